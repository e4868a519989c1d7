use std::time::Duration;

/// Counters accumulated by a [`crate::CascadeEngine`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunStats {
    /// Accepted hadronic interactions.
    pub interactions: usize,
    /// Decay events, counting every decay inside a chain.
    pub decays: usize,
    /// Interactions refused by the generator.
    pub rejections: usize,
    /// Completed calls to `run`.
    pub runs: usize,
    /// Wall time spent inside the propagation loop.
    pub elapsed: Duration,
}

impl RunStats {
    pub fn clear(&mut self) {
        *self = RunStats::default();
    }

    /// Mean wall time per completed run.
    pub fn mean_run_time(&self) -> Option<Duration> {
        if self.runs == 0 {
            return None;
        }
        let runs = u32::try_from(self.runs).ok()?;
        Some(self.elapsed / runs)
    }
}
