// End-to-end cascade runs with mocked generators

mod common;

use aircascade::{
    CascadeEngine, EngineConfig, Error, FinalKind, IdAllocator, MixingTieBreak, ParticleRecord,
    ProductionKind, RejectionReason, TypeCatalog,
};
use common::*;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[test]
fn test_final_type_primary_is_reported_unchanged() {
    let mut engine = engine(seeded_config(1), AlwaysReject, NoDecay);
    engine.run(22, 1.0e3, 1.0, 0.0).unwrap();

    let finals = engine.final_particles();
    assert_eq!(finals.len(), 1);
    let photon = finals.get(0);
    assert_eq!(photon.type_code, 22);
    assert_eq!(photon.energy, 1.0e3);
    assert_eq!(photon.generation, 0);
    assert_eq!(photon.production, ProductionKind::Primary);
    assert_eq!(photon.final_kind, FinalKind::None);
    assert!(engine.archival_particles().is_empty());
    assert_eq!(engine.generated_particles().len(), 1);
    assert_eq!(engine.stats().interactions, 0);
    assert_eq!(engine.stats().decays, 0);
    assert_eq!(engine.stats().runs, 1);
}

#[test]
fn test_binary_splitting_conserves_energy() {
    let mut engine = CascadeEngine::with_cross_sections(
        seeded_config(2),
        TypeCatalog::air_shower_default(),
        Box::new(SplitInTwo),
        Box::new(NoDecay),
        Box::new(short_nucleon_lengths(1.0e-3)),
    )
    .unwrap();
    engine.run(2212, 1024.0, 1.0, 0.0).unwrap();

    let finals = engine.final_particles();
    // Ten halvings bring 1024 GeV down to the 1 GeV threshold
    assert_eq!(finals.len(), 1024);
    assert_eq!(engine.stats().interactions, 1023);
    assert!(finals.iter().all(|p| p.type_code == 2212
        && p.energy == 1.0
        && p.generation == 10
        && p.final_kind == FinalKind::BelowThreshold));
    assert_eq!(finals.total_energy(), 1024.0);
    assert_eq!(engine.archival_particles().len(), 1023);
    assert!(engine
        .archival_particles()
        .final_kinds()
        .iter()
        .all(|k| *k == FinalKind::Interacted));
    engine.check_unique_ids().unwrap();
}

#[test]
fn test_mixed_primary_below_crossover_never_interacts() {
    let (hadronic, calls) = Counting::new(AlwaysReject);
    let mut engine = engine(seeded_config(3), hadronic, ScriptedDecay::default());
    engine.run(211, 50.0, 1.0, 0.0).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(engine.stats().interactions, 0);
    assert_eq!(engine.stats().rejections, 0);
    let total = engine.final_particles().total_energy();
    assert!(relative_difference(total, 50.0) < 1e-9);
}

#[test]
fn test_rejected_proton_is_final_with_reason_archived() {
    let mut engine = engine(seeded_config(4), AlwaysReject, NoDecay);
    engine.run(2212, 1.0e5, 1.0, 0.0).unwrap();

    let finals = engine.final_particles();
    assert_eq!(finals.len(), 1);
    let proton = finals.get(0);
    assert_eq!(proton.final_kind, FinalKind::ReachedGround);
    assert_eq!(proton.rejection, Some(RejectionReason::UnsupportedProjectile));

    let archived = engine.archival_particles();
    assert_eq!(archived.len(), 1);
    let record = archived.get(0);
    assert_eq!(record.id, proton.id);
    assert_eq!(record.final_kind, FinalKind::RejectedByGenerator);
    assert_eq!(record.rejection, Some(RejectionReason::UnsupportedProjectile));
}

#[test]
fn test_rejected_pion_is_routed_to_decay() {
    let (hadronic, calls) = Counting::new(AlwaysReject);
    let mut engine = engine(seeded_config(5), hadronic, ScriptedDecay::default());
    engine.run(211, 1.0e7, 1.0, 0.0).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.stats().rejections, 1);
    let primary_id = engine.generated_particles().ids()[0];
    assert!(engine.archival_particles().iter().any(|r| r.id == primary_id
        && r.final_kind == FinalKind::RejectedByGenerator
        && r.rejection == Some(RejectionReason::UnsupportedProjectile)));
    let total = engine.final_particles().total_energy();
    assert!(relative_difference(total, 1.0e7) < 1e-9);
}

#[test]
fn test_mixed_type_at_crossover_follows_tie_break() {
    // A stable mixed type never wins the decay race, so the routing alone
    // decides whether the generator is called.
    let catalog = || {
        TypeCatalog::builder()
            .final_types(&[22])
            .mixed(2212, 1000.0)
            .build()
            .unwrap()
    };

    let (hadronic, calls) = Counting::new(AlwaysReject);
    let mut engine = CascadeEngine::with_cross_sections(
        seeded_config(6),
        catalog(),
        Box::new(hadronic),
        Box::new(NoDecay),
        Box::new(short_nucleon_lengths(1.0)),
    )
    .unwrap();
    engine.run(2212, 1000.0, 1.0, 0.0).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let config = EngineConfig {
        mixing_tie_break: MixingTieBreak::Decay,
        ..seeded_config(6)
    };
    let (hadronic, calls) = Counting::new(AlwaysReject);
    let mut engine = CascadeEngine::with_cross_sections(
        config,
        catalog(),
        Box::new(hadronic),
        Box::new(NoDecay),
        Box::new(short_nucleon_lengths(1.0)),
    )
    .unwrap();
    engine.run(2212, 1000.0, 1.0, 0.0).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        engine.final_particles().final_kinds(),
        &[FinalKind::ReachedGround]
    );
}

fn by_id(records: impl Iterator<Item = ParticleRecord>) -> HashMap<i64, ParticleRecord> {
    records.map(|r| (r.id, r)).collect()
}

#[test]
fn test_toy_cascade_invariants() {
    let mut engine = toy_engine(42);
    engine.run(2212, 1.0e5, 10.0, 0.0).unwrap();
    engine.check_unique_ids().unwrap();

    let finals = engine.final_particles();
    let archived = engine.archival_particles();
    let generated = by_id(engine.generated_particles().iter());
    assert!(finals.len() > 10);
    assert!(engine.stats().interactions > 1);
    assert!(engine.stats().decays > 1);

    // Energy: every generator conserves it exactly
    assert!(relative_difference(finals.total_energy(), 1.0e5) < 1e-9);

    // Lineage: depth never decreases, generation counts production steps
    for r in generated.values() {
        if r.parent_id == 0 {
            assert_eq!(r.production, ProductionKind::Primary);
            continue;
        }
        let parent = &generated[&r.parent_id];
        assert!(r.depth >= parent.depth, "child {} above parent", r.id);
        assert_eq!(r.generation, parent.generation + 1);
    }

    // Every created particle ends exactly once: final or consumed
    let final_ids: HashSet<i64> = finals.ids().iter().copied().collect();
    let consumed: HashSet<i64> = archived
        .iter()
        .filter(|r| matches!(r.final_kind, FinalKind::Interacted | FinalKind::DecayedAway))
        .map(|r| r.id)
        .collect();
    assert!(final_ids.is_disjoint(&consumed));
    assert_eq!(final_ids.len() + consumed.len(), generated.len());

    let stop = engine.stop_depth();
    let catalog = engine.catalog();
    for p in finals.iter() {
        assert!(p.depth_stop >= p.depth);
        assert!(p.depth <= stop);
        assert!(catalog.is_trackable(p.type_code));
        assert!(!matches!(
            p.final_kind,
            FinalKind::Interacted | FinalKind::DecayedAway
        ));
        if p.final_kind == FinalKind::ReachedGround {
            assert_eq!(p.depth_stop, stop);
        }
        if p.type_code == 2212 && p.final_kind == FinalKind::ReachedGround {
            assert_eq!(p.depth_decay, stop);
        }
        if p.final_kind == FinalKind::BelowThreshold {
            assert!(p.energy <= 10.0);
        }
    }
    for r in archived.iter() {
        match r.final_kind {
            FinalKind::Interacted => {
                assert!(r.depth_inter >= r.depth);
                assert_eq!(r.depth_stop, r.depth_inter);
            }
            FinalKind::DecayedAway => {
                assert!(r.depth_decay >= r.depth);
                assert_eq!(r.depth_stop, r.depth_decay);
            }
            _ => {}
        }
    }
}

#[test]
fn test_accumulated_runs_keep_ids_unique() {
    let config = EngineConfig {
        accumulate_runs: true,
        ..seeded_config(7)
    };
    let mut engine = engine(config, LeadingParticle, ScriptedDecay::default());
    engine.run(2212, 1.0e3, 10.0, 0.0).unwrap();
    let after_first = engine.final_particles().len();
    engine.run(2212, 1.0e3, 10.0, 0.0).unwrap();

    assert!(engine.final_particles().len() > after_first);
    assert_eq!(engine.stats().runs, 2);
    engine.check_unique_ids().unwrap();
    let total = engine.final_particles().total_energy();
    assert!(relative_difference(total, 2.0e3) < 1e-9);
}

#[test]
fn test_stop_height_above_ground() {
    let mut engine = toy_engine(8);
    engine.run(2212, 1.0e4, 10.0, 5.0e5).unwrap();
    let stop = engine.stop_depth();
    assert!(stop < engine.max_depth());
    assert!((stop - engine.height_to_depth(5.0e5)).abs() < 1e-9);
    for p in engine.final_particles().iter() {
        assert!(p.depth <= stop);
        assert!(p.depth_stop <= stop);
    }
}

#[test]
fn test_failed_run_leaves_accumulated_results_untouched() {
    let config = EngineConfig {
        accumulate_runs: true,
        ..seeded_config(9)
    };
    let mut engine = engine(config, PhotonAndPion, EmptyDecay);
    engine.run(22, 100.0, 1.0, 0.0).unwrap();
    let finals_before: Vec<_> = engine.final_particles().iter().collect();
    let stats_before = *engine.stats();

    // The pion child reaches the decay generator, whose record is empty
    let err = engine.run(2212, 1.0e3, 1.0, 0.0).unwrap_err();
    assert!(matches!(err, Error::GeneratorContract(_)));

    let finals_after: Vec<_> = engine.final_particles().iter().collect();
    assert_eq!(finals_after, finals_before);
    assert!(engine.archival_particles().is_empty());
    assert_eq!(engine.generated_particles().len(), 1);
    assert_eq!(*engine.stats(), stats_before);

    // The engine stays usable
    engine.run(22, 100.0, 1.0, 0.0).unwrap();
    assert_eq!(engine.final_particles().len(), 2);
    assert_eq!(engine.stats().runs, 2);
}

#[test]
fn test_duplicate_ids_abort_the_run() {
    let ids = Arc::new(IdAllocator::new());
    let accumulating = EngineConfig {
        accumulate_runs: true,
        ..seeded_config(10)
    };
    let resetting = EngineConfig {
        reset_ids: true,
        ..seeded_config(11)
    };
    let mut a = engine(accumulating, AlwaysReject, NoDecay).with_id_allocator(Arc::clone(&ids));
    let mut b = engine(resetting, AlwaysReject, NoDecay).with_id_allocator(Arc::clone(&ids));

    a.run(22, 1.0e3, 1.0, 0.0).unwrap();
    // Restarts the allocator that `a` is still using
    b.reset();
    let err = a.run(22, 1.0e3, 1.0, 0.0).unwrap_err();
    assert!(matches!(err, Error::DuplicateId(1)));

    assert_eq!(a.final_particles().ids(), &[1]);
    assert_eq!(a.generated_particles().ids(), &[1]);
    assert_eq!(a.stats().runs, 1);
    a.check_unique_ids().unwrap();
}
