// Columnar particle store
//
// Every collection the engine keeps (working, decay, final, archival, ...) is a
// ParticleBatch. Rows are copied between batches by index; a batch never
// borrows rows owned by another batch.

use crate::error::{Error, Result};
use crate::id_allocator::IdAllocator;
use crate::particle::{DepthFlag, FinalKind, ParticleRecord, ProductionKind, RejectionReason};
use std::ops::Range;

/// Rows reserved by [`ParticleBatch::new`].
pub const INITIAL_CAPACITY: usize = 1000;

/// Hard ceiling on the number of rows a batch may hold.
pub const DEFAULT_MAX_CAPACITY: usize = 100_000_000;

/// A value given to [`ParticleBatch::push`]: either broadcast to every new row
/// or one value per new row.
#[derive(Debug, Clone, Copy)]
pub enum Field<'a, T> {
    Scalar(T),
    Column(&'a [T]),
}

impl<T: Copy> Field<'_, T> {
    fn column_len(&self) -> Option<usize> {
        match self {
            Field::Scalar(_) => None,
            Field::Column(values) => Some(values.len()),
        }
    }

    #[inline]
    fn at(&self, i: usize) -> T {
        match self {
            Field::Scalar(value) => *value,
            Field::Column(values) => values[i],
        }
    }
}

/// Field values for a push. Unset fields default to zero / `Primary`.
#[derive(Debug, Clone, Copy)]
pub struct PushFields<'a> {
    pub type_code: Field<'a, i32>,
    pub energy: Field<'a, f64>,
    pub depth: Field<'a, f64>,
    pub generation: Field<'a, i32>,
    pub parent_id: Field<'a, i64>,
    pub production: Field<'a, ProductionKind>,
}

impl Default for PushFields<'_> {
    fn default() -> Self {
        Self {
            type_code: Field::Scalar(0),
            energy: Field::Scalar(0.0),
            depth: Field::Scalar(0.0),
            generation: Field::Scalar(0),
            parent_id: Field::Scalar(0),
            production: Field::Scalar(ProductionKind::Primary),
        }
    }
}

impl PushFields<'_> {
    /// Number of rows described, or a panic if column lengths disagree.
    fn row_count(&self) -> usize {
        let lengths = [
            self.type_code.column_len(),
            self.energy.column_len(),
            self.depth.column_len(),
            self.generation.column_len(),
            self.parent_id.column_len(),
            self.production.column_len(),
        ];
        let mut rows: Option<usize> = None;
        for len in lengths.into_iter().flatten() {
            match rows {
                None => rows = Some(len),
                Some(n) => assert_eq!(
                    n, len,
                    "push: column fields must all have the same length"
                ),
            }
        }
        rows.unwrap_or(1)
    }
}

/// Growable struct-of-arrays container of particle records.
///
/// `len()` counts valid rows; `capacity()` counts rows the columns have room
/// for. Capacity doubles when exceeded and never goes past `max_capacity`.
#[derive(Debug, Clone)]
pub struct ParticleBatch {
    id: Vec<i64>,
    parent_id: Vec<i64>,
    type_code: Vec<i32>,
    energy: Vec<f64>,
    depth: Vec<f64>,
    depth_stop: Vec<f64>,
    depth_decay: Vec<f64>,
    depth_inter: Vec<f64>,
    generation: Vec<i32>,
    production: Vec<ProductionKind>,
    final_kind: Vec<FinalKind>,
    ready_flag: Vec<DepthFlag>,
    rejection: Vec<Option<RejectionReason>>,
    capacity: usize,
    max_capacity: usize,
}

impl ParticleBatch {
    /// Create an empty batch with the default initial capacity.
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    /// Create an empty batch with room for `capacity` rows.
    pub fn with_capacity(capacity: usize) -> Self {
        ParticleBatch {
            id: Vec::with_capacity(capacity),
            parent_id: Vec::with_capacity(capacity),
            type_code: Vec::with_capacity(capacity),
            energy: Vec::with_capacity(capacity),
            depth: Vec::with_capacity(capacity),
            depth_stop: Vec::with_capacity(capacity),
            depth_decay: Vec::with_capacity(capacity),
            depth_inter: Vec::with_capacity(capacity),
            generation: Vec::with_capacity(capacity),
            production: Vec::with_capacity(capacity),
            final_kind: Vec::with_capacity(capacity),
            ready_flag: Vec::with_capacity(capacity),
            rejection: Vec::with_capacity(capacity),
            capacity,
            max_capacity: DEFAULT_MAX_CAPACITY.max(capacity),
        }
    }

    /// Set the growth ceiling.
    pub fn with_max_capacity(mut self, max_capacity: usize) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Empty batch sharing this batch's growth ceiling.
    fn empty_like(&self, capacity: usize) -> Self {
        Self::with_capacity(capacity).with_max_capacity(self.max_capacity)
    }

    /// Number of valid rows.
    pub fn len(&self) -> usize {
        self.type_code.len()
    }

    /// True when the batch holds no valid rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of rows the columns can hold before growing.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Row count beyond which growth fails.
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Make room for `rows` valid rows in total, doubling the capacity as needed.
    fn ensure_rows(&mut self, rows: usize) -> Result<()> {
        if rows <= self.capacity {
            return Ok(());
        }
        if rows > self.max_capacity {
            return Err(Error::CapacityExceeded {
                requested: rows,
                limit: self.max_capacity,
            });
        }
        let mut new_capacity = self.capacity.max(1);
        while new_capacity < rows {
            new_capacity = new_capacity.saturating_mul(2);
        }
        let new_capacity = new_capacity.min(self.max_capacity);
        let additional = new_capacity - self.len();

        self.id.reserve_exact(additional);
        self.parent_id.reserve_exact(additional);
        self.type_code.reserve_exact(additional);
        self.energy.reserve_exact(additional);
        self.depth.reserve_exact(additional);
        self.depth_stop.reserve_exact(additional);
        self.depth_decay.reserve_exact(additional);
        self.depth_inter.reserve_exact(additional);
        self.generation.reserve_exact(additional);
        self.production.reserve_exact(additional);
        self.final_kind.reserve_exact(additional);
        self.ready_flag.reserve_exact(additional);
        self.rejection.reserve_exact(additional);
        self.capacity = new_capacity;
        Ok(())
    }

    /// Append one or more rows and return their index range.
    ///
    /// Scalar fields are broadcast; column fields give one value per row.
    /// New rows have no id, `depth_stop == depth`, a stale decay depth and no
    /// final kind.
    ///
    /// # Panics
    /// If column fields have different lengths.
    pub fn push(&mut self, fields: PushFields<'_>) -> Result<Range<usize>> {
        let rows = fields.row_count();
        let start = self.len();
        self.ensure_rows(start + rows)?;
        for i in 0..rows {
            let depth = fields.depth.at(i);
            self.id.push(0);
            self.parent_id.push(fields.parent_id.at(i));
            self.type_code.push(fields.type_code.at(i));
            self.energy.push(fields.energy.at(i));
            self.depth.push(depth);
            self.depth_stop.push(depth);
            self.depth_decay.push(0.0);
            self.depth_inter.push(0.0);
            self.generation.push(fields.generation.at(i));
            self.production.push(fields.production.at(i));
            self.final_kind.push(FinalKind::None);
            self.ready_flag.push(DepthFlag::Stale);
            self.rejection.push(None);
        }
        Ok(start..start + rows)
    }

    /// Append a full record and return its index.
    pub fn push_record(&mut self, record: &ParticleRecord) -> Result<usize> {
        let index = self.len();
        self.ensure_rows(index + 1)?;
        self.push_row_unchecked(record);
        Ok(index)
    }

    fn push_row_unchecked(&mut self, r: &ParticleRecord) {
        self.id.push(r.id);
        self.parent_id.push(r.parent_id);
        self.type_code.push(r.type_code);
        self.energy.push(r.energy);
        self.depth.push(r.depth);
        self.depth_stop.push(r.depth_stop);
        self.depth_decay.push(r.depth_decay);
        self.depth_inter.push(r.depth_inter);
        self.generation.push(r.generation);
        self.production.push(r.production);
        self.final_kind.push(r.final_kind);
        self.ready_flag.push(r.ready_flag);
        self.rejection.push(r.rejection);
    }

    /// Copy row `i` of `other` to the end of `self` (capacity already ensured).
    fn copy_row_from(&mut self, other: &ParticleBatch, i: usize) {
        self.id.push(other.id[i]);
        self.parent_id.push(other.parent_id[i]);
        self.type_code.push(other.type_code[i]);
        self.energy.push(other.energy[i]);
        self.depth.push(other.depth[i]);
        self.depth_stop.push(other.depth_stop[i]);
        self.depth_decay.push(other.depth_decay[i]);
        self.depth_inter.push(other.depth_inter[i]);
        self.generation.push(other.generation[i]);
        self.production.push(other.production[i]);
        self.final_kind.push(other.final_kind[i]);
        self.ready_flag.push(other.ready_flag[i]);
        self.rejection.push(other.rejection[i]);
    }

    /// Copy of row `i`.
    ///
    /// # Panics
    /// If `i >= len()`.
    pub fn get(&self, i: usize) -> ParticleRecord {
        ParticleRecord {
            id: self.id[i],
            parent_id: self.parent_id[i],
            type_code: self.type_code[i],
            energy: self.energy[i],
            depth: self.depth[i],
            depth_stop: self.depth_stop[i],
            depth_decay: self.depth_decay[i],
            depth_inter: self.depth_inter[i],
            generation: self.generation[i],
            production: self.production[i],
            final_kind: self.final_kind[i],
            ready_flag: self.ready_flag[i],
            rejection: self.rejection[i],
        }
    }

    /// Iterate over copies of the valid rows.
    pub fn iter(&self) -> impl Iterator<Item = ParticleRecord> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    /// New batch holding copies of the rows at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> ParticleBatch {
        let mut out = self.empty_like(indices.len());
        for &i in indices {
            out.copy_row_from(self, i);
        }
        out
    }

    /// New batch holding copies of the rows where `mask` is true.
    ///
    /// # Panics
    /// If `mask.len() != len()`.
    pub fn select_mask(&self, mask: &[bool]) -> ParticleBatch {
        assert_eq!(
            mask.len(),
            self.len(),
            "select_mask: mask length must equal batch length"
        );
        let indices: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect();
        self.select(&indices)
    }

    /// Copy all valid rows of `other` onto the end of `self`.
    pub fn append(&mut self, other: &ParticleBatch) -> Result<()> {
        if other.is_empty() {
            return Ok(());
        }
        self.ensure_rows(self.len() + other.len())?;
        for i in 0..other.len() {
            self.copy_row_from(other, i);
        }
        Ok(())
    }

    /// Drop all rows. Capacity is kept.
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Drop the last `n` rows (all of them if `n > len()`).
    pub fn clear_last(&mut self, n: usize) {
        self.truncate(self.len().saturating_sub(n));
    }

    /// Remove the last `n` rows and return them as a new batch.
    pub fn pop(&mut self, n: usize) -> ParticleBatch {
        let start = self.len().saturating_sub(n);
        let indices: Vec<usize> = (start..self.len()).collect();
        let popped = self.select(&indices);
        self.truncate(start);
        popped
    }

    /// Keep only the first `len` rows.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.id.truncate(len);
        self.parent_id.truncate(len);
        self.type_code.truncate(len);
        self.energy.truncate(len);
        self.depth.truncate(len);
        self.depth_stop.truncate(len);
        self.depth_decay.truncate(len);
        self.depth_inter.truncate(len);
        self.generation.truncate(len);
        self.production.truncate(len);
        self.final_kind.truncate(len);
        self.ready_flag.truncate(len);
        self.rejection.truncate(len);
    }

    /// Give every row a fresh id from `ids`.
    pub fn assign_ids(&mut self, ids: &IdAllocator) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let range = ids.allocate(self.len())?;
        for (slot, id) in self.id.iter_mut().zip(range) {
            *slot = id;
        }
        Ok(())
    }

    /// Sum of the energies of all valid rows.
    pub fn total_energy(&self) -> f64 {
        self.energy.iter().sum()
    }

    // Whole-batch attribute writes

    /// Set `final_kind` on every row.
    pub fn set_final_kind(&mut self, kind: FinalKind) {
        self.final_kind.fill(kind);
    }

    /// Set the production kind on every row.
    pub fn set_production_kind(&mut self, kind: ProductionKind) {
        self.production.fill(kind);
    }

    /// Set `depth_stop` on every row.
    pub fn set_depth_stop(&mut self, depth: f64) {
        self.depth_stop.fill(depth);
    }

    /// Set the decay-depth flag on every row.
    pub fn set_ready_flag(&mut self, flag: DepthFlag) {
        self.ready_flag.fill(flag);
    }

    // Column access

    /// Particle ids, 0 until assigned.
    pub fn ids(&self) -> &[i64] {
        &self.id
    }

    /// Ids of the producing particles, 0 for primaries.
    pub fn parent_ids(&self) -> &[i64] {
        &self.parent_id
    }

    /// PDG codes.
    pub fn type_codes(&self) -> &[i32] {
        &self.type_code
    }

    /// Total energies in GeV.
    pub fn energies(&self) -> &[f64] {
        &self.energy
    }

    /// Slant depths of creation in g/cm².
    pub fn depths(&self) -> &[f64] {
        &self.depth
    }

    /// Depths where the last propagation step ended.
    pub fn depth_stops(&self) -> &[f64] {
        &self.depth_stop
    }

    /// Sampled decay depths.
    pub fn depth_decays(&self) -> &[f64] {
        &self.depth_decay
    }

    /// Sampled interaction depths.
    pub fn depth_inters(&self) -> &[f64] {
        &self.depth_inter
    }

    /// Production events since the primary.
    pub fn generations(&self) -> &[i32] {
        &self.generation
    }

    /// How each row was produced.
    pub fn production_kinds(&self) -> &[ProductionKind] {
        &self.production
    }

    /// Why each row stopped propagating.
    pub fn final_kinds(&self) -> &[FinalKind] {
        &self.final_kind
    }

    /// Whether each decay depth is still valid.
    pub fn ready_flags(&self) -> &[DepthFlag] {
        &self.ready_flag
    }

    /// Hadronic generator rejections.
    pub fn rejections(&self) -> &[Option<RejectionReason>] {
        &self.rejection
    }

    /// Mutable creation depths.
    pub fn depths_mut(&mut self) -> &mut [f64] {
        &mut self.depth
    }

    /// Mutable step end depths.
    pub fn depth_stops_mut(&mut self) -> &mut [f64] {
        &mut self.depth_stop
    }

    /// Mutable decay depths.
    pub fn depth_decays_mut(&mut self) -> &mut [f64] {
        &mut self.depth_decay
    }

    /// Mutable interaction depths.
    pub fn depth_inters_mut(&mut self) -> &mut [f64] {
        &mut self.depth_inter
    }

    /// Mutable decay-depth flags.
    pub fn ready_flags_mut(&mut self) -> &mut [DepthFlag] {
        &mut self.ready_flag
    }

    /// Mutable final kinds.
    pub fn final_kinds_mut(&mut self) -> &mut [FinalKind] {
        &mut self.final_kind
    }

    /// Mutable rejection reasons.
    pub fn rejections_mut(&mut self) -> &mut [Option<RejectionReason>] {
        &mut self.rejection
    }

    /// Mutable generations.
    pub fn generations_mut(&mut self) -> &mut [i32] {
        &mut self.generation
    }

    /// Mutable parent ids.
    pub fn parent_ids_mut(&mut self) -> &mut [i64] {
        &mut self.parent_id
    }

    /// Mutable ids.
    pub fn ids_mut(&mut self) -> &mut [i64] {
        &mut self.id
    }
}

impl Default for ParticleBatch {
    fn default() -> Self {
        Self::new()
    }
}
