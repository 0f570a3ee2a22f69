//! Spatial hashing for neighbor search.
//!
//! Space is divided into square cells of side `cell_size`. A cell's integer
//! coordinates are hashed with two large primes and folded into a fixed number
//! of buckets. Every step the table is rebuilt as a count-sort style structure:
//!
//! 1. one [`HashEntry`] `(particle_index, cell_key)` per particle,
//! 2. entries sorted by `(cell_key, particle_index)`,
//! 3. a start table giving, per bucket, the offset of its first entry.
//!
//! All entries sharing a key form one contiguous run, so a bucket lookup is a
//! table read followed by a linear scan. Unrelated cells may share a bucket,
//! which means the candidates returned for a query are a superset of the true
//! neighbors. Callers always apply an exact distance test.
//!
//! Negative cell coordinates are reinterpreted as two's-complement `u32`
//! before hashing, so some negative cells cluster into the same buckets more
//! often than positive ones.

use glam::{IVec2, Vec2};
use rayon::prelude::*;

/// First hashing prime (x axis).
pub const HASH_P1: u32 = 73856093;
/// Second hashing prime (y axis).
pub const HASH_P2: u32 = 19349663;

/// Start-table value for a bucket that holds no entries.
pub const EMPTY_BUCKET: u32 = u32::MAX;

/// Offsets of the Moore neighborhood, center cell first.
pub const NEIGHBOR_OFFSETS: [IVec2; 9] = [
    IVec2::new(0, 0),
    IVec2::new(1, 0),
    IVec2::new(1, -1),
    IVec2::new(0, -1),
    IVec2::new(-1, -1),
    IVec2::new(-1, 0),
    IVec2::new(-1, 1),
    IVec2::new(0, 1),
    IVec2::new(1, 1),
];

/// One particle's slot in the sorted entry array.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct HashEntry {
    pub particle_index: u32,
    pub cell_key: u32,
}

/// Hash a cell coordinate. Wrapping arithmetic, identical to the GPU path.
#[inline]
pub fn hash_cell(cell: IVec2) -> u32 {
    (cell.x as u32).wrapping_mul(HASH_P1) ^ (cell.y as u32).wrapping_mul(HASH_P2)
}

/// Spatial hash rebuilt from scratch every step.
#[derive(Clone, Debug)]
pub struct SpatialHash {
    cell_size: f32,
    inv_cell_size: f32,
    bucket_count: u32,
    entries: Vec<HashEntry>,
    start_indices: Vec<u32>,
}

impl SpatialHash {
    /// Create an empty hash. `cell_size` should be at least the smoothing
    /// radius; `bucket_count` is usually the particle count.
    pub fn new(cell_size: f32, bucket_count: u32) -> Self {
        let bucket_count = bucket_count.max(1);
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            bucket_count,
            entries: Vec::new(),
            start_indices: vec![EMPTY_BUCKET; bucket_count as usize],
        }
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    pub fn bucket_count(&self) -> u32 {
        self.bucket_count
    }

    /// Cell containing `position`, rounding half up on both axes.
    ///
    /// Rounding with `floor(x + 0.5)` keeps the cell distance of two points at
    /// most one whenever their distance is at most `cell_size`, which is what
    /// makes the 3×3 neighborhood complete.
    #[inline]
    pub fn cell_of(&self, position: Vec2) -> IVec2 {
        let scaled = position * self.inv_cell_size + Vec2::splat(0.5);
        IVec2::new(scaled.x.floor() as i32, scaled.y.floor() as i32)
    }

    /// Fold a cell hash into a bucket.
    #[inline]
    pub fn key_of(&self, hash: u32) -> u32 {
        hash % self.bucket_count
    }

    /// Bucket of a cell.
    #[inline]
    pub fn cell_key(&self, cell: IVec2) -> u32 {
        self.key_of(hash_cell(cell))
    }

    /// The cell holding `position` and its eight neighbors, center first.
    pub fn surrounding_cells(&self, position: Vec2) -> [IVec2; 9] {
        let center = self.cell_of(position);
        NEIGHBOR_OFFSETS.map(|offset| center + offset)
    }

    /// Rebuild from the predicted positions of a particle buffer.
    pub fn rebuild(&mut self, particles: &[crate::Particle], parallel: bool) {
        self.rebuild_with(particles.len(), parallel, |i| particles[i].predicted_position);
    }

    /// Rebuild from a plain list of positions.
    pub fn rebuild_from_positions(&mut self, positions: &[Vec2], parallel: bool) {
        self.rebuild_with(positions.len(), parallel, |i| positions[i]);
    }

    fn rebuild_with<F>(&mut self, count: usize, parallel: bool, position_of: F)
    where
        F: Fn(usize) -> Vec2 + Sync,
    {
        let this = &*self;
        let entry_for = |i: usize| HashEntry {
            particle_index: i as u32,
            cell_key: this.cell_key(this.cell_of(position_of(i))),
        };
        let fresh: Vec<HashEntry> = if parallel {
            (0..count).into_par_iter().map(entry_for).collect()
        } else {
            (0..count).map(entry_for).collect()
        };
        self.entries = fresh;

        // Sorting on (key, index) is a stable sort on key with index tie-break.
        if parallel {
            self.entries
                .par_sort_unstable_by_key(|e| (e.cell_key, e.particle_index));
        } else {
            self.entries
                .sort_unstable_by_key(|e| (e.cell_key, e.particle_index));
        }

        self.start_indices.fill(EMPTY_BUCKET);
        for (i, entry) in self.entries.iter().enumerate() {
            let first_of_run = i == 0 || self.entries[i - 1].cell_key != entry.cell_key;
            if first_of_run {
                self.start_indices[entry.cell_key as usize] = i as u32;
            }
        }
    }

    /// Entries in sorted order.
    #[inline]
    pub fn entries(&self) -> &[HashEntry] {
        &self.entries
    }

    /// Per-bucket offset of the first entry, or [`EMPTY_BUCKET`].
    #[inline]
    pub fn start_indices(&self) -> &[u32] {
        &self.start_indices
    }

    /// Number of buckets holding at least one particle.
    pub fn occupied_buckets(&self) -> usize {
        self.start_indices
            .iter()
            .filter(|&&start| start != EMPTY_BUCKET)
            .count()
    }

    /// Particles stored in the bucket of `cell`.
    ///
    /// This is every particle whose cell hashes to the same bucket, not only
    /// those inside `cell`.
    pub fn neighbors_of_cell(&self, cell: IVec2) -> BucketIter<'_> {
        self.bucket(self.cell_key(cell))
    }

    /// Particles stored in bucket `key`.
    pub fn bucket(&self, key: u32) -> BucketIter<'_> {
        let start = self
            .start_indices
            .get(key as usize)
            .copied()
            .unwrap_or(EMPTY_BUCKET);
        BucketIter {
            entries: &self.entries,
            key,
            cursor: if start == EMPTY_BUCKET {
                self.entries.len()
            } else {
                start as usize
            },
        }
    }

    /// Candidate neighbors of `position`: the contents of the buckets of the
    /// nine surrounding cells. Buckets shared by several of those cells are
    /// visited once, so no candidate is yielded twice.
    pub fn candidates(&self, position: Vec2) -> Candidates<'_> {
        let mut keys = [0u32; 9];
        let mut key_count = 0;
        for cell in self.surrounding_cells(position) {
            let key = self.cell_key(cell);
            if !keys[..key_count].contains(&key) {
                keys[key_count] = key;
                key_count += 1;
            }
        }
        Candidates {
            hash: self,
            keys,
            key_count,
            next_key: 0,
            current: None,
        }
    }
}

/// Iterator over the particle indices of one bucket.
#[derive(Clone, Debug)]
pub struct BucketIter<'a> {
    entries: &'a [HashEntry],
    key: u32,
    cursor: usize,
}

impl Iterator for BucketIter<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        let entry = self.entries.get(self.cursor)?;
        if entry.cell_key != self.key {
            self.cursor = self.entries.len();
            return None;
        }
        self.cursor += 1;
        Some(entry.particle_index as usize)
    }
}

/// Iterator over the candidate neighbors of a position.
#[derive(Clone, Debug)]
pub struct Candidates<'a> {
    hash: &'a SpatialHash,
    keys: [u32; 9],
    key_count: usize,
    next_key: usize,
    current: Option<BucketIter<'a>>,
}

impl Iterator for Candidates<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if let Some(index) = self.current.as_mut().and_then(Iterator::next) {
                return Some(index);
            }
            if self.next_key >= self.key_count {
                return None;
            }
            self.current = Some(self.hash.bucket(self.keys[self.next_key]));
            self.next_key += 1;
        }
    }
}
