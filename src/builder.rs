use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::bounds::{BoundingBox, Vec3};
use crate::density::DensityGrid;
use crate::error::{DatabaseError, Result};
use crate::format::{self, Block, Header, HEADER_SIZE};
use crate::particle::SmoothParticle;
use crate::util::Timed;

/// Options for [`crate::FileDatabase::create`].
#[derive(Clone, Copy, Debug)]
pub struct BuildOptions {
    /// Number of blocks along each axis of the index.
    pub blocks_per_axis: usize,
    /// Log build phases at INFO instead of DEBUG level.
    pub verbose: bool,
    /// Compute each particle's `rho` before writing. When disabled the
    /// caller's values are stored as they are.
    pub compute_density: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            blocks_per_axis: 16,
            verbose: false,
            compute_density: true,
        }
    }
}

impl BuildOptions {
    pub fn new(blocks_per_axis: usize) -> Self {
        Self {
            blocks_per_axis,
            ..Self::default()
        }
    }

    /// Checks the options against the particles to be written.
    pub fn validate(&self, particles: &[SmoothParticle]) -> Result<()> {
        let n = self.blocks_per_axis as u64;
        if n == 0 {
            return Err(DatabaseError::InvalidConfig(
                "blocks_per_axis must be > 0".to_string(),
            ));
        }
        if n * n * n > u32::MAX as u64 {
            return Err(DatabaseError::InvalidConfig(format!(
                "blocks_per_axis {} exceeds the block table limit",
                n
            )));
        }
        if particles.len() as u64 > u32::MAX as u64 {
            return Err(DatabaseError::InvalidConfig(format!(
                "{} particles exceed the file format limit",
                particles.len()
            )));
        }
        for (i, p) in particles.iter().enumerate() {
            if !(p.smoothing_length.is_finite() && p.smoothing_length > 0.0) {
                return Err(DatabaseError::InvalidConfig(format!(
                    "particle {} has smoothing length {}, must be finite and > 0",
                    i, p.smoothing_length
                )));
            }
            if !p.position.iter().all(|v| v.is_finite()) {
                return Err(DatabaseError::InvalidConfig(format!(
                    "particle {} has a non-finite position",
                    i
                )));
            }
        }
        Ok(())
    }
}

/// The uniform block layout spanning `[lower, upper]`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BlockGrid {
    pub lower: Vec3,
    pub blocks_per_axis: usize,
    pub block_size: Vec3,
    /// Rounding allowance between `axis_index` and `block_bounds`.
    pub slack: f32,
}

impl BlockGrid {
    pub fn new(lower: Vec3, upper: Vec3, blocks_per_axis: usize) -> Self {
        let n = blocks_per_axis as f32;
        let magnitude = lower
            .iter()
            .chain(upper.iter())
            .fold(0.0f32, |m, v| m.max(v.abs()));
        Self {
            lower,
            blocks_per_axis,
            block_size: [
                (upper[0] - lower[0]) / n,
                (upper[1] - lower[1]) / n,
                (upper[2] - lower[2]) / n,
            ],
            slack: 8.0 * f32::EPSILON * magnitude,
        }
    }

    /// Block coordinate of `value` along `axis`. Cells are half-open except
    /// the last one, values outside the grid are clamped.
    pub fn axis_index(&self, axis: usize, value: f32) -> usize {
        let size = self.block_size[axis] as f64;
        if size <= 0.0 {
            return 0;
        }
        let t = ((value as f64 - self.lower[axis] as f64) / size).floor();
        t.clamp(0.0, (self.blocks_per_axis - 1) as f64) as usize
    }

    pub fn flat_index(&self, ix: usize, iy: usize, iz: usize) -> usize {
        let n = self.blocks_per_axis;
        ix * n * n + iy * n + iz
    }

    /// Strict box of block `(ix, iy, iz)`.
    pub fn block_bounds(&self, ix: usize, iy: usize, iz: usize) -> BoundingBox {
        let idx = [ix, iy, iz];
        let mut min = [0.0f32; 3];
        let mut max = [0.0f32; 3];
        for i in 0..3 {
            min[i] = self.lower[i] + idx[i] as f32 * self.block_size[i];
            max[i] = min[i] + self.block_size[i];
        }
        BoundingBox::new(min, max)
    }
}

/// Tight box over the expanded extents (center +- smoothing length).
pub(crate) fn expanded_bounds(particles: &[SmoothParticle]) -> BoundingBox {
    let mut iter = particles.iter();
    let Some(first) = iter.next() else {
        return BoundingBox::new([0.0; 3], [0.0; 3]);
    };
    let mut bounds = first.expanded_bounds();
    for p in iter {
        bounds.merge(&p.expanded_bounds());
    }
    bounds
}

/// Assigns every particle to the block containing its position.
///
/// `particles` must be sorted by X. Returns the block table and the particle
/// indices in file order. Each X slab is a contiguous run of the sorted slice,
/// found by binary search, and is bucketed by `(iy, iz)` with a stable
/// counting sort.
pub(crate) fn assign_blocks(
    particles: &[SmoothParticle],
    grid: &BlockGrid,
    verbose: bool,
) -> (Vec<Block>, Vec<usize>) {
    let n = grid.blocks_per_axis;
    let mut blocks = vec![Block::default(); n * n * n];
    let mut order = Vec::with_capacity(particles.len());

    let mut cell_counts = vec![0usize; n * n];
    let mut cell_keys = Vec::new();
    let mut slab_order = Vec::new();

    let mut slab_start = 0;
    for ix in 0..n {
        let slab_end = slab_start
            + particles[slab_start..].partition_point(|p| grid.axis_index(0, p.position[0]) <= ix);
        let slab = slab_start..slab_end;

        cell_counts.iter_mut().for_each(|c| *c = 0);
        cell_keys.clear();
        for p in &particles[slab.clone()] {
            let key = grid.axis_index(1, p.position[1]) * n + grid.axis_index(2, p.position[2]);
            cell_keys.push(key);
            cell_counts[key] += 1;
        }

        // Exclusive prefix sums give each cell's first slot in the slab.
        let mut cell_offsets = Vec::with_capacity(n * n);
        let mut running = 0;
        for &c in &cell_counts {
            cell_offsets.push(running);
            running += c;
        }
        slab_order.clear();
        slab_order.resize(slab.len(), 0);
        for (k, &key) in cell_keys.iter().enumerate() {
            slab_order[cell_offsets[key]] = slab.start + k;
            cell_offsets[key] += 1;
        }

        let mut cursor = 0;
        for key in 0..n * n {
            let count = cell_counts[key];
            let block = &mut blocks[ix * n * n + key];
            block.start = order.len() as u32;
            block.count = count as u32;
            block.margin = 0.0;
            for &i in &slab_order[cursor..cursor + count] {
                block.margin = block.margin.max(particles[i].smoothing_length);
                order.push(i);
            }
            cursor += count;
        }

        if verbose {
            log::info!("x slab {}/{}: {} particles", ix + 1, n, slab.len());
        } else {
            log::trace!("x slab {}/{}: {} particles", ix + 1, n, slab.len());
        }
        slab_start = slab_end;
    }

    (blocks, order)
}

/// Writes `particles` to `path` as a block indexed database.
pub(crate) fn create(particles: &mut [SmoothParticle], path: &Path, options: &BuildOptions) -> Result<()> {
    options.validate(particles)?;
    let verbose = options.verbose;
    let _total = Timed::new("create particle database", verbose);
    log::debug!("creating {} with {} particles", path.display(), particles.len());

    {
        let _t = Timed::new("sort particles", verbose);
        particles.sort_by(|a, b| a.position[0].total_cmp(&b.position[0]));
    }

    let bounds = expanded_bounds(particles);

    if options.compute_density {
        let _t = Timed::new("compute densities", verbose);
        DensityGrid::compute(particles);
    }

    let grid = BlockGrid::new(bounds.min, bounds.max, options.blocks_per_axis);
    let (blocks, order) = {
        let _t = Timed::new("assign blocks", verbose);
        assign_blocks(particles, &grid, verbose)
    };

    let header = Header {
        count: particles.len() as u32,
        lower: bounds.min,
        upper: bounds.max,
        blocks_per_axis: options.blocks_per_axis as u32,
    };

    let _t = Timed::new("write particles", verbose);
    let mut out = BufWriter::new(File::create(path)?);
    format::write_header(&mut out, &header)?;
    let placeholder = Block::default();
    for _ in 0..blocks.len() {
        format::write_block(&mut out, &placeholder)?;
    }
    for &i in &order {
        format::write_particle(&mut out, &particles[i])?;
    }

    out.seek(SeekFrom::Start(HEADER_SIZE))?;
    for block in &blocks {
        format::write_block(&mut out, block)?;
    }
    out.flush()?;
    Ok(())
}
