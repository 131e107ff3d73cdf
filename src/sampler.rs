use rayon::prelude::*;

use crate::bounds::Vec3;
use crate::error::{DatabaseError, Result};
use crate::particle::SmoothParticle;
use crate::visitor::ParticleVisitor;

struct Progress<'a> {
    interval: usize,
    callback: Box<dyn FnMut(usize) + 'a>,
}

/// Visitor that deposits particle fields onto a regular `n^3` grid.
///
/// The grid covers the cube `[offset, offset + size]` with cells of length
/// `size / n`. Cell `(x, y, z)` lives at `data[x * n * n + y * n + z]` and is
/// sampled at `offset + (x, y, z) * cell`. Each visited particle adds
/// `bfield * weight * mass / rho * kernel` to the cells within its support.
///
/// Particles are deposited one at a time; the cells of one particle are
/// written in parallel over disjoint X planes.
pub struct GridSampler<'a> {
    data: &'a mut [Vec3],
    n: usize,
    offset: Vec3,
    cell: f32,
    lower: [usize; 3],
    upper: [usize; 3],
    visited: usize,
    skipped: usize,
    progress: Option<Progress<'a>>,
}

impl<'a> GridSampler<'a> {
    /// Creates a sampler writing into `data`, which must hold `n^3` values.
    pub fn new(data: &'a mut [Vec3], n: usize, offset: Vec3, size: f32) -> Result<Self> {
        if n == 0 {
            return Err(DatabaseError::InvalidConfig("grid resolution must be > 0".to_string()));
        }
        if !(size.is_finite() && size > 0.0) {
            return Err(DatabaseError::InvalidConfig(format!(
                "grid size must be finite and > 0, got {}",
                size
            )));
        }
        let cells = n.checked_mul(n).and_then(|n2| n2.checked_mul(n));
        if cells != Some(data.len()) {
            return Err(DatabaseError::InvalidConfig(format!(
                "grid of resolution {} needs {}^3 values, got {}",
                n,
                n,
                data.len()
            )));
        }
        Ok(Self {
            data,
            n,
            offset,
            cell: size / n as f32,
            lower: [0; 3],
            upper: [n - 1; 3],
            visited: 0,
            skipped: 0,
            progress: None,
        })
    }

    /// Restricts writes to the inclusive index region `[lower, upper]`,
    /// clamped to the grid.
    pub fn limit(&mut self, lower: [usize; 3], upper: [usize; 3]) {
        let max = self.n - 1;
        for i in 0..3 {
            self.lower[i] = lower[i].min(max);
            self.upper[i] = upper[i].min(max);
        }
    }

    /// Calls `callback` with the number of visited particles every
    /// `interval` visits.
    pub fn on_progress<F>(&mut self, interval: usize, callback: F)
    where
        F: FnMut(usize) + 'a,
    {
        self.progress = Some(Progress {
            interval: interval.max(1),
            callback: Box::new(callback),
        });
    }

    /// Logs progress every million particles when enabled.
    pub fn show_progress(&mut self, enabled: bool) {
        if enabled {
            self.on_progress(1_000_000, |count| log::info!("sampled {} particles", count));
        } else {
            self.progress = None;
        }
    }

    pub fn cell_length(&self) -> f32 {
        self.cell
    }

    /// Particles visited since the last `begin`.
    pub fn visited(&self) -> usize {
        self.visited
    }

    /// Visited particles without a usable density.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Inclusive index range touched by a particle at `position` with
    /// influence radius `r`, or `None` when it misses the limit region.
    fn index_range(&self, position: &Vec3, r: f32) -> Option<([usize; 3], [usize; 3])> {
        let mut lo = [0usize; 3];
        let mut hi = [0usize; 3];
        for i in 0..3 {
            let rel = position[i] - self.offset[i];
            let a = ((rel - r) / self.cell).floor().max(self.lower[i] as f32);
            let b = ((rel + r) / self.cell).ceil().min(self.upper[i] as f32);
            if !(a <= b) {
                return None;
            }
            lo[i] = a as usize;
            hi[i] = b as usize;
        }
        Some((lo, hi))
    }

    fn report_progress(&mut self) {
        if let Some(progress) = &mut self.progress {
            if self.visited % progress.interval == 0 {
                (progress.callback)(self.visited);
            }
        }
        if self.visited % 10_000 == 0 {
            log::trace!("sampled {} particles", self.visited);
        }
    }
}

impl ParticleVisitor for GridSampler<'_> {
    fn begin(&mut self) {
        self.visited = 0;
        self.skipped = 0;
    }

    fn visit(&mut self, particle: &SmoothParticle) {
        self.visited += 1;
        self.report_progress();

        if !(particle.rho.is_finite() && particle.rho > 0.0) {
            self.skipped += 1;
            return;
        }
        let scale = particle.weight() * particle.mass / particle.rho;
        let value = [
            particle.bfield[0] * scale,
            particle.bfield[1] * scale,
            particle.bfield[2] * scale,
        ];

        // One extra cell keeps sample points near cell boundaries inside the range.
        let r = particle.smoothing_length + self.cell;
        let Some((lo, hi)) = self.index_range(&particle.position, r) else {
            return;
        };

        let n = self.n;
        let n2 = n * n;
        let cell = self.cell;
        let offset = self.offset;
        self.data[lo[0] * n2..(hi[0] + 1) * n2]
            .par_chunks_mut(n2)
            .enumerate()
            .for_each(|(i, plane)| {
                let mut p = [offset[0] + (lo[0] + i) as f32 * cell, 0.0, 0.0];
                for y in lo[1]..=hi[1] {
                    p[1] = offset[1] + y as f32 * cell;
                    for z in lo[2]..=hi[2] {
                        p[2] = offset[2] + z as f32 * cell;
                        let k = particle.kernel_at(&p);
                        if k > 0.0 {
                            let target = &mut plane[y * n + z];
                            target[0] += value[0] * k;
                            target[1] += value[1] * k;
                            target[2] += value[2] * k;
                        }
                    }
                }
            });
    }
}
