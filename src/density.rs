use rayon::prelude::*;

use crate::bounds::Vec3;
use crate::particle::SmoothParticle;

/// A uniform neighbour grid used to evaluate particle densities.
///
/// The bins are at least as wide as the largest smoothing length, so every
/// particle whose kernel reaches a point lies in the point's bin or one of its
/// 26 neighbours.
pub struct DensityGrid {
    /// Number of bins along each axis.
    pub grid_res: [usize; 3],
    /// Scale factor from coordinate to bin index.
    pub grid_scale: [f64; 3],
    /// Maximum valid bin coordinate per axis.
    pub grid_limit: [f64; 3],
    /// Minimum corner of the grid.
    pub min: [f64; 3],
    /// Particle indices per bin.
    pub grid_bins: Vec<Vec<usize>>,
}

impl DensityGrid {
    /// Bins `particles` by position.
    pub fn new(particles: &[SmoothParticle]) -> Self {
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        let mut max_h = 0.0f64;
        for p in particles {
            for i in 0..3 {
                min[i] = min[i].min(p.position[i] as f64);
                max[i] = max[i].max(p.position[i] as f64);
            }
            max_h = max_h.max(p.smoothing_length as f64);
        }
        if particles.is_empty() {
            min = [0.0; 3];
            max = [0.0; 3];
        }

        // Bins slightly wider than max_h keep rounding from splitting a pair two bins apart.
        let bin_width = (max_h * 1.001).max(f64::MIN_POSITIVE);
        let res_cap = ((2.0 * (particles.len() as f64).cbrt()).ceil() as usize).max(1);

        let mut grid_res = [1usize; 3];
        let mut grid_scale = [0.0f64; 3];
        let mut grid_limit = [0.0f64; 3];
        for i in 0..3 {
            let extent = max[i] - min[i];
            let res = ((extent / bin_width).floor() as usize).clamp(1, res_cap);
            grid_res[i] = res;
            grid_scale[i] = if extent > 0.0 { res as f64 / extent } else { 0.0 };
            grid_limit[i] = res as f64 - 1e-5;
        }

        let mut grid = DensityGrid {
            grid_res,
            grid_scale,
            grid_limit,
            min,
            grid_bins: vec![Vec::new(); grid_res[0] * grid_res[1] * grid_res[2]],
        };
        for (i, p) in particles.iter().enumerate() {
            let bin = grid.get_bin_index(&p.position);
            grid.grid_bins[bin].push(i);
        }
        grid
    }

    fn bin_coords(&self, point: &Vec3) -> [usize; 3] {
        let mut c = [0usize; 3];
        for i in 0..3 {
            c[i] = ((point[i] as f64 - self.min[i]) * self.grid_scale[i]).clamp(0.0, self.grid_limit[i])
                as usize;
        }
        c
    }

    /// Linear index of the bin containing `point`.
    pub fn get_bin_index(&self, point: &Vec3) -> usize {
        let [ix, iy, iz] = self.bin_coords(point);
        ix + iy * self.grid_res[0] + iz * self.grid_res[0] * self.grid_res[1]
    }

    /// Calls `visitor` with the index of every particle binned in the 3x3x3
    /// neighbourhood of `point`.
    pub fn visit_neighbors<F>(&self, point: &Vec3, mut visitor: F)
    where
        F: FnMut(usize),
    {
        let [nx, ny, nz] = self.grid_res;
        let c = self.bin_coords(point);
        for bz in c[2].saturating_sub(1)..=(c[2] + 1).min(nz - 1) {
            for by in c[1].saturating_sub(1)..=(c[1] + 1).min(ny - 1) {
                for bx in c[0].saturating_sub(1)..=(c[0] + 1).min(nx - 1) {
                    for &j in &self.grid_bins[bx + by * nx + bz * nx * ny] {
                        visitor(j);
                    }
                }
            }
        }
    }

    /// Kernel weighted mass density at `point`.
    pub fn density_at(&self, particles: &[SmoothParticle], point: &Vec3) -> f32 {
        let mut rho = 0.0f32;
        self.visit_neighbors(point, |j| {
            let p = &particles[j];
            rho += p.mass * p.weight() * p.kernel_at(point);
        });
        rho
    }

    /// Stores the density at each particle's own position in its `rho` field.
    pub fn compute(particles: &mut [SmoothParticle]) {
        let grid = DensityGrid::new(particles);
        let shared: &[SmoothParticle] = particles;
        let rhos: Vec<f32> = shared
            .par_iter()
            .map(|p| grid.density_at(shared, &p.position))
            .collect();
        for (p, rho) in particles.iter_mut().zip(rhos) {
            p.rho = rho;
        }
    }
}
