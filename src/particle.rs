use std::f32::consts::PI;
use std::fmt;

use crate::bounds::{distance, BoundingBox, Vec3};

/// Cubic spline SPH kernel as a function of the normalized distance `r = d / h`.
///
/// Has compact support: it is exactly zero for `r >= 1`, which is what makes
/// margin based pruning in the block index valid.
#[inline]
pub fn kernel(r: f32) -> f32 {
    if r < 0.5 {
        1.0 + 6.0 * r * r * (r - 1.0)
    } else if r < 1.0 {
        let x = 1.0 - r;
        2.0 * x * x * x
    } else {
        0.0
    }
}

/// A smoothed particle as stored in the database file.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SmoothParticle {
    pub position: Vec3,
    /// Field value carried by the particle (the magnetic field for MHD runs).
    pub bfield: Vec3,
    pub smoothing_length: f32,
    pub mass: f32,
    /// Density at the particle's own position.
    pub rho: f32,
}

impl SmoothParticle {
    pub fn new(position: Vec3, bfield: Vec3, smoothing_length: f32, mass: f32) -> Self {
        Self {
            position,
            bfield,
            smoothing_length,
            mass,
            rho: 0.0,
        }
    }

    /// Kernel normalization in 3D, `8 / (pi h^3)`.
    #[inline]
    pub fn weight(&self) -> f32 {
        let h = self.smoothing_length;
        8.0 / (PI * h * h * h)
    }

    /// Kernel value of this particle evaluated at `point`.
    #[inline]
    pub fn kernel_at(&self, point: &Vec3) -> f32 {
        kernel(distance(point, &self.position) / self.smoothing_length)
    }

    /// The box covering the particle's kernel support.
    pub fn expanded_bounds(&self) -> BoundingBox {
        BoundingBox::around(self.position, self.smoothing_length)
    }

    /// Density at this particle's position summed over all `particles`.
    ///
    /// This is the all-pairs reference; [`crate::DensityGrid`] computes the same
    /// sum with a neighbour grid.
    pub fn calculate_rho(&self, particles: &[SmoothParticle]) -> f32 {
        particles
            .iter()
            .map(|p| p.mass * p.weight() * p.kernel_at(&self.position))
            .sum()
    }
}

impl fmt::Display for SmoothParticle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{},{}), ({},{},{}), {}",
            self.position[0],
            self.position[1],
            self.position[2],
            self.bfield[0],
            self.bfield[1],
            self.bfield[2],
            self.smoothing_length
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_boundaries() {
        assert!(kernel(0.49999) > 0.0);
        // second branch at exactly 0.5: 2 * 0.5^3
        assert_eq!(kernel(0.5), 0.25);
        assert_eq!(kernel(1.0), 0.0);
        assert_eq!(kernel(1.5), 0.0);
        assert_eq!(kernel(0.0), 1.0);
    }

    #[test]
    fn test_kernel_continuity() {
        let eps = 1e-4;
        let below = kernel(0.5 - eps);
        let above = kernel(0.5 + eps);
        assert!((below - above).abs() < 1e-3, "jump at 0.5: {} vs {}", below, above);
        assert!(kernel(1.0 - eps) < 1e-6);
    }

    #[test]
    fn test_kernel_non_negative() {
        for i in 0..=1000 {
            let r = i as f32 / 1000.0;
            assert!(kernel(r) >= 0.0, "negative kernel at {}", r);
        }
    }

    #[test]
    fn test_weight() {
        let p = SmoothParticle::new([0.0; 3], [0.0; 3], 2.0, 1.0);
        assert!((p.weight() - 1.0 / PI).abs() < 1e-6);
    }

    #[test]
    fn test_kernel_at() {
        let p = SmoothParticle::new([1.0, 1.0, 1.0], [0.0; 3], 2.0, 1.0);
        assert_eq!(p.kernel_at(&[1.0, 1.0, 1.0]), 1.0);
        assert_eq!(p.kernel_at(&[2.0, 1.0, 1.0]), 0.25);
        assert_eq!(p.kernel_at(&[3.0, 1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_calculate_rho_single() {
        let p = SmoothParticle::new([0.0; 3], [0.0; 3], 1.0, 3.0);
        let rho = p.calculate_rho(&[p]);
        assert!((rho - 3.0 * p.weight()).abs() < 1e-6);
    }
}
