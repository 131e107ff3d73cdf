use crate::bounds::{BoundingBox, Vec3};
use crate::builder::expanded_bounds;
use crate::database::Database;
use crate::error::Result;
use crate::particle::SmoothParticle;
use crate::visitor::ParticleVisitor;

/// A [`Database`] over particles held in memory.
///
/// Range scans test every particle, which makes this the reference for the
/// file backed index.
#[derive(Clone, Debug, Default)]
pub struct MemoryDatabase {
    particles: Vec<SmoothParticle>,
    bounds: BoundingBox,
}

impl MemoryDatabase {
    pub fn new(particles: Vec<SmoothParticle>) -> Self {
        let bounds = expanded_bounds(&particles);
        Self { particles, bounds }
    }
}

impl Database for MemoryDatabase {
    fn lower_bounds(&self) -> Vec3 {
        self.bounds.min
    }

    fn upper_bounds(&self) -> Vec3 {
        self.bounds.max
    }

    fn count(&self) -> usize {
        self.particles.len()
    }

    fn accept(&self, visitor: &mut dyn ParticleVisitor) -> Result<()> {
        if self.particles.is_empty() {
            return Ok(());
        }
        visitor.begin();
        for p in &self.particles {
            visitor.visit(p);
        }
        visitor.end();
        Ok(())
    }

    fn accept_range(&self, lower: Vec3, upper: Vec3, visitor: &mut dyn ParticleVisitor) -> Result<()> {
        if self.particles.is_empty() {
            return Ok(());
        }
        let query = BoundingBox::new(lower, upper);
        visitor.begin();
        for p in self.particles.iter().filter(|p| p.expanded_bounds().intersects(&query)) {
            visitor.visit(p);
        }
        visitor.end();
        Ok(())
    }
}
