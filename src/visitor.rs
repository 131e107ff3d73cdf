use crate::particle::SmoothParticle;

/// Callback interface through which a [`crate::Database`] streams particles.
///
/// A scan calls `begin` once before the first `visit` and `end` once after
/// the last one. Scans over an empty database call neither. A scan that fails
/// with an I/O error returns before calling `end`.
pub trait ParticleVisitor {
    fn begin(&mut self) {}

    fn visit(&mut self, particle: &SmoothParticle);

    fn end(&mut self) {}
}

impl<F> ParticleVisitor for F
where
    F: FnMut(&SmoothParticle),
{
    fn visit(&mut self, particle: &SmoothParticle) {
        self(particle)
    }
}

/// Visitor that appends every visited particle to a list.
pub struct Collector<'a> {
    particles: &'a mut Vec<SmoothParticle>,
    count: usize,
}

impl<'a> Collector<'a> {
    pub fn new(particles: &'a mut Vec<SmoothParticle>) -> Self {
        Self { particles, count: 0 }
    }

    /// Number of particles collected by the last scan.
    pub fn count(&self) -> usize {
        self.count
    }
}

impl ParticleVisitor for Collector<'_> {
    fn begin(&mut self) {
        self.count = 0;
    }

    fn visit(&mut self, particle: &SmoothParticle) {
        self.count += 1;
        self.particles.push(*particle);
    }
}
