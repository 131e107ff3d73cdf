#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sphdb::{ParticleVisitor, SmoothParticle};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A file path in the temp directory that is removed on drop.
pub struct TempFile(PathBuf);

impl TempFile {
    pub fn new(name: &str) -> Self {
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let file = format!("sphdb-{}-{}-{}.db", name, std::process::id(), id);
        TempFile(std::env::temp_dir().join(file))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

pub fn random_particles(count: usize, size: f32, seed: u64) -> Vec<SmoothParticle> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let position = [
                rng.gen_range(0.0..size),
                rng.gen_range(0.0..size),
                rng.gen_range(0.0..size),
            ];
            let bfield = [
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            ];
            let h = rng.gen_range(0.02..0.15) * size;
            SmoothParticle::new(position, bfield, h, rng.gen_range(0.5..2.0))
        })
        .collect()
}

/// Bit patterns of every field, sorted, for order independent comparison.
pub fn sorted_bits(particles: &[SmoothParticle]) -> Vec<[u32; 9]> {
    let mut keys: Vec<[u32; 9]> = particles
        .iter()
        .map(|p| {
            [
                p.position[0].to_bits(),
                p.position[1].to_bits(),
                p.position[2].to_bits(),
                p.bfield[0].to_bits(),
                p.bfield[1].to_bits(),
                p.bfield[2].to_bits(),
                p.smoothing_length.to_bits(),
                p.mass.to_bits(),
                p.rho.to_bits(),
            ]
        })
        .collect();
    keys.sort_unstable();
    keys
}

/// Visitor recording the callback sequence.
#[derive(Default)]
pub struct Recorder {
    pub begins: usize,
    pub ends: usize,
    pub visited: Vec<SmoothParticle>,
}

impl ParticleVisitor for Recorder {
    fn begin(&mut self) {
        assert_eq!(self.ends, self.begins, "begin called twice without end");
        self.begins += 1;
    }

    fn visit(&mut self, particle: &SmoothParticle) {
        assert_eq!(self.begins, self.ends + 1, "visit outside begin/end");
        self.visited.push(*particle);
    }

    fn end(&mut self) {
        self.ends += 1;
    }
}
