//! # sphdb
//!
//! `sphdb` stores large, static SPH particle clouds on disk in a block indexed
//! file and streams them back for spatial range queries and for resampling onto
//! regular 3D grids, without loading the whole data set into memory.
//!
//! ## Features
//!
//! - **Block index**: the bounding volume is split into a uniform grid of
//!   blocks, each holding a contiguous run of particles and a margin (its
//!   largest smoothing length) used to prune range queries.
//! - **Streaming queries**: particles are handed to a [`ParticleVisitor`]
//!   one at a time; only the header and block table stay in memory.
//! - **Grid sampling**: [`GridSampler`] deposits kernel weighted particle
//!   fields onto a caller-owned grid, in parallel across grid planes.
//!
//! ## Example
//!
//! ```no_run
//! use sphdb::{BuildOptions, Database, FileDatabase, GridSampler, SmoothParticle};
//!
//! let mut particles = vec![SmoothParticle::new([1.0, 2.0, 3.0], [0.0, 0.0, 1.0], 0.5, 1.0)];
//! FileDatabase::create(&mut particles, "particles.db", &BuildOptions::new(8))?;
//!
//! let db = FileDatabase::open("particles.db")?;
//! let n = 32;
//! let mut grid = vec![[0.0f32; 3]; n * n * n];
//! let mut sampler = GridSampler::new(&mut grid, n, db.lower_bounds(), 4.0)?;
//! db.accept_range(db.lower_bounds(), db.upper_bounds(), &mut sampler)?;
//! # Ok::<(), sphdb::DatabaseError>(())
//! ```

mod bounds;
mod builder;
mod database;
mod density;
mod error;
mod format;
mod memory;
mod particle;
mod sampler;
mod util;
mod visitor;

pub use bounds::BoundingBox;
pub use bounds::Vec3;
pub use builder::BuildOptions;
pub use database::Database;
pub use database::FileDatabase;
pub use density::DensityGrid;
pub use error::DatabaseError;
pub use error::Result;
pub use format::Block;
pub use format::Header;
pub use memory::MemoryDatabase;
pub use particle::kernel;
pub use particle::SmoothParticle;
pub use sampler::GridSampler;
pub use visitor::Collector;
pub use visitor::ParticleVisitor;
