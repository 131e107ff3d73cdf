use std::fs::File;
use std::io::{self, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::bounds::{BoundingBox, Vec3};
use crate::builder::{self, BlockGrid, BuildOptions};
use crate::error::{DatabaseError, Result};
use crate::format::{self, Block, Header, PARTICLE_SIZE};
use crate::particle::SmoothParticle;
use crate::visitor::{Collector, ParticleVisitor};

/// Read access to a static particle set.
///
/// Implementors stream particles to a [`ParticleVisitor`]. A range scan must
/// visit every particle whose expanded box (center +- smoothing length)
/// intersects the query box, and only those.
pub trait Database {
    fn lower_bounds(&self) -> Vec3;

    fn upper_bounds(&self) -> Vec3;

    /// Number of particles stored.
    fn count(&self) -> usize;

    /// Visits every particle in storage order.
    fn accept(&self, visitor: &mut dyn ParticleVisitor) -> Result<()>;

    /// Visits every particle whose kernel support intersects `[lower, upper]`.
    fn accept_range(&self, lower: Vec3, upper: Vec3, visitor: &mut dyn ParticleVisitor) -> Result<()>;

    /// Collects the particles a range scan over `[lower, upper]` visits.
    fn get_particles(&self, lower: Vec3, upper: Vec3) -> Result<Vec<SmoothParticle>> {
        let mut particles = Vec::new();
        let mut collector = Collector::new(&mut particles);
        self.accept_range(lower, upper, &mut collector)?;
        Ok(particles)
    }
}

fn read_error(err: io::Error, offset: u64) -> DatabaseError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        DatabaseError::Truncated { offset }
    } else {
        DatabaseError::Io(err)
    }
}

/// Sequential particle reader that tracks its byte offset.
struct ParticleReader {
    inner: BufReader<File>,
    offset: u64,
}

impl ParticleReader {
    fn open(path: &Path, offset: u64) -> Result<Self> {
        let mut inner = BufReader::new(File::open(path)?);
        inner.seek(SeekFrom::Start(offset))?;
        Ok(Self { inner, offset })
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        // Keep the buffer when blocks are read back to back.
        if offset != self.offset {
            self.inner.seek(SeekFrom::Start(offset))?;
            self.offset = offset;
        }
        Ok(())
    }

    fn next_particle(&mut self) -> Result<SmoothParticle> {
        let particle = format::read_particle(&mut self.inner).map_err(|e| read_error(e, self.offset))?;
        self.offset += PARTICLE_SIZE;
        Ok(particle)
    }
}

/// A particle database stored in a block indexed file.
///
/// Only the header and the block table are held in memory. Every scan opens
/// its own handle on the file, so scans may run concurrently.
#[derive(Clone, Debug)]
pub struct FileDatabase {
    path: PathBuf,
    header: Header,
    data_offset: u64,
    blocks: Vec<Block>,
}

impl FileDatabase {
    /// Writes `particles` to `path` as a database file.
    ///
    /// The slice is sorted by X and, when `options.compute_density` is set,
    /// each particle's `rho` is overwritten. A file left behind by a failed
    /// call is invalid.
    pub fn create<P: AsRef<Path>>(
        particles: &mut [SmoothParticle],
        path: P,
        options: &BuildOptions,
    ) -> Result<()> {
        builder::create(particles, path.as_ref(), options)
    }

    /// Reads and checks the header and block table of a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let header = format::read_header(&mut reader).map_err(|e| read_error(e, 0))?;
        if header.blocks_per_axis == 0 {
            return Err(DatabaseError::Corrupt("blocks_per_axis is 0".to_string()));
        }
        if !BoundingBox::new(header.lower, header.upper).is_valid() {
            return Err(DatabaseError::Corrupt(format!(
                "lower bounds {:?} exceed upper bounds {:?}",
                header.lower, header.upper
            )));
        }
        let (block_count, data_offset) = match (header.block_count(), header.data_offset()) {
            (Some(blocks), Some(offset)) => (blocks, offset),
            _ => {
                return Err(DatabaseError::Corrupt(format!(
                    "block table of {}^3 blocks is too large",
                    header.blocks_per_axis
                )));
            }
        };
        if data_offset > file_len {
            return Err(DatabaseError::Corrupt(format!(
                "block table of {} blocks does not fit in {} bytes",
                block_count, file_len
            )));
        }
        let data_end = data_offset + header.count as u64 * PARTICLE_SIZE;
        if data_end > file_len {
            return Err(DatabaseError::Corrupt(format!(
                "{} particles declared but the file ends at byte {}",
                header.count, file_len
            )));
        }

        let mut blocks = Vec::with_capacity(block_count as usize);
        let mut total = 0u64;
        for i in 0..block_count {
            let offset = format::HEADER_SIZE + i * format::BLOCK_SIZE;
            let block = format::read_block(&mut reader).map_err(|e| read_error(e, offset))?;
            if block.start as u64 + block.count as u64 > header.count as u64 {
                return Err(DatabaseError::Corrupt(format!(
                    "block {} covers particles {}..{} of {}",
                    i,
                    block.start,
                    block.start as u64 + block.count as u64,
                    header.count
                )));
            }
            total += block.count as u64;
            blocks.push(block);
        }
        if total != header.count as u64 {
            return Err(DatabaseError::Corrupt(format!(
                "block counts sum to {} but the header declares {}",
                total, header.count
            )));
        }

        log::debug!(
            "opened {}: {} particles in {}^3 blocks",
            path.display(),
            header.count,
            header.blocks_per_axis
        );
        Ok(Self {
            path,
            header,
            data_offset,
            blocks,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Byte offset of the first particle record.
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// The block table in row-major order, X outermost.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn blocks_per_axis(&self) -> usize {
        self.header.blocks_per_axis as usize
    }
}

impl Database for FileDatabase {
    fn lower_bounds(&self) -> Vec3 {
        self.header.lower
    }

    fn upper_bounds(&self) -> Vec3 {
        self.header.upper
    }

    fn count(&self) -> usize {
        self.header.count as usize
    }

    fn accept(&self, visitor: &mut dyn ParticleVisitor) -> Result<()> {
        if self.header.count == 0 {
            return Ok(());
        }
        let mut reader = ParticleReader::open(&self.path, self.data_offset)?;

        visitor.begin();
        for _ in 0..self.header.count {
            let particle = reader.next_particle()?;
            visitor.visit(&particle);
        }
        visitor.end();
        Ok(())
    }

    fn accept_range(&self, lower: Vec3, upper: Vec3, visitor: &mut dyn ParticleVisitor) -> Result<()> {
        if self.header.count == 0 {
            return Ok(());
        }
        let data_offset = self.data_offset;
        let mut reader = ParticleReader::open(&self.path, data_offset)?;

        let query = BoundingBox::new(lower, upper);
        let n = self.blocks_per_axis();
        let grid = BlockGrid::new(self.header.lower, self.header.upper, n);

        visitor.begin();
        for ix in 0..n {
            for iy in 0..n {
                for iz in 0..n {
                    let block = &self.blocks[grid.flat_index(ix, iy, iz)];
                    if block.count == 0 {
                        continue;
                    }
                    // far from the origin the f32 block faces can round
                    // inside the particles they hold
                    let block_box = grid
                        .block_bounds(ix, iy, iz)
                        .expanded(block.margin + grid.slack);
                    if !block_box.intersects(&query) {
                        continue;
                    }

                    reader.seek(data_offset + block.start as u64 * PARTICLE_SIZE)?;
                    for _ in 0..block.count {
                        let particle = reader.next_particle()?;
                        if particle.expanded_bounds().intersects(&query) {
                            visitor.visit(&particle);
                        }
                    }
                }
            }
        }
        visitor.end();
        Ok(())
    }
}
