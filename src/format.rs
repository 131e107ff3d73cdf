//! Binary layout of the database file.
//!
//! All values are little-endian:
//!
//! ```text
//! [count: u32]
//! [lower: 3 x f32][upper: 3 x f32]
//! [blocks_per_axis: u32]
//! [Block; blocks_per_axis^3]   start: u32, count: u32, margin: f32
//! [Particle; count]            position: 3 x f32, bfield: 3 x f32,
//!                              smoothing_length: f32, mass: f32, rho: f32
//! ```

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::bounds::Vec3;
use crate::particle::SmoothParticle;

pub const HEADER_SIZE: u64 = 32;
pub const BLOCK_SIZE: u64 = 12;
pub const PARTICLE_SIZE: u64 = 36;

/// File header.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Header {
    pub count: u32,
    pub lower: Vec3,
    pub upper: Vec3,
    pub blocks_per_axis: u32,
}

impl Header {
    /// Number of blocks in the table, `blocks_per_axis^3`, or `None` when it
    /// does not fit in a `u64`.
    pub fn block_count(&self) -> Option<u64> {
        let n = self.blocks_per_axis as u64;
        n.checked_mul(n)?.checked_mul(n)
    }

    /// Byte offset of the first particle record, or `None` on overflow.
    pub fn data_offset(&self) -> Option<u64> {
        self.block_count()?
            .checked_mul(BLOCK_SIZE)?
            .checked_add(HEADER_SIZE)
    }
}

/// A spatial cell of the index holding a contiguous run of particles.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Block {
    /// Offset of the first particle, counted in particles.
    pub start: u32,
    pub count: u32,
    /// Largest smoothing length among the block's particles.
    pub margin: f32,
}

fn write_vec3(w: &mut impl Write, v: &Vec3) -> io::Result<()> {
    w.write_f32::<LittleEndian>(v[0])?;
    w.write_f32::<LittleEndian>(v[1])?;
    w.write_f32::<LittleEndian>(v[2])
}

fn read_vec3(r: &mut impl Read) -> io::Result<Vec3> {
    Ok([
        r.read_f32::<LittleEndian>()?,
        r.read_f32::<LittleEndian>()?,
        r.read_f32::<LittleEndian>()?,
    ])
}

pub fn write_header(w: &mut impl Write, header: &Header) -> io::Result<()> {
    w.write_u32::<LittleEndian>(header.count)?;
    write_vec3(w, &header.lower)?;
    write_vec3(w, &header.upper)?;
    w.write_u32::<LittleEndian>(header.blocks_per_axis)
}

pub fn read_header(r: &mut impl Read) -> io::Result<Header> {
    let count = r.read_u32::<LittleEndian>()?;
    let lower = read_vec3(r)?;
    let upper = read_vec3(r)?;
    let blocks_per_axis = r.read_u32::<LittleEndian>()?;
    Ok(Header {
        count,
        lower,
        upper,
        blocks_per_axis,
    })
}

pub fn write_block(w: &mut impl Write, block: &Block) -> io::Result<()> {
    w.write_u32::<LittleEndian>(block.start)?;
    w.write_u32::<LittleEndian>(block.count)?;
    w.write_f32::<LittleEndian>(block.margin)
}

pub fn read_block(r: &mut impl Read) -> io::Result<Block> {
    Ok(Block {
        start: r.read_u32::<LittleEndian>()?,
        count: r.read_u32::<LittleEndian>()?,
        margin: r.read_f32::<LittleEndian>()?,
    })
}

pub fn write_particle(w: &mut impl Write, p: &SmoothParticle) -> io::Result<()> {
    write_vec3(w, &p.position)?;
    write_vec3(w, &p.bfield)?;
    w.write_f32::<LittleEndian>(p.smoothing_length)?;
    w.write_f32::<LittleEndian>(p.mass)?;
    w.write_f32::<LittleEndian>(p.rho)
}

pub fn read_particle(r: &mut impl Read) -> io::Result<SmoothParticle> {
    Ok(SmoothParticle {
        position: read_vec3(r)?,
        bfield: read_vec3(r)?,
        smoothing_length: r.read_f32::<LittleEndian>()?,
        mass: r.read_f32::<LittleEndian>()?,
        rho: r.read_f32::<LittleEndian>()?,
    })
}
