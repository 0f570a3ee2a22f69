//! Binary particle snapshots.
//!
//! A snapshot is a 16-byte header followed by the raw particle records:
//!
//! | Offset | Field     | Value                        |
//! |--------|-----------|------------------------------|
//! | 0      | magic     | `b"SPH2"`                    |
//! | 4      | version   | [`SNAPSHOT_VERSION`]         |
//! | 8      | stride    | [`PARTICLE_STRIDE`] (36)     |
//! | 12     | count     | number of records            |
//! | 16     | records   | `count * stride` bytes       |
//!
//! Header integers are little-endian. Records are written in their in-memory
//! layout, so snapshots are only portable between little-endian targets.

use crate::error::SnapshotError;
use crate::particle::{Particle, PARTICLE_STRIDE};
use bytemuck::Zeroable;
use std::io::{Read, Write};

/// Leading bytes of every snapshot.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"SPH2";
/// Current layout version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct SnapshotHeader {
    magic: [u8; 4],
    version: u32,
    stride: u32,
    count: u32,
}

/// Write `particles` as a snapshot.
pub fn write_snapshot<W: Write>(mut writer: W, particles: &[Particle]) -> Result<(), SnapshotError> {
    let header = SnapshotHeader {
        magic: SNAPSHOT_MAGIC,
        version: SNAPSHOT_VERSION.to_le(),
        stride: (PARTICLE_STRIDE as u32).to_le(),
        count: (particles.len() as u32).to_le(),
    };
    writer.write_all(bytemuck::bytes_of(&header))?;
    writer.write_all(bytemuck::cast_slice(particles))?;
    writer.flush()?;
    Ok(())
}

/// Read a snapshot header and return the record count it announces.
fn read_header<R: Read>(reader: &mut R) -> Result<usize, SnapshotError> {
    let mut header = SnapshotHeader::zeroed();
    reader.read_exact(bytemuck::bytes_of_mut(&mut header))?;

    if header.magic != SNAPSHOT_MAGIC {
        return Err(SnapshotError::BadMagic);
    }
    let version = u32::from_le(header.version);
    if version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(version));
    }
    let stride = u32::from_le(header.stride);
    if stride as usize != PARTICLE_STRIDE {
        return Err(SnapshotError::StrideMismatch {
            expected: PARTICLE_STRIDE as u32,
            actual: stride,
        });
    }
    Ok(u32::from_le(header.count) as usize)
}

/// Records read per chunk, so the buffer only grows as record bytes arrive.
const READ_CHUNK: usize = 4096;

fn read_records<R: Read>(reader: &mut R, count: usize) -> Result<Vec<Particle>, SnapshotError> {
    let mut particles = Vec::with_capacity(count.min(READ_CHUNK));
    let mut remaining = count;
    while remaining > 0 {
        let chunk = remaining.min(READ_CHUNK);
        let start = particles.len();
        particles.resize(start + chunk, Particle::zeroed());
        reader.read_exact(bytemuck::cast_slice_mut(&mut particles[start..]))?;
        remaining -= chunk;
    }
    Ok(particles)
}

/// Read a whole snapshot.
pub fn read_snapshot<R: Read>(mut reader: R) -> Result<Vec<Particle>, SnapshotError> {
    let count = read_header(&mut reader)?;
    read_records(&mut reader, count)
}

/// Read a snapshot that must hold exactly `expected` particles. The count is
/// checked before any record is read.
pub fn read_snapshot_exact<R: Read>(
    mut reader: R,
    expected: usize,
) -> Result<Vec<Particle>, SnapshotError> {
    let count = read_header(&mut reader)?;
    if count != expected {
        return Err(SnapshotError::ParticleCountMismatch {
            expected,
            actual: count,
        });
    }
    read_records(&mut reader, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn sample() -> Vec<Particle> {
        (0..5)
            .map(|i| {
                let mut p = Particle::new(Vec2::new(i as f32, -(i as f32)), 1.0 + i as f32)
                    .with_velocity(Vec2::new(0.5, 0.25));
                p.density = 1.5;
                p.near_density = 0.75;
                p
            })
            .collect()
    }

    #[test]
    fn test_header_layout() {
        let mut bytes = Vec::new();
        write_snapshot(&mut bytes, &sample()).unwrap();
        assert_eq!(bytes.len(), 16 + 5 * 36);
        assert_eq!(&bytes[0..4], b"SPH2");
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &36u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &5u32.to_le_bytes());
    }

    #[test]
    fn test_restores_every_field() {
        let particles = sample();
        let mut bytes = Vec::new();
        write_snapshot(&mut bytes, &particles).unwrap();
        assert_eq!(read_snapshot(bytes.as_slice()).unwrap(), particles);
        assert_eq!(read_snapshot_exact(bytes.as_slice(), 5).unwrap(), particles);
    }

    #[test]
    fn test_rejects_bad_headers() {
        let mut bytes = Vec::new();
        write_snapshot(&mut bytes, &sample()).unwrap();

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        assert!(matches!(
            read_snapshot(bad_magic.as_slice()),
            Err(SnapshotError::BadMagic)
        ));

        let mut bad_version = bytes.clone();
        bad_version[4..8].copy_from_slice(&7u32.to_le_bytes());
        assert!(matches!(
            read_snapshot(bad_version.as_slice()),
            Err(SnapshotError::UnsupportedVersion(7))
        ));

        let mut bad_stride = bytes.clone();
        bad_stride[8..12].copy_from_slice(&40u32.to_le_bytes());
        assert!(matches!(
            read_snapshot(bad_stride.as_slice()),
            Err(SnapshotError::StrideMismatch { expected: 36, actual: 40 })
        ));

        assert!(matches!(
            read_snapshot(&bytes[..bytes.len() - 1]),
            Err(SnapshotError::Truncated)
        ));
        assert!(matches!(
            read_snapshot(&bytes[..10]),
            Err(SnapshotError::Truncated)
        ));
        assert!(matches!(
            read_snapshot_exact(bytes.as_slice(), 4),
            Err(SnapshotError::ParticleCountMismatch { expected: 4, actual: 5 })
        ));
    }

    #[test]
    fn test_oversized_count_reports_truncation() {
        let mut bytes = Vec::new();
        write_snapshot(&mut bytes, &sample()[..1]).unwrap();
        bytes[12..16].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            read_snapshot(bytes.as_slice()),
            Err(SnapshotError::Truncated)
        ));
    }

    #[test]
    fn test_reads_across_chunks() {
        let particles: Vec<Particle> = (0..READ_CHUNK + 17)
            .map(|i| Particle::new(Vec2::new(i as f32, 1.0), 1.0))
            .collect();
        let mut bytes = Vec::new();
        write_snapshot(&mut bytes, &particles).unwrap();
        assert_eq!(read_snapshot(bytes.as_slice()).unwrap(), particles);
    }
}
