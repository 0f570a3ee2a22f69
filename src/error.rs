//! Error types for sph2d.
//!
//! Only two things can fail: building a simulation from bad parameters, and
//! reading or writing a particle snapshot. Everything that happens inside a
//! step is absorbed locally (clamped, skipped or substituted) so the real-time
//! loop never stops on an error.

use glam::Vec2;
use std::fmt;

/// Errors that refuse to start a simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The particle count was zero.
    NoParticles,
    /// Fewer or more initial positions than requested particles.
    PositionCountMismatch { expected: usize, actual: usize },
    /// Smoothing radius must be finite and strictly positive.
    InvalidSmoothingRadius(f32),
    /// Cell size must be finite and strictly positive.
    InvalidCellSize(f32),
    /// Cells smaller than the smoothing radius would hide neighbors from the
    /// 3×3 search.
    CellSmallerThanRadius { cell_size: f32, smoothing_radius: f32 },
    /// Particle radius must be finite and non-negative.
    InvalidParticleRadius(f32),
    /// Domain rectangle is empty or inverted once the particle radius is taken off.
    InvalidBounds { min: Vec2, max: Vec2 },
    /// A scalar parameter was NaN or infinite.
    NonFiniteParameter(&'static str),
    /// A bucket count of zero was requested.
    InvalidBucketCount,
    /// Fixed timestep must be finite and strictly positive.
    InvalidTimestep(f32),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoParticles => write!(f, "Particle count must be greater than zero"),
            ConfigError::PositionCountMismatch { expected, actual } => write!(
                f,
                "Expected {} initial positions but {} were provided",
                expected, actual
            ),
            ConfigError::InvalidSmoothingRadius(r) => {
                write!(f, "Smoothing radius must be positive, got {}", r)
            }
            ConfigError::InvalidCellSize(s) => write!(f, "Cell size must be positive, got {}", s),
            ConfigError::CellSmallerThanRadius {
                cell_size,
                smoothing_radius,
            } => write!(
                f,
                "Cell size {} is smaller than the smoothing radius {}",
                cell_size, smoothing_radius
            ),
            ConfigError::InvalidParticleRadius(r) => {
                write!(f, "Particle radius must be non-negative, got {}", r)
            }
            ConfigError::InvalidBounds { min, max } => write!(
                f,
                "Domain bounds {:?}..{:?} leave no room for particles",
                min, max
            ),
            ConfigError::NonFiniteParameter(name) => {
                write!(f, "Parameter `{}` must be a finite number", name)
            }
            ConfigError::InvalidBucketCount => write!(f, "Bucket count must be greater than zero"),
            ConfigError::InvalidTimestep(dt) => {
                write!(f, "Fixed timestep must be positive, got {}", dt)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors that can occur when saving or restoring a particle snapshot.
#[derive(Debug)]
pub enum SnapshotError {
    /// Underlying reader or writer failed.
    Io(std::io::Error),
    /// The data does not start with the snapshot magic.
    BadMagic,
    /// The snapshot was written by an unknown layout version.
    UnsupportedVersion(u32),
    /// The record stride differs from this build's particle layout.
    StrideMismatch { expected: u32, actual: u32 },
    /// Fewer bytes than the header announced.
    Truncated,
    /// Snapshot particle count does not match the running simulation.
    ParticleCountMismatch { expected: usize, actual: usize },
    /// A record holds a NaN or infinite position, velocity or mass.
    NonFiniteRecord(usize),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::Io(e) => write!(f, "Snapshot I/O failed: {}", e),
            SnapshotError::BadMagic => write!(f, "Not a particle snapshot (bad magic)"),
            SnapshotError::UnsupportedVersion(v) => {
                write!(f, "Unsupported snapshot version {}", v)
            }
            SnapshotError::StrideMismatch { expected, actual } => write!(
                f,
                "Snapshot record stride is {} bytes, this build expects {}",
                actual, expected
            ),
            SnapshotError::Truncated => write!(f, "Snapshot data ends before the last record"),
            SnapshotError::ParticleCountMismatch { expected, actual } => write!(
                f,
                "Snapshot holds {} particles but the simulation has {}",
                actual, expected
            ),
            SnapshotError::NonFiniteRecord(i) => {
                write!(f, "Snapshot record {} holds a non-finite value", i)
            }
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnapshotError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SnapshotError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            SnapshotError::Truncated
        } else {
            SnapshotError::Io(e)
        }
    }
}
