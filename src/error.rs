use core::fmt;

use crate::ClusterNumber;

/// Result type used by every fallible filesystem operation.
pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// Tried to create a file with a path that ends in a separator.
    IsDirectory,

    /// A parent or intermediate path component does not exist.
    NoSuchEntry,

    /// No free cluster is left to grow a chain.
    NoEnoughMemory,

    /// On-disk metadata is inconsistent (bad geometry, looping chain, ...).
    CorruptVolume(&'static str),

    /// A cluster number outside of the volume's data region.
    ClusterOutOfRange(ClusterNumber),

    /// The process-wide boot volume was used before `global::initialize`.
    NotInitialized,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IsDirectory => write!(f, "is a directory"),
            Self::NoSuchEntry => write!(f, "no such file or directory"),
            Self::NoEnoughMemory => write!(f, "no free clusters left on volume"),
            Self::CorruptVolume(reason) => write!(f, "corrupt volume: {reason}"),
            Self::ClusterOutOfRange(cluster) => {
                write!(f, "cluster {} is outside of the data region", cluster.0)
            }
            Self::NotInitialized => write!(f, "boot volume not initialized"),
        }
    }
}
