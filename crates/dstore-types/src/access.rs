use std::fmt;

use serde::{Deserialize, Serialize};

/// Access a node holds for an object or binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccessMode {
    Read,
    Write,
}

impl AccessMode {
    pub fn is_write(self) -> bool {
        matches!(self, Self::Write)
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// What a callback asks the current holder of a key to give up.
///
/// `Evict` is the stronger request: the holder drops its cached copy
/// entirely. `Downgrade` asks it to stop writing; a holder displaced by a
/// writer keeps no access in the directory either way.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReleaseKind {
    Downgrade,
    Evict,
}

impl fmt::Display for ReleaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Downgrade => f.write_str("downgrade"),
            Self::Evict => f.write_str("evict"),
        }
    }
}
