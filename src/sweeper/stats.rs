use serde::Serialize;
use std::fmt;
use std::ops::{Add, AddAssign};

/// Counters produced by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    /// Files (and symlinks) removed
    pub files_deleted: u64,
    /// Empty directories removed
    pub dirs_deleted: u64,
    /// Operational errors that were counted and skipped
    pub errors: u64,
    /// Apparent size of the removed files
    pub bytes_freed: u64,
}

impl SweepStats {
    /// True when the sweep neither deleted anything nor hit an error
    pub fn is_empty(&self) -> bool {
        self.files_deleted == 0 && self.dirs_deleted == 0 && self.errors == 0
    }

    pub fn deleted(&self) -> u64 {
        self.files_deleted + self.dirs_deleted
    }
}

impl Add for SweepStats {
    type Output = SweepStats;

    fn add(self, other: SweepStats) -> SweepStats {
        SweepStats {
            files_deleted: self.files_deleted + other.files_deleted,
            dirs_deleted: self.dirs_deleted + other.dirs_deleted,
            errors: self.errors + other.errors,
            bytes_freed: self.bytes_freed + other.bytes_freed,
        }
    }
}

impl AddAssign for SweepStats {
    fn add_assign(&mut self, other: SweepStats) {
        *self = *self + other;
    }
}

impl fmt::Display for SweepStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} file{}, {} director{} deleted ({}), {} error{}",
            self.files_deleted,
            if self.files_deleted == 1 { "" } else { "s" },
            self.dirs_deleted,
            if self.dirs_deleted == 1 { "y" } else { "ies" },
            humansize::format_size(self.bytes_freed, humansize::BINARY),
            self.errors,
            if self.errors == 1 { "" } else { "s" },
        )
    }
}
