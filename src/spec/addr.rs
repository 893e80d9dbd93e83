//! Structured hardware address carried by every log record.
//!
//! Example log addr: chip:0;die:1;quad:2;row:3;col:4  =>  ClusterAddr { 0, 1, 2, 3, 4 }
//!
//! Fields are signed: the log writer uses -1 for "no cluster" (host-level BMT
//! traffic reports row -1). Ordering is derived so addresses can key BTreeMaps.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Quads per die side; a die holds a 2x2 quad grid.
pub const QUADS_PER_SIDE: usize = 2;

/// Cluster slots per quad side; a quad holds an 8x8 cluster grid.
pub const CLUSTERS_PER_SIDE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterAddr {
    pub chip: i32,
    pub die: i32,
    pub quad: i32,
    pub row: i32,
    pub col: i32,
}

impl ClusterAddr {
    pub fn new(chip: i32, die: i32, quad: i32, row: i32, col: i32) -> Self {
        Self {
            chip,
            die,
            quad,
            row,
            col,
        }
    }

    /// Position of `quad` inside the die's 2x2 grid, row-major.
    pub fn quad_position(&self) -> Option<(usize, usize)> {
        quad_position(self.quad)
    }
}

/// Map a linear quad index onto `(quad div 2, quad mod 2)`.
pub fn quad_position(quad: i32) -> Option<(usize, usize)> {
    let q = usize::try_from(quad).ok()?;
    if q >= QUADS_PER_SIDE * QUADS_PER_SIDE {
        return None;
    }
    Some((q / QUADS_PER_SIDE, q % QUADS_PER_SIDE))
}

impl fmt::Display for ClusterAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chip:{};die:{};quad:{};row:{};col:{}",
            self.chip, self.die, self.quad, self.row, self.col
        )
    }
}
