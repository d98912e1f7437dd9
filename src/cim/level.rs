use serde::{Deserialize, Serialize};

use crate::analysis::partition::SubArrayCapacity;

/// the levels of the accelerator, from the chip down to one subarray
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Chip = 0,
    Tile,
    Pe,
    SubArray,
}

impl Level {
    pub fn get_child_level(&self) -> Option<Self> {
        match self {
            Level::Chip => Some(Level::Tile),
            Level::Tile => Some(Level::Pe),
            Level::Pe => Some(Level::SubArray),
            Level::SubArray => None,
        }
    }

    pub fn is_last(&self) -> bool {
        self.get_child_level().is_none()
    }
}

/// how many children each fixed level holds, the number of tiles is per layer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyCounts {
    /// (numSubArrayRow, numSubArrayCol)
    pub subarrays_per_pe: (usize, usize),
    /// (numPERow, numPECol)
    pub pes_per_tile: (usize, usize),
}

impl HierarchyCounts {
    /// (rows, cols) of children inside one instance of `level`
    pub fn children(&self, level: Level) -> Option<(usize, usize)> {
        match level {
            Level::Tile => Some(self.pes_per_tile),
            Level::Pe => Some(self.subarrays_per_pe),
            Level::Chip | Level::SubArray => None,
        }
    }

    pub fn subarrays_in_pe(&self) -> usize {
        self.subarrays_per_pe.0 * self.subarrays_per_pe.1
    }

    pub fn pes_in_tile(&self) -> usize {
        self.pes_per_tile.0 * self.pes_per_tile.1
    }

    /// the weight capacity of one instance of `level`, the chip has none since it grows per layer
    pub fn capacity(&self, level: Level, subarray: SubArrayCapacity) -> Option<SubArrayCapacity> {
        match level {
            Level::SubArray => Some(subarray),
            Level::Chip => None,
            _ => {
                let (rows, cols) = self.children(level)?;
                let child = self.capacity(level.get_child_level()?, subarray)?;
                Some(SubArrayCapacity {
                    rows: child.rows * rows,
                    cols: child.cols * cols,
                })
            }
        }
    }
}
