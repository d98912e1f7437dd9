//! split a weight matrix into subarray sized tiles

use std::ops::Range;

use enum_as_inner::EnumAsInner;
use itertools::{iproduct, Itertools};
use serde::{Deserialize, Serialize};

/// rows and columns of one subarray (or of any level built from subarrays)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubArrayCapacity {
    pub rows: usize,
    pub cols: usize,
}

impl SubArrayCapacity {
    /// how many blocks of this capacity cover a `rows`x`cols` matrix
    pub fn blocks_needed(&self, rows: usize, cols: usize) -> (usize, usize) {
        (rows.div_ceil(self.rows), cols.div_ceil(self.cols))
    }
}

/// a rectangular block of the weight matrix mapped onto one subarray
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileAssignment {
    pub row_offset: usize,
    pub col_offset: usize,
    pub rows: usize,
    pub cols: usize,
}

impl TileAssignment {
    pub fn row_range(&self) -> Range<usize> {
        self.row_offset..self.row_offset + self.rows
    }

    pub fn col_range(&self) -> Range<usize> {
        self.col_offset..self.col_offset + self.cols
    }

    pub fn cells(&self) -> usize {
        self.rows * self.cols
    }

    /// shift a tile expressed inside `parent` into the parent's coordinates
    pub fn inside(&self, parent: &TileAssignment) -> TileAssignment {
        TileAssignment {
            row_offset: parent.row_offset + self.row_offset,
            col_offset: parent.col_offset + self.col_offset,
            ..*self
        }
    }
}

/// number of replicas holding the same logical tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicationFactor {
    pub row: usize,
    pub col: usize,
}

impl DuplicationFactor {
    pub const NONE: DuplicationFactor = DuplicationFactor { row: 1, col: 1 };

    pub fn total(&self) -> usize {
        self.row * self.col
    }

    pub fn is_duplicated(&self) -> bool {
        self.total() > 1
    }
}

impl Default for DuplicationFactor {
    fn default() -> Self {
        Self::NONE
    }
}

/// how a weight matrix lands on physical subarrays
#[derive(Debug, Clone, PartialEq, Eq, EnumAsInner)]
pub enum Partition {
    /// one copy, split over as many subarrays as needed
    Partitioned(Vec<TileAssignment>),
    /// split over several subarrays, every one of them replicated
    DuplicatedPartitioned(Vec<TileAssignment>, DuplicationFactor),
    /// the whole matrix sits in one subarray copied onto every replica
    Replicated(TileAssignment, DuplicationFactor),
}

impl Partition {
    pub fn tiles(&self) -> &[TileAssignment] {
        match self {
            Partition::Partitioned(tiles) | Partition::DuplicatedPartitioned(tiles, _) => tiles,
            Partition::Replicated(tile, _) => std::slice::from_ref(tile),
        }
    }

    pub fn duplication(&self) -> DuplicationFactor {
        match self {
            Partition::Partitioned(_) => DuplicationFactor::NONE,
            Partition::DuplicatedPartitioned(_, dup) | Partition::Replicated(_, dup) => *dup,
        }
    }

    /// the partial sums of this many row blocks meet in the adder tree
    pub fn row_partitions(&self) -> usize {
        row_partitions(self.tiles())
    }

    /// results of several subarrays have to be merged
    pub fn uses_adder_tree(&self) -> bool {
        !self.is_replicated()
    }

    /// subarrays holding a copy of some tile
    pub fn physical_subarrays(&self) -> usize {
        self.tiles().len() * self.duplication().total()
    }
}

/// number of distinct row blocks in a set of tiles
pub fn row_partitions(tiles: &[TileAssignment]) -> usize {
    tiles.iter().map(|t| t.row_offset).unique().count()
}

/// cover a `rows`x`cols` matrix with blocks of `capacity`, row major, clipping the last block of each dimension
fn cover(rows: usize, cols: usize, capacity: SubArrayCapacity) -> Vec<TileAssignment> {
    let (row_blocks, col_blocks) = capacity.blocks_needed(rows, cols);
    iproduct!(0..row_blocks, 0..col_blocks)
        .map(|(i, j)| {
            let row_offset = i * capacity.rows;
            let col_offset = j * capacity.cols;
            TileAssignment {
                row_offset,
                col_offset,
                rows: capacity.rows.min(rows - row_offset),
                cols: capacity.cols.min(cols - col_offset),
            }
        })
        .collect()
}

/// map a `rows`x`cols` weight matrix onto subarrays of `capacity`, replicated `dup` times
///
/// ```
/// use cim_sim::analysis::partition::*;
/// let capacity = SubArrayCapacity { rows: 128, cols: 128 };
/// let p = partition(300, 100, capacity, DuplicationFactor::NONE);
/// assert_eq!(p.tiles().len(), 3);
/// assert_eq!(p.tiles()[2].rows, 44);
/// let p = partition(100, 100, capacity, DuplicationFactor { row: 2, col: 2 });
/// assert!(p.is_replicated());
/// ```
pub fn partition(
    rows: usize,
    cols: usize,
    capacity: SubArrayCapacity,
    dup: DuplicationFactor,
) -> Partition {
    assert!(
        capacity.rows > 0 && capacity.cols > 0,
        "subarray capacity must be positive"
    );
    assert!(rows > 0 && cols > 0, "cannot partition an empty {rows}x{cols} matrix");
    assert!(dup.total() > 0, "duplication factor must be positive");

    let tiles = cover(rows, cols, capacity);
    match (dup.is_duplicated(), tiles.as_slice()) {
        (false, _) => Partition::Partitioned(tiles),
        (true, [single]) => Partition::Replicated(*single, dup),
        (true, _) => Partition::DuplicatedPartitioned(tiles, dup),
    }
}
