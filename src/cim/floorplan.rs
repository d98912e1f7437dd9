//! how many tiles a layer takes and how often its subarrays are replicated

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    config::Design,
    error::{self, ConfigError},
    level::Level,
};
use crate::analysis::partition::{DuplicationFactor, SubArrayCapacity};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerFloorplan {
    /// (rows, cols) of tiles
    pub tiles: (usize, usize),
    pub duplication: DuplicationFactor,
    /// fraction of the allocated cells holding a weight, replicas included
    pub utilization: f64,
}

impl LayerFloorplan {
    pub fn num_tiles(&self) -> usize {
        self.tiles.0 * self.tiles.1
    }
}

fn capacity_of(design: &Design, level: Level) -> SubArrayCapacity {
    // every level below the chip has a fixed capacity
    design
        .hierarchy
        .capacity(level, design.capacity)
        .unwrap_or(design.capacity)
}

/// the largest replication a single pe can hold, shrunk to at most `speed_up_degree` copies
fn auto_duplication(design: &Design, blocks: (usize, usize)) -> DuplicationFactor {
    let (pe_rows, pe_cols) = design.hierarchy.subarrays_per_pe;
    let mut dup = DuplicationFactor {
        row: (pe_rows / blocks.0).max(1),
        col: (pe_cols / blocks.1).max(1),
    };
    while dup.total() > design.speed_up_degree {
        if dup.row >= dup.col {
            dup.row -= 1;
        } else {
            dup.col -= 1;
        }
    }
    dup
}

/// place a `rows`x`cols` layer, `duplication` overrides the automatic choice
pub fn plan_layer(
    design: &Design,
    rows: usize,
    cols: usize,
    duplication: Option<[usize; 2]>,
) -> error::Result<LayerFloorplan> {
    if rows == 0 || cols == 0 {
        return Err(ConfigError::invalid(
            "layer",
            format!("a {rows}x{cols} layer holds no weight"),
        ));
    }
    let tile = capacity_of(design, Level::Tile);
    let pe = capacity_of(design, Level::Pe);
    let tiles = tile.blocks_needed(rows, cols);
    let fits_one_pe = rows <= pe.rows && cols <= pe.cols;
    let blocks = design.capacity.blocks_needed(rows, cols);

    let duplication = match duplication {
        None if fits_one_pe => auto_duplication(design, blocks),
        None => DuplicationFactor::NONE,
        Some([row, col]) => {
            let dup = DuplicationFactor { row, col };
            let (pe_rows, pe_cols) = design.hierarchy.subarrays_per_pe;
            if row == 0 || col == 0 {
                return Err(ConfigError::invalid(
                    "duplication",
                    format!("{row}x{col} replicas"),
                ));
            }
            if dup.is_duplicated() && !fits_one_pe {
                return Err(ConfigError::invalid(
                    "duplication",
                    format!("a {rows}x{cols} layer spans several pes and cannot be replicated"),
                ));
            }
            if dup.is_duplicated() && (blocks.0 * row > pe_rows || blocks.1 * col > pe_cols) {
                return Err(ConfigError::invalid(
                    "duplication",
                    format!(
                        "{row}x{col} copies of {}x{} subarrays exceed a {pe_rows}x{pe_cols} pe",
                        blocks.0, blocks.1
                    ),
                ));
            }
            dup
        }
    };

    let allocated = (tiles.0 * tiles.1 * tile.rows * tile.cols) as f64;
    let plan = LayerFloorplan {
        tiles,
        duplication,
        utilization: (rows * cols * duplication.total()) as f64 / allocated,
    };
    debug!(?plan, rows, cols, "layer floorplan");
    Ok(plan)
}
