//! # the analysis module
//! map every layer onto the hierarchy and aggregate its latency, energy and area
pub mod activity;
pub mod chip;
pub mod clock;
pub mod matrix;
pub mod partition;
pub mod pe;
pub mod resistance;
pub mod results;
pub mod subarray_perf;
pub mod tile;
pub mod traits;

use tracing::info;

use self::{
    activity::ActivityStatistics,
    chip::{chip_area, chip_utilization, combine_layers},
    clock::calibrate_clock,
    matrix::{ActivationMatrix, WeightMatrix},
    partition::{partition, DuplicationFactor, TileAssignment},
    results::{ChipReport, Summary},
    tile::evaluate_layer,
    traits::ReportStats,
};
use crate::cim::{
    config::{Clocking, Design},
    floorplan::LayerFloorplan,
    level::Level,
    periphery::PeripherySet,
    subarray::{AnalyticalSubArray, SubArrayModel},
    timing::Timing,
};

/// the models one estimate runs on, all borrowing the same design
#[derive(Debug)]
pub struct Engine<'a, S: SubArrayModel> {
    pub design: &'a Design,
    pub subarray: S,
    pub pe: PeripherySet,
    pub tile: PeripherySet,
    pub global: PeripherySet,
}

impl<'a, S: SubArrayModel> Engine<'a, S> {
    pub fn new(design: &'a Design, subarray: S, pe: PeripherySet, tile: PeripherySet, global: PeripherySet) -> Self {
        Self {
            design,
            subarray,
            pe,
            tile,
            global,
        }
    }
}

impl<'a> Engine<'a, AnalyticalSubArray> {
    pub fn analytical(design: &'a Design) -> Self {
        Self::new(
            design,
            AnalyticalSubArray::new(design),
            PeripherySet::new(Level::Pe, design),
            PeripherySet::new(Level::Tile, design),
            PeripherySet::new(Level::Chip, design),
        )
    }
}

/// one layer ready to be mapped
#[derive(Debug, Clone)]
pub struct LayerWorkload {
    pub index: usize,
    pub weights: WeightMatrix,
    pub inputs: ActivationMatrix,
    pub floorplan: LayerFloorplan,
    pub operations: f64,
    /// outputs of the max pooling following the layer, zero without pooling
    pub pooled_outputs: usize,
}

/// split a `rows`x`cols` layer into tiles and every tile into pes, all in layer coordinates
pub fn layer_slices(design: &Design, rows: usize, cols: usize) -> Vec<(TileAssignment, Vec<TileAssignment>)> {
    let capacity = |level| {
        design
            .hierarchy
            .capacity(level, design.capacity)
            .unwrap_or(design.capacity)
    };
    let tile_capacity = capacity(Level::Tile);
    let pe_capacity = capacity(Level::Pe);
    partition(rows, cols, tile_capacity, DuplicationFactor::NONE)
        .tiles()
        .iter()
        .map(|tile| {
            let pes = partition(tile.rows, tile.cols, pe_capacity, DuplicationFactor::NONE)
                .tiles()
                .iter()
                .map(|pe| pe.inside(tile))
                .collect();
            (*tile, pes)
        })
        .collect()
}

/// estimate the whole network, calibrating the clock first when it is synchronous
pub fn estimate<S: SubArrayModel>(engine: &Engine<'_, S>, layers: &[LayerWorkload]) -> ChipReport {
    let design = engine.design;
    let clock = match design.clocking {
        Clocking::Synchronous => Some(calibrate_clock(engine, layers, design.clock_frequency)),
        Clocking::Asynchronous => None,
    };
    let timing = clock
        .as_ref()
        .map_or(Timing::Asynchronous, |c| Timing::Synchronous { period: c.period });

    let mut records: Vec<_> = layers
        .iter()
        .map(|layer| {
            let mut record = evaluate_layer(engine, layer, &timing);
            record.record = record.record.in_seconds(&timing);
            record
        })
        .collect();
    let chip = combine_layers(design.execution, &mut records);
    let area = chip_area(&records, &engine.global);
    let operations = records.iter().map(|r| r.operations).sum();
    let summary = Summary::new(&chip, area.total(), operations);
    let utilization = chip_utilization(&records);
    let per_layer: Vec<ActivityStatistics> = records.iter().map(|r| r.record.activity.clone()).collect();
    let activity_stats = ActivityStatistics::report_stats(&per_layer);
    let mut activity = ActivityStatistics::default();
    for layer in per_layer {
        activity.merge(layer);
    }
    info!(
        layers = records.len(),
        latency = chip.read_latency,
        energy = chip.total_energy(),
        utilization,
        "network estimated"
    );
    ChipReport {
        clock,
        layers: records,
        chip,
        area,
        summary,
        utilization,
        activity,
        activity_stats,
    }
}


#[cfg(test)]
mod tests {
    use super::{test_utils::*, *};
    use crate::cim::config::ExecutionMode;

    #[test]
    fn test_layer_slices() {
        let design = null_design();
        // tiles of 1024x1024 made of pes of 256x256
        let slices = layer_slices(&design, 1100, 300);
        assert_eq!(slices.len(), 2);
        let (tile, pes) = &slices[1];
        assert_eq!((tile.row_offset, tile.rows, tile.cols), (1024, 76, 300));
        assert_eq!(pes.len(), 2);
        assert_eq!((pes[1].row_offset, pes[1].col_offset, pes[1].cols), (1024, 256, 44));
        let (_, pes) = &slices[0];
        assert_eq!(pes.len(), 8);
    }

    #[test]
    fn test_duplication_scales_latency_exactly() {
        let design = null_design();
        let engine = null_periphery_engine(&design);
        let shapes = [(100, 64), (60, 120), (128, 128)];
        let run = |dup: DuplicationFactor| {
            let layers: Vec<_> = shapes
                .iter()
                .enumerate()
                .map(|(i, (rows, cols))| workload(&design, i, *rows, *cols, 16, dup))
                .collect();
            estimate(&engine, &layers)
        };
        let base = run(DuplicationFactor::NONE);
        for (row, col) in [(2, 1), (2, 2), (4, 2)] {
            let dup = DuplicationFactor { row, col };
            let d = dup.total() as f64;
            let report = run(dup);
            for (layer, undup) in report.layers.iter().zip(&base.layers) {
                assert_eq!(layer.record.read_latency, undup.record.read_latency / d);
                assert_eq!(layer.record.latency, undup.record.latency / d);
                assert_eq!(layer.record.energy, undup.record.energy);
            }
        }
    }

    #[test]
    fn test_pipelined_against_layer_by_layer() {
        let mut design = null_design();
        // the first layer reads twice as many vectors
        let layers = |design: &Design| {
            vec![
                workload(design, 0, 64, 64, 32, DuplicationFactor::NONE),
                workload(design, 1, 64, 64, 16, DuplicationFactor::NONE),
            ]
        };
        design.execution = ExecutionMode::Pipelined;
        let engine = constant_engine(&design);
        let pipelined = estimate(&engine, &layers(&design));
        let (first, second) = (
            pipelined.layers[0].record.read_latency,
            pipelined.layers[1].record.read_latency,
        );
        assert_eq!(first, 2.0 * second);
        assert_eq!(pipelined.chip.read_latency, first);
        // the slowest layer leaks in use for the whole stage
        let slowest = &pipelined.layers[0];
        assert_eq!(
            slowest.leakage_energy,
            slowest.tiles as f64 * slowest.record.leakage.in_use * first
        );

        design.execution = ExecutionMode::LayerByLayer;
        let engine = constant_engine(&design);
        let sequential = estimate(&engine, &layers(&design));
        assert_eq!(sequential.chip.read_latency, first + second);
        assert_eq!(sequential.chip.dynamic_energy, pipelined.chip.dynamic_energy);
        assert!(sequential.clock.is_none());
    }

    #[test]
    fn test_synchronous_estimate() {
        let mut design = null_design();
        design.clocking = Clocking::Synchronous;
        let engine = Engine::analytical(&design);
        let layers = vec![workload(&design, 0, 200, 100, 8, DuplicationFactor::NONE)];
        let report = estimate(&engine, &layers);
        let clock = report.clock.as_ref().unwrap();
        assert_eq!(clock.period, clock.max_sensing);
        assert!(clock.frequency <= design.clock_frequency);
        assert!(clock.frequency <= 1.0 / clock.period);
        // every latency is a whole number of cycles
        let cycles = report.chip.read_latency / clock.period;
        assert!((cycles - cycles.round()).abs() < 1e-6);
        assert!(report.summary.tops > 0.0);
        assert!(report.summary.tops_per_watt > 0.0);
        assert_eq!(report.activity.vectors, 2 * 8);
    }

    #[test]
    fn test_report_utilization_and_activity() {
        let design = null_design();
        let engine = constant_engine(&design);
        // tiles of 1024x1024, the second layer takes two of them
        let layers = vec![
            workload(&design, 0, 512, 512, 4, DuplicationFactor::NONE),
            workload(&design, 1, 1024, 2048, 4, DuplicationFactor::NONE),
        ];
        let report = estimate(&engine, &layers);
        assert_eq!(report.layers[0].utilization, 0.25);
        assert_eq!(report.layers[1].tiles, 2);
        assert_eq!(report.layers[1].utilization, 1.0);
        assert!((report.utilization - (0.25 + 2.0) / 3.0).abs() < 1e-12);
        // every layer drives half of its rows
        let (mean, std, max) = report.activity_stats["activation_rate"];
        assert_eq!((mean, std, max), (0.5, 0.0, 0.5));
        assert_eq!(report.activity.activation_rate(), 0.5);
    }
}
