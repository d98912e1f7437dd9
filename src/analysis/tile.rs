//! the tile and layer levels, both merge children running in parallel

use tracing::{debug, info};

use super::{
    matrix::{ActivationMatrix, WeightMatrix},
    partition::{row_partitions, DuplicationFactor, TileAssignment},
    pe::{add_adder_tree, add_buffers_and_buses, evaluate_pe, pe_area, pe_idle_leakage},
    results::{Area, LayerRecord, Leakage, PerformanceRecord},
    layer_slices, Engine, LayerWorkload,
};
use crate::cim::{
    config::Design,
    periphery::{Load, PeripherySet, MAX_POOL_WINDOW},
    subarray::SubArrayModel,
    timing::Timing,
};

/// static power of a tile with nothing mapped on it
pub fn tile_idle_leakage<S: SubArrayModel>(engine: &Engine<'_, S>) -> f64 {
    pe_idle_leakage(engine) * engine.design.hierarchy.pes_in_tile() as f64 + engine.tile.leakage()
}

pub fn tile_area<S: SubArrayModel>(engine: &Engine<'_, S>) -> Area {
    let mut area = pe_area(engine) * engine.design.hierarchy.pes_in_tile() as f64;
    area.other += engine.tile.area();
    area
}

/// evaluate one tile spanning `tile` of the layer, mapped onto `pes`
pub fn evaluate_tile<S: SubArrayModel>(
    engine: &Engine<'_, S>,
    weights: &WeightMatrix,
    inputs: &ActivationMatrix,
    tile: &TileAssignment,
    pes: &[TileAssignment],
    dup: DuplicationFactor,
    timing: &Timing,
) -> PerformanceRecord {
    let design = engine.design;
    let pes_in_tile = design.hierarchy.pes_in_tile();
    let mut record = PerformanceRecord::default();
    let mut in_use = 0.0;
    for pe in pes {
        let pe_weights = weights.sub_matrix(pe);
        let pe_inputs = inputs.sub_rows(pe.row_offset, pe.rows);
        let pe_record = evaluate_pe(engine, &pe_weights, &pe_inputs, dup, timing);
        in_use += pe_record.leakage.in_use;
        record.merge_parallel(pe_record);
    }

    let vectors = inputs.num_vectors();
    add_adder_tree(&mut record, &engine.tile, design, vectors, row_partitions(pes), timing);
    add_buffers_and_buses(&mut record, &engine.tile, design, (tile.rows, tile.cols), vectors, timing);

    let idle_pes = pes_in_tile.saturating_sub(pes.len()) as f64;
    let periphery = engine.tile.leakage();
    record.leakage = Leakage {
        idle: tile_idle_leakage(engine),
        in_use: in_use + pe_idle_leakage(engine) * idle_pes + periphery,
    };
    record.area = tile_area(engine);
    debug!(?tile, pes = pes.len(), read_latency = record.read_latency, "tile evaluated");
    record
}

/// add the max pooling of `outputs` pooled values, charged to the other bucket
fn add_max_pool(record: &mut PerformanceRecord, periphery: &PeripherySet, design: &Design, outputs: usize, timing: &Timing) {
    let cost = periphery
        .max_pool
        .evaluate(Load::adds(outputs as f64, MAX_POOL_WINDOW), timing);
    record.read_latency += cost.latency;
    if !design.only_main_array {
        record.latency.other += cost.latency;
    }
    record.energy.other += cost.energy;
}

/// evaluate every tile of one layer, latencies stay in `timing` units
pub fn evaluate_layer<S: SubArrayModel>(engine: &Engine<'_, S>, layer: &LayerWorkload, timing: &Timing) -> LayerRecord {
    let design = engine.design;
    let weights = &layer.weights;
    let inputs = &layer.inputs;
    let slices = layer_slices(design, weights.rows(), weights.cols());
    let tiles: Vec<TileAssignment> = slices.iter().map(|(tile, _)| *tile).collect();
    let dup = layer.floorplan.duplication;

    let mut record = PerformanceRecord::default();
    let mut leakage = Leakage::default();
    for (tile, pes) in &slices {
        let tile_record = evaluate_tile(engine, weights, inputs, tile, pes, dup, timing);
        leakage += tile_record.leakage;
        record.merge_parallel(tile_record);
    }

    let vectors = inputs.num_vectors();
    add_adder_tree(&mut record, &engine.global, design, vectors, row_partitions(&tiles), timing);
    add_buffers_and_buses(
        &mut record,
        &engine.global,
        design,
        (weights.rows(), weights.cols()),
        vectors,
        timing,
    );
    if layer.pooled_outputs > 0 {
        add_max_pool(&mut record, &engine.global, design, layer.pooled_outputs, timing);
    }

    let count = tiles.len().max(1) as f64;
    record.leakage = leakage / count;
    record.area = tile_area(engine) * tiles.len() as f64;
    info!(
        layer = layer.index,
        tiles = tiles.len(),
        duplication = dup.total(),
        read_latency = record.read_latency,
        "layer evaluated"
    );
    LayerRecord {
        index: layer.index,
        tiles: tiles.len(),
        duplication: dup,
        utilization: layer.floorplan.utilization,
        operations: layer.operations,
        record,
        leakage_energy: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_utils::{analytical_engine, constant_engine, null_design, workload};

    #[test]
    fn test_tile_takes_max_over_pes() {
        let design = null_design();
        let engine = constant_engine(&design);
        // a pe holds 256x256, 300 rows need two of them
        let layer = workload(&design, 0, 300, 100, 4, DuplicationFactor::NONE);
        let record = evaluate_layer(&engine, &layer, &Timing::Asynchronous);
        assert_eq!(record.tiles, 1);
        // the slowest subarray reads 4 vectors
        assert_eq!(record.record.read_latency, 24.0);
        // 3 subarrays
        assert_eq!(record.record.energy.total(), 3.0 * 24.0);
        assert_eq!(record.record.activity.vectors, 12);
    }

    #[test]
    fn test_tile_leakage() {
        let design = null_design();
        let engine = constant_engine(&design);
        let layer = workload(&design, 0, 300, 100, 1, DuplicationFactor::NONE);
        let record = evaluate_layer(&engine, &layer, &Timing::Asynchronous);
        // 16 pes of 4 subarrays leaking 1 each, 3 subarrays are in use and leak 2
        assert_eq!(record.record.leakage, Leakage { idle: 64.0, in_use: 67.0 });
        assert_eq!(record.record.area.array, 64.0);
    }

    #[test]
    fn test_layer_spans_tiles() {
        let design = null_design();
        let engine = constant_engine(&design);
        // a tile holds 1024x1024
        let layer = workload(&design, 3, 1500, 2100, 2, DuplicationFactor::NONE);
        let record = evaluate_layer(&engine, &layer, &Timing::Asynchronous);
        assert_eq!(record.index, 3);
        assert_eq!(record.tiles, 6);
        assert_eq!(record.record.read_latency, 12.0);
        // leakage is the mean of one tile
        assert_eq!(record.record.leakage.idle, 64.0);
        assert_eq!(record.record.area.array, 6.0 * 64.0);
    }

    #[test]
    fn test_pooling_costs_other() {
        let design = null_design();
        let engine = analytical_engine(&design);
        let mut layer = workload(&design, 0, 100, 64, 4, DuplicationFactor::NONE);
        let plain = evaluate_layer(&engine, &layer, &Timing::Asynchronous);
        layer.pooled_outputs = 16;
        let pooled = evaluate_layer(&engine, &layer, &Timing::Asynchronous);
        assert!(pooled.record.latency.other > plain.record.latency.other);
        assert!(pooled.record.energy.other > plain.record.energy.other);
        assert!(pooled.record.read_latency > plain.record.read_latency);
        assert_eq!(pooled.record.latency.adc, plain.record.latency.adc);
        assert_eq!(pooled.record.energy.adc, plain.record.energy.adc);
        assert_eq!(pooled.record.energy.accum, plain.record.energy.accum);

        // without a pooling unit nothing changes
        let engine = constant_engine(&design);
        let free = evaluate_layer(&engine, &layer, &Timing::Asynchronous);
        layer.pooled_outputs = 0;
        assert_eq!(free.record, evaluate_layer(&engine, &layer, &Timing::Asynchronous).record);
    }

    #[test]
    fn test_layer_only_main_array() {
        let mut design = null_design();
        // two tiles of 4x2 pes, merged by the tile and the global adder trees
        let mut layer = workload(&design, 0, 2048, 300, 8, DuplicationFactor::NONE);
        layer.pooled_outputs = 32;
        let full = {
            let engine = analytical_engine(&design);
            evaluate_layer(&engine, &layer, &Timing::Asynchronous)
        };
        design.only_main_array = true;
        let engine = analytical_engine(&design);
        let main = evaluate_layer(&engine, &layer, &Timing::Asynchronous);
        assert_eq!(full.tiles, 2);
        assert!(full.record.latency.accum > main.record.latency.accum);
        assert!(full.record.latency.other > main.record.latency.other);
        assert_eq!(full.record.latency.adc, main.record.latency.adc);
        assert_eq!(full.record.energy, main.record.energy);
        assert_eq!(full.record.read_latency, main.record.read_latency);
    }
}
