//! combine the subarrays of one processing element

use tracing::debug;

use super::{
    matrix::{ActivationMatrix, WeightMatrix},
    partition::{partition, DuplicationFactor, Partition},
    results::{Area, Leakage, PerformanceRecord},
    subarray_perf::simulate_tile,
    Engine,
};
use crate::cim::{
    config::Design,
    periphery::{Load, PeripherySet},
    subarray::SubArrayModel,
    timing::Timing,
};

/// back to back accumulations an adder tree runs for `vectors` input vectors
pub fn accumulation_reads(design: &Design, vectors: usize) -> f64 {
    let per_vector = design.num_col_muxed.div_ceil(design.cols_per_synapse);
    vectors as f64 / design.input_bit as f64 * per_vector as f64
}

/// bits moved into and out of a block holding a `rows`x`cols` slice
pub fn traffic_bits(design: &Design, rows: usize, cols: usize, vectors: usize) -> (f64, f64) {
    let input_bits = (rows * vectors) as f64;
    let outputs = cols.div_ceil(design.cols_per_synapse);
    let output_bits = (outputs * design.word_bits()) as f64 * vectors as f64 / design.input_bit as f64;
    (input_bits, output_bits)
}

/// add the adder tree of `periphery` merging `fan_in` partial sums
pub fn add_adder_tree(
    record: &mut PerformanceRecord,
    periphery: &PeripherySet,
    design: &Design,
    vectors: usize,
    fan_in: usize,
    timing: &Timing,
) {
    add_adder_tree_passes(record, periphery, design, vectors, fan_in, 1, timing);
}

/// same as [`add_adder_tree`] with `passes` trees running side by side, each paying its own energy
pub fn add_adder_tree_passes(
    record: &mut PerformanceRecord,
    periphery: &PeripherySet,
    design: &Design,
    vectors: usize,
    fan_in: usize,
    passes: usize,
    timing: &Timing,
) {
    let cost = periphery
        .adder_tree
        .evaluate(Load::adds(accumulation_reads(design, vectors), fan_in), timing);
    record.read_latency += cost.latency;
    if !design.only_main_array {
        record.latency.accum += cost.latency;
    }
    record.energy.accum += cost.energy * passes as f64;
}

/// add the buffers and buses of `periphery` moving a `rows`x`cols` slice
pub fn add_buffers_and_buses(
    record: &mut PerformanceRecord,
    periphery: &PeripherySet,
    design: &Design,
    (rows, cols): (usize, usize),
    vectors: usize,
    timing: &Timing,
) {
    let (input_bits, output_bits) = traffic_bits(design, rows, cols, vectors);
    let buffer = periphery.buffers(input_bits, output_bits, timing);
    let mut bus = periphery.buses(input_bits, output_bits, timing);
    if timing.hides_bus() {
        bus.latency = 0.0;
    }
    let latency = buffer.latency + bus.latency;
    record.read_latency += latency;
    if !design.only_main_array {
        record.latency.other += latency;
    }
    record.energy.other += buffer.energy + bus.energy;
    record.buffer += buffer;
    record.interconnect += bus;
}

/// static power of a pe with nothing mapped on it
pub fn pe_idle_leakage<S: SubArrayModel>(engine: &Engine<'_, S>) -> f64 {
    let count = engine.design.hierarchy.subarrays_in_pe() as f64;
    engine.subarray.leakage().idle * count + engine.pe.leakage()
}

pub fn pe_area<S: SubArrayModel>(engine: &Engine<'_, S>) -> Area {
    let count = engine.design.hierarchy.subarrays_in_pe() as f64;
    let mut area = engine.subarray.area() * count;
    area.other += engine.pe.area();
    area
}

/// evaluate the pe holding all of `weights`, `inputs` covers the same rows
pub fn evaluate_pe<S: SubArrayModel>(
    engine: &Engine<'_, S>,
    weights: &WeightMatrix,
    inputs: &ActivationMatrix,
    dup: DuplicationFactor,
    timing: &Timing,
) -> PerformanceRecord {
    let design = engine.design;
    let vectors = inputs.num_vectors();
    let partition = partition(weights.rows(), weights.cols(), design.capacity, dup);

    let mut record = PerformanceRecord::default();
    for tile in partition.tiles() {
        let tile_record = simulate_tile(engine, weights, inputs, tile, timing);
        record.read_latency = record.read_latency.max(tile_record.read_latency);
        record.latency = record.latency.max(&tile_record.latency);
        record.energy += tile_record.energy;
        record.activity.merge(tile_record.activity);
    }

    if partition.uses_adder_tree() {
        // every slice of a duplicated layer feeds its own tree
        let passes = match &partition {
            Partition::DuplicatedPartitioned(tiles, _) => tiles.len(),
            _ => 1,
        };
        add_adder_tree_passes(
            &mut record,
            &engine.pe,
            design,
            vectors,
            partition.row_partitions(),
            passes,
            timing,
        );
    }

    match &partition {
        // one copy of every tile, the slowest subarray sets the pace
        Partition::Partitioned(_) => {}
        // the replicas share the input vectors
        Partition::DuplicatedPartitioned(_, dup) | Partition::Replicated(_, dup) => {
            let d = dup.total() as f64;
            record.read_latency /= d;
            record.latency = record.latency / d;
        }
    }

    add_buffers_and_buses(
        &mut record,
        &engine.pe,
        design,
        (weights.rows(), weights.cols()),
        vectors,
        timing,
    );

    let count = design.hierarchy.subarrays_in_pe();
    let used = partition.physical_subarrays().min(count);
    let subarray = engine.subarray.leakage();
    let periphery = engine.pe.leakage();
    record.leakage = Leakage {
        idle: subarray.idle * count as f64 + periphery,
        in_use: subarray.in_use * used as f64 + subarray.idle * (count - used) as f64 + periphery,
    };
    record.area = pe_area(engine);

    debug!(
        rows = weights.rows(),
        cols = weights.cols(),
        tiles = partition.tiles().len(),
        duplication = dup.total(),
        read_latency = record.read_latency,
        "pe evaluated"
    );
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{
        results::Buckets,
        test_utils::{analytical_engine, constant_engine, null_design},
    };

    /// a `rows`x`cols` layer at max conductance read by `vectors` alternating vectors
    fn data(design: &Design, rows: usize, cols: usize, vectors: usize) -> (WeightMatrix, ActivationMatrix) {
        let weights = WeightMatrix::filled(
            rows,
            cols,
            design.device.max_conductance,
            design.device.min_conductance,
            design.device.max_conductance,
        );
        let inputs = ActivationMatrix::from_fn(rows, vectors, |i, k| (i + k) % 3 != 0);
        (weights, inputs)
    }

    #[test]
    fn test_partitioned_takes_max() {
        let design = null_design();
        let engine = constant_engine(&design);
        // 2x2 subarrays of 128x128
        let (weights, inputs) = data(&design, 200, 200, 4);
        let record = evaluate_pe(&engine, &weights, &inputs, DuplicationFactor::NONE, &Timing::Asynchronous);
        assert_eq!(record.read_latency, 24.0);
        assert_eq!(
            record.latency,
            Buckets {
                adc: 4.0,
                accum: 8.0,
                other: 12.0
            }
        );
        // four tiles of 4 reads each
        assert_eq!(record.energy.total(), 4.0 * 4.0 * 6.0);
        assert_eq!(record.activity.vectors, 16);
    }

    #[test]
    fn test_duplication_divides_latency_only() {
        let design = null_design();
        let engine = constant_engine(&design);
        let (weights, inputs) = data(&design, 100, 60, 8);
        let base = evaluate_pe(&engine, &weights, &inputs, DuplicationFactor::NONE, &Timing::Asynchronous);
        for (row, col) in [(2, 1), (2, 2), (1, 2)] {
            let dup = DuplicationFactor { row, col };
            let record = evaluate_pe(&engine, &weights, &inputs, dup, &Timing::Asynchronous);
            let d = dup.total() as f64;
            assert_eq!(record.read_latency, base.read_latency / d);
            assert_eq!(record.latency, base.latency / d);
            assert_eq!(record.energy, base.energy);
        }
    }

    #[test]
    fn test_duplicated_partitions_divide_after_max() {
        let design = null_design();
        let engine = constant_engine(&design);
        let (weights, inputs) = data(&design, 200, 60, 4);
        let base = evaluate_pe(&engine, &weights, &inputs, DuplicationFactor::NONE, &Timing::Asynchronous);
        let dup = DuplicationFactor { row: 1, col: 2 };
        let record = evaluate_pe(&engine, &weights, &inputs, dup, &Timing::Asynchronous);
        assert_eq!(record.read_latency, base.read_latency / 2.0);
        assert_eq!(record.energy, base.energy);
    }

    #[test]
    fn test_leakage_counts_used_subarrays() {
        let design = null_design();
        let engine = constant_engine(&design);
        // the constant subarray leaks 1 when idle and 2 in use
        let (weights, inputs) = data(&design, 100, 60, 1);
        let one = evaluate_pe(&engine, &weights, &inputs, DuplicationFactor::NONE, &Timing::Asynchronous);
        assert_eq!(one.leakage, Leakage { idle: 4.0, in_use: 5.0 });
        let four = evaluate_pe(&engine, &weights, &inputs, DuplicationFactor { row: 2, col: 2 }, &Timing::Asynchronous);
        assert_eq!(four.leakage, Leakage { idle: 4.0, in_use: 8.0 });
        assert_eq!(pe_idle_leakage(&engine), 4.0);
        assert_eq!(pe_area(&engine).array, 4.0);
    }

    #[test]
    fn test_only_main_array() {
        let mut design = null_design();
        let (weights, inputs) = data(&design, 200, 200, 8);
        let full = {
            let engine = analytical_engine(&design);
            evaluate_pe(&engine, &weights, &inputs, DuplicationFactor::NONE, &Timing::Asynchronous)
        };
        design.only_main_array = true;
        let engine = analytical_engine(&design);
        let main = evaluate_pe(&engine, &weights, &inputs, DuplicationFactor::NONE, &Timing::Asynchronous);
        assert!(full.latency.accum > main.latency.accum);
        assert!(full.latency.other > main.latency.other);
        assert_eq!(full.latency.adc, main.latency.adc);
        // energies and the critical path are untouched
        assert_eq!(full.energy, main.energy);
        assert_eq!(full.read_latency, main.read_latency);
    }

    #[test]
    fn test_duplicated_only_main_array() {
        let mut design = null_design();
        // 2x1 subarrays copied twice along the columns
        let (weights, inputs) = data(&design, 200, 60, 8);
        let dup = DuplicationFactor { row: 1, col: 2 };
        let full = {
            let engine = analytical_engine(&design);
            evaluate_pe(&engine, &weights, &inputs, dup, &Timing::Asynchronous)
        };
        design.only_main_array = true;
        let engine = analytical_engine(&design);
        let main = evaluate_pe(&engine, &weights, &inputs, dup, &Timing::Asynchronous);
        assert!(full.latency.accum > main.latency.accum);
        assert!(full.latency.other > main.latency.other);
        assert_eq!(full.latency.adc, main.latency.adc);
        assert_eq!(full.energy, main.energy);
        assert_eq!(full.read_latency, main.read_latency);
    }

    #[test]
    fn test_duplicated_slices_pay_their_own_tree() {
        let design = null_design();
        let engine = analytical_engine(&design);
        let (weights, inputs) = data(&design, 200, 60, 8);
        let base = evaluate_pe(&engine, &weights, &inputs, DuplicationFactor::NONE, &Timing::Asynchronous);
        let dup = evaluate_pe(&engine, &weights, &inputs, DuplicationFactor { row: 1, col: 2 }, &Timing::Asynchronous);
        let tree = engine
            .pe
            .adder_tree
            .evaluate(Load::adds(accumulation_reads(&design, 8), 2), &Timing::Asynchronous);
        assert!(tree.energy > 0.0);
        // one tree for the plain layer, one per slice once duplicated
        let extra = dup.energy.accum - base.energy.accum;
        assert!((extra - tree.energy).abs() <= 1e-9 * tree.energy);
        assert_eq!(dup.energy.adc, base.energy.adc);
    }

    #[test]
    fn test_synchronous_bus_is_hidden() {
        let design = null_design();
        let engine = analytical_engine(&design);
        let (weights, inputs) = data(&design, 100, 60, 8);
        let period = 1e-9;
        let sync = Timing::Synchronous { period };
        let record = evaluate_pe(&engine, &weights, &inputs, DuplicationFactor::NONE, &sync);
        assert_eq!(record.interconnect.latency, 0.0);
        assert!(record.interconnect.energy > 0.0);
        let record = evaluate_pe(&engine, &weights, &inputs, DuplicationFactor::NONE, &Timing::Asynchronous);
        assert!(record.interconnect.latency > 0.0);
    }

    #[test]
    fn test_accumulation_reads() {
        let design = null_design();
        // 8 columns per adc, an 8 bit synapse takes 4 cells of 2 bits
        assert_eq!(design.cols_per_synapse, 4);
        assert_eq!(accumulation_reads(&design, 16), 2.0 * 2.0);
        let (input_bits, output_bits) = traffic_bits(&design, 10, 8, 16);
        assert_eq!(input_bits, 160.0);
        assert_eq!(output_bits, 2.0 * design.word_bits() as f64 * 2.0);
    }
}
