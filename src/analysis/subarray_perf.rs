//! drive every input vector of a tile through the subarray model

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{
    activity::{ActivityStatistics, ReadActivity},
    matrix::{ActivationMatrix, WeightMatrix},
    partition::TileAssignment,
    resistance::resistance_of_columns,
    results::Buckets,
    Engine,
};
use crate::cim::{config::Design, subarray::SubArrayModel, timing::Timing};

/// the summed reads of one logical tile, latencies in [`Timing`] units
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    pub read_latency: f64,
    pub latency: Buckets,
    pub energy: Buckets,
    pub activity: ActivityStatistics,
}

/// call `on_read` with the column resistances and activity of every vector in order
fn drive_reads(
    design: &Design,
    weights: &WeightMatrix,
    inputs: &ActivationMatrix,
    mut on_read: impl FnMut(&[f64], &ReadActivity),
) -> ActivityStatistics {
    let mut stats = ActivityStatistics::default();
    stats.record_weights(weights);
    let mut previous = None;
    for current in inputs.iter() {
        let sample = design.activity.measure(current, previous, weights);
        stats.record(&sample);
        let resistance = resistance_of_columns(
            current,
            weights,
            design.cell,
            design.read_mode,
            &design.tech.wire,
            design.device.access_resistance,
        );
        on_read(&resistance, &sample.activity);
        previous = Some(current);
    }
    stats
}

/// the block of `weights` and `inputs` covered by `tile`
fn tile_slices(weights: &WeightMatrix, inputs: &ActivationMatrix, tile: &TileAssignment) -> (WeightMatrix, ActivationMatrix) {
    (
        weights.sub_matrix(tile),
        inputs.sub_rows(tile.row_offset, tile.rows),
    )
}

/// accumulate the latency and energy of every read of `tile`
pub fn simulate_tile<S: SubArrayModel>(
    engine: &Engine<'_, S>,
    weights: &WeightMatrix,
    inputs: &ActivationMatrix,
    tile: &TileAssignment,
    timing: &Timing,
) -> TileRecord {
    let (weights, inputs) = tile_slices(weights, inputs, tile);
    let mut record = TileRecord::default();
    let activity = drive_reads(engine.design, &weights, &inputs, |resistance, activity| {
        let read = engine.subarray.simulate_read(resistance, activity, timing);
        record.read_latency += read.latency.total();
        record.latency += read.latency;
        record.energy += read.energy;
    });
    trace!(?tile, vectors = activity.vectors, read_latency = record.read_latency, "tile simulated");
    record.activity = activity;
    record
}

/// the slowest sensing of any single read of `tile`, zero without input vectors
pub fn calibrate_tile<S: SubArrayModel>(
    engine: &Engine<'_, S>,
    weights: &WeightMatrix,
    inputs: &ActivationMatrix,
    tile: &TileAssignment,
) -> f64 {
    let (weights, inputs) = tile_slices(weights, inputs, tile);
    let mut slowest: f64 = 0.0;
    drive_reads(engine.design, &weights, &inputs, |resistance, _| {
        slowest = slowest.max(engine.subarray.sensing_latency(resistance));
    });
    slowest
}
