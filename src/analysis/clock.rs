//! derive the global clock from the slowest sensing operation

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{layer_slices, partition::partition, subarray_perf::calibrate_tile, Engine, LayerWorkload};
use crate::cim::subarray::SubArrayModel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockPlan {
    /// the slowest single read over the whole chip, in seconds
    pub max_sensing: f64,
    pub layer_sensing: Vec<f64>,
    /// one cycle lasts exactly the slowest sensing
    pub period: f64,
    /// the target frequency, lowered to what the period allows
    pub frequency: f64,
    /// the target frequency could not be met
    pub clamped: bool,
}

/// the period is the slowest sensing, or the target period when no column is ever sensed
pub fn resolve_period(max_sensing: f64, target_frequency: f64) -> f64 {
    if max_sensing > 0.0 {
        max_sensing
    } else {
        1.0 / target_frequency
    }
}

/// the target frequency can never exceed one cycle per `period`
pub fn resolve_frequency(period: f64, target_frequency: f64) -> f64 {
    target_frequency.min(1.0 / period)
}

/// the slowest sensing of every subarray `layer` is mapped on
fn layer_sensing<S: SubArrayModel>(engine: &Engine<'_, S>, layer: &LayerWorkload) -> f64 {
    let design = engine.design;
    let weights = &layer.weights;
    let inputs = &layer.inputs;
    let mut slowest: f64 = 0.0;
    for (_, pes) in layer_slices(design, weights.rows(), weights.cols()) {
        for pe in pes {
            let pe_weights = weights.sub_matrix(&pe);
            let pe_inputs = inputs.sub_rows(pe.row_offset, pe.rows);
            let tiles = partition(
                pe.rows,
                pe.cols,
                design.capacity,
                layer.floorplan.duplication,
            );
            for tile in tiles.tiles() {
                slowest = slowest.max(calibrate_tile(engine, &pe_weights, &pe_inputs, tile));
            }
        }
    }
    slowest
}

/// first pass of a synchronous estimate, nothing but the sensing latency is evaluated
pub fn calibrate_clock<S: SubArrayModel>(
    engine: &Engine<'_, S>,
    layers: &[LayerWorkload],
    target_frequency: f64,
) -> ClockPlan {
    let layer_sensing: Vec<f64> = layers.iter().map(|l| layer_sensing(engine, l)).collect();
    let max_sensing = layer_sensing.iter().copied().fold(0.0, f64::max);
    let period = resolve_period(max_sensing, target_frequency);
    let frequency = resolve_frequency(period, target_frequency);
    let clamped = frequency < target_frequency;
    if clamped {
        warn!(
            "the target clock of {:.3e}Hz is faster than the slowest sensing, running at {:.3e}Hz",
            target_frequency, frequency
        );
    }
    info!(max_sensing, period, frequency, "clock calibrated");
    ClockPlan {
        max_sensing,
        layer_sensing,
        period,
        frequency,
        clamped,
    }
}
