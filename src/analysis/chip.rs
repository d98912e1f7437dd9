//! combine the layers of a network according to the execution mode

use tracing::debug;

use super::results::{Area, ChipRecord, LayerRecord};
use crate::cim::{config::ExecutionMode, periphery::PeripherySet};

/// chip totals of `layers`, whose latencies are already in seconds
///
/// fills the leakage energy of every layer on the way
pub fn combine_layers(mode: ExecutionMode, layers: &mut [LayerRecord]) -> ChipRecord {
    let mut chip = ChipRecord {
        leakage_power: layers
            .iter()
            .map(|l| l.tiles as f64 * l.record.leakage.idle)
            .sum(),
        ..Default::default()
    };
    for layer in layers.iter() {
        chip.energy += layer.record.energy;
        chip.dynamic_energy += layer.record.read_dynamic_energy();
        chip.buffer.energy += layer.record.buffer.energy;
        chip.interconnect.energy += layer.record.interconnect.energy;
    }

    match mode {
        ExecutionMode::LayerByLayer => {
            let all_idle = chip.leakage_power;
            for layer in layers.iter_mut() {
                let tiles = layer.tiles as f64;
                let leakage = &layer.record.leakage;
                // every other layer idles while this one computes
                let power = all_idle - tiles * leakage.idle + tiles * leakage.in_use;
                layer.leakage_energy = power * layer.record.read_latency;
                chip.read_latency += layer.record.read_latency;
                chip.latency += layer.record.latency;
                chip.buffer.latency += layer.record.buffer.latency;
                chip.interconnect.latency += layer.record.interconnect.latency;
            }
        }
        ExecutionMode::Pipelined => {
            let slowest = layers
                .iter()
                .max_by(|a, b| a.record.read_latency.total_cmp(&b.record.read_latency));
            let system_clock = slowest.map_or(0.0, |l| l.record.read_latency);
            if let Some(slowest) = slowest {
                chip.latency = slowest.record.latency;
                chip.buffer.latency = slowest.record.buffer.latency;
                chip.interconnect.latency = slowest.record.interconnect.latency;
            }
            for layer in layers.iter_mut() {
                // busy for its own latency and idle for the rest of the stage
                layer.leakage_energy = if system_clock > 0.0 {
                    let tiles = layer.tiles as f64;
                    let leakage = &layer.record.leakage;
                    let latency = layer.record.read_latency;
                    tiles * (leakage.in_use * latency + leakage.idle * (system_clock - latency))
                } else {
                    0.0
                };
            }
            chip.read_latency = system_clock;
            chip.system_clock = Some(system_clock);
        }
    }
    chip.leakage_energy = layers.iter().map(|l| l.leakage_energy).sum();
    if let Some(stage) = chip.system_clock.filter(|stage| *stage > 0.0) {
        // every layer blends its in use and idle power over one stage
        chip.leakage_power = chip.leakage_energy / stage;
    }
    debug!(?mode, latency = chip.read_latency, leakage = chip.leakage_energy, "layers combined");
    chip
}

/// fraction of the allocated cells holding a weight, every layer weighted by its tiles
pub fn chip_utilization(layers: &[LayerRecord]) -> f64 {
    let tiles: usize = layers.iter().map(|l| l.tiles).sum();
    if tiles == 0 {
        return 0.0;
    }
    let mapped: f64 = layers.iter().map(|l| l.tiles as f64 * l.utilization).sum();
    mapped / tiles as f64
}

/// the layers' tiles plus the global periphery
pub fn chip_area(layers: &[LayerRecord], global: &PeripherySet) -> Area {
    let mut area = layers.iter().fold(Area::default(), |acc, l| acc + l.record.area);
    area.other += global.area();
    area
}
