use std::collections::BTreeMap;

use derive_more::{Add, AddAssign, Div, Mul};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    activity::ActivityStatistics,
    clock::ClockPlan,
    partition::DuplicationFactor,
    traits::{get_mean_std_max, ReportStats},
};
use crate::cim::timing::Timing;

/// a quantity split into sensing, accumulation and the rest of the periphery
#[derive(Serialize, Deserialize, Clone, Copy, Default, Debug, PartialEq, Add, AddAssign, Mul, Div)]
pub struct Buckets {
    pub adc: f64,
    pub accum: f64,
    pub other: f64,
}

impl Buckets {
    pub fn total(&self) -> f64 {
        self.adc + self.accum + self.other
    }

    /// field wise max
    pub fn max(&self, other: &Buckets) -> Buckets {
        Buckets {
            adc: self.adc.max(other.adc),
            accum: self.accum.max(other.accum),
            other: self.other.max(other.other),
        }
    }
}

/// latency and energy of one peripheral operation
#[derive(Serialize, Deserialize, Clone, Copy, Default, Debug, PartialEq, Add, AddAssign, Mul, Div)]
pub struct Cost {
    pub latency: f64,
    pub energy: f64,
}

/// static power in watts, `idle` when the block holds no active work, `in_use` while it computes
#[derive(Serialize, Deserialize, Clone, Copy, Default, Debug, PartialEq, Add, AddAssign, Mul, Div)]
pub struct Leakage {
    pub idle: f64,
    pub in_use: f64,
}

/// silicon area in m^2
#[derive(Serialize, Deserialize, Clone, Copy, Default, Debug, PartialEq, Add, AddAssign, Mul, Div)]
pub struct Area {
    pub array: f64,
    pub adc: f64,
    pub accum: f64,
    pub other: f64,
}

impl Area {
    pub fn total(&self) -> f64 {
        self.array + self.adc + self.accum + self.other
    }
}

/// the aggregate of one pe, tile or layer
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct PerformanceRecord {
    /// critical path of the whole read
    pub read_latency: f64,
    pub latency: Buckets,
    pub energy: Buckets,
    pub buffer: Cost,
    pub interconnect: Cost,
    pub leakage: Leakage,
    pub area: Area,
    pub activity: ActivityStatistics,
}

impl PerformanceRecord {
    pub fn read_dynamic_energy(&self) -> f64 {
        self.energy.total()
    }

    /// combine a child running in parallel with its siblings
    pub fn merge_parallel(&mut self, child: PerformanceRecord) {
        self.read_latency = self.read_latency.max(child.read_latency);
        self.latency = self.latency.max(&child.latency);
        self.energy += child.energy;
        self.buffer.energy += child.buffer.energy;
        self.buffer.latency = self.buffer.latency.max(child.buffer.latency);
        self.interconnect.energy += child.interconnect.energy;
        self.interconnect.latency = self.interconnect.latency.max(child.interconnect.latency);
        self.activity.merge(child.activity);
    }

    /// rescale every latency field from `timing` units into seconds
    pub fn in_seconds(mut self, timing: &Timing) -> Self {
        self.read_latency = timing.to_seconds(self.read_latency);
        self.latency = Buckets {
            adc: timing.to_seconds(self.latency.adc),
            accum: timing.to_seconds(self.latency.accum),
            other: timing.to_seconds(self.latency.other),
        };
        self.buffer.latency = timing.to_seconds(self.buffer.latency);
        self.interconnect.latency = timing.to_seconds(self.interconnect.latency);
        self
    }
}

/// one layer mapped onto its own tiles
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct LayerRecord {
    pub index: usize,
    pub tiles: usize,
    pub duplication: DuplicationFactor,
    /// fraction of the cells of its tiles holding a weight
    pub utilization: f64,
    /// multiply accumulates times two
    pub operations: f64,
    /// leakage is the mean of one tile
    pub record: PerformanceRecord,
    /// filled once the execution mode is known
    pub leakage_energy: f64,
}

impl ReportStats for LayerRecord {
    fn report_stats(data_vec: &[Self]) -> BTreeMap<String, (f64, f64, f64)> {
        let mut map = BTreeMap::new();
        map.insert(
            "read_latency".to_string(),
            get_mean_std_max(data_vec, |x| x.record.read_latency),
        );
        map.insert(
            "read_dynamic_energy".to_string(),
            get_mean_std_max(data_vec, |x| x.record.read_dynamic_energy()),
        );
        map.insert(
            "leakage_energy".to_string(),
            get_mean_std_max(data_vec, |x| x.leakage_energy),
        );
        map.insert(
            "tiles".to_string(),
            get_mean_std_max(data_vec, |x| x.tiles as f64),
        );
        map.insert(
            "utilization".to_string(),
            get_mean_std_max(data_vec, |x| x.utilization),
        );
        map
    }
}

/// chip wide totals, every latency in seconds
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct ChipRecord {
    pub read_latency: f64,
    pub latency: Buckets,
    pub dynamic_energy: f64,
    pub energy: Buckets,
    pub buffer: Cost,
    pub interconnect: Cost,
    pub leakage_energy: f64,
    pub leakage_power: f64,
    /// the pipeline stage time, only for pipelined execution
    pub system_clock: Option<f64>,
}

impl ChipRecord {
    pub fn total_energy(&self) -> f64 {
        self.dynamic_energy + self.leakage_energy
    }
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct Summary {
    pub operations: f64,
    pub tops_per_watt: f64,
    pub tops: f64,
    pub fps: f64,
    pub tops_per_mm2: f64,
}

impl Summary {
    pub fn new(chip: &ChipRecord, area: f64, operations: f64) -> Self {
        let per_second = |value: f64| if value > 0.0 { 1.0 / value } else { 0.0 };
        let energy = chip.total_energy();
        let tops = operations * per_second(chip.read_latency) / 1e12;
        Self {
            operations,
            tops_per_watt: if energy > 0.0 {
                operations / energy / 1e12
            } else {
                0.0
            },
            tops,
            fps: per_second(chip.read_latency),
            tops_per_mm2: if area > 0.0 { tops / (area * 1e6) } else { 0.0 },
        }
    }
}

/// everything one estimate produces
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ChipReport {
    pub clock: Option<ClockPlan>,
    pub layers: Vec<LayerRecord>,
    pub chip: ChipRecord,
    pub area: Area,
    pub summary: Summary,
    /// memory utilization of the whole chip
    pub utilization: f64,
    pub activity: ActivityStatistics,
    /// mean, std and max over the layers
    pub activity_stats: BTreeMap<String, (f64, f64, f64)>,
}

impl ChipReport {
    /// print out all the results
    pub fn show_results(&self) {
        if let Some(clock) = &self.clock {
            info!(
                "clock period: {:.3e}s ({:.3e}Hz), clamped by sensing: {}",
                clock.period, clock.frequency, clock.clamped
            );
        }
        for layer in &self.layers {
            info!(
                "layer {}: tiles {} speed up {} utilization {:.2}% latency {:.4e}s dynamic energy {:.4e}J leakage energy {:.4e}J",
                layer.index,
                layer.tiles,
                layer.duplication.total(),
                layer.utilization * 100.0,
                layer.record.read_latency,
                layer.record.read_dynamic_energy(),
                layer.leakage_energy
            );
        }
        for (name, (mean, std, max)) in LayerRecord::report_stats(&self.layers) {
            info!("per layer {name}: mean {mean:.4e} std {std:.4e} max {max:.4e}");
        }
        info!("memory utilization of the whole chip: {:.2}%", self.utilization * 100.0);
        info!("chip area: {:.4e}m^2 {:?}", self.area.total(), self.area);
        info!(
            "chip latency: {:.4e}s {:?}",
            self.chip.read_latency, self.chip.latency
        );
        info!(
            "chip dynamic energy: {:.4e}J {:?}, leakage energy: {:.4e}J, leakage power: {:.4e}W",
            self.chip.dynamic_energy, self.chip.energy, self.chip.leakage_energy, self.chip.leakage_power
        );
        info!(
            "activation rate {:.4} toggle rate {:.4} sparsity {:.4}",
            self.activity.activation_rate(),
            self.activity.toggle_rate(),
            self.activity.sparsity()
        );
        for (name, (mean, std, max)) in &self.activity_stats {
            info!("per layer {name}: mean {mean:.4} std {std:.4} max {max:.4}");
        }
        info!(
            "TOPS/W {:.4} TOPS {:.4} FPS {:.4} TOPS/mm^2 {:.4}",
            self.summary.tops_per_watt, self.summary.tops, self.summary.fps, self.summary.tops_per_mm2
        );
    }
}
