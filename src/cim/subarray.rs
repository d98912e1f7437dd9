//! first-order timing, energy, leakage and area of one subarray

use serde::Serialize;

use super::{config::Design, timing::Timing};
use crate::{
    analysis::{
        activity::ReadActivity,
        resistance::is_open,
        results::{Area, Buckets, Leakage},
    },
    tools::math::{count_to_log, horowitz},
};

/// latency (in [`Timing`] units) and energy of one read
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SubArrayRead {
    pub latency: Buckets,
    pub energy: Buckets,
}

/// the electrical model of one subarray, driven once per input vector
pub trait SubArrayModel {
    /// read every column given their equivalent resistances
    fn simulate_read(
        &self,
        column_resistance: &[f64],
        activity: &ReadActivity,
        timing: &Timing,
    ) -> SubArrayRead;

    /// seconds the sense amplifiers need to resolve the slowest column
    fn sensing_latency(&self, column_resistance: &[f64]) -> f64;

    fn leakage(&self) -> Leakage;

    fn area(&self) -> Area;
}

/// an RC model of the bitlines with a muxed adc per group of columns
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticalSubArray {
    rows: usize,
    cols: usize,
    num_col_muxed: usize,
    adc_bits: usize,
    digital: bool,
    volatile: bool,
    read_voltage: f64,
    vdd: f64,
    gate_delay: f64,
    gate_energy: f64,
    gate_leakage: f64,
    gate_area: f64,
    cell_area: f64,
    /// total capacitance of one bitline
    cap_col: f64,
    /// total capacitance of one wordline
    cap_row: f64,
    /// total resistance of one wordline
    res_row: f64,
}

impl AnalyticalSubArray {
    pub fn new(design: &Design) -> Self {
        let tech = &design.tech;
        let rows = design.capacity.rows;
        let cols = design.capacity.cols;
        let gate_cap = tech.gate_energy / (tech.vdd * tech.vdd);
        Self {
            rows,
            cols,
            num_col_muxed: design.num_col_muxed,
            adc_bits: design.adc_bits(),
            digital: design.cell == super::config::CellKind::DigitalSram,
            volatile: design.cell.is_volatile(),
            read_voltage: design.device.read_voltage,
            vdd: tech.vdd,
            gate_delay: tech.gate_delay,
            gate_energy: tech.gate_energy,
            gate_leakage: tech.gate_leakage,
            gate_area: tech.gate_area,
            cell_area: tech.cell_area(),
            cap_col: rows as f64 * (tech.cell_height() * tech.wire_cap + gate_cap),
            cap_row: cols as f64 * (tech.cell_width() * tech.wire_cap + gate_cap),
            res_row: cols as f64 * tech.wire.row,
        }
    }

    fn adc_groups(&self) -> usize {
        self.cols.div_ceil(self.num_col_muxed)
    }

    /// sense amplifier plus conversion, without the bitline
    fn converter_delay(&self) -> f64 {
        self.gate_delay * (2 + self.adc_bits) as f64
    }

    fn bitline_delay(&self, resistance: f64) -> f64 {
        horowitz(resistance * self.cap_col, 1.0 / self.gate_delay)
    }

    fn shift_add_delay(&self) -> f64 {
        self.gate_delay * (self.adc_bits + 1) as f64
    }

    fn row_path_delay(&self) -> f64 {
        self.gate_delay * (count_to_log(self.rows) + 1) as f64
            + horowitz(0.5 * self.res_row * self.cap_row, 1.0 / self.gate_delay)
    }

    /// energy of one conversion
    fn conversion_energy(&self) -> f64 {
        if self.digital {
            2.0 * self.gate_energy
        } else {
            4.0 * self.adc_bits as f64 * self.gate_energy
        }
    }
}

impl SubArrayModel for AnalyticalSubArray {
    fn simulate_read(
        &self,
        column_resistance: &[f64],
        activity: &ReadActivity,
        timing: &Timing,
    ) -> SubArrayRead {
        let muxed = self.num_col_muxed as f64;
        let sensing = self.sensing_latency(column_resistance);
        let latency = Buckets {
            adc: muxed * timing.stage(sensing),
            accum: muxed * timing.stage(self.shift_add_delay()),
            other: timing.stage(self.row_path_delay()),
        };

        // current through the cells only flows while the column is sensed
        let sense_energy: f64 = column_resistance
            .iter()
            .filter(|r| !is_open(**r))
            .map(|r| self.read_voltage * self.read_voltage / r * (self.bitline_delay(*r) + self.converter_delay()))
            .sum();
        let adc = sense_energy + column_resistance.len() as f64 * self.conversion_energy();

        let mut accum = column_resistance.len() as f64 * (self.adc_bits + 1) as f64 * self.gate_energy * 0.5;
        if self.digital {
            accum += activity.adder_toggle_rate * (self.rows * self.cols) as f64 * 6.0 * self.gate_energy;
        }

        let mut other = activity.row_activity * self.rows as f64 * self.cap_row * self.vdd * self.vdd
            + self.rows as f64 * self.gate_energy
            + self.cols as f64 * self.gate_energy;
        if self.volatile {
            other += self.cols as f64 * self.cap_col * self.vdd * self.vdd;
        }

        SubArrayRead {
            latency,
            energy: Buckets { adc, accum, other },
        }
    }

    fn sensing_latency(&self, column_resistance: &[f64]) -> f64 {
        let slowest = column_resistance
            .iter()
            .copied()
            .filter(|r| !is_open(*r))
            .fold(0.0, f64::max);
        self.bitline_delay(slowest) + self.converter_delay()
    }

    fn leakage(&self) -> Leakage {
        let mut idle = self.gate_leakage * (2 * self.rows + self.cols * (self.adc_bits + 1)) as f64;
        if self.volatile {
            // cross coupled inverters keep leaking while they retain data
            idle += self.gate_leakage * 0.1 * (self.rows * self.cols) as f64;
        }
        let converter_bias = self.gate_leakage * 10.0 * (self.adc_groups() * self.adc_bits) as f64;
        Leakage {
            idle,
            in_use: idle + converter_bias,
        }
    }

    fn area(&self) -> Area {
        let groups = self.adc_groups() as f64;
        Area {
            array: (self.rows * self.cols) as f64 * self.cell_area,
            adc: groups * self.adc_bits as f64 * 40.0 * self.gate_area,
            accum: groups * (self.adc_bits + 1) as f64 * 12.0 * self.gate_area,
            other: (4 * self.rows + 2 * self.cols) as f64 * self.gate_area,
        }
    }
}
