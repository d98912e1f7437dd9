//! adder trees, buffers and buses sitting between the levels of the hierarchy

use std::fmt::Debug;

use super::{config::Design, level::Level, timing::Timing};
use crate::{analysis::results::Cost, tools::math::count_to_log};

/// the work handed to one peripheral block
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Load {
    /// number of back to back operations
    pub transfers: f64,
    /// inputs merged by an adder tree
    pub fan_in: usize,
    /// bits moved through a buffer or a bus
    pub bits: f64,
}

impl Load {
    pub fn adds(transfers: f64, fan_in: usize) -> Self {
        Self {
            transfers,
            fan_in,
            bits: 0.0,
        }
    }

    pub fn bits(bits: f64) -> Self {
        Self {
            bits,
            ..Default::default()
        }
    }
}

pub trait PeripheryModel: Debug + Send + Sync {
    /// latency in `timing` units and energy in joules
    fn evaluate(&self, load: Load, timing: &Timing) -> Cost;
    /// static power in watts
    fn leakage(&self) -> f64;
    fn area(&self) -> f64;
}

/// first-order per-gate figures shared by all the analytical blocks
#[derive(Debug, Clone, Copy)]
struct Gates {
    delay: f64,
    energy: f64,
    leakage: f64,
    area: f64,
}

impl Gates {
    fn of(design: &Design) -> Self {
        Self {
            delay: design.tech.gate_delay,
            energy: design.tech.gate_energy,
            leakage: design.tech.gate_leakage,
            area: design.tech.gate_area,
        }
    }
}

/// a tree of ripple carry adders, one per output word
#[derive(Debug, Clone)]
pub struct AdderTree {
    gates: Gates,
    word_bits: usize,
    /// parallel trees
    count: usize,
    /// the widest fan in the trees are built for
    max_fan_in: usize,
}

impl AdderTree {
    fn adders(&self) -> usize {
        self.count * self.max_fan_in.saturating_sub(1) * (self.word_bits + count_to_log(self.max_fan_in))
    }
}

impl PeripheryModel for AdderTree {
    fn evaluate(&self, load: Load, timing: &Timing) -> Cost {
        let depth = count_to_log(load.fan_in);
        if depth == 0 || load.transfers <= 0.0 {
            return Cost::default();
        }
        // each level is one bit wider than the one below
        let stage: f64 = (0..depth)
            .map(|level| (self.word_bits + level + 1) as f64 * self.gates.delay)
            .sum();
        let full_adders = (load.fan_in - 1) * (self.word_bits + depth);
        Cost {
            latency: load.transfers * timing.stage(stage),
            energy: load.transfers * (self.count * full_adders) as f64 * 6.0 * self.gates.energy,
        }
    }

    fn leakage(&self) -> f64 {
        self.adders() as f64 * 6.0 * self.gates.leakage
    }

    fn area(&self) -> f64 {
        self.adders() as f64 * 14.0 * self.gates.area
    }
}

/// inputs compared by one max pooling window
pub const MAX_POOL_WINDOW: usize = 4;

/// a bank of comparator trees keeping the largest output of every pooling window
#[derive(Debug, Clone)]
pub struct MaxPool {
    gates: Gates,
    word_bits: usize,
    /// windows reduced in parallel
    units: usize,
}

impl MaxPool {
    fn comparators(&self) -> usize {
        self.units * (MAX_POOL_WINDOW - 1)
    }
}

impl PeripheryModel for MaxPool {
    /// `transfers` pooled outputs, each reducing `fan_in` values
    fn evaluate(&self, load: Load, timing: &Timing) -> Cost {
        let depth = count_to_log(load.fan_in);
        if depth == 0 || load.transfers <= 0.0 {
            return Cost::default();
        }
        let rounds = (load.transfers / self.units as f64).ceil();
        let compare = depth as f64 * (self.word_bits + 1) as f64 * self.gates.delay;
        Cost {
            latency: rounds * timing.stage(compare),
            energy: load.transfers * ((load.fan_in - 1) * self.word_bits) as f64 * 4.0 * self.gates.energy,
        }
    }

    fn leakage(&self) -> f64 {
        (self.comparators() * self.word_bits) as f64 * 4.0 * self.gates.leakage
    }

    fn area(&self) -> f64 {
        (self.comparators() * self.word_bits) as f64 * 10.0 * self.gates.area
    }
}

/// a register file buffer moving `width` bits per access
#[derive(Debug, Clone)]
pub struct Buffer {
    gates: Gates,
    width: usize,
    capacity_bits: usize,
}

impl PeripheryModel for Buffer {
    fn evaluate(&self, load: Load, timing: &Timing) -> Cost {
        if load.bits <= 0.0 {
            return Cost::default();
        }
        let accesses = (load.bits / self.width as f64).ceil();
        let access_delay = self.gates.delay * (count_to_log(self.capacity_bits / self.width) + 2) as f64;
        Cost {
            latency: accesses * timing.stage(access_delay),
            energy: load.bits * 2.0 * self.gates.energy,
        }
    }

    fn leakage(&self) -> f64 {
        self.capacity_bits as f64 * 0.5 * self.gates.leakage
    }

    fn area(&self) -> f64 {
        self.capacity_bits as f64 * 2.0 * self.gates.area
    }
}

/// a repeated h tree bus spanning one level
#[derive(Debug, Clone)]
pub struct Bus {
    gates: Gates,
    width: usize,
    /// wire length from the root to a leaf, in meters
    length: f64,
    wire_cap: f64,
    unit_wire_resistance: f64,
    vdd: f64,
}

impl PeripheryModel for Bus {
    fn evaluate(&self, load: Load, timing: &Timing) -> Cost {
        if load.bits <= 0.0 {
            return Cost::default();
        }
        let transfers = (load.bits / self.width as f64).ceil();
        let rc = 0.38 * self.unit_wire_resistance * self.wire_cap * self.length * self.length;
        let wire_delay = rc + 2.0 * self.gates.delay;
        Cost {
            latency: transfers * timing.stage(wire_delay),
            energy: load.bits * self.wire_cap * self.length * self.vdd * self.vdd,
        }
    }

    fn leakage(&self) -> f64 {
        self.width as f64 * 4.0 * self.gates.leakage
    }

    fn area(&self) -> f64 {
        self.width as f64 * 8.0 * self.gates.area
    }
}

/// a block that costs nothing, used to isolate the arrays
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPeriphery;

impl PeripheryModel for NullPeriphery {
    fn evaluate(&self, _load: Load, _timing: &Timing) -> Cost {
        Cost::default()
    }

    fn leakage(&self) -> f64 {
        0.0
    }

    fn area(&self) -> f64 {
        0.0
    }
}

/// the periphery of one pe, one tile or the whole chip
#[derive(Debug)]
pub struct PeripherySet {
    pub level: Level,
    pub adder_tree: Box<dyn PeripheryModel>,
    pub input_buffer: Box<dyn PeripheryModel>,
    pub output_buffer: Box<dyn PeripheryModel>,
    pub input_bus: Box<dyn PeripheryModel>,
    pub output_bus: Box<dyn PeripheryModel>,
    /// only the chip level pools
    pub max_pool: Box<dyn PeripheryModel>,
}

impl PeripherySet {
    /// the analytical periphery of `level`, the chip level holds the global blocks
    pub fn new(level: Level, design: &Design) -> Self {
        let gates = Gates::of(design);
        let sub = design.capacity;
        let (pe_rows, pe_cols) = design.hierarchy.subarrays_per_pe;
        let (tile_rows, tile_cols) = design.hierarchy.pes_per_tile;
        // children merged at this level and the edge of the square it spans, in subarrays
        let (fan_in, span) = match level {
            Level::SubArray | Level::Pe => (pe_rows, pe_rows.max(pe_cols)),
            Level::Tile => (tile_rows, pe_rows.max(pe_cols) * tile_rows.max(tile_cols)),
            Level::Chip => (
                tile_rows,
                pe_rows.max(pe_cols) * tile_rows.max(tile_cols) * 2,
            ),
        };
        let cols_in = match level {
            Level::SubArray | Level::Pe => sub.cols * pe_cols,
            Level::Tile | Level::Chip => sub.cols * pe_cols * tile_cols,
        };
        let words = (cols_in / design.cols_per_synapse).max(1);
        let word_bits = design.word_bits();
        let width = (sub.rows).max(word_bits);
        let edge = sub.cols as f64 * design.tech.cell_width();

        let buffer = |capacity_bits: usize| -> Box<dyn PeripheryModel> {
            Box::new(Buffer {
                gates,
                width,
                capacity_bits: capacity_bits.max(width),
            })
        };
        let bus = || -> Box<dyn PeripheryModel> {
            Box::new(Bus {
                gates,
                width,
                length: span as f64 * edge,
                wire_cap: design.tech.wire_cap,
                unit_wire_resistance: design.tech.unit_wire_resistance,
                vdd: design.tech.vdd,
            })
        };
        Self {
            level,
            adder_tree: Box::new(AdderTree {
                gates,
                word_bits,
                count: words,
                max_fan_in: fan_in,
            }),
            input_buffer: buffer(sub.rows * fan_in * design.input_bit),
            output_buffer: buffer(words * word_bits),
            input_bus: bus(),
            output_bus: bus(),
            max_pool: match level {
                Level::Chip => Box::new(MaxPool {
                    gates,
                    word_bits,
                    units: words,
                }),
                _ => Box::new(NullPeriphery),
            },
        }
    }

    /// a level whose blocks cost nothing
    pub fn null(level: Level) -> Self {
        Self {
            level,
            adder_tree: Box::new(NullPeriphery),
            input_buffer: Box::new(NullPeriphery),
            output_buffer: Box::new(NullPeriphery),
            input_bus: Box::new(NullPeriphery),
            output_bus: Box::new(NullPeriphery),
            max_pool: Box::new(NullPeriphery),
        }
    }

    fn blocks(&self) -> [&dyn PeripheryModel; 6] {
        [
            self.adder_tree.as_ref(),
            self.input_buffer.as_ref(),
            self.output_buffer.as_ref(),
            self.input_bus.as_ref(),
            self.output_bus.as_ref(),
            self.max_pool.as_ref(),
        ]
    }

    pub fn leakage(&self) -> f64 {
        self.blocks().iter().map(|b| b.leakage()).sum()
    }

    pub fn area(&self) -> f64 {
        self.blocks().iter().map(|b| b.area()).sum()
    }

    /// both buffers moving `input_bits` in and `output_bits` out
    pub fn buffers(&self, input_bits: f64, output_bits: f64, timing: &Timing) -> Cost {
        self.input_buffer.evaluate(Load::bits(input_bits), timing)
            + self.output_buffer.evaluate(Load::bits(output_bits), timing)
    }

    /// both buses moving `input_bits` in and `output_bits` out
    pub fn buses(&self, input_bits: f64, output_bits: f64, timing: &Timing) -> Cost {
        self.input_bus.evaluate(Load::bits(input_bits), timing)
            + self.output_bus.evaluate(Load::bits(output_bits), timing)
    }
}
