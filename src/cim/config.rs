use std::{fmt::Display, path::Path, path::PathBuf};

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{
    error::{self, ensure_nonzero, ensure_positive, ConfigError},
    level::HierarchyCounts,
    tech::{TechNode, Technology},
};
use crate::{
    analysis::{activity::ActivityPolicy, partition::SubArrayCapacity},
    tools::math::count_to_log,
};

/// fraction of the on resistance taken by the access transistor of a 1T1R cell
pub const IR_DROP_TOLERANCE: f64 = 0.25;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    Cmos,
    Bjt,
    Diode,
    None,
}

/// the memory cell holding one weight slice
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CellKind {
    /// 6T latch read through an access transistor
    Sram,
    /// latch based digital compute-in-memory
    DigitalSram,
    Resistive {
        access: AccessKind,
    },
    Ferroelectric,
}

impl CellKind {
    pub fn is_volatile(&self) -> bool {
        match self {
            CellKind::Sram | CellKind::DigitalSram => true,
            CellKind::Resistive { .. } | CellKind::Ferroelectric => false,
        }
    }

    /// the largest number of bits one cell can hold
    fn max_cell_bit(&self, synapse_bit: usize) -> usize {
        if self.is_volatile() {
            1
        } else {
            synapse_bit
        }
    }
}

impl Display for CellKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellKind::Sram => write!(f, "sram"),
            CellKind::DigitalSram => write!(f, "digital sram"),
            CellKind::Resistive { access } => write!(f, "resistive ({access:?} access)"),
            CellKind::Ferroelectric => write!(f, "ferroelectric"),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransistorKind {
    Conventional,
    Fet2d,
    Tfet,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRoadmap {
    /// high performance
    Hp,
    /// low standby power
    Lstp,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    /// all activated rows are sensed at once
    Parallel,
    /// one row per read
    Sequential,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// every layer owns its tiles and all layers run at once
    Pipelined,
    /// layers run one after another
    LayerByLayer,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Clocking {
    /// a global clock derived from the slowest sensing operation
    Synchronous,
    Asynchronous,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TechnologyConfig {
    pub node: u32,
    pub transistor: TransistorKind,
    pub roadmap: DeviceRoadmap,
    /// kelvin
    pub temperature: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CellConfig {
    #[serde(flatten)]
    pub kind: CellKind,
    pub resistance_on: f64,
    pub resistance_off: f64,
    pub read_voltage: f64,
    pub cell_bit: usize,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ArrayConfig {
    pub rows: usize,
    pub cols: usize,
    /// how many columns share one adc
    pub num_col_muxed: usize,
    /// adc output levels
    pub level_output: usize,
    pub read_mode: ReadMode,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct HierarchyConfig {
    /// subarrays per pe, (rows, cols)
    pub pe_subarrays: [usize; 2],
    /// pes per tile, (rows, cols)
    pub tile_pes: [usize; 2],
    /// upper bound of the duplication factor of one pe
    pub speed_up_degree: usize,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RunConfig {
    pub execution: ExecutionMode,
    pub clocking: Clocking,
    /// target clock frequency, in hz
    pub clock_frequency: f64,
    pub activity: ActivityPolicy,
    /// only account the array itself in the latency buckets
    #[serde(default)]
    pub only_main_array: bool,
    pub synapse_bit: usize,
    pub input_bit: usize,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LayerFiles {
    pub weights: PathBuf,
    pub inputs: PathBuf,
    /// overrides the floorplanner's duplication factor, (rows, cols)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplication: Option<[usize; 2]>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct NetworkConfig {
    /// the network structure csv
    pub structure: PathBuf,
    pub layers: Vec<LayerFiles>,
    pub output_path: PathBuf,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    pub technology: TechnologyConfig,
    pub cell: CellConfig,
    pub array: ArrayConfig,
    pub hierarchy: HierarchyConfig,
    pub run: RunConfig,
    pub network: NetworkConfig,
}

impl Config {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&content).wrap_err_with(|| format!("failed to parse config {}", path.display()))
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

impl Config {
    fn preset(node: u32, cell: CellConfig, read_mode: ReadMode, activity: ActivityPolicy) -> Self {
        Self {
            technology: TechnologyConfig {
                node,
                transistor: TransistorKind::Conventional,
                roadmap: DeviceRoadmap::Lstp,
                temperature: 300.0,
            },
            cell,
            array: ArrayConfig {
                rows: 128,
                cols: 128,
                num_col_muxed: 8,
                level_output: 32,
                read_mode,
            },
            hierarchy: HierarchyConfig {
                pe_subarrays: [2, 2],
                tile_pes: [4, 4],
                speed_up_degree: 8,
            },
            run: RunConfig {
                execution: ExecutionMode::Pipelined,
                clocking: Clocking::Synchronous,
                clock_frequency: 1e9,
                activity,
                only_main_array: false,
                synapse_bit: 8,
                input_bit: 8,
            },
            network: NetworkConfig {
                structure: PathBuf::from("data/network.csv"),
                layers: vec![LayerFiles {
                    weights: PathBuf::from("data/layer1_weights.csv"),
                    inputs: PathBuf::from("data/layer1_inputs.csv"),
                    duplication: None,
                }],
                output_path: PathBuf::from("output/report.json"),
            },
        }
    }

    /// an analog sram macro read in parallel
    pub fn from_sram(node: u32) -> Self {
        Self::preset(
            node,
            CellConfig {
                kind: CellKind::Sram,
                resistance_on: 6e3,
                resistance_off: 6e3 * 150.0,
                read_voltage: 0.5,
                cell_bit: 1,
            },
            ReadMode::Parallel,
            ActivityPolicy::RawActivation,
        )
    }

    /// a 1T1R rram macro with multi level cells
    pub fn from_rram(node: u32) -> Self {
        let mut config = Self::preset(
            node,
            CellConfig {
                kind: CellKind::Resistive {
                    access: AccessKind::Cmos,
                },
                resistance_on: 6e3,
                resistance_off: 6e3 * 150.0,
                read_voltage: 0.5,
                cell_bit: 2,
            },
            ReadMode::Parallel,
            ActivityPolicy::RawActivation,
        );
        // two bit cells halve the columns of every synapse
        for layer in &mut config.network.layers {
            layer.weights = PathBuf::from("data/layer1_weights_mlc.csv");
        }
        config
    }

    /// a digital sram macro using toggle based activity
    pub fn from_digital_sram(node: u32) -> Self {
        Self::preset(
            node,
            CellConfig {
                kind: CellKind::DigitalSram,
                resistance_on: 6e3,
                resistance_off: 6e3 * 150.0,
                read_voltage: 0.5,
                cell_bit: 1,
            },
            ReadMode::Parallel,
            ActivityPolicy::ToggleActivation,
        )
    }
}

/// device figures after validation
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DeviceParams {
    pub resistance_on: f64,
    pub resistance_off: f64,
    pub read_voltage: f64,
    /// series resistance added by the access device of one cell
    pub access_resistance: f64,
    pub min_conductance: f64,
    pub max_conductance: f64,
}

/// a validated and immutable configuration, every estimate borrows one of these
#[derive(Debug, Clone, Serialize)]
pub struct Design {
    pub tech: Technology,
    pub cell: CellKind,
    pub device: DeviceParams,
    pub capacity: SubArrayCapacity,
    pub num_col_muxed: usize,
    pub level_output: usize,
    pub read_mode: ReadMode,
    pub cell_bit: usize,
    pub synapse_bit: usize,
    pub input_bit: usize,
    pub cols_per_synapse: usize,
    pub hierarchy: HierarchyCounts,
    pub speed_up_degree: usize,
    pub execution: ExecutionMode,
    pub clocking: Clocking,
    pub clock_frequency: f64,
    pub activity: ActivityPolicy,
    pub only_main_array: bool,
}

impl Design {
    /// validate the config, fixing up what can be fixed and rejecting the rest
    pub fn from_config(config: &Config) -> error::Result<Self> {
        let node = TechNode::try_from(config.technology.node).map_err(|_| {
            ConfigError::UnsupportedTechNode {
                node: config.technology.node,
            }
        })?;
        if config.technology.transistor != TransistorKind::Conventional {
            return Err(ConfigError::UnsupportedTransistor {
                kind: format!("{:?}", config.technology.transistor),
            });
        }
        let cell = config.cell.kind;
        if let CellKind::Resistive {
            access: AccessKind::Bjt,
        } = cell
        {
            return Err(ConfigError::UnsupportedAccess {
                access: "bjt".to_string(),
                cell: cell.to_string(),
            });
        }
        ensure_positive("temperature", config.technology.temperature)?;

        let rows = ensure_nonzero("array rows", config.array.rows)?;
        let cols = ensure_nonzero("array cols", config.array.cols)?;
        let num_col_muxed = ensure_nonzero("columns per adc", config.array.num_col_muxed)?;
        if num_col_muxed > cols {
            return Err(ConfigError::invalid(
                "num_col_muxed",
                format!("{num_col_muxed} columns per adc exceed the {cols} array columns"),
            ));
        }
        ensure_nonzero("adc levels", config.array.level_output)?;
        let [pe_rows, pe_cols] = config.hierarchy.pe_subarrays;
        ensure_nonzero("subarray rows per pe", pe_rows)?;
        ensure_nonzero("subarray cols per pe", pe_cols)?;
        let [tile_rows, tile_cols] = config.hierarchy.tile_pes;
        ensure_nonzero("pe rows per tile", tile_rows)?;
        ensure_nonzero("pe cols per tile", tile_cols)?;
        let speed_up_degree = ensure_nonzero("speed up degree", config.hierarchy.speed_up_degree)?;

        let synapse_bit = ensure_nonzero("synapse bits", config.run.synapse_bit)?;
        let input_bit = ensure_nonzero("input bits", config.run.input_bit)?;
        let mut cell_bit = ensure_nonzero("cell bits", config.cell.cell_bit)?;
        let max_cell_bit = cell.max_cell_bit(synapse_bit);
        if cell_bit > max_cell_bit {
            warn!(
                "{} cells hold at most {} bits, cell_bit {} is reduced to {}",
                cell, max_cell_bit, cell_bit, max_cell_bit
            );
            cell_bit = max_cell_bit;
        }
        let cols_per_synapse = synapse_bit.div_ceil(cell_bit);
        let level_output = match config.array.read_mode {
            ReadMode::Parallel => config.array.level_output,
            ReadMode::Sequential => u32::try_from(cell_bit)
                .ok()
                .and_then(|bits| 1usize.checked_shl(bits))
                .ok_or_else(|| {
                    ConfigError::invalid(
                        "cell_bit",
                        format!("{cell_bit} bits per cell give too many levels for a sequential read"),
                    )
                })?,
        };

        let mut activity = config.run.activity;
        if activity == ActivityPolicy::ToggleActivation && cell != CellKind::DigitalSram {
            warn!(
                "toggle based activity is only modeled for digital sram, {} cells use raw activation",
                cell
            );
            activity = ActivityPolicy::RawActivation;
        }

        let resistance_on = ensure_positive("resistance_on", config.cell.resistance_on)?;
        let resistance_off = ensure_positive("resistance_off", config.cell.resistance_off)?;
        if resistance_off < resistance_on {
            return Err(ConfigError::invalid(
                "resistance_off",
                format!("{resistance_off} is below the on resistance {resistance_on}"),
            ));
        }
        let read_voltage = ensure_positive("read_voltage", config.cell.read_voltage)?;
        let clock_frequency = ensure_positive("clock_frequency", config.run.clock_frequency)?;

        let tech = Technology::new(
            node,
            config.technology.roadmap,
            config.technology.temperature,
            cell,
        );
        let access_resistance = match cell {
            CellKind::Sram | CellKind::DigitalSram => tech.latch_access_resistance,
            CellKind::Resistive {
                access: AccessKind::Cmos,
            } => resistance_on * IR_DROP_TOLERANCE,
            CellKind::Resistive { .. } | CellKind::Ferroelectric => 0.0,
        };

        Ok(Self {
            tech,
            cell,
            device: DeviceParams {
                resistance_on,
                resistance_off,
                read_voltage,
                access_resistance,
                min_conductance: 1.0 / resistance_off,
                max_conductance: 1.0 / resistance_on,
            },
            capacity: SubArrayCapacity { rows, cols },
            num_col_muxed,
            level_output,
            read_mode: config.array.read_mode,
            cell_bit,
            synapse_bit,
            input_bit,
            cols_per_synapse,
            hierarchy: HierarchyCounts {
                subarrays_per_pe: (pe_rows, pe_cols),
                pes_per_tile: (tile_rows, tile_cols),
            },
            speed_up_degree,
            execution: config.run.execution,
            clocking: config.run.clocking,
            clock_frequency,
            activity,
            only_main_array: config.run.only_main_array,
        })
    }

    /// resolution of one conversion
    pub fn adc_bits(&self) -> usize {
        count_to_log(self.level_output).max(1)
    }

    /// width of one partial sum after the shift and add over the input bits
    pub fn word_bits(&self) -> usize {
        self.adc_bits() + self.input_bit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_read_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rram.toml");
        let config = Config::from_rram(22);
        config.save_to_file(&path).unwrap();
        let read = Config::new(&path).unwrap();
        assert_eq!(read.cell.kind, config.cell.kind);
        assert_eq!(read.array.rows, 128);
        assert_eq!(read.run.activity, ActivityPolicy::RawActivation);
    }

    #[test]
    fn parse_tagged_cell() {
        let cell: CellConfig = toml::from_str(
            r#"
            kind = "resistive"
            access = "diode"
            resistance_on = 1e4
            resistance_off = 1e6
            read_voltage = 0.3
            cell_bit = 2
            "#,
        )
        .unwrap();
        assert_eq!(
            cell.kind,
            CellKind::Resistive {
                access: AccessKind::Diode
            }
        );
        let cell: CellConfig = toml::from_str(
            r#"
            kind = "digital_sram"
            resistance_on = 1e4
            resistance_off = 1e6
            read_voltage = 0.3
            cell_bit = 1
            "#,
        )
        .unwrap();
        assert_eq!(cell.kind, CellKind::DigitalSram);
    }

    #[test]
    fn reject_unsupported_node() {
        let mut config = Config::from_sram(22);
        config.technology.node = 28;
        assert!(matches!(
            Design::from_config(&config),
            Err(ConfigError::UnsupportedTechNode { node: 28 })
        ));
    }

    #[test]
    fn reject_zero_capacity() {
        let mut config = Config::from_sram(22);
        config.array.rows = 0;
        assert!(matches!(
            Design::from_config(&config),
            Err(ConfigError::NonPositiveCapacity { .. })
        ));
    }

    #[test]
    fn reject_unsupported_devices() {
        let mut config = Config::from_sram(22);
        config.technology.transistor = TransistorKind::Tfet;
        assert!(matches!(
            Design::from_config(&config),
            Err(ConfigError::UnsupportedTransistor { .. })
        ));
        let mut config = Config::from_rram(22);
        config.cell.kind = CellKind::Resistive {
            access: AccessKind::Bjt,
        };
        assert!(matches!(
            Design::from_config(&config),
            Err(ConfigError::UnsupportedAccess { .. })
        ));
    }

    #[test]
    fn clamp_cell_bit() {
        let mut config = Config::from_sram(22);
        config.cell.cell_bit = 4;
        let design = Design::from_config(&config).unwrap();
        assert_eq!(design.cell_bit, 1);
        assert_eq!(design.cols_per_synapse, 8);

        let mut config = Config::from_rram(22);
        config.cell.cell_bit = 16;
        let design = Design::from_config(&config).unwrap();
        assert_eq!(design.cell_bit, 8);
        assert_eq!(design.cols_per_synapse, 1);
    }

    #[test]
    fn toggle_falls_back_on_analog_cells() {
        let mut config = Config::from_rram(22);
        config.run.activity = ActivityPolicy::ToggleActivation;
        let design = Design::from_config(&config).unwrap();
        assert_eq!(design.activity, ActivityPolicy::RawActivation);
        let design = Design::from_config(&Config::from_digital_sram(22)).unwrap();
        assert_eq!(design.activity, ActivityPolicy::ToggleActivation);
    }

    #[test]
    fn sequential_read_levels() {
        let mut config = Config::from_rram(22);
        config.array.read_mode = ReadMode::Sequential;
        let design = Design::from_config(&config).unwrap();
        assert_eq!(design.level_output, 4);
        assert_eq!(design.adc_bits(), 2);
        assert_eq!(design.word_bits(), 10);
        let design = Design::from_config(&Config::from_rram(22)).unwrap();
        assert_eq!(design.level_output, 32);
        assert_eq!(
            design.device.access_resistance,
            6e3 * IR_DROP_TOLERANCE
        );
    }

    #[test]
    fn sequential_levels_must_fit() {
        let mut config = Config::from_rram(22);
        config.array.read_mode = ReadMode::Sequential;
        config.run.synapse_bit = 64;
        config.cell.cell_bit = 64;
        assert!(Design::from_config(&config).is_err());
        config.cell.cell_bit = 16;
        let design = Design::from_config(&config).unwrap();
        assert_eq!(design.level_output, 1 << 16);
        assert_eq!(design.cols_per_synapse, 4);
    }
}
