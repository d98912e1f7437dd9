//! the accelerator description: technology, cells, periphery and the files feeding a run
pub mod config;
pub mod error;
pub mod floorplan;
pub mod level;
pub mod network;
pub mod periphery;
pub mod subarray;
pub mod tech;
pub mod timing;

use eyre::{Result, WrapErr};
use tracing::{info, warn};

use self::{
    config::{Config, Design},
    floorplan::plan_layer,
    network::{load_inputs, load_network, load_weights},
};
use crate::analysis::{estimate, results::ChipReport, Engine, LayerWorkload};

/// owns a validated design and runs estimates on it
#[derive(Debug, Clone)]
pub struct Simulator {
    design: Design,
}

impl Simulator {
    pub fn new(config: &Config) -> Result<Self> {
        let design = Design::from_config(config).wrap_err("invalid configuration")?;
        info!(
            "{} cells at {}nm, {}x{} subarrays",
            design.cell,
            design.tech.node.nm(),
            design.capacity.rows,
            design.capacity.cols
        );
        Ok(Self { design })
    }

    pub fn design(&self) -> &Design {
        &self.design
    }

    /// read the network and every layer listed in `config`
    pub fn load_workloads(&self, config: &Config) -> Result<Vec<LayerWorkload>> {
        let design = &self.design;
        let network = load_network(&config.network.structure)?;
        if network.len() != config.network.layers.len() {
            warn!(
                "the network has {} layers but {} layer files are listed, only the first {} are estimated",
                network.len(),
                config.network.layers.len(),
                network.len().min(config.network.layers.len())
            );
        }
        network
            .iter()
            .zip(&config.network.layers)
            .enumerate()
            .map(|(index, (layer, files))| {
                let rows = layer.weight_rows();
                let cols = layer.weight_cols(design.cols_per_synapse);
                let weights = load_weights(
                    &files.weights,
                    rows,
                    cols,
                    design.device.min_conductance,
                    design.device.max_conductance,
                )?;
                let inputs = load_inputs(&files.inputs, layer, design.input_bit)?;
                let floorplan = plan_layer(design, rows, cols, files.duplication)
                    .wrap_err_with(|| format!("cannot place layer {index}"))?;
                Ok(LayerWorkload {
                    index,
                    weights,
                    inputs,
                    floorplan,
                    operations: layer.operations(),
                    pooled_outputs: layer.pooled_outputs(),
                })
            })
            .collect()
    }

    pub fn run(&self, layers: &[LayerWorkload]) -> ChipReport {
        let engine = Engine::analytical(&self.design);
        estimate(&engine, layers)
    }
}
