//! the network structure and per layer weight and input files

use std::path::Path;

use bit_vec::BitVec;
use eyre::{bail, eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analysis::matrix::{ActivationMatrix, WeightMatrix};

/// one row of the network structure file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkLayer {
    pub ifm_h: usize,
    pub ifm_w: usize,
    pub ifm_c: usize,
    pub kernel_h: usize,
    pub kernel_w: usize,
    pub ofm_c: usize,
    pub pooling: bool,
    pub stride: usize,
}

impl NetworkLayer {
    /// (height, width) of the output feature map
    pub fn ofm_size(&self) -> (usize, usize) {
        (
            (self.ifm_h - self.kernel_h) / self.stride + 1,
            (self.ifm_w - self.kernel_w) / self.stride + 1,
        )
    }

    pub fn weight_rows(&self) -> usize {
        self.kernel_h * self.kernel_w * self.ifm_c
    }

    pub fn weight_cols(&self, cols_per_synapse: usize) -> usize {
        self.ofm_c * cols_per_synapse
    }

    pub fn num_input_vectors(&self, input_bit: usize) -> usize {
        let (h, w) = self.ofm_size();
        h * w * input_bit
    }

    /// values left after the 2x2 max pooling of the output, zero without pooling
    pub fn pooled_outputs(&self) -> usize {
        if !self.pooling {
            return 0;
        }
        let (h, w) = self.ofm_size();
        (h / 2).max(1) * (w / 2).max(1) * self.ofm_c
    }

    /// multiply accumulates counted as two operations
    pub fn operations(&self) -> f64 {
        let (h, w) = self.ofm_size();
        2.0 * (h * w * self.weight_rows() * self.ofm_c) as f64
    }
}

/// the non empty lines of a csv file with their 1 based line numbers
fn csv_lines(content: &str) -> impl Iterator<Item = (usize, Vec<&str>)> {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(i, line)| (i, line.split(',').map(str::trim).collect()))
}

fn parse_field<T: std::str::FromStr>(field: &str, line: usize, column: usize) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    field
        .parse()
        .map_err(|e| eyre!("line {line}, column {}: cannot parse {field:?}: {e}", column + 1))
}

pub fn parse_network(content: &str) -> Result<Vec<NetworkLayer>> {
    let mut layers = vec![];
    for (line, fields) in csv_lines(content) {
        if !(6..=8).contains(&fields.len()) {
            bail!("line {line}: expected 6 to 8 columns, found {}", fields.len());
        }
        let values = fields
            .iter()
            .enumerate()
            .map(|(column, f)| parse_field::<usize>(f, line, column))
            .collect::<Result<Vec<_>>>()?;
        let layer = NetworkLayer {
            ifm_h: values[0],
            ifm_w: values[1],
            ifm_c: values[2],
            kernel_h: values[3],
            kernel_w: values[4],
            ofm_c: values[5],
            pooling: values.get(6).is_some_and(|p| *p != 0),
            stride: values.get(7).copied().unwrap_or(1),
        };
        if layer.stride == 0 {
            bail!("line {line}: stride must be positive");
        }
        if layer.kernel_h > layer.ifm_h || layer.kernel_w > layer.ifm_w {
            bail!(
                "line {line}: kernel {}x{} is larger than the {}x{} input",
                layer.kernel_h,
                layer.kernel_w,
                layer.ifm_h,
                layer.ifm_w
            );
        }
        if layer.weight_rows() == 0 || layer.ofm_c == 0 {
            bail!("line {line}: the layer holds no weight");
        }
        layers.push(layer);
    }
    if layers.is_empty() {
        bail!("the network has no layer");
    }
    Ok(layers)
}

pub fn load_network(path: impl AsRef<Path>) -> Result<Vec<NetworkLayer>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read network {}", path.display()))?;
    let layers = parse_network(&content).wrap_err_with(|| format!("in {}", path.display()))?;
    info!("loaded {} layers from {}", layers.len(), path.display());
    Ok(layers)
}

/// a `rows`x`cols` conductance matrix, every value has to lie in `[min, max]`
pub fn parse_weights(
    content: &str,
    rows: usize,
    cols: usize,
    min_conductance: f64,
    max_conductance: f64,
) -> Result<WeightMatrix> {
    let tolerance = max_conductance * 1e-9;
    let mut data = Vec::with_capacity(rows * cols);
    let mut read_rows = 0;
    for (line, fields) in csv_lines(content) {
        if fields.len() != cols {
            bail!("line {line}: expected {cols} weights, found {}", fields.len());
        }
        for (column, field) in fields.iter().enumerate() {
            let value: f64 = parse_field(field, line, column)?;
            if !(min_conductance - tolerance..=max_conductance + tolerance).contains(&value) {
                bail!(
                    "line {line}, column {}: conductance {value} is outside [{min_conductance}, {max_conductance}]",
                    column + 1
                );
            }
            data.push(value);
        }
        read_rows += 1;
    }
    if read_rows != rows {
        bail!("expected {rows} weight rows, found {read_rows}");
    }
    Ok(WeightMatrix::new(rows, cols, data, min_conductance, max_conductance))
}

pub fn load_weights(
    path: impl AsRef<Path>,
    rows: usize,
    cols: usize,
    min_conductance: f64,
    max_conductance: f64,
) -> Result<WeightMatrix> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read weights {}", path.display()))?;
    parse_weights(&content, rows, cols, min_conductance, max_conductance)
        .wrap_err_with(|| format!("in {}", path.display()))
}

/// `rows` lines with one entry per input vector, any non zero entry drives the row
pub fn parse_inputs(content: &str, rows: usize) -> Result<ActivationMatrix> {
    let mut bits_by_row: Vec<Vec<bool>> = vec![];
    for (line, fields) in csv_lines(content) {
        let row = fields
            .iter()
            .enumerate()
            .map(|(column, f)| parse_field::<f64>(f, line, column).map(|v| v != 0.0))
            .collect::<Result<Vec<_>>>()?;
        if let Some(first) = bits_by_row.first() {
            if first.len() != row.len() {
                bail!("line {line}: expected {} input vectors, found {}", first.len(), row.len());
            }
        }
        bits_by_row.push(row);
    }
    if bits_by_row.len() != rows {
        bail!("expected {rows} input rows, found {}", bits_by_row.len());
    }
    let num_vectors = bits_by_row.first().map_or(0, |r| r.len());
    let vectors = (0..num_vectors)
        .map(|k| bits_by_row.iter().map(|row| row[k]).collect::<BitVec>())
        .collect();
    Ok(ActivationMatrix::new(rows, vectors))
}

pub fn load_inputs(path: impl AsRef<Path>, layer: &NetworkLayer, input_bit: usize) -> Result<ActivationMatrix> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read inputs {}", path.display()))?;
    let inputs = parse_inputs(&content, layer.weight_rows()).wrap_err_with(|| format!("in {}", path.display()))?;
    let expected = layer.num_input_vectors(input_bit);
    if inputs.num_vectors() != expected {
        warn!(
            "{} holds {} input vectors, the layer needs {}",
            path.display(),
            inputs.num_vectors(),
            expected
        );
    }
    Ok(inputs)
}
