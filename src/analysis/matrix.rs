//! weights and input activations of one layer

use bit_vec::BitVec;

use super::partition::TileAssignment;

/// conductances of a weight matrix, rows are synapse inputs and columns synapse outputs
#[derive(Debug, Clone, PartialEq)]
pub struct WeightMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
    min_conductance: f64,
    max_conductance: f64,
}

impl WeightMatrix {
    /// build from row major data
    pub fn new(
        rows: usize,
        cols: usize,
        data: Vec<f64>,
        min_conductance: f64,
        max_conductance: f64,
    ) -> Self {
        assert_eq!(data.len(), rows * cols, "weight data does not match {rows}x{cols}");
        Self {
            rows,
            cols,
            data,
            min_conductance,
            max_conductance,
        }
    }

    pub fn from_fn(
        rows: usize,
        cols: usize,
        min_conductance: f64,
        max_conductance: f64,
        mut f: impl FnMut(usize, usize) -> f64,
    ) -> Self {
        let data = (0..rows)
            .flat_map(|i| (0..cols).map(move |j| (i, j)))
            .map(|(i, j)| f(i, j))
            .collect();
        Self::new(rows, cols, data, min_conductance, max_conductance)
    }

    pub fn filled(rows: usize, cols: usize, value: f64, min_conductance: f64, max_conductance: f64) -> Self {
        Self::new(rows, cols, vec![value; rows * cols], min_conductance, max_conductance)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn min_conductance(&self) -> f64 {
        self.min_conductance
    }

    pub fn max_conductance(&self) -> f64 {
        self.max_conductance
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// is the weight in the highest conductance state
    pub fn is_max(&self, value: f64) -> bool {
        (value - self.max_conductance).abs() <= self.max_conductance * 1e-9
    }

    /// is the weight in the lowest conductance state
    pub fn is_min(&self, value: f64) -> bool {
        (value - self.min_conductance).abs() <= self.min_conductance * 1e-9
    }

    /// number of cells left in the lowest conductance state
    pub fn count_min(&self) -> usize {
        self.data.iter().filter(|w| self.is_min(**w)).count()
    }

    /// copy the block covered by `tile`
    pub fn sub_matrix(&self, tile: &TileAssignment) -> WeightMatrix {
        assert!(
            tile.row_offset + tile.rows <= self.rows && tile.col_offset + tile.cols <= self.cols,
            "tile {tile:?} is outside of the {}x{} matrix",
            self.rows,
            self.cols
        );
        let data = (tile.row_offset..tile.row_offset + tile.rows)
            .flat_map(|i| self.row(i)[tile.col_offset..tile.col_offset + tile.cols].iter().copied())
            .collect();
        WeightMatrix::new(tile.rows, tile.cols, data, self.min_conductance, self.max_conductance)
    }
}

/// one bit per row for every input vector of a layer
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationMatrix {
    rows: usize,
    vectors: Vec<BitVec>,
}

impl ActivationMatrix {
    pub fn new(rows: usize, vectors: Vec<BitVec>) -> Self {
        assert!(
            vectors.iter().all(|v| v.len() == rows),
            "every input vector must cover {rows} rows"
        );
        Self { rows, vectors }
    }

    pub fn from_fn(rows: usize, num_vectors: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let vectors = (0..num_vectors)
            .map(|k| BitVec::from_fn(rows, |i| f(i, k)))
            .collect();
        Self { rows, vectors }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn num_vectors(&self) -> usize {
        self.vectors.len()
    }

    pub fn vector(&self, k: usize) -> &BitVec {
        &self.vectors[k]
    }

    pub fn iter(&self) -> impl Iterator<Item = &BitVec> {
        self.vectors.iter()
    }

    /// the rows `offset..offset+len` of every vector
    pub fn sub_rows(&self, offset: usize, len: usize) -> ActivationMatrix {
        assert!(offset + len <= self.rows, "rows {offset}..{} out of {}", offset + len, self.rows);
        let vectors = self
            .vectors
            .iter()
            .map(|v| BitVec::from_fn(len, |i| v[offset + i]))
            .collect();
        ActivationMatrix { rows: len, vectors }
    }
}
