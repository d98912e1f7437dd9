//! equivalent resistance of every output column during one read

use bit_vec::BitVec;

use super::matrix::WeightMatrix;
use crate::cim::{
    config::{AccessKind, CellKind, ReadMode},
    tech::WireResistance,
};

/// resistance of a column with no activated row
pub const OPEN_COLUMN_RESISTANCE: f64 = 1e50;

pub fn is_open(resistance: f64) -> bool {
    resistance >= OPEN_COLUMN_RESISTANCE
}

impl CellKind {
    /// conductance one activated cell at (`row`, `col`) adds to its column
    pub fn row_conductance(
        &self,
        weight: f64,
        row: usize,
        col: usize,
        rows: usize,
        wire: &WireResistance,
        access_resistance: f64,
    ) -> f64 {
        let array_path = |access: f64| {
            1.0 / (1.0 / weight
                + (col + 1) as f64 * wire.row
                + (rows - row) as f64 * wire.col
                + access)
        };
        match self {
            CellKind::Sram | CellKind::DigitalSram => 1.0 / (access_resistance + wire.col),
            CellKind::Resistive {
                access: AccessKind::Cmos,
            } => array_path(access_resistance),
            CellKind::Resistive { .. } | CellKind::Ferroelectric => array_path(0.0),
        }
    }

    /// a sequential read senses one analog row at a time, latches keep the summed path
    pub fn averages_sequential_reads(&self) -> bool {
        matches!(self, CellKind::Resistive { .. } | CellKind::Ferroelectric)
    }
}

/// one resistance per column of `weights` for the rows set in `activation`
///
/// columns without any activated row get [`OPEN_COLUMN_RESISTANCE`]
pub fn resistance_of_columns(
    activation: &BitVec,
    weights: &WeightMatrix,
    cell: CellKind,
    read_mode: ReadMode,
    wire: &WireResistance,
    access_resistance: f64,
) -> Vec<f64> {
    let rows = weights.rows();
    assert_eq!(
        activation.len(),
        rows,
        "activation covers {} rows but the weight tile has {}",
        activation.len(),
        rows
    );
    let active_rows: Vec<usize> = activation
        .iter()
        .enumerate()
        .filter_map(|(i, bit)| bit.then_some(i))
        .collect();

    (0..weights.cols())
        .map(|j| {
            let mut conductance: f64 = active_rows
                .iter()
                .map(|&i| cell.row_conductance(weights.get(i, j), i, j, rows, wire, access_resistance))
                .sum();
            if read_mode == ReadMode::Sequential && cell.averages_sequential_reads() && !active_rows.is_empty() {
                conductance /= active_rows.len() as f64;
            }
            if conductance > 0.0 {
                1.0 / conductance
            } else {
                OPEN_COLUMN_RESISTANCE
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cim::tech::WireResistance;

    /// 2^-20 keeps every reciprocal exact
    const MIN_G: f64 = 1.0 / 1048576.0;
    const MAX_G: f64 = 1.0 / 8192.0;
    const CROSSBAR: CellKind = CellKind::Resistive {
        access: AccessKind::None,
    };

    fn ones(n: usize) -> BitVec {
        BitVec::from_elem(n, true)
    }

    #[test]
    fn test_min_conductance_parallel() {
        let weights = WeightMatrix::filled(4, 4, MIN_G, MIN_G, MAX_G);
        let res = resistance_of_columns(
            &ones(4),
            &weights,
            CROSSBAR,
            ReadMode::Parallel,
            &WireResistance::IDEAL,
            0.0,
        );
        assert_eq!(res.len(), 4);
        for r in res {
            assert_eq!(r, 1.0 / (4.0 * MIN_G));
        }
    }

    #[test]
    fn test_all_zero_activation() {
        let weights = WeightMatrix::from_fn(8, 5, MIN_G, MAX_G, |i, j| if (i + j) % 2 == 0 { MAX_G } else { MIN_G });
        let wire = WireResistance { row: 1.5, col: 2.5 };
        for cell in [
            CellKind::Sram,
            CellKind::DigitalSram,
            CROSSBAR,
            CellKind::Ferroelectric,
            CellKind::Resistive {
                access: AccessKind::Cmos,
            },
        ] {
            for mode in [ReadMode::Parallel, ReadMode::Sequential] {
                let res = resistance_of_columns(&BitVec::from_elem(8, false), &weights, cell, mode, &wire, 1500.0);
                assert!(res.iter().all(|r| *r == OPEN_COLUMN_RESISTANCE));
            }
        }
    }

    #[test]
    fn test_values_are_finite_or_open() {
        let weights = WeightMatrix::from_fn(16, 6, MIN_G, MAX_G, |i, j| if i * j % 3 == 0 { MAX_G } else { MIN_G });
        let wire = WireResistance { row: 0.7, col: 1.1 };
        for pattern in 1..64usize {
            let activation = BitVec::from_fn(16, |i| (pattern >> (i % 6)) & 1 == 1);
            for cell in [CellKind::Sram, CROSSBAR, CellKind::Ferroelectric] {
                let res = resistance_of_columns(&activation, &weights, cell, ReadMode::Parallel, &wire, 2000.0);
                assert_eq!(res.len(), 6);
                for r in res {
                    assert!(r.is_finite() && r > 0.0);
                    assert!(r < OPEN_COLUMN_RESISTANCE);
                    assert!(!is_open(r));
                }
            }
        }
    }

    #[test]
    fn test_sequential_averages() {
        let weights = WeightMatrix::filled(4, 2, MIN_G, MIN_G, MAX_G);
        let res = resistance_of_columns(
            &ones(4),
            &weights,
            CROSSBAR,
            ReadMode::Sequential,
            &WireResistance::IDEAL,
            0.0,
        );
        assert_eq!(res[0], 1.0 / MIN_G);
        let res = resistance_of_columns(
            &ones(4),
            &weights,
            CellKind::Ferroelectric,
            ReadMode::Sequential,
            &WireResistance::IDEAL,
            0.0,
        );
        assert_eq!(res[0], 1.0 / MIN_G);
    }

    #[test]
    fn test_sram_sequential_matches_parallel() {
        let weights = WeightMatrix::filled(4, 2, MAX_G, MIN_G, MAX_G);
        for cell in [CellKind::Sram, CellKind::DigitalSram] {
            let read = |mode| resistance_of_columns(&ones(4), &weights, cell, mode, &WireResistance::IDEAL, 1024.0);
            let parallel = read(ReadMode::Parallel);
            assert_eq!(parallel, vec![256.0, 256.0]);
            assert_eq!(read(ReadMode::Sequential), parallel);
        }
    }

    #[test]
    fn test_latch_ignores_weight() {
        let weights = WeightMatrix::from_fn(2, 2, MIN_G, MAX_G, |i, _| if i == 0 { MIN_G } else { MAX_G });
        let wire = WireResistance { row: 1.0, col: 4.0 };
        let res = resistance_of_columns(&ones(2), &weights, CellKind::Sram, ReadMode::Parallel, &wire, 1020.0);
        assert!((res[0] - 512.0).abs() < 1e-9);
        assert_eq!(res[0], res[1]);
    }

    #[test]
    fn test_access_and_wire_add_resistance() {
        let weights = WeightMatrix::filled(1, 3, MAX_G, MIN_G, MAX_G);
        let wire = WireResistance { row: 10.0, col: 20.0 };
        let cmos = CellKind::Resistive {
            access: AccessKind::Cmos,
        };
        let res = resistance_of_columns(&ones(1), &weights, cmos, ReadMode::Parallel, &wire, 100.0);
        // 8192 + (j+1)*10 + 1*20 + 100
        assert!((res[0] - 8322.0).abs() < 1e-6);
        assert!((res[2] - 8342.0).abs() < 1e-6);
        let res = resistance_of_columns(&ones(1), &weights, CellKind::Ferroelectric, ReadMode::Parallel, &wire, 100.0);
        assert!((res[0] - 8222.0).abs() < 1e-6);
    }

    #[test]
    #[should_panic]
    fn test_mismatched_activation() {
        let weights = WeightMatrix::filled(4, 4, MIN_G, MIN_G, MAX_G);
        resistance_of_columns(&ones(3), &weights, CROSSBAR, ReadMode::Parallel, &WireResistance::IDEAL, 0.0);
    }
}
