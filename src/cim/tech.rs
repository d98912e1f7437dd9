//! technology tables: wire resistance, cell geometry and first-order gate figures per node

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;

use super::config::{AccessKind, CellKind, DeviceRoadmap};

/// the supported technology nodes, in nm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum TechNode {
    N130 = 130,
    N90 = 90,
    N65 = 65,
    N45 = 45,
    N32 = 32,
    N22 = 22,
    N14 = 14,
    N10 = 10,
    N7 = 7,
    N5 = 5,
    N3 = 3,
    N2 = 2,
    N1 = 1,
}

/// per node constants: (wire width nm, barrier thickness nm, vdd, sram cell height F, sram cell width F)
struct NodeTable {
    wire_width: f64,
    barrier: f64,
    vdd: f64,
    sram_cell: (f64, f64),
}

impl TechNode {
    fn table(self) -> NodeTable {
        let (wire_width, barrier, vdd, sram_cell) = match self {
            TechNode::N130 => (175.0, 10.0, 1.3, (10.0, 28.0)),
            TechNode::N90 => (110.0, 10.0, 1.2, (10.0, 28.0)),
            TechNode::N65 => (105.0, 7.0, 1.1, (10.0, 28.0)),
            TechNode::N45 => (80.0, 5.0, 1.0, (10.0, 28.0)),
            TechNode::N32 => (56.0, 4.0, 0.9, (10.0, 28.0)),
            TechNode::N22 => (40.0, 3.0, 0.85, (10.0, 28.0)),
            TechNode::N14 => (32.0, 2.5, 0.8, (10.6, 30.8)),
            TechNode::N10 => (22.0, 2.5, 0.75, (12.8, 31.25)),
            TechNode::N7 => (20.0, 2.5, 0.7, (16.0, 34.43)),
            TechNode::N5 => (18.0, 2.0, 0.7, (19.2, 43.75)),
            TechNode::N3 => (16.0, 1.5, 0.7, (30.0, 68.26)),
            TechNode::N2 => (12.0, 0.5, 0.65, (42.0, 120.0)),
            TechNode::N1 => (8.0, 0.5, 0.65, (80.0, 144.0)),
        };
        NodeTable {
            wire_width,
            barrier,
            vdd,
            sram_cell,
        }
    }

    pub fn nm(self) -> u32 {
        self.into()
    }
}

/// (aspect ratio, bulk resistivity in ohm*m) of a copper wire of the given width
fn wire_material(wire_width: f64) -> (f64, f64) {
    match wire_width {
        w if w >= 175.0 => (1.6, 2.01e-8),
        w if w >= 110.0 => (1.6, 2.20e-8),
        w if w >= 105.0 => (1.7, 2.21e-8),
        w if w >= 80.0 => (1.7, 2.37e-8),
        w if w >= 56.0 => (1.8, 2.63e-8),
        w if w >= 40.0 => (1.9, 2.97e-8),
        w if w >= 32.0 => (2.0, 3.25e-8),
        w if w >= 22.0 => (2.0, 3.95e-8),
        w if w >= 20.0 => (2.0, 4.17e-8),
        w if w >= 15.0 => (2.0, 4.98e-8),
        w if w >= 12.0 => (2.0, 5.8e-8),
        w if w >= 10.0 => (2.0, 6.61e-8),
        _ => (3.0, 7.87e-8),
    }
}

/// wire resistance of one cell pitch along a row and along a column
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WireResistance {
    pub row: f64,
    pub col: f64,
}

impl WireResistance {
    pub const IDEAL: WireResistance = WireResistance { row: 0.0, col: 0.0 };
}

/// cell footprint in multiples of the feature size
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CellGeometry {
    pub height: f64,
    pub width: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Technology {
    pub node: TechNode,
    /// in meters
    pub feature_size: f64,
    pub vdd: f64,
    /// ohm per meter
    pub unit_wire_resistance: f64,
    pub wire: WireResistance,
    pub cell: CellGeometry,
    /// fanout-of-4 delay of a minimum inverter
    pub gate_delay: f64,
    /// switching energy of a minimum gate
    pub gate_energy: f64,
    /// static power of a minimum gate
    pub gate_leakage: f64,
    pub gate_area: f64,
    /// farad per meter
    pub wire_cap: f64,
    /// on resistance of the latch access transistor
    pub latch_access_resistance: f64,
}

impl Technology {
    pub fn new(node: TechNode, roadmap: DeviceRoadmap, temperature: f64, cell: CellKind) -> Self {
        let table = node.table();
        let w = table.wire_width;
        let (aspect_ratio, bulk_rho) = wire_material(w);
        let barrier_scale = 1.0 - (2.0 * aspect_ratio * w + w) * table.barrier / (aspect_ratio * w * w);
        let rho = bulk_rho / barrier_scale * (1.0 + 0.00451 * (temperature - 300.0).abs());
        let width_m = w * 1e-9;
        let unit_wire_resistance = rho / (width_m * width_m * aspect_ratio);

        let geometry = match cell {
            CellKind::Sram | CellKind::DigitalSram => CellGeometry {
                height: table.sram_cell.0,
                width: table.sram_cell.1,
            },
            CellKind::Resistive {
                access: AccessKind::Cmos,
            }
            | CellKind::Ferroelectric => CellGeometry {
                height: 4.0,
                width: 12.0,
            },
            CellKind::Resistive { .. } => CellGeometry {
                height: 2.0,
                width: 2.0,
            },
        };
        let wire = WireResistance {
            row: unit_wire_resistance * width_m * geometry.height,
            col: unit_wire_resistance * width_m * geometry.width,
        };

        let (delay_scale, off_current, on_current) = match roadmap {
            DeviceRoadmap::Hp => (1.0, 50e-9, 1.0e-4),
            DeviceRoadmap::Lstp => (1.5, 50e-12, 5.0e-5),
        };
        let gate_cap = 2.5e-18 * w;
        Self {
            node,
            feature_size: width_m,
            vdd: table.vdd,
            unit_wire_resistance,
            wire,
            cell: geometry,
            gate_delay: 0.25e-12 * w * delay_scale,
            gate_energy: gate_cap * table.vdd * table.vdd,
            gate_leakage: off_current * table.vdd,
            gate_area: 40.0 * width_m * width_m,
            wire_cap: 0.2e-9,
            latch_access_resistance: table.vdd / on_current,
        }
    }

    pub fn cell_height(&self) -> f64 {
        self.cell.height * self.feature_size
    }

    pub fn cell_width(&self) -> f64 {
        self.cell.width * self.feature_size
    }

    pub fn cell_area(&self) -> f64 {
        self.cell_height() * self.cell_width()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tech(node: TechNode, temperature: f64) -> Technology {
        Technology::new(
            node,
            DeviceRoadmap::Lstp,
            temperature,
            CellKind::Resistive {
                access: AccessKind::Cmos,
            },
        )
    }

    #[test]
    fn test_node_lookup() {
        assert_eq!(TechNode::try_from(22).unwrap(), TechNode::N22);
        assert!(TechNode::try_from(28).is_err());
        assert_eq!(TechNode::N7.nm(), 7);
    }

    #[test]
    fn test_wire_resistance_grows_with_scaling() {
        let old = tech(TechNode::N130, 300.0);
        let new = tech(TechNode::N7, 300.0);
        assert!(new.unit_wire_resistance > old.unit_wire_resistance);
        assert!(old.wire.row > 0.0 && old.wire.col > old.wire.row);
    }

    #[test]
    fn test_temperature() {
        let cold = tech(TechNode::N22, 300.0);
        let hot = tech(TechNode::N22, 400.0);
        let ratio = hot.unit_wire_resistance / cold.unit_wire_resistance;
        assert!((ratio - 1.451).abs() < 1e-9);
    }

    #[test]
    fn test_geometry() {
        let t = Technology::new(TechNode::N14, DeviceRoadmap::Hp, 300.0, CellKind::Sram);
        assert_eq!(t.cell, CellGeometry { height: 10.6, width: 30.8 });
        let t = Technology::new(
            TechNode::N14,
            DeviceRoadmap::Hp,
            300.0,
            CellKind::Resistive {
                access: AccessKind::None,
            },
        );
        assert_eq!(t.cell, CellGeometry { height: 2.0, width: 2.0 });
        assert!(t.cell_area() > 0.0);
    }
}
