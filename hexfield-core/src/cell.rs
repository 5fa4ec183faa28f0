//! Hex cells and faction sides

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Owning faction of a cell or controller
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Neutral = 0,
    Red = 1,
    Green = 2,
    Blue = 3,
    Yellow = 4,
}

/// All playable (non-neutral) sides, in turn order
pub const PLAYABLE_SIDES: [Side; 4] = [Side::Red, Side::Green, Side::Blue, Side::Yellow];

#[derive(Debug, Error)]
#[error("invalid side value: {0}")]
pub struct SideError(pub i32);

impl Side {
    pub fn is_neutral(self) -> bool {
        self == Side::Neutral
    }
}

impl TryFrom<i32> for Side {
    type Error = SideError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Side::Neutral),
            1 => Ok(Side::Red),
            2 => Ok(Side::Green),
            3 => Ok(Side::Blue),
            4 => Ok(Side::Yellow),
            other => Err(SideError(other)),
        }
    }
}

/// One hexagonal territory.
///
/// Cells live in a dense array for the lifetime of a map; "destruction" is
/// semantic (level drops to 0, prune marks -1) and never removes the slot,
/// so index-based adjacency stays valid across snapshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HexCell {
    /// Stable index into the grid's cell array
    pub index: usize,
    /// Health: >= 1 alive, 0 dying, -1 removed by pruning
    pub level: i32,
    pub side: Side,

    /// Units that may still receive orders this turn
    pub units_free: u32,
    /// Units that already moved; freed at the owner's next settlement
    pub units_moved: u32,

    pub harvester: bool,
    pub harvested: bool,
    pub armory: bool,
    pub cannon: bool,
    /// Ammo ready to fire
    pub ammo: bool,
    /// Ammo in transit; becomes ready at the owner's next settlement
    pub loaded_ammo: bool,

    /// Hexagon side length
    pub a: f32,
    /// Inscribed circle radius
    pub r: f32,
    /// Center point, used for hit-testing and distance math only
    pub cx: f32,
    pub cy: f32,

    /// UI selection flags, persisted so editor sessions round-trip
    pub active: bool,
    pub marked: bool,
}

impl HexCell {
    /// Create a cell from its top-left corner, side length and level.
    pub fn new(index: usize, x1: f32, y1: f32, a: f32, level: i32) -> Self {
        let a = a.round();
        let r = (0.5 * 3.0f32.sqrt() * a).round();
        Self {
            index,
            level,
            side: Side::Neutral,
            units_free: 0,
            units_moved: 0,
            harvester: false,
            harvested: false,
            armory: false,
            cannon: false,
            ammo: false,
            loaded_ammo: false,
            a,
            r,
            cx: x1.round() + r,
            cy: y1.round() + r,
            active: false,
            marked: false,
        }
    }

    pub fn alive(&self) -> bool {
        self.level >= 1
    }

    /// Total units on the cell, free and moved
    pub fn units(&self) -> u32 {
        self.units_free + self.units_moved
    }

    pub fn has_building(&self) -> bool {
        self.harvester || self.armory || self.cannon
    }

    /// Straight-line center distance to another cell
    pub fn distance_to(&self, other: &HexCell) -> f32 {
        let dx = self.cx - other.cx;
        let dy = self.cy - other.cy;
        (dx * dx + dy * dy).sqrt()
    }

    /// Harvest this cell: one level becomes one resource for the owner.
    pub fn harvest(&mut self) {
        self.level -= 1;
        self.harvested = true;
    }

    /// Strip everything a dead cell can no longer hold.
    pub fn clear_contents(&mut self) {
        self.units_free = 0;
        self.units_moved = 0;
        self.harvester = false;
        self.armory = false;
        self.cannon = false;
        self.ammo = false;
        self.loaded_ammo = false;
        self.side = Side::Neutral;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_decode() {
        assert_eq!(Side::try_from(0).unwrap(), Side::Neutral);
        assert_eq!(Side::try_from(3).unwrap(), Side::Blue);
        assert!(Side::try_from(5).is_err());
        assert!(Side::try_from(-1).is_err());
    }

    #[test]
    fn test_cell_geometry() {
        let cell = HexCell::new(0, 10.0, 20.0, 50.0, 3);
        // r = round(0.5 * sqrt(3) * 50) = 43
        assert_eq!(cell.r, 43.0);
        assert_eq!(cell.cx, 53.0);
        assert_eq!(cell.cy, 63.0);
        assert!(cell.alive());
    }

    #[test]
    fn test_harvest_marks() {
        let mut cell = HexCell::new(0, 0.0, 0.0, 50.0, 2);
        cell.harvest();
        assert_eq!(cell.level, 1);
        assert!(cell.harvested);
    }

    #[test]
    fn test_clear_contents() {
        let mut cell = HexCell::new(0, 0.0, 0.0, 50.0, 0);
        cell.side = Side::Red;
        cell.units_free = 4;
        cell.cannon = true;
        cell.ammo = true;
        cell.clear_contents();
        assert_eq!(cell.side, Side::Neutral);
        assert_eq!(cell.units(), 0);
        assert!(!cell.has_building());
        assert!(!cell.ammo);
    }
}
