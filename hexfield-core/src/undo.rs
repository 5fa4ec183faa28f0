//! Full-state snapshots for intra-turn undo

use crate::cell::HexCell;
use crate::game::Controller;

/// Value copy of everything a player action can mutate: every cell plus the
/// acting controller. Deliberately a whole-state copy, not a command-pattern
/// reversal; undo stays trivially correct as resolution rules evolve.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub cells: Vec<HexCell>,
    pub controller: Controller,
}

/// Stack of snapshots, one per mutating action. Cleared at every turn
/// boundary: undo is strictly intra-turn.
#[derive(Clone, Debug, Default)]
pub struct SnapshotStack {
    stack: Vec<Snapshot>,
}

impl SnapshotStack {
    pub fn push(&mut self, cells: &[HexCell], controller: &Controller) {
        self.stack.push(Snapshot {
            cells: cells.to_vec(),
            controller: controller.clone(),
        });
    }

    pub fn pop(&mut self) -> Option<Snapshot> {
        self.stack.pop()
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}
