//! Pending action modes and hex selection handling

use crate::game::{GameState, RulesError, UNIT_MOVE_RANGE};
use serde::{Deserialize, Serialize};

/// The single active command mode: how the next hex selection is
/// interpreted. MovingUnits is both the idle default and the mode every
/// other mode returns to, on success or refusal alike.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingAction {
    #[default]
    MovingUnits,
    BuildHarvester,
    DestroyHarvester,
    AddAmmo,
    BuildCannon,
    FireCannon,
    BuildWalker,
    BuildArmory,
    BuildCarrier,
}

impl GameState {
    pub fn pending(&self) -> PendingAction {
        self.pending
    }

    /// Arm a command mode. Any selection from the previous mode is stale.
    pub fn set_pending(&mut self, mode: PendingAction) {
        self.clear_selection();
        self.pending = mode;
    }

    /// Interpret a hex selection under the current mode. Mutating outcomes
    /// push a snapshot first; refusals emit a message, reset the mode and
    /// touch nothing.
    pub fn select_hex(&mut self, index: usize) {
        match self.pending {
            PendingAction::MovingUnits => self.select_move(index),
            PendingAction::FireCannon => self.select_fire(index),
            PendingAction::BuildHarvester => match self.can_build_harvester(index) {
                Ok(()) => {
                    self.store_current_state();
                    self.build_harvester(index);
                    self.finish();
                }
                Err(err) => self.refuse(err),
            },
            PendingAction::DestroyHarvester => match self.can_destroy_harvester(index) {
                Ok(()) => {
                    self.store_current_state();
                    self.destroy_harvester(index);
                    self.finish();
                }
                Err(err) => self.refuse(err),
            },
            PendingAction::AddAmmo => match self.can_add_cannon_ammo(index) {
                Ok(()) => {
                    self.store_current_state();
                    self.add_cannon_ammo(index);
                    self.finish();
                }
                Err(err) => self.refuse(err),
            },
            PendingAction::BuildCannon => match self.can_build_cannon(index) {
                Ok(()) => {
                    self.store_current_state();
                    self.build_cannon(index);
                    self.finish();
                }
                Err(err) => self.refuse(err),
            },
            PendingAction::BuildWalker => match self.can_build_walker(index) {
                Ok(()) => {
                    self.store_current_state();
                    self.build_walker(index);
                    self.finish();
                }
                Err(err) => self.refuse(err),
            },
            PendingAction::BuildArmory => match self.can_build_armory(index) {
                Ok(()) => {
                    self.store_current_state();
                    self.build_armory(index);
                    self.finish();
                }
                Err(err) => self.refuse(err),
            },
            PendingAction::BuildCarrier => match self.can_build_carrier(index) {
                Ok(()) => {
                    self.store_current_state();
                    self.build_carrier();
                    self.finish();
                }
                Err(err) => self.refuse(err),
            },
        }
    }

    fn can_select_stack(&self, index: usize) -> Result<(), RulesError> {
        let cell = &self.grid.cells[index];
        if !cell.alive() {
            return Err(RulesError::DeadCell);
        }
        if cell.side != self.current_side() {
            return Err(RulesError::NotOwned);
        }
        if cell.units_free == 0 {
            return Err(RulesError::NoFreeUnits);
        }
        Ok(())
    }

    /// Two-step movement: pick the stack, then pick a marked destination.
    fn select_move(&mut self, index: usize) {
        match self.active() {
            None => match self.can_select_stack(index) {
                Ok(()) => {
                    let mut targets =
                        self.grid.bfs_reachable(index, UNIT_MOVE_RANGE, false, true);
                    targets.retain(|&t| t != index);
                    self.set_active(Some(index));
                    self.set_marked(targets);
                }
                Err(err) => self.refuse(err),
            },
            Some(from) if from == index => self.clear_selection(),
            Some(from) => {
                if !self.marked().contains(&index) {
                    self.refuse(RulesError::InvalidTarget);
                    return;
                }
                match self.can_move_or_attack(from, index) {
                    Ok(()) => {
                        self.store_current_state();
                        self.move_or_attack(from, index);
                        self.clear_selection();
                    }
                    Err(err) => self.refuse(err),
                }
            }
        }
    }

    /// Two-step cannon fire: pick the armed cannon, then a target in the
    /// annulus.
    fn select_fire(&mut self, index: usize) {
        match self.active() {
            None => {
                let err = {
                    let cell = &self.grid.cells[index];
                    if !cell.alive() {
                        Some(RulesError::DeadCell)
                    } else if cell.side != self.current_side() {
                        Some(RulesError::NotOwned)
                    } else if !cell.cannon {
                        Some(RulesError::NoCannon)
                    } else if !cell.ammo {
                        Some(RulesError::NoAmmo)
                    } else {
                        None
                    }
                };
                match err {
                    Some(err) => self.refuse(err),
                    None => {
                        let targets: Vec<usize> = (0..self.grid.len())
                            .filter(|&t| {
                                t != index
                                    && self.grid.cells[t].alive()
                                    && self.cannon_in_range(index, t)
                            })
                            .collect();
                        self.set_active(Some(index));
                        self.set_marked(targets);
                    }
                }
            }
            Some(from) => match self.can_fire_cannon(from, index) {
                Ok(()) => {
                    self.store_current_state();
                    self.fire_cannon(from, index);
                    self.finish();
                }
                Err(err) => self.refuse(err),
            },
        }
    }

    fn finish(&mut self) {
        self.clear_selection();
        self.pending = PendingAction::MovingUnits;
    }

    /// Tier-1 refusal: message out, selection and mode reset, no mutation.
    fn refuse(&mut self, err: RulesError) {
        tracing::debug!(%err, "refused");
        self.message(err.to_string());
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{HexCell, Side};
    use crate::grid::HexGrid;
    use crate::game::{COST_HARVESTER, STARTING_RESOURCES};

    fn strip_state(n: usize) -> GameState {
        let cells = (0..n)
            .map(|i| HexCell::new(i, i as f32 * 86.0, 0.0, 50.0, 3))
            .collect();
        GameState::new(HexGrid::new(cells), 2)
    }

    fn give(state: &mut GameState, index: usize, side: Side, free: u32) {
        let cell = &mut state.grid.cells[index];
        cell.side = side;
        cell.units_free = free;
    }

    #[test]
    fn test_default_mode_is_moving_units() {
        let state = strip_state(2);
        assert_eq!(state.pending(), PendingAction::MovingUnits);
    }

    #[test]
    fn test_build_mode_completes_and_resets() {
        let mut state = strip_state(2);
        give(&mut state, 0, Side::Red, 1);
        state.set_pending(PendingAction::BuildHarvester);
        state.select_hex(0);

        assert!(state.grid.cells[0].harvester);
        assert_eq!(
            state.current_controller().resources,
            STARTING_RESOURCES - COST_HARVESTER
        );
        assert_eq!(state.pending(), PendingAction::MovingUnits);
        assert_eq!(state.undo_depth(), 1);
    }

    #[test]
    fn test_refusal_emits_message_and_mutates_nothing() {
        let mut state = strip_state(2);
        give(&mut state, 1, Side::Green, 1);
        state.set_pending(PendingAction::BuildHarvester);
        state.select_hex(1); // not ours

        assert!(!state.grid.cells[1].harvester);
        assert_eq!(state.pending(), PendingAction::MovingUnits);
        assert_eq!(state.undo_depth(), 0);
        let messages = state.drain_messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("not yours"));
    }

    #[test]
    fn test_move_flow_marks_then_moves() {
        let mut state = strip_state(4);
        give(&mut state, 0, Side::Red, 5);

        state.select_hex(0);
        assert_eq!(state.active(), Some(0));
        assert!(state.marked().contains(&1));
        assert!(state.grid.cells[1].marked);

        state.set_moving_units(2);
        state.select_hex(1);
        assert_eq!(state.grid.cells[1].units_moved, 2);
        assert_eq!(state.grid.cells[0].units_free, 3);
        assert_eq!(state.active(), None);
        assert!(state.marked().is_empty());
    }

    #[test]
    fn test_move_range_exempts_only_adjacent_enemies() {
        let mut state = strip_state(5);
        give(&mut state, 0, Side::Red, 5);
        give(&mut state, 1, Side::Red, 5);
        give(&mut state, 2, Side::Green, 2);

        // From the front-line stack the adjacent enemy is a target, but the
        // search never routes past it.
        state.select_hex(1);
        assert!(state.marked().contains(&0));
        assert!(state.marked().contains(&2));
        assert!(!state.marked().contains(&3));
        state.clear_selection();

        // From the rear stack the enemy is two steps away and not exempt.
        state.select_hex(0);
        assert!(state.marked().contains(&1));
        assert!(!state.marked().contains(&2));
    }

    #[test]
    fn test_reselecting_stack_clears_selection() {
        let mut state = strip_state(3);
        give(&mut state, 0, Side::Red, 5);
        state.select_hex(0);
        assert_eq!(state.active(), Some(0));
        state.select_hex(0);
        assert_eq!(state.active(), None);
        assert!(state.drain_messages().is_empty());
    }

    #[test]
    fn test_unmarked_target_refused() {
        let mut state = strip_state(5);
        give(&mut state, 0, Side::Red, 5);
        give(&mut state, 2, Side::Green, 9);
        state.select_hex(0);
        state.select_hex(4); // beyond the enemy wall

        assert_eq!(state.active(), None);
        assert_eq!(state.grid.cells[4].units(), 0);
        assert_eq!(state.drain_messages().len(), 1);
    }

    #[test]
    fn test_fire_flow_two_step() {
        let mut state = strip_state(5);
        give(&mut state, 0, Side::Red, 1);
        state.grid.cells[0].cannon = true;
        state.grid.cells[0].ammo = true;
        give(&mut state, 2, Side::Green, 4);

        state.set_pending(PendingAction::FireCannon);
        state.select_hex(0);
        assert_eq!(state.active(), Some(0));
        // With r = 43 the strip pitch is exactly 2r: cell 1 lands on the
        // inner bound and cell 3 on the outer bound, both excluded; only
        // cell 2 is inside the annulus.
        assert_eq!(state.marked(), &[2]);

        state.select_hex(2);
        assert!(!state.grid.cells[0].ammo);
        assert_eq!(state.grid.cells[2].level, 2);
        assert_eq!(state.grid.cells[2].units_free, 1);
        assert_eq!(state.pending(), PendingAction::MovingUnits);
    }

    #[test]
    fn test_fire_without_ammo_is_recoverable() {
        let mut state = strip_state(3);
        give(&mut state, 0, Side::Red, 1);
        state.grid.cells[0].cannon = true;

        state.set_pending(PendingAction::FireCannon);
        state.select_hex(0);
        assert_eq!(state.pending(), PendingAction::MovingUnits);
        assert_eq!(state.undo_depth(), 0);
        assert!(state.drain_messages()[0].contains("ammo"));
    }
}
