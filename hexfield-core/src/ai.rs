//! Rule-based AI opponent
//!
//! The planner runs its heuristics against the live grid, paying real
//! resources and triggering real combat, while recording every action it
//! takes. The whole turn is then rewound through the snapshot manager and
//! the recorded script replayed through the same resolution entry points,
//! one action per UI tick or all at once. Planning and replay are therefore
//! bit-identical by construction.

use crate::cell::Side;
use crate::game::{
    GameState, COST_ARMORY, COST_CARRIER, COST_HARVESTER, COST_WALKER, UNIT_MOVE_RANGE,
};
use crate::grid::HexGrid;
use serde::{Deserialize, Serialize};

// ============================================================================
// TERRITORY ANALYSIS
// ============================================================================

/// A maximal connected same-side cluster of living cells within one island,
/// with derived totals. Recomputed fresh each pass; owns no game state.
#[derive(Clone, Debug)]
pub struct Blob {
    pub side: Side,
    pub cells: Vec<usize>,
    pub level: i32,
    pub units_free: u32,
    pub units_moved: u32,
    pub harvesters: usize,
    pub armories: usize,
    pub cannons: usize,
}

impl Blob {
    fn collect(grid: &HexGrid, side: Side, cells: Vec<usize>) -> Self {
        let mut blob = Blob {
            side,
            cells,
            level: 0,
            units_free: 0,
            units_moved: 0,
            harvesters: 0,
            armories: 0,
            cannons: 0,
        };
        for &i in &blob.cells {
            let cell = &grid.cells[i];
            blob.level += cell.level;
            blob.units_free += cell.units_free;
            blob.units_moved += cell.units_moved;
            blob.harvesters += cell.harvester as usize;
            blob.armories += cell.armory as usize;
            blob.cannons += cell.cannon as usize;
        }
        blob
    }

    pub fn units(&self) -> u32 {
        self.units_free + self.units_moved
    }
}

/// A maximal connected region of living cells regardless of side, carved
/// into per-faction blobs. Neutral clusters stay in `cells` only.
#[derive(Clone, Debug)]
pub struct Island {
    pub cells: Vec<usize>,
    pub blobs: Vec<Blob>,
}

/// Partition the living grid into islands and blobs.
pub fn analyze(grid: &HexGrid) -> Vec<Island> {
    grid.find_islands()
        .into_iter()
        .map(|cells| {
            let blobs = grid
                .find_clusters(&cells)
                .into_iter()
                .filter(|(side, _)| !side.is_neutral())
                .map(|(side, members)| Blob::collect(grid, side, members))
                .collect();
            Island { cells, blobs }
        })
        .collect()
}

// ============================================================================
// ACTION SCRIPT
// ============================================================================

/// One recorded planner decision, naming exactly one resolution call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Move { from: usize, to: usize, units: u32 },
    BuildHarvester { cell: usize },
    BuildArmory { cell: usize },
    Recruit { cell: usize },
    BuyCarrier,
    Transport { from: usize, to: usize },
}

/// Apply one action through the regular resolution functions. Used both
/// while planning and while replaying; there is no animate-only path.
pub fn apply(state: &mut GameState, action: Action) {
    match action {
        Action::Move { from, to, units } => {
            state.set_moving_units(units);
            state.move_or_attack(from, to);
        }
        Action::BuildHarvester { cell } => state.build_harvester(cell),
        Action::BuildArmory { cell } => state.build_armory(cell),
        Action::Recruit { cell } => state.build_walker(cell),
        Action::BuyCarrier => state.build_carrier(),
        Action::Transport { from, to } => state.transport(from, to),
    }
}

/// A planned turn being replayed for the viewer.
#[derive(Clone, Debug)]
pub struct TurnScript {
    actions: Vec<Action>,
    next: usize,
}

impl TurnScript {
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions, next: 0 }
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.actions.len()
    }

    /// Replay the next action, if any. Call once per tick for watchable
    /// pacing; the final state does not depend on the pacing.
    pub fn step(&mut self, state: &mut GameState) -> Option<Action> {
        let action = *self.actions.get(self.next)?;
        self.next += 1;
        apply(state, action);
        Some(action)
    }

    /// Replay everything left in one go (the "skip" path).
    pub fn run_all(&mut self, state: &mut GameState) {
        while self.step(state).is_some() {}
    }
}

// ============================================================================
// PLANNER
// ============================================================================

/// Compute the current controller's full turn. Executes every decision
/// against the live state (so validation and resource debits are the real
/// ones), records the script, then rewinds the whole turn via the snapshot
/// manager. The caller replays the script and ends the turn.
pub fn plan_turn(state: &mut GameState) -> TurnScript {
    let mut actions = Vec::new();
    state.store_current_state();

    expand(state, &mut actions);
    place_harvesters(state, &mut actions);
    place_armories(state, &mut actions);
    attack_or_recruit(state, &mut actions);
    regroup_or_ship(state, &mut actions);

    state.undo();
    tracing::debug!(side = ?state.current_side(), planned = actions.len(), "turn planned");
    TurnScript::new(actions)
}

fn commit(state: &mut GameState, actions: &mut Vec<Action>, action: Action) {
    actions.push(action);
    apply(state, action);
}

/// Pass 1: every friendly cell with free units drops one unit into each
/// adjacent neutral cell.
fn expand(state: &mut GameState, actions: &mut Vec<Action>) {
    let side = state.current_side();
    for i in 0..state.grid.len() {
        let cell = &state.grid.cells[i];
        if !cell.alive() || cell.side != side {
            continue;
        }
        let neighbors: Vec<usize> = state.grid.neighbors(i).to_vec();
        for n in neighbors {
            if state.grid.cells[i].units_free == 0 {
                break;
            }
            let target = &state.grid.cells[n];
            if target.alive() && target.side.is_neutral() {
                commit(state, actions, Action::Move { from: i, to: n, units: 1 });
            }
        }
    }
}

/// A building on the cell or any neighbor makes the spot unattractive for
/// another one.
fn building_nearby(grid: &HexGrid, index: usize) -> bool {
    grid.cells[index].has_building()
        || grid
            .neighbors(index)
            .iter()
            .any(|&n| grid.cells[n].has_building())
}

fn harvester_nearby(grid: &HexGrid, index: usize) -> bool {
    grid.cells[index].harvester
        || grid
            .neighbors(index)
            .iter()
            .any(|&n| grid.cells[n].harvester)
}

/// Pass 2: bring every blob up to two harvesters, spaced away from
/// existing buildings, while the budget lasts.
fn place_harvesters(state: &mut GameState, actions: &mut Vec<Action>) {
    let side = state.current_side();
    for island in analyze(&state.grid) {
        for blob in island.blobs.iter().filter(|b| b.side == side) {
            let mut harvesters = blob.harvesters;
            for &cell in &blob.cells {
                if harvesters >= 2 || !state.current_controller().can_afford(COST_HARVESTER) {
                    break;
                }
                if building_nearby(&state.grid, cell) {
                    continue;
                }
                commit(state, actions, Action::BuildHarvester { cell });
                harvesters += 1;
            }
        }
    }
}

/// Pass 3: one armory per blob, on the highest-level cell clear of
/// harvesters.
fn place_armories(state: &mut GameState, actions: &mut Vec<Action>) {
    let side = state.current_side();
    for island in analyze(&state.grid) {
        for blob in island.blobs.iter().filter(|b| b.side == side) {
            if blob.armories > 0 || !state.current_controller().can_afford(COST_ARMORY) {
                continue;
            }
            let mut site: Option<usize> = None;
            for &cell in &blob.cells {
                if harvester_nearby(&state.grid, cell) || state.grid.cells[cell].armory {
                    continue;
                }
                if site.map_or(true, |s| {
                    state.grid.cells[cell].level > state.grid.cells[s].level
                }) {
                    site = Some(cell);
                }
            }
            if let Some(cell) = site {
                commit(state, actions, Action::BuildArmory { cell });
            }
        }
    }
}

/// Walk a stack along the side-blind shortest path toward `goal`, at most
/// the per-turn movement range. Orders obey the same reachability rule as
/// a selected stack: the path is followed through friendly cells only, and
/// a cross-side cell is a legal destination only when it is adjacent to
/// the stack itself.
fn advance_stack(state: &mut GameState, actions: &mut Vec<Action>, from: usize, goal: usize) {
    let units = state.grid.cells[from].units_free;
    if units == 0 || from == goal {
        return;
    }
    let path = state.grid.shortest_path(from, goal);
    if path.is_empty() {
        return;
    }
    let side = state.current_side();
    let mut dest = None;
    for (step, &cell) in path.iter().take(UNIT_MOVE_RANGE as usize).enumerate() {
        if state.grid.cells[cell].side != side {
            if step == 0 {
                dest = Some(cell);
            }
            break;
        }
        dest = Some(cell);
    }
    let Some(dest) = dest else { return };
    if state.can_move_or_attack(from, dest).is_ok() {
        commit(state, actions, Action::Move { from, to: dest, units });
    }
}

/// Pass 4: in every contested island, press the attack when the friendly
/// blob outnumbers the enemy; otherwise turn the remaining budget into
/// walkers at the island's armories.
fn attack_or_recruit(state: &mut GameState, actions: &mut Vec<Action>) {
    let side = state.current_side();
    for island in analyze(&state.grid) {
        let mine: u32 = island
            .blobs
            .iter()
            .filter(|b| b.side == side)
            .map(Blob::units)
            .sum();
        let theirs: u32 = island
            .blobs
            .iter()
            .filter(|b| b.side != side)
            .map(Blob::units)
            .sum();
        let has_friend = island.blobs.iter().any(|b| b.side == side);
        let has_enemy = island.blobs.iter().any(|b| b.side != side);
        if !has_friend || !has_enemy {
            continue;
        }

        if mine > theirs {
            let enemy_cells: Vec<usize> = island
                .cells
                .iter()
                .copied()
                .filter(|&c| {
                    let cell = &state.grid.cells[c];
                    !cell.side.is_neutral() && cell.side != side
                })
                .collect();
            let stacks: Vec<usize> = island
                .cells
                .iter()
                .copied()
                .filter(|&c| {
                    state.grid.cells[c].side == side && state.grid.cells[c].units_free > 0
                })
                .collect();
            for stack in stacks {
                if let Some(goal) = state.grid.nearest(stack, &enemy_cells) {
                    advance_stack(state, actions, stack, goal);
                }
            }
        } else {
            let armories: Vec<usize> = island
                .cells
                .iter()
                .copied()
                .filter(|&c| state.grid.cells[c].side == side && state.grid.cells[c].armory)
                .collect();
            if armories.is_empty() {
                continue;
            }
            let mut i = 0;
            while state.current_controller().can_afford(COST_WALKER) {
                commit(state, actions, Action::Recruit { cell: armories[i % armories.len()] });
                i += 1;
            }
        }
    }
}

/// Pass 5: fresh analysis, then consolidate. Split friendly blobs on a
/// pacified island regroup toward its highest-level cell; a lone stack on
/// a fully-owned island is shipped by carrier toward the next island
/// worth contesting.
fn regroup_or_ship(state: &mut GameState, actions: &mut Vec<Action>) {
    let side = state.current_side();
    let islands = analyze(&state.grid);

    for island in &islands {
        let mine: Vec<&Blob> = island.blobs.iter().filter(|b| b.side == side).collect();
        if mine.is_empty() || island.blobs.iter().any(|b| b.side != side) {
            continue;
        }

        if mine.len() > 1 {
            let rally = island
                .cells
                .iter()
                .copied()
                .filter(|&c| state.grid.cells[c].side == side)
                .max_by_key(|&c| state.grid.cells[c].level);
            let Some(rally) = rally else { continue };
            let stacks: Vec<usize> = island
                .cells
                .iter()
                .copied()
                .filter(|&c| {
                    c != rally
                        && state.grid.cells[c].side == side
                        && state.grid.cells[c].units_free > 0
                })
                .collect();
            for stack in stacks {
                advance_stack(state, actions, stack, rally);
            }
            continue;
        }

        // Single blob: consider shipping out once the island is fully ours.
        let stacks: Vec<usize> = island
            .cells
            .iter()
            .copied()
            .filter(|&c| state.grid.cells[c].side == side && state.grid.cells[c].units_free > 0)
            .collect();
        let has_neutral = island
            .cells
            .iter()
            .any(|&c| state.grid.cells[c].side.is_neutral());
        if stacks.len() != 1 || has_neutral {
            continue;
        }
        let stack = stacks[0];

        // Landing sites: neutral cells on islands where we hold nothing.
        let landings: Vec<usize> = islands
            .iter()
            .filter(|other| !other.blobs.iter().any(|b| b.side == side))
            .flat_map(|other| other.cells.iter().copied())
            .filter(|&c| state.grid.cells[c].side.is_neutral())
            .collect();
        let Some(dest) = state.grid.nearest(stack, &landings) else {
            continue;
        };

        if state.current_controller().carriers == 0 {
            if !state.current_controller().can_afford(COST_CARRIER) {
                continue;
            }
            commit(state, actions, Action::BuyCarrier);
        }
        if state.can_transport(stack, dest).is_ok() {
            commit(state, actions, Action::Transport { from: stack, to: dest });
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::HexCell;

    fn strip_state(n: usize) -> GameState {
        let cells = (0..n)
            .map(|i| HexCell::new(i, i as f32 * 86.0, 0.0, 50.0, 3))
            .collect();
        GameState::new(HexGrid::new(cells), 2)
    }

    /// Two strips separated by a dead cell: two islands.
    fn split_state() -> GameState {
        let mut state = strip_state(7);
        state.grid.cells[3].level = 0;
        state
    }

    fn give(state: &mut GameState, index: usize, side: Side, free: u32) {
        let cell = &mut state.grid.cells[index];
        cell.side = side;
        cell.units_free = free;
    }

    #[test]
    fn test_analyze_totals() {
        let mut state = split_state();
        give(&mut state, 0, Side::Red, 2);
        give(&mut state, 1, Side::Red, 3);
        give(&mut state, 5, Side::Green, 4);

        let islands = analyze(&state.grid);
        assert_eq!(islands.len(), 2);

        let red = &islands[0].blobs[0];
        assert_eq!(red.side, Side::Red);
        assert_eq!(red.units(), 5);
        assert_eq!(red.cells.len(), 2);

        // The neutral tail of island 0 forms no blob.
        assert_eq!(islands[0].blobs.len(), 1);
        assert_eq!(islands[1].blobs[0].side, Side::Green);
    }

    #[test]
    fn test_expand_claims_neutral_neighbors() {
        let mut state = strip_state(4);
        give(&mut state, 1, Side::Red, 5);

        let mut actions = Vec::new();
        expand(&mut state, &mut actions);

        assert_eq!(
            actions,
            vec![
                Action::Move { from: 1, to: 0, units: 1 },
                Action::Move { from: 1, to: 2, units: 1 },
            ]
        );
        assert_eq!(state.grid.cells[0].side, Side::Red);
        assert_eq!(state.grid.cells[0].units_moved, 1);
        assert_eq!(state.grid.cells[1].units_free, 3);
        // Cell 3 is not adjacent to any stack and stays neutral.
        assert_eq!(state.grid.cells[3].side, Side::Neutral);
    }

    #[test]
    fn test_harvester_pass_builds_up_to_two() {
        let mut state = strip_state(6);
        for i in 0..6 {
            give(&mut state, i, Side::Red, 1);
        }
        state.current_controller_mut().resources = 100;

        let mut actions = Vec::new();
        place_harvesters(&mut state, &mut actions);

        let built: Vec<_> = state
            .grid
            .cells
            .iter()
            .filter(|c| c.harvester)
            .map(|c| c.index)
            .collect();
        assert_eq!(built.len(), 2);
        // Spacing: the second harvester is not adjacent to the first.
        assert_eq!(built, vec![0, 2]);
    }

    #[test]
    fn test_attack_pass_moves_toward_enemy() {
        let mut state = strip_state(6);
        give(&mut state, 0, Side::Red, 6);
        give(&mut state, 1, Side::Red, 0);
        give(&mut state, 2, Side::Red, 0);
        give(&mut state, 5, Side::Green, 2);
        state.current_controller_mut().resources = 0;

        let mut actions = Vec::new();
        attack_or_recruit(&mut state, &mut actions);

        // The advance ends on cell 2, the last friendly cell on the path:
        // the neutral cell 3 is not adjacent to the stack and stays out of
        // reach this turn.
        assert_eq!(actions, vec![Action::Move { from: 0, to: 2, units: 6 }]);
        assert_eq!(state.grid.cells[2].units_moved, 6);
        assert_eq!(state.grid.cells[3].side, Side::Neutral);
    }

    #[test]
    fn test_planned_moves_stay_inside_reachable_sets() {
        let mut state = strip_state(6);
        give(&mut state, 0, Side::Red, 6);
        give(&mut state, 1, Side::Red, 0);
        give(&mut state, 2, Side::Red, 0);
        give(&mut state, 5, Side::Green, 2);
        state.current_controller_mut().resources = 0;

        let reachable = state.grid.bfs_reachable(0, UNIT_MOVE_RANGE, false, true);
        let script = plan_turn(&mut state);

        // Every order the planner issues for the stack must target a cell
        // a selected stack would have marked.
        for action in script.actions() {
            if let Action::Move { from: 0, to, .. } = *action {
                assert!(
                    reachable.contains(&to),
                    "stack 0 ordered to {to}, outside {reachable:?}"
                );
            }
        }
    }

    #[test]
    fn test_outnumbered_side_recruits_instead() {
        let mut state = strip_state(5);
        give(&mut state, 0, Side::Red, 2);
        give(&mut state, 4, Side::Green, 9);
        state.grid.cells[0].armory = true;
        state.current_controller_mut().resources = COST_WALKER * 2 + 1;

        let mut actions = Vec::new();
        attack_or_recruit(&mut state, &mut actions);

        assert_eq!(
            actions,
            vec![Action::Recruit { cell: 0 }, Action::Recruit { cell: 0 }]
        );
        assert_eq!(state.grid.cells[0].units_moved, 2);
        assert!(state.current_controller().resources < COST_WALKER);
    }

    #[test]
    fn test_regroup_toward_highest_level() {
        let mut state = strip_state(5);
        give(&mut state, 0, Side::Red, 3);
        give(&mut state, 4, Side::Red, 2);
        state.grid.cells[4].level = 7;
        // Neutral gap keeps the two stacks in separate blobs.

        let mut actions = Vec::new();
        regroup_or_ship(&mut state, &mut actions);

        assert!(actions
            .iter()
            .all(|a| matches!(a, Action::Move { .. })));
        assert!(!actions.is_empty());
        // The western stack marches east, not the other way around.
        assert!(matches!(actions[0], Action::Move { from: 0, .. }));
    }

    #[test]
    fn test_lone_stack_ships_out() {
        let mut state = split_state();
        for i in 0..3 {
            give(&mut state, i, Side::Red, 0);
        }
        state.grid.cells[1].units_free = 4;
        give(&mut state, 6, Side::Green, 2);
        state.current_controller_mut().resources = COST_CARRIER;

        let mut actions = Vec::new();
        regroup_or_ship(&mut state, &mut actions);

        assert_eq!(
            actions,
            vec![Action::BuyCarrier, Action::Transport { from: 1, to: 4 }]
        );
        assert_eq!(state.current_controller().carriers, 1);
        assert_eq!(state.grid.cells[4].units_moved, 4);
    }

    #[test]
    fn test_plan_leaves_state_untouched() {
        let mut state = strip_state(6);
        give(&mut state, 0, Side::Red, 5);
        give(&mut state, 5, Side::Green, 2);
        state.set_ai(Side::Red, true);

        let pristine_cells = state.grid.cells.clone();
        let pristine_controller = state.current_controller().clone();

        let script = plan_turn(&mut state);
        assert!(!script.actions().is_empty());
        assert_eq!(state.grid.cells, pristine_cells);
        assert_eq!(*state.current_controller(), pristine_controller);
        assert_eq!(state.undo_depth(), 0);
    }

    #[test]
    fn test_replay_pacing_is_cosmetic() {
        let mut state = strip_state(6);
        give(&mut state, 0, Side::Red, 5);
        give(&mut state, 5, Side::Green, 2);

        let script = plan_turn(&mut state);

        let mut stepped = state.clone();
        let mut ticker = script.clone();
        while ticker.step(&mut stepped).is_some() {}

        let mut skipped = state.clone();
        let mut runner = script.clone();
        runner.run_all(&mut skipped);

        assert_eq!(stepped.grid.cells, skipped.grid.cells);
        assert_eq!(stepped.controllers(), skipped.controllers());
    }
}
