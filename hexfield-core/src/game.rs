//! Game state, turn economy and combat resolution

use crate::action::PendingAction;
use crate::cell::{HexCell, Side, PLAYABLE_SIDES};
use crate::grid::HexGrid;
use crate::undo::SnapshotStack;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// RULE CONSTANTS
// ============================================================================

/// Resources granted per harvested cell
pub const HARVEST_REWARD: u32 = 1;

/// BFS range of a movement order
pub const UNIT_MOVE_RANGE: u32 = 3;

/// Hard cap on units transferred by a single order
pub const MAX_UNITS_MOVED: u32 = 8;

/// Cannon annulus, scaled by the firing cell's inscribed radius.
/// Both comparisons are strict; legacy behavior, keep exact.
pub const CANNON_MIN_RANGE: f32 = 2.0;
pub const CANNON_MAX_RANGE: f32 = 6.0;

/// Units destroyed per cannon hit, free pool first
pub const CANNON_KILLS: u32 = 3;

pub const COST_HARVESTER: u32 = 10;
pub const COST_ARMORY: u32 = 15;
pub const COST_CANNON: u32 = 20;
pub const COST_AMMO: u32 = 5;
pub const COST_WALKER: u32 = 5;
pub const COST_CARRIER: u32 = 25;

pub const STARTING_RESOURCES: u32 = 20;

// ============================================================================
// ERRORS
// ============================================================================

/// Player-recoverable refusals. These reset the pending mode and surface a
/// one-line message; nothing mutates and no snapshot is pushed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RulesError {
    #[error("not enough resources ({needed} needed, {have} available)")]
    InsufficientResources { needed: u32, have: u32 },
    #[error("that cell is not yours")]
    NotOwned,
    #[error("that cell is dead")]
    DeadCell,
    #[error("no free units on that cell")]
    NoFreeUnits,
    #[error("that cell already has this building")]
    AlreadyBuilt,
    #[error("no harvester on that cell")]
    NoHarvester,
    #[error("no armory on that cell")]
    NoArmory,
    #[error("no cannon on that cell")]
    NoCannon,
    #[error("cannon has no ready ammo")]
    NoAmmo,
    #[error("ammo already loaded or ready")]
    AmmoPending,
    #[error("target out of range")]
    OutOfRange,
    #[error("no carrier available")]
    NoCarrier,
    #[error("target must be friendly or neutral")]
    HostileTarget,
    #[error("not a legal target for the current order")]
    InvalidTarget,
}

// ============================================================================
// CONTROLLERS
// ============================================================================

/// One faction's seat at the table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Controller {
    pub side: Side,
    pub resources: u32,
    pub carriers: u32,
    pub is_ai: bool,
}

impl Controller {
    pub fn new(side: Side, resources: u32) -> Self {
        Self {
            side,
            resources,
            carriers: 0,
            is_ai: false,
        }
    }

    pub fn can_afford(&self, cost: u32) -> bool {
        self.resources >= cost
    }

    /// Debit a cost. Sufficiency must have been validated upstream.
    pub fn pay(&mut self, cost: u32) {
        assert!(
            self.resources >= cost,
            "controller {:?} paying {} with only {}",
            self.side,
            cost,
            self.resources
        );
        self.resources -= cost;
    }

    pub fn earn(&mut self, amount: u32) {
        self.resources += amount;
    }
}

// ============================================================================
// GAME STATE
// ============================================================================

/// The whole mutable simulation: grid, controllers, turn rotation, pending
/// action mode, selection, undo stack and the user-message queue. Passed
/// explicitly into everything; there are no globals.
#[derive(Clone, Debug)]
pub struct GameState {
    pub grid: HexGrid,
    controllers: Vec<Controller>,
    current: usize,
    pub(crate) pending: PendingAction,
    active: Option<usize>,
    marked: Vec<usize>,
    pub(crate) snapshots: SnapshotStack,
    messages: Vec<String>,
    /// Units requested per movement order; clamped by free units and
    /// MAX_UNITS_MOVED at resolution time
    moving_units: u32,
    winner: Option<Side>,
    pub turn: u32,
}

impl GameState {
    /// Create a game over a loaded grid with the first `sides` playable
    /// factions seated in turn order.
    pub fn new(grid: HexGrid, sides: usize) -> Self {
        assert!(sides <= PLAYABLE_SIDES.len(), "2 to 4 factions required");
        Self::with_sides(grid, &PLAYABLE_SIDES[..sides])
    }

    /// Create a game seating exactly the given factions, in the given
    /// order. The seats must match the factions actually holding cells on
    /// the map, or absent ones are declared defeated at the first boundary.
    pub fn with_sides(grid: HexGrid, sides: &[Side]) -> Self {
        assert!((2..=4).contains(&sides.len()), "2 to 4 factions required");
        assert!(
            sides.iter().all(|s| !s.is_neutral()),
            "neutral holds no seat"
        );
        let controllers = sides
            .iter()
            .map(|&side| Controller::new(side, STARTING_RESOURCES))
            .collect();
        Self {
            grid,
            controllers,
            current: 0,
            pending: PendingAction::MovingUnits,
            active: None,
            marked: Vec::new(),
            snapshots: SnapshotStack::default(),
            messages: Vec::new(),
            moving_units: 1,
            winner: None,
            turn: 1,
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn controllers(&self) -> &[Controller] {
        &self.controllers
    }

    pub fn current_controller(&self) -> &Controller {
        &self.controllers[self.current]
    }

    pub fn current_controller_mut(&mut self) -> &mut Controller {
        &mut self.controllers[self.current]
    }

    pub fn current_side(&self) -> Side {
        self.controllers[self.current].side
    }

    pub fn controller(&self, side: Side) -> Option<&Controller> {
        self.controllers.iter().find(|c| c.side == side)
    }

    pub fn set_ai(&mut self, side: Side, is_ai: bool) {
        if let Some(c) = self.controllers.iter_mut().find(|c| c.side == side) {
            c.is_ai = is_ai;
        }
    }

    pub fn winner(&self) -> Option<Side> {
        self.winner
    }

    pub fn moving_units(&self) -> u32 {
        self.moving_units
    }

    pub fn set_moving_units(&mut self, count: u32) {
        assert!(count >= 1, "an order moves at least one unit");
        self.moving_units = count;
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn marked(&self) -> &[usize] {
        &self.marked
    }

    /// Queue a one-line user-facing message.
    pub fn message(&mut self, text: impl Into<String>) {
        self.messages.push(text.into());
    }

    /// Hand queued messages to the presentation layer.
    pub fn drain_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }

    // ========================================================================
    // SELECTION
    // ========================================================================

    pub fn set_active(&mut self, index: Option<usize>) {
        if let Some(old) = self.active {
            self.grid.cells[old].active = false;
        }
        if let Some(new) = index {
            self.grid.cells[new].active = true;
        }
        self.active = index;
    }

    pub fn set_marked(&mut self, indices: Vec<usize>) {
        for &old in &self.marked {
            self.grid.cells[old].marked = false;
        }
        for &new in &indices {
            self.grid.cells[new].marked = true;
        }
        self.marked = indices;
    }

    pub fn clear_selection(&mut self) {
        self.set_active(None);
        self.set_marked(Vec::new());
    }

    // ========================================================================
    // SNAPSHOT / UNDO
    // ========================================================================

    /// Push a full value copy of the grid and the acting controller.
    /// Called immediately before every mutating player action.
    pub fn store_current_state(&mut self) {
        let controller = self.controllers[self.current].clone();
        self.snapshots.push(&self.grid.cells, &controller);
    }

    /// Restore the most recent snapshot, if any. Clears selection.
    pub fn undo(&mut self) {
        if let Some(snapshot) = self.snapshots.pop() {
            self.grid.cells = snapshot.cells;
            self.controllers[self.current] = snapshot.controller;
            // The restored cells may carry selection flags from before the
            // action; drop them together with the live selection.
            self.active = None;
            self.marked.clear();
            for cell in &mut self.grid.cells {
                cell.active = false;
                cell.marked = false;
            }
            tracing::debug!(remaining = self.snapshots.len(), "undo");
        }
    }

    pub fn undo_depth(&self) -> usize {
        self.snapshots.len()
    }

    // ========================================================================
    // VALIDATION (tier 1 -- player-recoverable)
    // ========================================================================

    fn owned_living(&self, index: usize) -> Result<(), RulesError> {
        let cell = &self.grid.cells[index];
        if !cell.alive() {
            return Err(RulesError::DeadCell);
        }
        if cell.side != self.current_side() {
            return Err(RulesError::NotOwned);
        }
        Ok(())
    }

    fn affordable(&self, cost: u32) -> Result<(), RulesError> {
        let have = self.current_controller().resources;
        if have < cost {
            return Err(RulesError::InsufficientResources { needed: cost, have });
        }
        Ok(())
    }

    pub fn can_move_or_attack(&self, from: usize, to: usize) -> Result<(), RulesError> {
        if from == to {
            return Err(RulesError::InvalidTarget);
        }
        self.owned_living(from)?;
        if !self.grid.cells[to].alive() {
            return Err(RulesError::DeadCell);
        }
        if self.grid.cells[from].units_free == 0 {
            return Err(RulesError::NoFreeUnits);
        }
        Ok(())
    }

    pub fn can_build_harvester(&self, cell: usize) -> Result<(), RulesError> {
        self.owned_living(cell)?;
        if self.grid.cells[cell].harvester {
            return Err(RulesError::AlreadyBuilt);
        }
        self.affordable(COST_HARVESTER)
    }

    pub fn can_build_armory(&self, cell: usize) -> Result<(), RulesError> {
        self.owned_living(cell)?;
        if self.grid.cells[cell].armory {
            return Err(RulesError::AlreadyBuilt);
        }
        self.affordable(COST_ARMORY)
    }

    pub fn can_build_cannon(&self, cell: usize) -> Result<(), RulesError> {
        self.owned_living(cell)?;
        if self.grid.cells[cell].cannon {
            return Err(RulesError::AlreadyBuilt);
        }
        self.affordable(COST_CANNON)
    }

    pub fn can_add_cannon_ammo(&self, cell: usize) -> Result<(), RulesError> {
        self.owned_living(cell)?;
        let c = &self.grid.cells[cell];
        if !c.cannon {
            return Err(RulesError::NoCannon);
        }
        if c.ammo || c.loaded_ammo {
            return Err(RulesError::AmmoPending);
        }
        self.affordable(COST_AMMO)
    }

    pub fn can_fire_cannon(&self, from: usize, to: usize) -> Result<(), RulesError> {
        self.owned_living(from)?;
        let firer = &self.grid.cells[from];
        if !firer.cannon {
            return Err(RulesError::NoCannon);
        }
        if !firer.ammo {
            return Err(RulesError::NoAmmo);
        }
        let target = &self.grid.cells[to];
        if !target.alive() {
            return Err(RulesError::DeadCell);
        }
        if !self.cannon_in_range(from, to) {
            return Err(RulesError::OutOfRange);
        }
        Ok(())
    }

    pub fn can_destroy_harvester(&self, cell: usize) -> Result<(), RulesError> {
        self.owned_living(cell)?;
        if !self.grid.cells[cell].harvester {
            return Err(RulesError::NoHarvester);
        }
        Ok(())
    }

    pub fn can_build_walker(&self, cell: usize) -> Result<(), RulesError> {
        self.owned_living(cell)?;
        if !self.grid.cells[cell].armory {
            return Err(RulesError::NoArmory);
        }
        self.affordable(COST_WALKER)
    }

    pub fn can_build_carrier(&self, cell: usize) -> Result<(), RulesError> {
        self.owned_living(cell)?;
        self.affordable(COST_CARRIER)
    }

    pub fn can_transport(&self, from: usize, to: usize) -> Result<(), RulesError> {
        self.owned_living(from)?;
        if self.current_controller().carriers == 0 {
            return Err(RulesError::NoCarrier);
        }
        if self.grid.cells[from].units_free == 0 {
            return Err(RulesError::NoFreeUnits);
        }
        let target = &self.grid.cells[to];
        if !target.alive() {
            return Err(RulesError::DeadCell);
        }
        if !target.side.is_neutral() && target.side != self.current_side() {
            return Err(RulesError::HostileTarget);
        }
        Ok(())
    }

    /// The legacy annulus check: strictly greater than the inner bound and
    /// strictly less than the outer bound, both scaled by the firer's
    /// inscribed radius. The boundary asymmetry is defined behavior.
    pub fn cannon_in_range(&self, from: usize, to: usize) -> bool {
        let firer = &self.grid.cells[from];
        let dist = firer.distance_to(&self.grid.cells[to]);
        dist > CANNON_MIN_RANGE * firer.r && dist < CANNON_MAX_RANGE * firer.r
    }

    // ========================================================================
    // RESOLUTION (tier 2 -- preconditions are asserted)
    // ========================================================================

    fn cells_pair_mut(&mut self, a: usize, b: usize) -> (&mut HexCell, &mut HexCell) {
        assert_ne!(a, b);
        let cells = &mut self.grid.cells;
        if a < b {
            let (lo, hi) = cells.split_at_mut(b);
            (&mut lo[a], &mut hi[0])
        } else {
            let (lo, hi) = cells.split_at_mut(a);
            (&mut hi[0], &mut lo[b])
        }
    }

    /// Move units onto a friendly or neutral cell, or attack a hostile one.
    ///
    /// `moved = min(moving_units, attacker free, MAX_UNITS_MOVED)`.
    /// Friendly/neutral: the stack lands in the target's moved pool and the
    /// target takes the attacker's side. Hostile: conquest if `moved`
    /// covers the garrison (surplus becomes the new moved pool), attrition
    /// drawn free-first otherwise.
    pub fn move_or_attack(&mut self, from: usize, to: usize) {
        let order = self.moving_units;
        let (attacker, defender) = self.cells_pair_mut(from, to);
        assert!(attacker.alive() && defender.alive(), "move between dead cells");

        let moved = order.min(attacker.units_free).min(MAX_UNITS_MOVED);
        assert!(moved > 0, "move_or_attack with no movable units");

        let side = attacker.side;
        if defender.side == side || defender.side.is_neutral() {
            attacker.units_free -= moved;
            defender.units_moved += moved;
            defender.side = side;
            tracing::debug!(?side, from, to, moved, "transfer");
        } else {
            let garrison = defender.units();
            attacker.units_free -= moved;
            if moved >= garrison {
                defender.side = side;
                defender.units_free = 0;
                defender.units_moved = moved - garrison;
                tracing::debug!(?side, from, to, moved, garrison, "conquered");
            } else {
                let from_free = moved.min(defender.units_free);
                defender.units_free -= from_free;
                defender.units_moved -= moved - from_free;
                tracing::debug!(?side, from, to, moved, garrison, "attrition");
            }
        }
    }

    pub fn build_harvester(&mut self, cell: usize) {
        assert!(!self.grid.cells[cell].harvester, "harvester already present");
        self.current_controller_mut().pay(COST_HARVESTER);
        self.grid.cells[cell].harvester = true;
        tracing::debug!(cell, "built harvester");
    }

    pub fn build_armory(&mut self, cell: usize) {
        assert!(!self.grid.cells[cell].armory, "armory already present");
        self.current_controller_mut().pay(COST_ARMORY);
        self.grid.cells[cell].armory = true;
        tracing::debug!(cell, "built armory");
    }

    pub fn build_cannon(&mut self, cell: usize) {
        assert!(!self.grid.cells[cell].cannon, "cannon already present");
        self.current_controller_mut().pay(COST_CANNON);
        self.grid.cells[cell].cannon = true;
        tracing::debug!(cell, "built cannon");
    }

    /// Load a shell. It rides as `loaded_ammo` until the owner's next
    /// settlement, mirroring the free/moved unit pattern.
    pub fn add_cannon_ammo(&mut self, cell: usize) {
        let c = &self.grid.cells[cell];
        assert!(c.cannon, "loading ammo without a cannon");
        assert!(!c.ammo && !c.loaded_ammo, "ammo already loaded or ready");
        self.current_controller_mut().pay(COST_AMMO);
        self.grid.cells[cell].loaded_ammo = true;
        tracing::debug!(cell, "loaded ammo");
    }

    /// Fire a ready shell: one level of damage plus up to CANNON_KILLS
    /// units destroyed, free pool first.
    pub fn fire_cannon(&mut self, from: usize, to: usize) {
        assert!(self.grid.cells[from].cannon, "firing without a cannon");
        assert!(self.grid.cells[from].ammo, "firing a spent cannon");
        self.grid.cells[from].ammo = false;

        let target = &mut self.grid.cells[to];
        target.level -= 1;
        let from_free = CANNON_KILLS.min(target.units_free);
        target.units_free -= from_free;
        let spill = (CANNON_KILLS - from_free).min(target.units_moved);
        target.units_moved -= spill;
        tracing::debug!(from, to, killed = from_free + spill, "cannon fired");
    }

    /// Tear a harvester down, harvesting its neighborhood one last time.
    pub fn destroy_harvester(&mut self, cell: usize) {
        assert!(self.grid.cells[cell].harvester, "no harvester to destroy");
        for c in &mut self.grid.cells {
            c.harvested = false;
        }
        let reward = self.harvest_neighborhood(cell);
        self.current_controller_mut().earn(reward);
        self.grid.cells[cell].harvester = false;
        tracing::debug!(cell, reward, "harvester destroyed");
    }

    /// Recruit one walker at an armory. It lands in the moved pool and is
    /// orderable from the next turn on.
    pub fn build_walker(&mut self, cell: usize) {
        assert!(self.grid.cells[cell].armory, "recruiting without an armory");
        self.current_controller_mut().pay(COST_WALKER);
        self.grid.cells[cell].units_moved += 1;
        tracing::debug!(cell, "recruited walker");
    }

    pub fn build_carrier(&mut self) {
        self.current_controller_mut().pay(COST_CARRIER);
        self.current_controller_mut().carriers += 1;
        tracing::debug!("bought carrier");
    }

    /// Ship a whole free stack across water to a friendly or neutral cell.
    /// The carrier is a capability, not a consumable.
    pub fn transport(&mut self, from: usize, to: usize) {
        assert!(self.current_controller().carriers > 0, "transport without a carrier");
        let (source, target) = self.cells_pair_mut(from, to);
        assert!(source.alive() && target.alive(), "transport between dead cells");
        let stack = source.units_free;
        assert!(stack > 0, "transport with no free units");
        source.units_free = 0;
        target.units_moved += stack;
        target.side = source.side;
        tracing::debug!(from, to, stack, "transported");
    }

    // ========================================================================
    // TURN ECONOMY
    // ========================================================================

    /// Harvest every neighborhood around the current side's harvesters.
    /// Runs once per turn, before free-unit settlement. The `harvested`
    /// marks are reset only at the turn boundary, so a repeated call within
    /// the same turn harvests nothing.
    pub fn harvest(&mut self) {
        let side = self.current_side();
        let mut reward = 0;
        for i in 0..self.grid.len() {
            let cell = &self.grid.cells[i];
            if cell.alive() && cell.harvester && cell.side == side {
                reward += self.harvest_neighborhood(i);
            }
        }
        if reward > 0 {
            tracing::debug!(?side, reward, "harvest");
        }
        self.current_controller_mut().earn(reward);
    }

    /// Harvest one cell and its living, un-harvested neighbors. Returns the
    /// resources earned.
    fn harvest_neighborhood(&mut self, index: usize) -> u32 {
        let mut reward = 0;
        let neighbors: Vec<usize> = self.grid.neighbors(index).to_vec();
        let cell = &mut self.grid.cells[index];
        if cell.alive() && !cell.harvested {
            cell.harvest();
            reward += HARVEST_REWARD;
        }
        for n in neighbors {
            let neighbor = &mut self.grid.cells[n];
            if neighbor.alive() && !neighbor.harvested {
                neighbor.harvest();
                reward += HARVEST_REWARD;
            }
        }
        reward
    }

    /// Start-of-turn settlement for the entering controller: moved units
    /// become free, loaded shells become ready.
    pub fn free_units(&mut self) {
        let side = self.current_side();
        for cell in &mut self.grid.cells {
            if cell.side != side {
                continue;
            }
            cell.units_free += cell.units_moved;
            cell.units_moved = 0;
            if cell.loaded_ammo {
                cell.loaded_ammo = false;
                cell.ammo = true;
            }
        }
    }

    /// A side is defeated when no living cell of that side holds a unit.
    pub fn side_defeated(&self, side: Side) -> bool {
        !self
            .grid
            .cells
            .iter()
            .any(|c| c.alive() && c.side == side && c.units() > 0)
    }

    /// Dead cells hold nothing once the turn settles, and a living cell
    /// keeps a faction only while units or buildings remain on it.
    fn settle_cells(&mut self) {
        for cell in &mut self.grid.cells {
            if cell.level <= 0 {
                cell.clear_contents();
            } else if cell.units() == 0 && !cell.has_building() {
                cell.side = Side::Neutral;
            }
        }
    }

    /// Close the current turn: check defeats, rotate to the next undefeated
    /// controller, run its harvest and settlement, settle the cells, and
    /// clear the undo stack (undo is intra-turn only).
    ///
    /// Cell settlement runs last so cells killed by the incoming harvest
    /// empty out immediately and cells abandoned during the turn drop
    /// their faction; the defeat check only ever counts living cells, so
    /// its position does not depend on the settlement.
    pub fn end_turn(&mut self) {
        let survivors: Vec<Side> = self
            .controllers
            .iter()
            .map(|c| c.side)
            .filter(|&s| !self.side_defeated(s))
            .collect();
        if survivors.len() == 1 {
            self.winner = Some(survivors[0]);
            tracing::info!(winner = ?survivors[0], "game over");
        }

        if !survivors.is_empty() {
            loop {
                self.current = (self.current + 1) % self.controllers.len();
                if survivors.contains(&self.controllers[self.current].side) {
                    break;
                }
            }
        }

        for cell in &mut self.grid.cells {
            cell.harvested = false;
        }
        self.harvest();
        self.free_units();
        self.settle_cells();

        self.snapshots.clear();
        self.clear_selection();
        self.pending = PendingAction::MovingUnits;
        self.moving_units = 1;
        self.turn += 1;
        tracing::debug!(turn = self.turn, side = ?self.current_side(), "turn started");
    }
}

// ============================================================================
// TESTS
// ============================================================================
