//! HEXFIELD Core - Simulation engine
//!
//! This crate provides the rule core for HEXFIELD, a turn-based hex
//! territory game:
//! - Hex cells, sides and grid adjacency
//! - Connectivity search (reachability, islands, blobs, paths)
//! - Turn economy and combat resolution
//! - Full-state snapshot undo
//! - Pending-action selection state machine
//! - Rule-based AI planner with record-and-replay turns
//! - Map save/load and generation

pub mod cell;
pub mod grid;
pub mod game;
pub mod action;
pub mod undo;
pub mod ai;
pub mod map;

// Re-exports for convenient access
pub use cell::{HexCell, Side, PLAYABLE_SIDES};
pub use grid::HexGrid;
pub use game::{Controller, GameState, RulesError};
pub use action::PendingAction;
pub use undo::{Snapshot, SnapshotStack};
pub use ai::{analyze, plan_turn, Action, Blob, Island, TurnScript};
pub use map::{generate, load, save, MapError};
