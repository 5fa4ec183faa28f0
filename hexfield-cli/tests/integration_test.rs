//! Integration tests for the HEXFIELD simulation core
//!
//! Drives the full stack the way the CLI does: map generation and
//! persistence, AI planning with record-and-replay, and turn rotation.

use hexfield_core::{
    ai, map,
    cell::Side,
    game::GameState,
    PLAYABLE_SIDES,
};
use std::fs::File;
use std::io::{BufReader, BufWriter};

// ============================================================================
// TEST FIXTURES
// ============================================================================

/// A deterministic two-player game on a generated board.
fn seeded_game(seed: u64) -> GameState {
    let grid = map::generate(8, 5, 2, seed);
    let mut state = GameState::new(grid, 2);
    for &side in &PLAYABLE_SIDES[..2] {
        state.set_ai(side, true);
    }
    state
}

/// Run one full AI turn: plan, replay, end.
fn play_turn(state: &mut GameState) {
    let mut script = ai::plan_turn(state);
    script.run_all(state);
    state.end_turn();
}

// ============================================================================
// FULL GAME
// ============================================================================

#[test]
fn test_ai_game_runs_and_keeps_invariants() {
    let mut state = seeded_game(11);

    for _ in 0..40 {
        if state.winner().is_some() {
            break;
        }
        play_turn(&mut state);

        // Undo is strictly intra-turn.
        assert_eq!(state.undo_depth(), 0);

        // Settled dead cells hold nothing.
        for cell in &state.grid.cells {
            if cell.level <= 0 {
                assert_eq!(cell.units(), 0, "dead cell {} holds units", cell.index);
                assert!(!cell.has_building(), "dead cell {} holds buildings", cell.index);
                assert_eq!(cell.side, Side::Neutral);
            }
        }

        // Resources never go negative by construction; carriers only grow
        // through purchases.
        for controller in state.controllers() {
            assert!(controller.carriers <= 4);
        }
    }
}

#[test]
fn test_identical_seeds_play_identical_games() {
    let mut first = seeded_game(23);
    let mut second = seeded_game(23);

    for _ in 0..15 {
        play_turn(&mut first);
        play_turn(&mut second);
    }

    assert_eq!(first.grid.cells, second.grid.cells);
    assert_eq!(first.controllers(), second.controllers());
    assert_eq!(first.winner(), second.winner());
}

#[test]
fn test_planning_never_leaks_into_live_state() {
    let mut state = seeded_game(5);

    for _ in 0..5 {
        let before_cells = state.grid.cells.clone();
        let before_controller = state.current_controller().clone();

        let script = ai::plan_turn(&mut state);

        assert_eq!(state.grid.cells, before_cells);
        assert_eq!(*state.current_controller(), before_controller);

        let mut replay = script;
        replay.run_all(&mut state);
        state.end_turn();
    }
}

#[test]
fn test_game_seats_the_factions_actually_on_the_map() {
    let mut grid = map::generate(8, 5, 2, 17);
    for cell in &mut grid.cells {
        if cell.side == Side::Green {
            cell.side = Side::Blue;
        }
    }

    let sides: Vec<Side> = PLAYABLE_SIDES
        .iter()
        .copied()
        .filter(|&side| grid.cells.iter().any(|c| c.side == side))
        .collect();
    assert_eq!(sides, vec![Side::Red, Side::Blue]);

    let mut state = GameState::with_sides(grid, &sides);
    for &side in &sides {
        state.set_ai(side, true);
    }

    // Both seats hold units, so closing Red's turn defeats nobody and
    // hands the board to Blue, not to an absent Green.
    play_turn(&mut state);
    assert_eq!(state.winner(), None);
    assert_eq!(state.current_controller().side, Side::Blue);
}

// ============================================================================
// MAP PERSISTENCE
// ============================================================================

#[test]
fn test_map_round_trip_through_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("battle.map");

    let grid = map::generate(10, 6, 3, 99);
    map::save(BufWriter::new(File::create(&path).unwrap()), &grid).unwrap();

    let loaded = map::load(BufReader::new(File::open(&path).unwrap()), false).unwrap();
    assert_eq!(loaded.cells, grid.cells);

    // Pruned load on a board with no dead cells is identical too.
    let pruned = map::load(BufReader::new(File::open(&path).unwrap()), true).unwrap();
    assert_eq!(pruned.len(), grid.len());
}

#[test]
fn test_game_on_saved_map_matches_game_on_original() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("battle.map");

    let grid = map::generate(8, 5, 2, 31);
    map::save(BufWriter::new(File::create(&path).unwrap()), &grid).unwrap();
    let loaded = map::load(BufReader::new(File::open(&path).unwrap()), true).unwrap();

    let mut original = GameState::new(grid, 2);
    let mut restored = GameState::new(loaded, 2);

    for _ in 0..10 {
        play_turn(&mut original);
        play_turn(&mut restored);
    }
    assert_eq!(original.grid.cells, restored.grid.cells);
}
