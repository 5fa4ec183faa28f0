//! Map persistence and generation
//!
//! The on-disk format is plain whitespace-delimited text: a count line,
//! then one record per cell. Loading with pruning drops dead cells and
//! renumbers densely before the adjacency table is built; editor mode
//! keeps every placeholder.

use crate::cell::{HexCell, Side, PLAYABLE_SIDES};
use crate::grid::HexGrid;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::io::{BufRead, Write};
use thiserror::Error;

/// Fields per cell record
const RECORD_FIELDS: usize = 17;

/// Hexagon side length used by the generator
const HEX_SIDE: f32 = 50.0;

/// Free units placed on each faction's home cell
const HOME_UNITS: u32 = 3;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: expected {RECORD_FIELDS} fields, found {found}")]
    FieldCount { line: usize, found: usize },
    #[error("line {line}: malformed value {value:?}")]
    Malformed { line: usize, value: String },
    #[error("line {line}: invalid side value {value}")]
    InvalidSide { line: usize, value: i32 },
    #[error("cell count mismatch: header says {expected}, found {found}")]
    CountMismatch { expected: usize, found: usize },
}

fn field<T: std::str::FromStr>(token: &str, line: usize) -> Result<T, MapError> {
    token.parse().map_err(|_| MapError::Malformed {
        line,
        value: token.to_string(),
    })
}

fn flag(token: &str, line: usize) -> Result<bool, MapError> {
    match token {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(MapError::Malformed {
            line,
            value: other.to_string(),
        }),
    }
}

/// Parse a map. With `prune` set, cells below level 1 are discarded and the
/// survivors renumbered 0..M-1; adjacency is generated either way.
pub fn load(reader: impl BufRead, prune: bool) -> Result<HexGrid, MapError> {
    let mut lines = reader.lines().enumerate();

    let expected: usize = match lines.next() {
        Some((line, text)) => field(text?.trim(), line + 1)?,
        None => {
            return Err(MapError::CountMismatch {
                expected: 0,
                found: 0,
            })
        }
    };

    let mut cells = Vec::with_capacity(expected);
    for (index, (line, text)) in lines.take(expected).enumerate() {
        let line = line + 1;
        let text = text?;
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.len() != RECORD_FIELDS {
            return Err(MapError::FieldCount {
                line,
                found: tokens.len(),
            });
        }

        let side_value: i32 = field(tokens[16], line)?;
        let side = Side::try_from(side_value)
            .map_err(|e| MapError::InvalidSide { line, value: e.0 })?;

        let cell = HexCell {
            index,
            level: field(tokens[1], line)?,
            side,
            a: field(tokens[2], line)?,
            r: field(tokens[3], line)?,
            active: flag(tokens[4], line)?,
            marked: flag(tokens[5], line)?,
            cx: field(tokens[6], line)?,
            cy: field(tokens[7], line)?,
            harvester: flag(tokens[8], line)?,
            harvested: flag(tokens[9], line)?,
            armory: flag(tokens[10], line)?,
            cannon: flag(tokens[11], line)?,
            ammo: flag(tokens[12], line)?,
            loaded_ammo: flag(tokens[13], line)?,
            units_free: field(tokens[14], line)?,
            units_moved: field(tokens[15], line)?,
        };
        cells.push(cell);
    }

    if cells.len() != expected {
        return Err(MapError::CountMismatch {
            expected,
            found: cells.len(),
        });
    }

    if prune {
        cells.retain(|c| c.level >= 1);
        for (index, cell) in cells.iter_mut().enumerate() {
            cell.index = index;
        }
    }

    tracing::debug!(cells = cells.len(), prune, "map loaded");
    Ok(HexGrid::new(cells))
}

/// Write a map in the text format. The stored index column is informative;
/// load re-derives indices from record order.
pub fn save(mut writer: impl Write, grid: &HexGrid) -> Result<(), MapError> {
    writeln!(writer, "{}", grid.len())?;
    for cell in &grid.cells {
        writeln!(
            writer,
            "{} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {}",
            cell.index,
            cell.level,
            cell.a,
            cell.r,
            cell.active as u8,
            cell.marked as u8,
            cell.cx,
            cell.cy,
            cell.harvester as u8,
            cell.harvested as u8,
            cell.armory as u8,
            cell.cannon as u8,
            cell.ammo as u8,
            cell.loaded_ammo as u8,
            cell.units_free,
            cell.units_moved,
            cell.side as i32,
        )?;
    }
    Ok(())
}

/// Generate a fresh board: the classic cols x rows brick layout with
/// `level = 2 + (x*y) % 7`, harvesters seeded on level-5 cells, and one
/// home stack per faction placed by the seeded RNG.
pub fn generate(cols: usize, rows: usize, sides: usize, seed: u64) -> HexGrid {
    assert!((2..=4).contains(&sides), "2 to 4 factions required");

    let a = HEX_SIDE;
    let r = (0.5 * 3.0f32.sqrt() * a).round();
    let sx = 2.0 * r;
    let sy = 2.0 * r;
    let x_off = a * (0.25f32).sin();

    let mut cells = Vec::with_capacity(cols * rows);
    for x in 0..cols {
        for y in 0..rows {
            let y_off = if x % 2 == 0 { -r } else { 0.0 };
            let level = 2 + ((x * y) % 7) as i32;
            let index = cells.len();
            let mut cell = HexCell::new(
                index,
                x as f32 * (sx - x_off),
                y as f32 * sy - y_off,
                a,
                level,
            );
            if level == 5 {
                cell.harvester = true;
            }
            cells.push(cell);
        }
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut homes: Vec<usize> = cells
        .iter()
        .filter(|c| c.alive() && !c.harvester)
        .map(|c| c.index)
        .collect();
    homes.shuffle(&mut rng);
    assert!(
        homes.len() >= sides,
        "{} eligible home cells for {} factions",
        homes.len(),
        sides
    );
    for (i, &side) in PLAYABLE_SIDES[..sides].iter().enumerate() {
        let home = homes[i];
        cells[home].side = side;
        cells[home].units_free = HOME_UNITS;
    }

    tracing::debug!(cols, rows, sides, seed, "map generated");
    HexGrid::new(cells)
}
