//! Grid cleanup applied to each statement slice before metric extraction.
//!
//! Every step keeps the first occurrence and preserves the relative order of what it
//! keeps. Cells are compared by normalized key, so `"$1,000"` and `1000` are the same
//! and text compares case- and whitespace-insensitively.

use crate::config::CleanupConfig;
use crate::normalizer::{normalize_cell, render_token};
use crate::periods::column_years;
use crate::schema::{Cell, Grid, Row};
use log::debug;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CellKey {
    Empty,
    Number(String),
    Text(String),
}

fn cell_key(cell: &Cell) -> CellKey {
    if cell.is_blank() {
        return CellKey::Empty;
    }
    if let Some(token) = normalize_cell(cell) {
        return CellKey::Number(render_token(&token));
    }
    let text = cell.to_string().replace('\u{a0}', " ");
    CellKey::Text(
        text.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase(),
    )
}

/// Row signature with trailing blanks removed, so ragged rows compare equal.
fn row_key(row: &[Cell]) -> Vec<CellKey> {
    let mut key: Vec<CellKey> = row.iter().map(cell_key).collect();
    while key.last() == Some(&CellKey::Empty) {
        key.pop();
    }
    key
}

fn is_empty_row(row: &[Cell]) -> bool {
    row.iter().all(Cell::is_blank)
}

fn width(grid: &[Row]) -> usize {
    grid.iter().map(Vec::len).max().unwrap_or(0)
}

fn column_key(grid: &[Row], col: usize) -> Vec<CellKey> {
    grid.iter()
        .map(|row| row.get(col).map(cell_key).unwrap_or(CellKey::Empty))
        .collect()
}

fn is_empty_column(grid: &[Row], col: usize) -> bool {
    grid.iter()
        .all(|row| row.get(col).map(Cell::is_blank).unwrap_or(true))
}

fn keep_columns(grid: &[Row], keep: &[bool]) -> Grid {
    grid.iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .filter(|(col, _)| keep.get(*col).copied().unwrap_or(true))
                .map(|(_, cell)| cell.clone())
                .collect()
        })
        .collect()
}

fn empty_row_mask(grid: &[Row]) -> Vec<bool> {
    grid.iter().map(|row| !is_empty_row(row)).collect()
}

fn duplicate_row_mask(grid: &[Row]) -> Vec<bool> {
    let mut seen: HashSet<Vec<CellKey>> = HashSet::new();
    grid.iter()
        .map(|row| is_empty_row(row) || seen.insert(row_key(row)))
        .collect()
}

fn keep_rows(grid: &[Row], keep: &[bool]) -> Grid {
    grid.iter()
        .zip(keep)
        .filter(|(_, keep)| **keep)
        .map(|(row, _)| row.clone())
        .collect()
}

pub fn drop_empty_rows(grid: &[Row]) -> Grid {
    keep_rows(grid, &empty_row_mask(grid))
}

pub fn drop_empty_columns(grid: &[Row]) -> Grid {
    let keep: Vec<bool> = (0..width(grid))
        .map(|col| !is_empty_column(grid, col))
        .collect();
    keep_columns(grid, &keep)
}

/// Keeps the first occurrence of each normalized row. Empty rows are left alone.
pub fn drop_duplicate_rows(grid: &[Row]) -> Grid {
    keep_rows(grid, &duplicate_row_mask(grid))
}

/// Keeps the first column with each normalized signature. Empty columns are left alone.
pub fn drop_duplicate_columns(grid: &[Row]) -> Grid {
    let mut seen: HashSet<Vec<CellKey>> = HashSet::new();
    let keep: Vec<bool> = (0..width(grid))
        .map(|col| is_empty_column(grid, col) || seen.insert(column_key(grid, col)))
        .collect();
    keep_columns(grid, &keep)
}

/// Keeps only the leftmost column for each year found in the first `scan_rows` rows.
/// Columns without a detected year are kept.
pub fn drop_repeated_year_columns(grid: &[Row], scan_rows: usize) -> Grid {
    let years = column_years(grid, scan_rows);
    let mut leftmost: BTreeMap<i32, usize> = BTreeMap::new();
    for (&col, &year) in &years {
        leftmost.entry(year).or_insert(col);
    }

    let keep: Vec<bool> = (0..width(grid))
        .map(|col| match years.get(&col) {
            Some(year) => leftmost.get(year) == Some(&col),
            None => true,
        })
        .collect();
    keep_columns(grid, &keep)
}

/// A cleaned grid plus, for each remaining row, its index in the input grid.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedGrid {
    pub rows: Grid,
    pub source_rows: Vec<usize>,
}

impl CleanedGrid {
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Row)> {
        self.source_rows.iter().copied().zip(self.rows.iter())
    }
}

/// Runs the enabled steps: year columns, duplicate columns and empty columns first,
/// then duplicate rows and empty rows.
pub fn apply_cleanup(grid: &[Row], config: &CleanupConfig) -> CleanedGrid {
    let (rows_before, cols_before) = (grid.len(), width(grid));
    let mut cleaned: Grid = grid.to_vec();

    if config.drop_repeated_year_columns {
        cleaned = drop_repeated_year_columns(&cleaned, config.year_scan_rows);
    }
    if config.drop_duplicate_columns {
        cleaned = drop_duplicate_columns(&cleaned);
    }
    if config.drop_empty_columns {
        cleaned = drop_empty_columns(&cleaned);
    }

    let mut keep = vec![true; cleaned.len()];
    if config.drop_duplicate_rows {
        for (k, unique) in keep.iter_mut().zip(duplicate_row_mask(&cleaned)) {
            *k &= unique;
        }
    }
    if config.drop_empty_rows {
        for (k, filled) in keep.iter_mut().zip(empty_row_mask(&cleaned)) {
            *k &= filled;
        }
    }

    let source_rows: Vec<usize> = (0..cleaned.len()).filter(|&i| keep[i]).collect();
    let rows = keep_rows(&cleaned, &keep);

    if rows.len() != rows_before || width(&rows) != cols_before {
        debug!(
            "Cleanup: {}x{} -> {}x{}",
            rows_before,
            cols_before,
            rows.len(),
            width(&rows)
        );
    }

    CleanedGrid { rows, source_rows }
}
