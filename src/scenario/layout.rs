//! Square arena layouts for the predator-prey scenario.
//!
//! A layout is a `size × size` grid. Blocks are circular obstacles, and predator and prey start
//! positions sit in cell centres. Layouts come from a textual map or from the registry of named
//! layouts.
//!
//! Text maps use one character per cell:
//!
//! ```text
//! P....P...P
//! ..........
//! ..##..##..
//! ..##..##..
//! ....pp....
//! P...pp...P
//! ..##..##..
//! ..##..##..
//! ..........
//! P....P...P
//! ```
//!
//! `.` is empty, `#` a block, `P` a predator start and `p` a prey start. Row `r`, column `c`
//! maps to the cell centre `(c + 0.5, r + 0.5)`. Without any `P` (or `p`) the default start
//! positions are used.

use std::str::FromStr;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use thiserror::Error;

use crate::domain::{euclidean_distance, Obstacle, Position};

/// Radius of every predator and prey body.
pub const AGENT_RADIUS: f64 = 0.5;

/// Smallest supported grid.
pub const MIN_SIZE: usize = 3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("layout must be at least 3x3, got {size}x{size}")]
    TooSmall { size: usize },
    #[error("layout has {rows} rows but {cols} columns")]
    NotSquare { rows: usize, cols: usize },
    #[error("row {row} has {actual} cells, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("unknown cell {cell:?} at row {row}, column {col}")]
    UnknownCell { row: usize, col: usize, cell: char },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Layout {
    size: usize,
    blocks: Vec<Obstacle>,
    predator_starts: Vec<Position>,
    prey_starts: Vec<Position>,
}

impl Layout {
    /// Builds a layout, filling in default start positions where none are given.
    ///
    /// Default predator starts are the corners and edge midpoints that do not overlap a block.
    /// Default prey starts are the interior cells at least one body width away from every
    /// predator start and not overlapping a block.
    pub fn new(
        size: usize,
        blocks: Vec<Obstacle>,
        predator_starts: Option<Vec<Position>>,
        prey_starts: Option<Vec<Position>>,
    ) -> Result<Self, LayoutError> {
        if size < MIN_SIZE {
            return Err(LayoutError::TooSmall { size });
        }
        Ok(Self::build(size, blocks, predator_starts, prey_starts))
    }

    fn build(
        size: usize,
        blocks: Vec<Obstacle>,
        predator_starts: Option<Vec<Position>>,
        prey_starts: Option<Vec<Position>>,
    ) -> Self {
        let predator_starts =
            predator_starts.unwrap_or_else(|| default_predator_starts(size, &blocks));
        let prey_starts =
            prey_starts.unwrap_or_else(|| default_prey_starts(size, &blocks, &predator_starts));
        Self {
            size,
            blocks,
            predator_starts,
            prey_starts,
        }
    }

    /// Open arena with, optionally, four circular blocks of radius `size / 10` placed on a
    /// `2 × 2` pattern.
    fn open(size: usize, include_blocks: bool) -> Self {
        let r = size as f64 / 10.0;
        let blocks = if include_blocks {
            let offsets = [size as f64 / 5.0, 3.0 * size as f64 / 5.0];
            offsets
                .iter()
                .flat_map(|&x| offsets.iter().map(move |&y| (x, y)))
                .map(|(x, y)| Obstacle::new(Position::new(x + r, y + r), r))
                .collect()
        } else {
            vec![]
        };
        Self::build(size, blocks, None, None)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn blocks(&self) -> &[Obstacle] {
        &self.blocks
    }

    pub fn predator_starts(&self) -> &[Position] {
        &self.predator_starts
    }

    pub fn prey_starts(&self) -> &[Position] {
        &self.prey_starts
    }
}

impl FromStr for Layout {
    type Err = LayoutError;

    /// Parses a text map. Leading and trailing whitespace of the map and of every row is
    /// ignored. Cells are visited in row-major order, which fixes the order of blocks and start
    /// positions.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rows = s.trim().lines().map(str::trim).collect::<Vec<_>>();
        let cols = rows.first().map_or(0, |row| row.chars().count());
        for (row, cells) in rows.iter().enumerate() {
            let actual = cells.chars().count();
            if actual != cols {
                return Err(LayoutError::Ragged {
                    row,
                    expected: cols,
                    actual,
                });
            }
        }
        if rows.len() != cols {
            return Err(LayoutError::NotSquare {
                rows: rows.len(),
                cols,
            });
        }
        if cols < MIN_SIZE {
            return Err(LayoutError::TooSmall { size: cols });
        }

        let mut blocks = vec![];
        let mut predators = vec![];
        let mut prey = vec![];
        for (row, cells) in rows.iter().enumerate() {
            for (col, cell) in cells.chars().enumerate() {
                let center = Position::new(col as f64 + 0.5, row as f64 + 0.5);
                match cell {
                    '.' => {}
                    '#' => blocks.push(Obstacle::new(center, 0.5)),
                    'P' => predators.push(center),
                    'p' => prey.push(center),
                    _ => return Err(LayoutError::UnknownCell { row, col, cell }),
                }
            }
        }

        Self::new(
            cols,
            blocks,
            (!predators.is_empty()).then_some(predators),
            (!prey.is_empty()).then_some(prey),
        )
    }
}

fn default_predator_starts(size: usize, blocks: &[Obstacle]) -> Vec<Position> {
    let edge = |v: usize| v == 0 || v == size - 1;
    let lines = [0, size / 2, size - 1];
    lines
        .iter()
        .flat_map(|&col| lines.iter().map(move |&row| (col, row)))
        .filter(|&(col, row)| edge(col) || edge(row))
        .map(|(col, row)| cell_center(col, row))
        .filter(|&p| {
            blocks
                .iter()
                .all(|b| euclidean_distance(p, b.position()) > AGENT_RADIUS + b.radius())
        })
        .collect()
}

fn default_prey_starts(size: usize, blocks: &[Obstacle], predators: &[Position]) -> Vec<Position> {
    (1..size - 1)
        .flat_map(|col| (1..size - 1).map(move |row| cell_center(col, row)))
        .filter(|&p| {
            predators
                .iter()
                .all(|&q| euclidean_distance(p, q) >= 2.0 * AGENT_RADIUS)
        })
        .filter(|&p| {
            blocks
                .iter()
                .all(|b| euclidean_distance(p, b.position()) >= AGENT_RADIUS + b.radius())
        })
        .collect()
}

fn cell_center(col: usize, row: usize) -> Position {
    Position::new(col as f64 + AGENT_RADIUS, row as f64 + AGENT_RADIUS)
}

/// Layout registered under a name together with its episode step limit.
#[derive(Clone, Debug, PartialEq)]
pub struct NamedLayout {
    pub layout: Layout,
    pub max_episode_steps: usize,
}

static NAMED_LAYOUTS: Lazy<IndexMap<&'static str, NamedLayout>> = Lazy::new(|| {
    [
        ("5x5", 5, false, 25),
        ("5x5Blocks", 5, true, 50),
        ("10x10", 10, false, 50),
        ("10x10Blocks", 10, true, 50),
        ("15x15", 15, false, 100),
        ("15x15Blocks", 15, true, 100),
        ("20x20", 20, false, 200),
        ("20x20Blocks", 20, true, 200),
    ]
    .into_iter()
    .map(|(name, size, include_blocks, max_episode_steps)| {
        (
            name,
            NamedLayout {
                layout: Layout::open(size, include_blocks),
                max_episode_steps,
            },
        )
    })
    .collect()
});

pub fn named_layout(name: &str) -> Option<&'static NamedLayout> {
    NAMED_LAYOUTS.get(name)
}

pub fn layout_names() -> impl Iterator<Item = &'static str> {
    NAMED_LAYOUTS.keys().copied()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_layout_names() {
        assert_eq!(
            layout_names().collect::<Vec<_>>(),
            vec![
                "5x5",
                "5x5Blocks",
                "10x10",
                "10x10Blocks",
                "15x15",
                "15x15Blocks",
                "20x20",
                "20x20Blocks"
            ]
        );
    }

    #[rstest]
    #[case::small("5x5", 5, 0, 25)]
    #[case::small_blocks("5x5Blocks", 5, 4, 50)]
    #[case::medium_blocks("10x10Blocks", 10, 4, 50)]
    #[case::large("20x20", 20, 0, 200)]
    fn test_named_layout(
        #[case] name: &str,
        #[case] size: usize,
        #[case] blocks: usize,
        #[case] max_episode_steps: usize,
    ) {
        let named = named_layout(name).unwrap();
        assert_eq!(named.layout.size(), size);
        assert_eq!(named.layout.blocks().len(), blocks);
        assert_eq!(named.max_episode_steps, max_episode_steps);
        assert!(named.layout.predator_starts().len() >= 2);
        assert!(!named.layout.prey_starts().is_empty());
    }

    #[test]
    fn test_named_layout_unknown() {
        assert_eq!(named_layout("7x7"), None);
    }

    #[test]
    fn test_open_layout_blocks() {
        let layout = &named_layout("10x10Blocks").unwrap().layout;
        let centers = layout
            .blocks()
            .iter()
            .map(|b| (b.position().x(), b.position().y(), b.radius()))
            .collect::<Vec<_>>();
        assert_eq!(
            centers,
            vec![
                (3.0, 3.0, 1.0),
                (3.0, 7.0, 1.0),
                (7.0, 3.0, 1.0),
                (7.0, 7.0, 1.0)
            ]
        );
    }

    #[test]
    fn test_default_predator_starts() {
        let layout = &named_layout("10x10").unwrap().layout;
        let starts = layout
            .predator_starts()
            .iter()
            .map(|p| (p.x(), p.y()))
            .collect::<Vec<_>>();
        assert_eq!(
            starts,
            vec![
                (0.5, 0.5),
                (0.5, 5.5),
                (0.5, 9.5),
                (5.5, 0.5),
                (5.5, 9.5),
                (9.5, 0.5),
                (9.5, 5.5),
                (9.5, 9.5)
            ]
        );
    }

    #[test]
    fn test_default_prey_starts_avoid_blocks() {
        let layout = &named_layout("10x10Blocks").unwrap().layout;
        for start in layout.prey_starts() {
            assert!(start.x() > 1.0 && start.x() < 9.0);
            for block in layout.blocks() {
                assert!(euclidean_distance(*start, block.position()) >= 0.5 + block.radius());
            }
        }
        // 8x8 interior minus the cells covered by the four blocks.
        assert_eq!(layout.prey_starts().len(), 64 - 4 * 4);
    }

    #[test]
    fn test_parse_layout() {
        let layout: Layout = "
            P...P
            .#...
            ..p..
            ...#.
            P.p.P
        "
        .parse()
        .unwrap();
        assert_eq!(layout.size(), 5);
        assert_eq!(
            layout.blocks(),
            &[
                Obstacle::new(Position::new(1.5, 1.5), 0.5),
                Obstacle::new(Position::new(3.5, 3.5), 0.5)
            ]
        );
        assert_eq!(
            layout.predator_starts(),
            &[
                Position::new(0.5, 0.5),
                Position::new(4.5, 0.5),
                Position::new(0.5, 4.5),
                Position::new(4.5, 4.5)
            ]
        );
        assert_eq!(
            layout.prey_starts(),
            &[Position::new(2.5, 2.5), Position::new(2.5, 4.5)]
        );
    }

    #[test]
    fn test_parse_layout_default_starts() {
        let layout: Layout = "...\n...\n...".parse().unwrap();
        assert_eq!(layout.predator_starts().len(), 8);
        // The single interior cell is a body width away from every edge midpoint.
        assert_eq!(layout.prey_starts(), &[Position::new(1.5, 1.5)]);
    }

    #[rstest]
    #[case::ragged("...\n..\n...", LayoutError::Ragged { row: 1, expected: 3, actual: 2 })]
    #[case::not_square("....\n....\n....", LayoutError::NotSquare { rows: 3, cols: 4 })]
    #[case::too_small("..\n..", LayoutError::TooSmall { size: 2 })]
    #[case::unknown_cell("...\n.x.\n...", LayoutError::UnknownCell { row: 1, col: 1, cell: 'x' })]
    fn test_parse_layout_errors(#[case] text: &str, #[case] expected: LayoutError) {
        assert_eq!(text.parse::<Layout>(), Err(expected));
    }

    #[test]
    fn test_layout_new_too_small() {
        assert_eq!(
            Layout::new(2, vec![], None, None),
            Err(LayoutError::TooSmall { size: 2 })
        );
    }
}
