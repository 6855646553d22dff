//! Marking cells and evaluating win conditions on a generated board.
//!
//! Only full rows, full columns and the two diagonals count as a win.

use serde::{Deserialize, Serialize};

use crate::{bingo::error::BingoError, domain::board::Board};

/// A completed line on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "camelCase")]
pub enum Line {
    Row(usize),
    Column(usize),
    /// 0 is top-left to bottom-right, 1 is top-right to bottom-left
    Diagonal(u8),
}

/// Snapshot of the win state, sent alongside the board after every move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardStatus {
    pub has_won: bool,
    pub completed_lines: Vec<Line>,
    pub is_blackout: bool,
}

impl Board {
    /// Flips the marked flag of one cell and returns its new value
    pub fn toggle_cell(&mut self, row: usize, col: usize) -> Result<bool, BingoError> {
        self.check_range(row, col)?;
        let cell = &mut self.cells[row][col];
        cell.marked = !cell.marked;
        Ok(cell.marked)
    }

    pub fn is_line_complete(&self, line: Line) -> bool {
        let n = self.size.get();
        match line {
            Line::Row(r) => r < n && self.cells[r].iter().all(|c| c.marked),
            Line::Column(c) => c < n && self.cells.iter().all(|row| row[c].marked),
            Line::Diagonal(0) => (0..n).all(|i| self.cells[i][i].marked),
            Line::Diagonal(1) => (0..n).all(|i| self.cells[i][n - 1 - i].marked),
            Line::Diagonal(_) => false,
        }
    }

    /// Every line that could complete on this board, rows first
    pub fn lines(&self) -> impl Iterator<Item = Line> + use<> {
        let n = self.size.get();
        (0..n)
            .map(Line::Row)
            .chain((0..n).map(Line::Column))
            .chain([Line::Diagonal(0), Line::Diagonal(1)])
    }

    pub fn completed_lines(&self) -> Vec<Line> {
        self.lines()
            .filter(|line| self.is_line_complete(*line))
            .collect()
    }

    pub fn has_won(&self) -> bool {
        self.lines().any(|line| self.is_line_complete(line))
    }

    pub fn is_blackout(&self) -> bool {
        self.cells().all(|c| c.marked)
    }

    /// Unmarks everything except the free space, which stays marked
    pub fn reset(&mut self) {
        for cell in self.cells.iter_mut().flatten() {
            cell.marked = cell.is_free_space();
        }
    }

    pub fn status(&self) -> BoardStatus {
        BoardStatus {
            has_won: self.has_won(),
            completed_lines: self.completed_lines(),
            is_blackout: self.is_blackout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bingo::generator::generate_board,
        domain::{board::BoardSize, track::mock_pool},
    };

    fn board(n: u8, free: bool) -> Board {
        generate_board(&mock_pool(30), BoardSize::new(n).unwrap(), free).unwrap()
    }

    fn mark_all(board: &mut Board, cells: &[(usize, usize)]) {
        for &(r, c) in cells {
            if !board.cells[r][c].marked {
                board.toggle_cell(r, c).unwrap();
            }
        }
    }

    #[test]
    fn test_toggle_flips_exactly_one_cell() -> anyhow::Result<()> {
        let mut b = board(4, false);
        let before = b.clone();

        assert!(b.toggle_cell(1, 2)?);

        let changed: Vec<_> = b
            .cells()
            .zip(before.cells())
            .filter(|(now, was)| now.marked != was.marked)
            .map(|(now, _)| (now.row, now.col))
            .collect();
        assert_eq!(changed, vec![(1, 2)]);

        assert!(!b.toggle_cell(1, 2)?);
        assert_eq!(b, before);

        Ok(())
    }

    #[test]
    fn test_toggle_out_of_range() {
        let mut b = board(3, false);

        assert_eq!(
            b.toggle_cell(3, 0),
            Err(BingoError::OutOfRange {
                row: 3,
                col: 0,
                size: 3
            })
        );
        assert!(b.toggle_cell(0, 7).is_err());
        assert!(b.cells().all(|c| !c.marked));
    }

    #[test]
    fn test_free_space_can_be_toggled_off() -> anyhow::Result<()> {
        let mut b = board(5, true);
        assert!(!b.toggle_cell(2, 2)?);
        b.reset();
        assert!(b.cell(2, 2)?.marked);
        Ok(())
    }

    #[test]
    fn test_single_row_win() {
        let mut b = board(5, false);
        mark_all(&mut b, &[(0, 0), (0, 1), (0, 2), (0, 3), (0, 4)]);

        assert!(b.has_won());
        assert_eq!(b.completed_lines(), vec![Line::Row(0)]);
        assert!(!b.is_blackout());
    }

    #[test]
    fn test_column_win() {
        let mut b = board(3, false);
        mark_all(&mut b, &[(0, 2), (1, 2), (2, 2)]);

        assert!(b.has_won());
        assert_eq!(b.completed_lines(), vec![Line::Column(2)]);
    }

    #[test]
    fn test_diagonal_wins() {
        let mut b = board(4, false);
        mark_all(&mut b, &[(0, 0), (1, 1), (2, 2), (3, 3)]);
        assert_eq!(b.completed_lines(), vec![Line::Diagonal(0)]);

        let mut b = board(4, false);
        mark_all(&mut b, &[(0, 3), (1, 2), (2, 1), (3, 0)]);
        assert_eq!(b.completed_lines(), vec![Line::Diagonal(1)]);
    }

    #[test]
    fn test_free_space_counts_towards_lines() {
        let mut b = board(5, true);
        mark_all(&mut b, &[(2, 0), (2, 1), (2, 3), (2, 4)]);

        assert_eq!(b.completed_lines(), vec![Line::Row(2)]);
    }

    #[test]
    fn test_all_simultaneous_lines_reported() {
        let mut b = board(3, false);
        mark_all(&mut b, &[(0, 0), (0, 1), (0, 2), (1, 0), (2, 0), (1, 1), (2, 2)]);

        assert_eq!(
            b.completed_lines(),
            vec![
                Line::Row(0),
                Line::Column(0),
                Line::Diagonal(0),
                Line::Diagonal(1)
            ]
        );
    }

    #[test]
    fn test_no_win_without_full_line() {
        let mut b = board(5, true);
        // X pattern missing two corners
        mark_all(&mut b, &[(0, 0), (1, 1), (3, 3), (0, 4), (1, 3), (3, 1)]);

        assert!(!b.has_won());
        assert!(b.completed_lines().is_empty());
    }

    #[test]
    fn test_blackout_for_all_sizes() {
        for n in [3, 4, 5] {
            let mut b = board(n, n == 5);
            let all: Vec<_> = b.cells().map(|c| (c.row, c.col)).collect();
            mark_all(&mut b, &all[1..]);
            assert!(!b.is_blackout());

            mark_all(&mut b, &all[..1]);
            assert!(b.is_blackout());
            assert_eq!(b.completed_lines().len(), 2 * n as usize + 2);
        }
    }

    #[test]
    fn test_reset_is_idempotent_and_keeps_free_space() -> anyhow::Result<()> {
        let mut b = board(5, true);
        mark_all(&mut b, &[(0, 0), (4, 4), (1, 3)]);

        b.reset();
        let once = b.clone();
        b.reset();

        assert_eq!(b, once);
        let marked: Vec<_> = b
            .cells()
            .filter(|c| c.marked)
            .map(|c| (c.row, c.col))
            .collect();
        assert_eq!(marked, vec![(2, 2)]);

        Ok(())
    }

    #[test]
    fn test_status_snapshot() {
        let mut b = board(3, false);
        mark_all(&mut b, &[(1, 0), (1, 1), (1, 2)]);

        let status = b.status();
        assert!(status.has_won);
        assert_eq!(status.completed_lines, vec![Line::Row(1)]);
        assert!(!status.is_blackout);
    }

    #[test]
    fn test_line_json() -> anyhow::Result<()> {
        assert_eq!(
            serde_json::to_string(&Line::Diagonal(1))?,
            r#"{"kind":"diagonal","index":1}"#
        );
        Ok(())
    }
}
