//! Builds randomized boards out of a playlist's tracks

use std::collections::HashSet;

use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric, seq::SliceRandom};

use crate::{
    bingo::error::BingoError,
    domain::{
        board::{Board, BoardId, BoardSize, Cell, Occupant},
        track::Track,
    },
};

const ID_SUFFIX_LEN: usize = 6;

/// Number of distinct tracks one board consumes
pub fn required_tracks(size: BoardSize, include_free_space: bool) -> usize {
    if size.free_space_applies(include_free_space) {
        size.cell_count() - 1
    } else {
        size.cell_count()
    }
}

pub fn generate_board(
    pool: &[Track],
    size: BoardSize,
    include_free_space: bool,
) -> Result<Board, BingoError> {
    generate_board_with_rng(pool, size, include_free_space, &mut rand::thread_rng())
}

/// Draws `required_tracks` distinct tracks from `pool` and lays them out
/// row-major, leaving the centre to the free space when it applies.
pub fn generate_board_with_rng<R: Rng + ?Sized>(
    pool: &[Track],
    size: BoardSize,
    include_free_space: bool,
    rng: &mut R,
) -> Result<Board, BingoError> {
    let required = required_tracks(size, include_free_space);
    let mut shuffled = distinct_tracks(pool);
    let available = shuffled.len();
    if available < required {
        return Err(BingoError::InsufficientTracks {
            required,
            available,
        });
    }

    shuffled.shuffle(rng);
    let mut picked = shuffled.into_iter().take(required);

    let free_cell = size
        .free_space_applies(include_free_space)
        .then(|| size.centre());

    let n = size.get();
    let mut cells = Vec::with_capacity(n);
    for row in 0..n {
        let mut cells_row = Vec::with_capacity(n);
        for col in 0..n {
            let cell = if free_cell == Some((row, col)) {
                Cell {
                    row,
                    col,
                    occupant: Occupant::FreeSpace,
                    marked: true,
                }
            } else {
                // the prefix has exactly one track per non-free cell
                let track = picked.next().ok_or(BingoError::InsufficientTracks {
                    required,
                    available,
                })?;
                Cell {
                    row,
                    col,
                    occupant: Occupant::Track(track.clone()),
                    marked: false,
                }
            };
            cells_row.push(cell);
        }
        cells.push(cells_row);
    }

    Ok(Board {
        id: new_board_id(rng),
        size,
        cells,
    })
}

pub fn generate_multiple_boards(
    pool: &[Track],
    count: usize,
    size: BoardSize,
    include_free_space: bool,
) -> Result<Vec<Board>, BingoError> {
    generate_multiple_boards_with_rng(
        pool,
        count,
        size,
        include_free_space,
        &mut rand::thread_rng(),
    )
}

/// Every board is shuffled independently: tracks may repeat across boards
pub fn generate_multiple_boards_with_rng<R: Rng + ?Sized>(
    pool: &[Track],
    count: usize,
    size: BoardSize,
    include_free_space: bool,
    rng: &mut R,
) -> Result<Vec<Board>, BingoError> {
    let boards = (0..count)
        .map(|_| generate_board_with_rng(pool, size, include_free_space, &mut *rng))
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!(
        "generated {} {} boards from {} tracks",
        boards.len(),
        size,
        pool.len()
    );
    Ok(boards)
}

/// A playlist may list the same track twice; only the first entry counts
fn distinct_tracks(pool: &[Track]) -> Vec<&Track> {
    let mut seen = HashSet::with_capacity(pool.len());
    pool.iter().filter(|t| seen.insert(&t.id)).collect()
}

fn new_board_id<R: Rng + ?Sized>(rng: &mut R) -> BoardId {
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| rng.sample(Alphanumeric) as char)
        .collect();
    BoardId(format!(
        "board-{}-{}",
        Utc::now().timestamp_millis(),
        suffix.to_lowercase()
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::domain::track::{TrackId, mock_pool};

    fn size(n: u8) -> BoardSize {
        BoardSize::new(n).unwrap()
    }

    fn track_ids(board: &Board) -> HashSet<TrackId> {
        board.tracks().map(|t| t.id.clone()).collect()
    }

    #[test]
    fn test_required_tracks() {
        assert_eq!(required_tracks(size(3), false), 9);
        assert_eq!(required_tracks(size(3), true), 9);
        assert_eq!(required_tracks(size(4), true), 16);
        assert_eq!(required_tracks(size(5), false), 25);
        assert_eq!(required_tracks(size(5), true), 24);
    }

    #[test]
    fn test_board_draws_distinct_tracks_from_pool() -> anyhow::Result<()> {
        let pool = mock_pool(40);
        let pool_ids: HashSet<TrackId> = pool.iter().map(|t| t.id.clone()).collect();
        let mut rng = StdRng::seed_from_u64(7);

        for (n, free) in [(3, false), (4, true), (5, false), (5, true)] {
            let board = generate_board_with_rng(&pool, size(n), free, &mut rng)?;
            let required = required_tracks(size(n), free);

            assert_eq!(board.tracks().count(), required);
            let ids = track_ids(&board);
            assert_eq!(ids.len(), required, "tracks repeat within one board");
            assert!(ids.is_subset(&pool_ids));
        }

        Ok(())
    }

    #[test]
    fn test_free_space_sits_marked_in_centre() -> anyhow::Result<()> {
        let board = generate_board(&mock_pool(25), size(5), true)?;

        let centre = board.cell(2, 2)?;
        assert!(centre.is_free_space());
        assert!(centre.marked);
        assert_eq!(board.cells().filter(|c| c.is_free_space()).count(), 1);
        assert_eq!(board.cells().filter(|c| c.marked).count(), 1);

        Ok(())
    }

    #[test]
    fn test_no_free_space_unless_five_and_enabled() -> anyhow::Result<()> {
        let pool = mock_pool(25);
        for (n, free) in [(3, true), (4, true), (5, false)] {
            let board = generate_board(&pool, size(n), free)?;
            assert!(board.free_space().is_none());
            assert!(board.cells().all(|c| !c.marked));
        }
        Ok(())
    }

    #[test]
    fn test_insufficient_tracks() {
        let pool = mock_pool(23);

        assert_eq!(
            generate_board(&pool, size(5), true),
            Err(BingoError::InsufficientTracks {
                required: 24,
                available: 23
            })
        );
        assert_eq!(
            generate_board(&[], size(3), false),
            Err(BingoError::InsufficientTracks {
                required: 9,
                available: 0
            })
        );
    }

    #[test]
    fn test_exact_pool_uses_every_track() -> anyhow::Result<()> {
        let pool = mock_pool(25);
        let board = generate_board(&pool, size(5), true)?;

        assert_eq!(track_ids(&board).len(), 24);
        assert_eq!(board.size.get(), 5);
        assert_eq!(board.cells.iter().map(Vec::len).sum::<usize>(), 25);

        Ok(())
    }

    #[test]
    fn test_cells_know_their_position() -> anyhow::Result<()> {
        let board = generate_board(&mock_pool(16), size(4), false)?;
        for (r, row) in board.cells.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                assert_eq!((cell.row, cell.col), (r, c));
            }
        }
        Ok(())
    }

    #[test]
    fn test_seeded_generation_is_reproducible() -> anyhow::Result<()> {
        let pool = mock_pool(30);
        let a = generate_board_with_rng(&pool, size(4), false, &mut StdRng::seed_from_u64(42))?;
        let b = generate_board_with_rng(&pool, size(4), false, &mut StdRng::seed_from_u64(42))?;

        let names = |board: &Board| board.tracks().map(|t| t.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(&a), names(&b));

        Ok(())
    }

    #[test]
    fn test_multiple_boards() -> anyhow::Result<()> {
        let pool = mock_pool(12);
        let boards = generate_multiple_boards(&pool, 3, size(3), false)?;

        assert_eq!(boards.len(), 3);
        for board in &boards {
            assert_eq!(board.size.get(), 3);
            assert_eq!(track_ids(board).len(), 9);
            assert!(board.free_space().is_none());
        }

        let ids: HashSet<_> = boards.iter().map(|b| b.id.clone()).collect();
        assert_eq!(ids.len(), 3, "board ids collide");

        Ok(())
    }

    #[test]
    fn test_multiple_boards_may_share_tracks() -> anyhow::Result<()> {
        // a 9-track pool forces every 3x3 board to use the same tracks
        let pool = mock_pool(9);
        let boards = generate_multiple_boards(&pool, 2, size(3), false)?;

        assert_eq!(track_ids(&boards[0]), track_ids(&boards[1]));

        Ok(())
    }

    #[test]
    fn test_every_track_can_be_picked() -> anyhow::Result<()> {
        let pool = mock_pool(12);
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen = HashSet::new();

        for _ in 0..200 {
            let board = generate_board_with_rng(&pool, size(3), false, &mut rng)?;
            seen.extend(track_ids(&board));
        }

        assert_eq!(seen.len(), pool.len());

        Ok(())
    }

    #[test]
    fn test_duplicate_playlist_entries_are_drawn_once() -> anyhow::Result<()> {
        let mut pool = mock_pool(10);
        pool[9] = pool[0].clone();
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..20 {
            let board = generate_board_with_rng(&pool, size(3), false, &mut rng)?;
            assert_eq!(track_ids(&board).len(), 9);
            board.validate()?;
        }

        Ok(())
    }

    #[test]
    fn test_duplicates_do_not_count_as_available() {
        let mut pool = mock_pool(9);
        pool[8] = pool[0].clone();

        assert_eq!(
            generate_board(&pool, size(3), false).unwrap_err(),
            BingoError::InsufficientTracks {
                required: 9,
                available: 8
            }
        );
    }

    #[test]
    fn test_board_id_format() -> anyhow::Result<()> {
        let board = generate_board(&mock_pool(9), size(3), false)?;
        let parts: Vec<&str> = board.id.0.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "board");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), ID_SUFFIX_LEN);

        Ok(())
    }
}
