//! Board Validator (§4.5 step 5): is a candidate traceable as a simple path
//! over 8-adjacent cells of the room's letter grid?
//!
//! The DFS itself is synchronous and CPU-bound; `BoardValidator::is_on_board`
//! offloads it to `tokio::task::spawn_blocking` so the dispatcher's async
//! event path stays responsive under load, mirroring the bounded-resource
//! style of `connection_registry`'s per-IP slot gating (no precedent of its
//! own for a CPU-bound worker pool, per DESIGN.md).

use std::collections::HashMap;

use crate::protocol::types::GridCell;

const DIRECTIONS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Offloads board tracing to a bounded worker pool (§5 Suspension points,
/// §6 Board Validator collaborator contract).
#[derive(Debug, Default, Clone, Copy)]
pub struct BoardValidator;

impl BoardValidator {
    /// Traces `normalized` (already lowercased) as a simple path of
    /// 8-adjacent cells on `grid`, using `positions_index` to prune the
    /// search to cells that could plausibly start or continue the word.
    /// Runs the DFS on a blocking-pool thread per §5.
    pub async fn is_on_board(
        &self,
        normalized: String,
        grid: Vec<Vec<GridCell>>,
        positions_index: HashMap<GridCell, Vec<(usize, usize)>>,
    ) -> bool {
        tokio::task::spawn_blocking(move || trace_word(&normalized, &grid, &positions_index))
            .await
            .unwrap_or(false)
    }
}

/// Synchronous core: DFS with no-cell-reuse pruning (§3 invariant 5).
#[must_use]
pub fn trace_word(
    normalized: &str,
    grid: &[Vec<GridCell>],
    positions_index: &HashMap<GridCell, Vec<(usize, usize)>>,
) -> bool {
    let letters: Vec<char> = normalized.chars().collect();
    if letters.is_empty() || grid.is_empty() {
        return false;
    }

    let Some(starts) = positions_index.get(&letters[0].to_ascii_lowercase()) else {
        return false;
    };

    let rows = grid.len();
    let mut visited = vec![vec![false; grid.first().map_or(0, Vec::len)]; rows];

    for &start in starts {
        if dfs(grid, &letters, 0, start, &mut visited) {
            return true;
        }
    }
    false
}

fn dfs(
    grid: &[Vec<GridCell>],
    letters: &[char],
    index: usize,
    (row, col): (usize, usize),
    visited: &mut [Vec<bool>],
) -> bool {
    let Some(cell) = grid.get(row).and_then(|r| r.get(col)) else {
        return false;
    };
    if cell.to_ascii_lowercase() != letters[index] {
        return false;
    }
    if visited[row][col] {
        return false;
    }

    if index + 1 == letters.len() {
        return true;
    }

    visited[row][col] = true;
    let rows = grid.len() as isize;
    let cols = grid.first().map_or(0, Vec::len) as isize;
    for (d_row, d_col) in DIRECTIONS {
        let next_row = row as isize + d_row;
        let next_col = col as isize + d_col;
        if next_row < 0 || next_col < 0 || next_row >= rows || next_col >= cols {
            continue;
        }
        if dfs(
            grid,
            letters,
            index + 1,
            (next_row as usize, next_col as usize),
            visited,
        ) {
            visited[row][col] = false;
            return true;
        }
    }
    visited[row][col] = false;
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_and_index() -> (Vec<Vec<GridCell>>, HashMap<GridCell, Vec<(usize, usize)>>) {
        let grid = vec![
            vec!['C', 'A', 'T'],
            vec!['D', 'O', 'G'],
            vec!['H', 'E', 'R'],
        ];
        let mut index: HashMap<GridCell, Vec<(usize, usize)>> = HashMap::new();
        for (r, row) in grid.iter().enumerate() {
            for (c, ch) in row.iter().enumerate() {
                index.entry(ch.to_ascii_lowercase()).or_default().push((r, c));
            }
        }
        (grid, index)
    }

    #[test]
    fn traces_simple_horizontal_word() {
        let (grid, index) = grid_and_index();
        assert!(trace_word("cat", &grid, &index));
    }

    #[test]
    fn traces_diagonal_adjacency() {
        let (grid, index) = grid_and_index();
        // C(0,0) -> O(1,1) diagonal -> G(1,2)
        assert!(trace_word("cog", &grid, &index));
    }

    #[test]
    fn rejects_non_adjacent_path() {
        let (grid, index) = grid_and_index();
        // C(0,0) and R(2,2) are not adjacent to a connecting middle letter set that spells "car"
        assert!(!trace_word("car", &grid, &index));
    }

    #[test]
    fn rejects_cell_reuse() {
        let grid = vec![vec!['A', 'B']];
        let mut index: HashMap<GridCell, Vec<(usize, usize)>> = HashMap::new();
        index.insert('a', vec![(0, 0)]);
        index.insert('b', vec![(0, 1)]);
        // "aba" would require reusing the 'a' cell.
        assert!(!trace_word("aba", &grid, &index));
    }

    #[test]
    fn empty_candidate_never_traces() {
        let (grid, index) = grid_and_index();
        assert!(!trace_word("", &grid, &index));
    }

    #[tokio::test]
    async fn async_wrapper_delegates_to_sync_core() {
        let (grid, index) = grid_and_index();
        let validator = BoardValidator;
        assert!(validator.is_on_board("dog".to_string(), grid, index).await);
    }
}
