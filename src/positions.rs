use crate::data::Room;
use std::collections::HashMap;

/// Usable seats of a room in row-major order, honoring the skip flags.
/// Constraint emission and solution extraction both rely on this ordering
/// being deterministic.
pub fn usable_positions(room: &Room) -> Vec<(u32, u32)> {
    let mut positions = Vec::new();
    for row in 0..room.rows {
        if room.skip_rows && row % 2 != 0 {
            continue;
        }
        for col in 0..room.cols {
            if room.skip_cols && col % 2 != 0 {
                continue;
            }
            positions.push((row, col));
        }
    }
    positions
}

/// Index pairs (i, j), i < j, of usable positions at Manhattan distance
/// exactly 1.
///
/// Skipped grid cells never enter `positions`, so two kept seats one step
/// apart are genuinely adjacent. With skipping enabled on an axis the
/// nearest kept seats sit two cells apart on that axis and the pair list
/// comes out empty, which makes separation vacuous for such rooms.
pub fn adjacent_pairs(positions: &[(u32, u32)]) -> Vec<(usize, usize)> {
    let index: HashMap<(u32, u32), usize> = positions
        .iter()
        .enumerate()
        .map(|(i, &pos)| (pos, i))
        .collect();

    let mut pairs = Vec::new();
    for (i, &(row, col)) in positions.iter().enumerate() {
        // row-major order puts the right and down neighbours at larger indices
        if let Some(&j) = index.get(&(row, col + 1)) {
            pairs.push((i, j));
        }
        if let Some(&j) = index.get(&(row + 1, col)) {
            pairs.push((i, j));
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(rows: u32, cols: u32, skip_rows: bool, skip_cols: bool) -> Room {
        Room {
            id: "R".to_string(),
            rows,
            cols,
            skip_rows,
            skip_cols,
        }
    }

    #[test]
    fn full_grid_is_row_major() {
        let positions = usable_positions(&room(2, 3, false, false));
        assert_eq!(
            positions,
            vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]
        );
    }

    #[test]
    fn skip_rows_keeps_even_rows_only() {
        let positions = usable_positions(&room(3, 2, true, false));
        assert_eq!(positions, vec![(0, 0), (0, 1), (2, 0), (2, 1)]);
    }

    #[test]
    fn skip_cols_keeps_even_cols_only() {
        let positions = usable_positions(&room(1, 5, false, true));
        assert_eq!(positions, vec![(0, 0), (0, 2), (0, 4)]);
    }

    #[test]
    fn skipping_both_axes_keeps_even_even_seats() {
        let positions = usable_positions(&room(3, 3, true, true));
        assert_eq!(positions, vec![(0, 0), (0, 2), (2, 0), (2, 2)]);
    }

    #[test]
    fn single_row_adjacency() {
        let positions = usable_positions(&room(1, 3, false, false));
        assert_eq!(adjacent_pairs(&positions), vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn grid_adjacency_is_sorted_and_complete() {
        // 2x2: every seat touches its right and down neighbour
        let positions = usable_positions(&room(2, 2, false, false));
        assert_eq!(
            adjacent_pairs(&positions),
            vec![(0, 1), (0, 2), (1, 3), (2, 3)]
        );
    }

    #[test]
    fn skipped_axis_leaves_no_adjacent_seats() {
        let positions = usable_positions(&room(1, 5, false, true));
        assert!(adjacent_pairs(&positions).is_empty());

        let positions = usable_positions(&room(4, 4, true, true));
        assert!(adjacent_pairs(&positions).is_empty());
    }

    #[test]
    fn skip_rows_keeps_horizontal_adjacency_only() {
        let positions = usable_positions(&room(3, 2, true, false));
        // rows 0 and 2 are two apart; only in-row neighbours remain
        assert_eq!(adjacent_pairs(&positions), vec![(0, 1), (2, 3)]);
    }
}
