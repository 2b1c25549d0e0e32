use crate::constants::{revival_bounds, GRID_SIZE, REVIVAL_DISTANCE};
use crate::types::{Cell, Direction};

pub(super) fn offset(cell: Cell, dir: Direction) -> Cell {
    let (dx, dy) = dir.delta();
    Cell::new(cell.x + dx, cell.y + dy)
}

pub(super) fn in_bounds(cell: Cell) -> bool {
    (0..GRID_SIZE).contains(&cell.x) && (0..GRID_SIZE).contains(&cell.y)
}

/// Projects the death head `REVIVAL_DISTANCE` cells against the direction of
/// travel and pulls the result off the outer border.
pub(super) fn revival_position(death_head: Cell, death_dir: Direction) -> Cell {
    let (dx, dy) = death_dir.opposite().delta();
    let (min, max) = revival_bounds();
    Cell::new(
        (death_head.x + dx * REVIVAL_DISTANCE).clamp(min, max),
        (death_head.y + dy * REVIVAL_DISTANCE).clamp(min, max),
    )
}

/// Straight body trailing behind `head`. Segments past the edge are kept as
/// is; only the head is guaranteed to be on the grid.
pub(super) fn reconstruct_body(head: Cell, dir: Direction, len: usize) -> Vec<Cell> {
    let back = dir.opposite();
    let mut body = Vec::with_capacity(len.max(1));
    body.push(head);
    for idx in 1..len {
        body.push(offset(body[idx - 1], back));
    }
    body
}
