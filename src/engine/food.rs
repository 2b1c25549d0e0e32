use crate::constants::{FOOD_PLACEMENT_ATTEMPTS, GRID_SIZE};
use crate::rng::Rng;
use crate::types::Cell;

/// Picks a free cell uniformly. `None` means the snake covers the board.
pub fn place_food(snake: &[Cell], rng: &mut Rng) -> Option<Cell> {
    for _ in 0..FOOD_PLACEMENT_ATTEMPTS {
        let candidate = Cell::new(rng.range(0, GRID_SIZE), rng.range(0, GRID_SIZE));
        if !snake.contains(&candidate) {
            return Some(candidate);
        }
    }

    let free_cells: Vec<Cell> = (0..GRID_SIZE)
        .flat_map(|y| (0..GRID_SIZE).map(move |x| Cell::new(x, y)))
        .filter(|cell| !snake.contains(cell))
        .collect();
    if free_cells.is_empty() {
        return None;
    }
    Some(free_cells[rng.pick_index(free_cells.len())])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_cells() -> Vec<Cell> {
        (0..GRID_SIZE)
            .flat_map(|y| (0..GRID_SIZE).map(move |x| Cell::new(x, y)))
            .collect()
    }

    #[test]
    fn food_never_lands_on_snake() {
        let snake = vec![Cell::new(5, 5), Cell::new(4, 5), Cell::new(3, 5)];
        for seed in 1..=500u32 {
            let mut rng = Rng::new(seed);
            let food = place_food(&snake, &mut rng).expect("board has room");
            assert!(!snake.contains(&food));
            assert!((0..GRID_SIZE).contains(&food.x));
            assert!((0..GRID_SIZE).contains(&food.y));
        }
    }

    #[test]
    fn nearly_full_board_finds_last_free_cell() {
        let mut snake = all_cells();
        let hole = snake.remove(137);
        for seed in 1..=20u32 {
            let mut rng = Rng::new(seed);
            assert_eq!(place_food(&snake, &mut rng), Some(hole));
        }
    }

    #[test]
    fn full_board_reports_no_placement() {
        let snake = all_cells();
        let mut rng = Rng::new(3);
        assert_eq!(place_food(&snake, &mut rng), None);
    }
}
