use crate::types::Cell;

pub const GRID_SIZE: i32 = 20;

pub const INITIAL_SPEED_MS: u64 = 150;
pub const SPEED_STEP_MS: u64 = 5;
pub const MIN_SPEED_MS: u64 = 50;

pub const SCORE_PER_FOOD: u32 = 10;

pub const QUESTION_TIME_LIMIT: u32 = 10;
pub const COUNTDOWN_TICK_MS: u64 = 1_000;
pub const MAX_REVIVE_ATTEMPTS: u32 = 3;

pub const REVIVAL_DISTANCE: i32 = 5;
pub const REVIVAL_MARGIN: i32 = 2;

pub const FOOD_PLACEMENT_ATTEMPTS: usize = 64;

pub const INITIAL_FOOD: Cell = Cell { x: 15, y: 15 };

pub fn initial_snake() -> Vec<Cell> {
    vec![Cell::new(5, 5), Cell::new(4, 5), Cell::new(3, 5)]
}

pub fn next_speed_ms(current_ms: u64) -> u64 {
    current_ms.saturating_sub(SPEED_STEP_MS).max(MIN_SPEED_MS)
}

/// Smallest and largest coordinate a revived head may take on either axis.
pub fn revival_bounds() -> (i32, i32) {
    (REVIVAL_MARGIN, GRID_SIZE - 1 - REVIVAL_MARGIN)
}
