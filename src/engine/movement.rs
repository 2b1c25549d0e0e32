use super::food::place_food;
use super::utils::{in_bounds, offset};
use super::{GameState, Transition};
use crate::constants::{next_speed_ms, MAX_REVIVE_ATTEMPTS, SCORE_PER_FOOD};
use crate::rng::Rng;
use crate::types::{DeathCause, DeathRecord, Direction, GameLifecycle, RuntimeEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Moved,
    Ate,
    Died(DeathCause),
    /// Food was eaten and no free cell is left for the next one.
    BoardFull,
    Ignored,
}

pub fn apply_direction(current: Direction, requested: Direction) -> Direction {
    if requested.is_opposite(current) {
        current
    } else {
        requested
    }
}

/// Advances the snake one cell in `direction`. The previous state is left
/// untouched; the rng is only consumed when food has to be replaced.
pub fn tick(state: &GameState, direction: Direction, rng: &mut Rng) -> Transition<TickOutcome> {
    if state.lifecycle != GameLifecycle::Running || state.is_frozen() {
        return Transition::unchanged(state, TickOutcome::Ignored);
    }

    let head = state.head();
    let candidate = offset(head, direction);
    let cause = if !in_bounds(candidate) {
        Some(DeathCause::Wall)
    } else if state.snake.contains(&candidate) {
        Some(DeathCause::SelfCollision)
    } else {
        None
    };

    if let Some(cause) = cause {
        let next = GameState {
            lifecycle: GameLifecycle::AwaitingRevivalChoice,
            direction,
            pending_direction: None,
            death: Some(DeathRecord {
                snake_at_death: state.snake.clone(),
                direction,
                head,
            }),
            attempts_left: MAX_REVIVE_ATTEMPTS,
            generation: state.generation + 1,
            ..state.clone()
        };
        return Transition {
            state: next,
            outcome: TickOutcome::Died(cause),
            events: vec![RuntimeEvent::Died {
                cause,
                x: head.x,
                y: head.y,
            }],
        };
    }

    let mut snake = Vec::with_capacity(state.snake.len() + 1);
    snake.push(candidate);
    snake.extend_from_slice(&state.snake);

    if state.food != Some(candidate) {
        snake.pop();
        return Transition {
            state: GameState {
                snake,
                direction,
                pending_direction: None,
                ..state.clone()
            },
            outcome: TickOutcome::Moved,
            events: Vec::new(),
        };
    }

    let score = state.score + SCORE_PER_FOOD;
    let food = place_food(&snake, rng);
    let mut events = vec![RuntimeEvent::FoodEaten {
        x: candidate.x,
        y: candidate.y,
        score,
    }];
    let outcome = match food {
        Some(cell) => {
            events.push(RuntimeEvent::FoodPlaced {
                x: cell.x,
                y: cell.y,
            });
            TickOutcome::Ate
        }
        None => {
            events.push(RuntimeEvent::BoardFull);
            TickOutcome::BoardFull
        }
    };

    Transition {
        state: GameState {
            snake,
            food,
            direction,
            pending_direction: None,
            score,
            highest_score: state.highest_score.max(score),
            speed_ms: next_speed_ms(state.speed_ms),
            ..state.clone()
        },
        outcome,
        events,
    }
}
