use super::utils::{reconstruct_body, revival_position};
use super::{reset_state, GameState, Transition};
use crate::constants::{MAX_REVIVE_ATTEMPTS, QUESTION_TIME_LIMIT};
use crate::question::MathQuestion;
use crate::rng::Rng;
use crate::types::{GameLifecycle, RuntimeEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevivalOutcome {
    QuestionIssued,
    Declined,
    Ignored,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnswerOutcome {
    Revived,
    Retry { attempts_left: u32 },
    /// Attempts ran out and the game started over.
    Reset,
    Ignored,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountdownOutcome {
    Counting { time_left: u32 },
    Expired(AnswerOutcome),
    Ignored,
}

pub fn choose_math_revival(state: &GameState, rng: &mut Rng) -> Transition<RevivalOutcome> {
    if state.lifecycle != GameLifecycle::AwaitingRevivalChoice {
        return Transition::unchanged(state, RevivalOutcome::Ignored);
    }
    let (next, event) = with_new_question(state, state.attempts_left, rng);
    Transition {
        state: GameState {
            lifecycle: GameLifecycle::AnsweringQuestion,
            ..next
        },
        outcome: RevivalOutcome::QuestionIssued,
        events: vec![event],
    }
}

pub fn decline_revival(state: &GameState) -> Transition<RevivalOutcome> {
    if state.lifecycle != GameLifecycle::AwaitingRevivalChoice {
        return Transition::unchanged(state, RevivalOutcome::Ignored);
    }
    Transition {
        state: GameState {
            lifecycle: GameLifecycle::Ended,
            generation: state.generation + 1,
            ..state.clone()
        },
        outcome: RevivalOutcome::Declined,
        events: vec![RuntimeEvent::RevivalDeclined],
    }
}

/// `None` stands for input that could not be read as a number.
pub fn submit_answer(
    state: &GameState,
    value: Option<i64>,
    rng: &mut Rng,
) -> Transition<AnswerOutcome> {
    if state.lifecycle != GameLifecycle::AnsweringQuestion {
        return Transition::unchanged(state, AnswerOutcome::Ignored);
    }
    let correct = match (&state.question, value) {
        (Some(question), Some(value)) => question.is_correct(value),
        _ => false,
    };
    if correct {
        revive(state)
    } else {
        penalize(state, false, rng)
    }
}

pub fn countdown_tick(state: &GameState, rng: &mut Rng) -> Transition<CountdownOutcome> {
    if state.lifecycle != GameLifecycle::AnsweringQuestion {
        return Transition::unchanged(state, CountdownOutcome::Ignored);
    }
    if state.time_left <= 1 {
        let expired = countdown_expire(state, rng);
        return Transition {
            outcome: CountdownOutcome::Expired(expired.outcome),
            state: expired.state,
            events: expired.events,
        };
    }
    let time_left = state.time_left - 1;
    Transition {
        state: GameState {
            time_left,
            ..state.clone()
        },
        outcome: CountdownOutcome::Counting { time_left },
        events: Vec::new(),
    }
}

pub fn countdown_expire(state: &GameState, rng: &mut Rng) -> Transition<AnswerOutcome> {
    if state.lifecycle != GameLifecycle::AnsweringQuestion {
        return Transition::unchanged(state, AnswerOutcome::Ignored);
    }
    penalize(state, true, rng)
}

fn revive(state: &GameState) -> Transition<AnswerOutcome> {
    let Some(death) = state.death.as_ref() else {
        debug_assert!(false, "answering a question without a death record");
        return Transition::unchanged(state, AnswerOutcome::Ignored);
    };
    let head = revival_position(death.head, death.direction);
    let snake = reconstruct_body(head, death.direction, death.snake_at_death.len());
    Transition {
        state: GameState {
            snake,
            direction: death.direction,
            pending_direction: None,
            lifecycle: GameLifecycle::Running,
            death: None,
            question: None,
            time_left: QUESTION_TIME_LIMIT,
            attempts_left: MAX_REVIVE_ATTEMPTS,
            generation: state.generation + 1,
            ..state.clone()
        },
        outcome: AnswerOutcome::Revived,
        events: vec![RuntimeEvent::Revived {
            x: head.x,
            y: head.y,
        }],
    }
}

fn penalize(state: &GameState, timed_out: bool, rng: &mut Rng) -> Transition<AnswerOutcome> {
    let attempts_left = state.attempts_left.saturating_sub(1);
    let rejected = RuntimeEvent::AnswerRejected {
        attempts_left,
        timed_out,
    };
    if attempts_left == 0 {
        // The next life runs on a seed drawn from this one so it never replays
        // the food and questions of the life that just ended.
        let next_life = GameState {
            seed: rng.next_u32(),
            ..state.clone()
        };
        let reset = reset_state(&next_life, rng);
        let mut events = vec![rejected];
        events.extend(reset.events);
        return Transition {
            state: reset.state,
            outcome: AnswerOutcome::Reset,
            events,
        };
    }

    let (next, issued) = with_new_question(state, attempts_left, rng);
    Transition {
        state: next,
        outcome: AnswerOutcome::Retry { attempts_left },
        events: vec![rejected, issued],
    }
}

fn with_new_question(
    state: &GameState,
    attempts_left: u32,
    rng: &mut Rng,
) -> (GameState, RuntimeEvent) {
    let question = MathQuestion::generate(rng);
    let event = RuntimeEvent::QuestionIssued {
        prompt: question.prompt.clone(),
        attempts_left,
    };
    let next = GameState {
        question: Some(question),
        time_left: QUESTION_TIME_LIMIT,
        attempts_left,
        generation: state.generation + 1,
        ..state.clone()
    };
    (next, event)
}
