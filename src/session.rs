use std::time::Duration;

use crate::constants::COUNTDOWN_TICK_MS;
use crate::engine::{
    AnswerOutcome, CountdownOutcome, GameEngine, RevivalOutcome, TickOutcome,
};
use crate::types::{Direction, GameLifecycle, GameSnapshot, ScoreReport};

/// Receives a snapshot after every accepted transition.
pub trait Renderer {
    fn render(&mut self, snapshot: &GameSnapshot);
}

/// Stores scores somewhere else. Implementations must return quickly; the
/// engine waits on nothing.
pub trait ScorePersister {
    fn report_score(&mut self, report: ScoreReport);
}

impl<F> Renderer for F
where
    F: FnMut(&GameSnapshot),
{
    fn render(&mut self, snapshot: &GameSnapshot) {
        self(snapshot)
    }
}

impl ScorePersister for Vec<ScoreReport> {
    fn report_score(&mut self, report: ScoreReport) {
        self.push(report);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameInput {
    MovementTick,
    CountdownTick,
    Steer(Direction),
    ChooseMathRevival,
    DeclineRevival,
    Answer(String),
    Reset,
}

/// Which clocks the shell should keep running, stamped with the engine
/// generation they belong to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerPlan {
    pub generation: u64,
    pub movement: Option<Duration>,
    pub countdown: Option<Duration>,
}

impl TimerPlan {
    pub fn for_engine(engine: &GameEngine) -> Self {
        let state = engine.state();
        let movement = (state.lifecycle == GameLifecycle::Running && !state.is_frozen())
            .then(|| Duration::from_millis(state.speed_ms));
        let countdown = (state.lifecycle == GameLifecycle::AnsweringQuestion)
            .then(|| Duration::from_millis(COUNTDOWN_TICK_MS));
        Self {
            generation: state.generation,
            movement,
            countdown,
        }
    }
}

pub struct GameSession<R, P> {
    engine: GameEngine,
    renderer: R,
    persister: P,
}

impl<R: Renderer, P: ScorePersister> GameSession<R, P> {
    pub fn new(engine: GameEngine, renderer: R, persister: P) -> Self {
        let mut session = Self {
            engine,
            renderer,
            persister,
        };
        session.publish();
        session
    }

    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut GameEngine {
        &mut self.engine
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn persister(&self) -> &P {
        &self.persister
    }

    pub fn persister_mut(&mut self) -> &mut P {
        &mut self.persister
    }

    pub fn timer_plan(&self) -> TimerPlan {
        TimerPlan::for_engine(&self.engine)
    }

    /// Runs one input to completion, then publishes if anything changed.
    pub fn handle(&mut self, input: GameInput) -> TimerPlan {
        let changed = match input {
            GameInput::MovementTick => self.engine.on_tick() != TickOutcome::Ignored,
            GameInput::CountdownTick => {
                self.engine.on_countdown_tick() != CountdownOutcome::Ignored
            }
            GameInput::Steer(direction) => self.engine.on_direction_requested(direction),
            GameInput::ChooseMathRevival => {
                self.engine.choose_math_revival() != RevivalOutcome::Ignored
            }
            GameInput::DeclineRevival => {
                self.engine.decline_revival() != RevivalOutcome::Ignored
            }
            GameInput::Answer(raw) => {
                self.engine.submit_answer_text(&raw) != AnswerOutcome::Ignored
            }
            GameInput::Reset => {
                self.engine.reset_game();
                true
            }
        };
        if changed {
            self.publish();
        }
        self.timer_plan()
    }

    /// Drops a timer pulse armed for an older generation.
    pub fn handle_timer(&mut self, input: GameInput, armed_generation: u64) -> TimerPlan {
        if !self.engine.is_current(armed_generation) {
            return self.timer_plan();
        }
        self.handle(input)
    }

    fn publish(&mut self) {
        for report in self.engine.drain_score_reports() {
            self.persister.report_score(report);
        }
        let snapshot = self.engine.build_snapshot();
        self.renderer.render(&snapshot);
    }
}
