use crate::constants::{
    initial_snake, INITIAL_FOOD, INITIAL_SPEED_MS, MAX_REVIVE_ATTEMPTS, QUESTION_TIME_LIMIT,
};
use crate::question::{parse_answer, MathQuestion};
use crate::rng::Rng;
use crate::types::{
    Cell, DeathRecord, Direction, GameLifecycle, GameSnapshot, RuntimeEvent, ScoreReport,
};

pub mod food;
pub mod movement;
pub mod revival;
mod utils;

pub use self::movement::{apply_direction, TickOutcome};
pub use self::revival::{AnswerOutcome, CountdownOutcome, RevivalOutcome};

/// Everything the engine knows about one game. Transitions never edit a
/// `GameState` in place; they build the next one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameState {
    pub snake: Vec<Cell>,
    /// `None` once the snake covers every cell.
    pub food: Option<Cell>,
    pub direction: Direction,
    pub pending_direction: Option<Direction>,
    pub lifecycle: GameLifecycle,
    pub score: u32,
    pub highest_score: u32,
    pub speed_ms: u64,
    pub death: Option<DeathRecord>,
    pub question: Option<MathQuestion>,
    pub time_left: u32,
    pub attempts_left: u32,
    pub generation: u64,
    pub seed: u32,
}

impl GameState {
    pub fn initial(food: Option<Cell>, highest_score: u32, seed: u32) -> Self {
        Self {
            snake: initial_snake(),
            food,
            direction: Direction::Right,
            pending_direction: None,
            lifecycle: GameLifecycle::Running,
            score: 0,
            highest_score,
            speed_ms: INITIAL_SPEED_MS,
            death: None,
            question: None,
            time_left: QUESTION_TIME_LIMIT,
            attempts_left: MAX_REVIVE_ATTEMPTS,
            generation: 0,
            seed,
        }
    }

    pub fn head(&self) -> Cell {
        self.snake[0]
    }

    pub fn is_frozen(&self) -> bool {
        self.food.is_none()
    }
}

/// Result of one transition: the replacement state plus what happened.
#[derive(Clone, Debug)]
pub struct Transition<O> {
    pub state: GameState,
    pub outcome: O,
    pub events: Vec<RuntimeEvent>,
}

impl<O> Transition<O> {
    pub(crate) fn unchanged(state: &GameState, outcome: O) -> Self {
        Self {
            state: state.clone(),
            outcome,
            events: Vec::new(),
        }
    }
}

/// Back to the starting board. The rng is rewound to the game seed so two
/// resets in a row lay out the same food.
pub(crate) fn reset_state(previous: &GameState, rng: &mut Rng) -> Transition<()> {
    *rng = Rng::new(previous.seed);
    let mut state = GameState::initial(None, previous.highest_score, previous.seed);
    state.food = food::place_food(&state.snake, rng);
    state.generation = previous.generation + 1;

    let mut events = vec![RuntimeEvent::Reset];
    if let Some(cell) = state.food {
        events.push(RuntimeEvent::FoodPlaced {
            x: cell.x,
            y: cell.y,
        });
    }
    Transition {
        state,
        outcome: (),
        events,
    }
}

#[derive(Clone, Debug)]
pub struct GameEngineOptions {
    pub seed: u32,
    pub initial_food: Option<Cell>,
}

impl GameEngineOptions {
    pub fn seeded(seed: u32) -> Self {
        Self {
            seed,
            initial_food: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GameEngine {
    state: GameState,
    rng: Rng,
    events: Vec<RuntimeEvent>,
    score_reports: Vec<ScoreReport>,
    tick_counter: u64,
}

impl GameEngine {
    pub fn new(options: GameEngineOptions) -> Self {
        let food = options.initial_food.unwrap_or(INITIAL_FOOD);
        Self {
            state: GameState::initial(Some(food), 0, options.seed),
            rng: Rng::new(options.seed),
            events: Vec::new(),
            score_reports: Vec::new(),
            tick_counter: 0,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn lifecycle(&self) -> GameLifecycle {
        self.state.lifecycle
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    pub fn generation(&self) -> u64 {
        self.state.generation
    }

    /// Timer pulses armed under an older generation must be dropped.
    pub fn is_current(&self, generation: u64) -> bool {
        self.state.generation == generation
    }

    /// Seed used by the next full reset.
    pub fn reseed(&mut self, seed: u32) {
        self.state.seed = seed;
    }

    pub fn on_tick(&mut self) -> TickOutcome {
        let direction = match self.state.pending_direction {
            Some(requested) => apply_direction(self.state.direction, requested),
            None => self.state.direction,
        };
        let result = movement::tick(&self.state, direction, &mut self.rng);
        if result.outcome != TickOutcome::Ignored {
            self.tick_counter += 1;
        }
        if matches!(result.outcome, TickOutcome::Ate | TickOutcome::BoardFull) {
            self.score_reports.push(ScoreReport {
                current: result.state.score,
                highest: result.state.highest_score,
            });
        }
        self.commit(result)
    }

    /// Returns whether the request is now the pending direction.
    pub fn on_direction_requested(&mut self, requested: Direction) -> bool {
        if self.state.lifecycle != GameLifecycle::Running {
            return false;
        }
        if apply_direction(self.state.direction, requested) != requested {
            return false;
        }
        self.state = GameState {
            pending_direction: Some(requested),
            ..self.state.clone()
        };
        true
    }

    pub fn choose_math_revival(&mut self) -> RevivalOutcome {
        let result = revival::choose_math_revival(&self.state, &mut self.rng);
        self.commit(result)
    }

    pub fn decline_revival(&mut self) -> RevivalOutcome {
        let result = revival::decline_revival(&self.state);
        self.commit(result)
    }

    pub fn submit_answer(&mut self, value: i64) -> AnswerOutcome {
        self.answer(Some(value))
    }

    pub fn submit_answer_text(&mut self, raw: &str) -> AnswerOutcome {
        self.answer(parse_answer(raw))
    }

    pub fn on_countdown_tick(&mut self) -> CountdownOutcome {
        let score_before = self.state.score;
        let result = revival::countdown_tick(&self.state, &mut self.rng);
        if result.outcome == CountdownOutcome::Expired(AnswerOutcome::Reset) {
            self.report_terminal(score_before);
        }
        self.commit(result)
    }

    pub fn on_countdown_expire(&mut self) -> AnswerOutcome {
        let score_before = self.state.score;
        let result = revival::countdown_expire(&self.state, &mut self.rng);
        if result.outcome == AnswerOutcome::Reset {
            self.report_terminal(score_before);
        }
        self.commit(result)
    }

    pub fn reset_game(&mut self) {
        self.report_terminal(self.state.score);
        let result = reset_state(&self.state, &mut self.rng);
        self.commit(result)
    }

    pub fn build_snapshot(&mut self) -> GameSnapshot {
        let state = &self.state;
        let answering = state.lifecycle == GameLifecycle::AnsweringQuestion;
        let dead = answering || state.lifecycle == GameLifecycle::AwaitingRevivalChoice;
        GameSnapshot {
            snake_cells: state.snake.clone(),
            food_cell: state.food,
            score: state.score,
            highest_score: state.highest_score,
            speed_ms: state.speed_ms,
            direction: state.direction,
            lifecycle: state.lifecycle,
            question: if answering {
                state.question.clone()
            } else {
                None
            },
            time_left: answering.then_some(state.time_left),
            attempts_left: dead.then_some(state.attempts_left),
            generation: state.generation,
            events: std::mem::take(&mut self.events),
        }
    }

    pub fn drain_score_reports(&mut self) -> Vec<ScoreReport> {
        std::mem::take(&mut self.score_reports)
    }

    fn answer(&mut self, value: Option<i64>) -> AnswerOutcome {
        let score_before = self.state.score;
        let result = revival::submit_answer(&self.state, value, &mut self.rng);
        if result.outcome == AnswerOutcome::Reset {
            self.report_terminal(score_before);
        }
        self.commit(result)
    }

    fn report_terminal(&mut self, final_score: u32) {
        self.score_reports.push(ScoreReport {
            current: final_score,
            highest: self.state.highest_score,
        });
    }

    fn commit<O>(&mut self, transition: Transition<O>) -> O {
        self.state = transition.state;
        self.events.extend(transition.events);
        transition.outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeathCause;

    fn make_engine(seed: u32) -> GameEngine {
        GameEngine::new(GameEngineOptions::seeded(seed))
    }

    fn kill_against_right_wall(engine: &mut GameEngine) {
        for _ in 0..32 {
            if engine.on_tick() == TickOutcome::Died(DeathCause::Wall) {
                return;
            }
        }
        panic!("snake should have reached the right wall");
    }

    fn answer(engine: &GameEngine) -> i64 {
        engine
            .state()
            .question
            .as_ref()
            .expect("question pending")
            .answer
    }

    #[test]
    fn new_engine_starts_with_reference_board() {
        let mut engine = make_engine(1);
        let snapshot = engine.build_snapshot();
        assert_eq!(
            snapshot.snake_cells,
            vec![Cell::new(5, 5), Cell::new(4, 5), Cell::new(3, 5)]
        );
        assert_eq!(snapshot.food_cell, Some(INITIAL_FOOD));
        assert_eq!(snapshot.direction, Direction::Right);
        assert_eq!(snapshot.lifecycle, GameLifecycle::Running);
        assert_eq!(snapshot.score, 0);
        assert_eq!(snapshot.speed_ms, INITIAL_SPEED_MS);
        assert!(snapshot.question.is_none());
        assert!(snapshot.attempts_left.is_none());
    }

    #[test]
    fn reference_scenario_eats_food_on_first_tick() {
        let mut engine = GameEngine::new(GameEngineOptions {
            seed: 12,
            initial_food: Some(Cell::new(6, 5)),
        });
        assert_eq!(engine.on_tick(), TickOutcome::Ate);
        let snapshot = engine.build_snapshot();
        assert_eq!(
            snapshot.snake_cells,
            vec![
                Cell::new(6, 5),
                Cell::new(5, 5),
                Cell::new(4, 5),
                Cell::new(3, 5)
            ]
        );
        assert_eq!(snapshot.score, 10);
        assert_eq!(snapshot.speed_ms, 145);
        let food = snapshot.food_cell.expect("food placed");
        assert!(!snapshot.snake_cells.contains(&food));
        assert_eq!(
            engine.drain_score_reports(),
            vec![ScoreReport {
                current: 10,
                highest: 10
            }]
        );
        assert!(engine.drain_score_reports().is_empty());
    }

    #[test]
    fn latest_valid_direction_wins_between_ticks() {
        let mut engine = make_engine(2);
        assert!(engine.on_direction_requested(Direction::Up));
        assert!(engine.on_direction_requested(Direction::Down));
        assert!(!engine.on_direction_requested(Direction::Left));
        assert_eq!(engine.on_tick(), TickOutcome::Moved);
        assert_eq!(engine.state().snake[0], Cell::new(5, 6));
        assert_eq!(engine.state().direction, Direction::Down);
        assert_eq!(engine.state().pending_direction, None);

        assert!(!engine.on_direction_requested(Direction::Up));
        engine.on_tick();
        assert_eq!(engine.state().snake[0], Cell::new(5, 7));
    }

    #[test]
    fn steering_is_ignored_while_dead() {
        let mut engine = make_engine(3);
        kill_against_right_wall(&mut engine);
        assert!(!engine.on_direction_requested(Direction::Up));
        assert_eq!(engine.state().pending_direction, None);
        assert_eq!(engine.on_tick(), TickOutcome::Ignored);
    }

    #[test]
    fn death_freezes_board_and_records_pre_collision_state() {
        let mut engine = make_engine(4);
        kill_against_right_wall(&mut engine);
        let state = engine.state().clone();
        assert_eq!(state.lifecycle, GameLifecycle::AwaitingRevivalChoice);
        let death = state.death.clone().expect("death recorded");
        assert_eq!(death.snake_at_death, state.snake);
        assert_eq!(death.head, Cell::new(19, 5));
        assert_eq!(death.direction, Direction::Right);

        let snapshot = engine.build_snapshot();
        assert_eq!(snapshot.attempts_left, Some(MAX_REVIVE_ATTEMPTS));
        assert!(snapshot
            .events
            .iter()
            .any(|event| matches!(event, RuntimeEvent::Died { .. })));
    }

    #[test]
    fn correct_answer_resumes_play_behind_death_point() {
        let mut engine = make_engine(5);
        kill_against_right_wall(&mut engine);
        let length = engine.state().snake.len();
        assert_eq!(engine.choose_math_revival(), RevivalOutcome::QuestionIssued);

        let snapshot = engine.build_snapshot();
        assert_eq!(snapshot.time_left, Some(QUESTION_TIME_LIMIT));
        assert!(snapshot.question.is_some());

        let value = answer(&engine);
        assert_eq!(
            engine.submit_answer_text(&format!(" {value} ")),
            AnswerOutcome::Revived
        );
        let state = engine.state();
        assert_eq!(state.lifecycle, GameLifecycle::Running);
        assert_eq!(state.snake.len(), length);
        assert_eq!(state.snake[0], Cell::new(14, 5));
        assert!(state.death.is_none());
        assert_eq!(engine.on_tick(), TickOutcome::Moved);
    }

    #[test]
    fn three_misses_reset_the_game() {
        let mut engine = GameEngine::new(GameEngineOptions {
            seed: 6,
            initial_food: Some(Cell::new(6, 5)),
        });
        assert_eq!(engine.on_tick(), TickOutcome::Ate);
        kill_against_right_wall(&mut engine);
        let score_at_death = engine.state().score;
        assert!(score_at_death >= 10);
        engine.drain_score_reports();
        engine.choose_math_revival();

        assert_eq!(
            engine.submit_answer_text("not a number"),
            AnswerOutcome::Retry { attempts_left: 2 }
        );
        let wrong = answer(&engine) + 1;
        assert_eq!(
            engine.submit_answer(wrong),
            AnswerOutcome::Retry { attempts_left: 1 }
        );
        assert_eq!(engine.on_countdown_expire(), AnswerOutcome::Reset);

        let snapshot = engine.build_snapshot();
        assert_eq!(snapshot.snake_cells, initial_snake());
        assert_eq!(snapshot.score, 0);
        assert_eq!(snapshot.highest_score, score_at_death);
        assert_eq!(snapshot.speed_ms, INITIAL_SPEED_MS);
        assert_eq!(snapshot.lifecycle, GameLifecycle::Running);
        assert_eq!(
            engine.drain_score_reports(),
            vec![ScoreReport {
                current: score_at_death,
                highest: score_at_death
            }]
        );
    }

    #[test]
    fn countdown_pulses_expire_question_and_stale_pulses_do_nothing() {
        let mut engine = make_engine(7);
        assert_eq!(engine.on_countdown_tick(), CountdownOutcome::Ignored);

        kill_against_right_wall(&mut engine);
        engine.choose_math_revival();
        let armed_at = engine.generation();
        for _ in 1..QUESTION_TIME_LIMIT {
            assert!(matches!(
                engine.on_countdown_tick(),
                CountdownOutcome::Counting { .. }
            ));
        }
        assert_eq!(
            engine.on_countdown_tick(),
            CountdownOutcome::Expired(AnswerOutcome::Retry { attempts_left: 2 })
        );
        assert!(!engine.is_current(armed_at));

        engine.reset_game();
        assert_eq!(engine.on_countdown_tick(), CountdownOutcome::Ignored);
        assert_eq!(engine.on_countdown_expire(), AnswerOutcome::Ignored);
        assert_eq!(engine.lifecycle(), GameLifecycle::Running);
    }

    #[test]
    fn decline_ends_game_until_reset() {
        let mut engine = make_engine(8);
        kill_against_right_wall(&mut engine);
        assert_eq!(engine.decline_revival(), RevivalOutcome::Declined);
        assert_eq!(engine.lifecycle(), GameLifecycle::Ended);
        assert_eq!(engine.on_tick(), TickOutcome::Ignored);
        assert_eq!(engine.choose_math_revival(), RevivalOutcome::Ignored);

        engine.reset_game();
        assert_eq!(engine.lifecycle(), GameLifecycle::Running);
        assert!(engine.state().death.is_none());
    }

    #[test]
    fn reset_twice_yields_same_snapshot() {
        let mut engine = make_engine(9);
        for _ in 0..4 {
            engine.on_tick();
        }
        engine.reset_game();
        let first = engine.build_snapshot();
        engine.reset_game();
        let second = engine.build_snapshot();

        assert_eq!(second.generation, first.generation + 1);
        assert_eq!(
            GameSnapshot {
                generation: 0,
                ..first
            },
            GameSnapshot {
                generation: 0,
                ..second
            }
        );
    }

    #[test]
    fn lives_after_exhausted_attempts_draw_fresh_questions() {
        let mut engine = make_engine(9);
        let mut lives = Vec::new();
        for _ in 0..3 {
            kill_against_right_wall(&mut engine);
            engine.choose_math_revival();
            let mut prompts = Vec::new();
            for _ in 0..MAX_REVIVE_ATTEMPTS {
                let question = engine.state().question.clone().expect("question pending");
                prompts.push(question.prompt);
                engine.on_countdown_expire();
            }
            assert_eq!(engine.lifecycle(), GameLifecycle::Running);
            lives.push((engine.state().seed, prompts));
        }

        assert_ne!(lives[0].0, lives[1].0);
        assert_ne!(lives[1].0, lives[2].0);
        assert_ne!(lives[0].1, lives[1].1);
        assert_ne!(lives[1].1, lives[2].1);

        // An explicit reset still rewinds to the current seed.
        engine.reset_game();
        let first = engine.build_snapshot();
        engine.reset_game();
        let second = engine.build_snapshot();
        assert_eq!(first.food_cell, second.food_cell);
    }

    #[test]
    fn same_seed_produces_same_game() {
        let mut a = make_engine(424_242);
        let mut b = make_engine(424_242);
        let turns = [Direction::Down, Direction::Left, Direction::Down, Direction::Right];
        for step in 0..60 {
            let dir = turns[(step / 5) % turns.len()];
            a.on_direction_requested(dir);
            b.on_direction_requested(dir);
            assert_eq!(a.on_tick(), b.on_tick());
            if a.lifecycle() == GameLifecycle::AwaitingRevivalChoice {
                a.choose_math_revival();
                b.choose_math_revival();
            }
            assert_eq!(a.build_snapshot(), b.build_snapshot());
        }
    }
}
