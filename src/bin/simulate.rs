use clap::Parser;
use serde::Serialize;
use serde_json::{json, Value};
use snake_revival_server::constants::{
    revival_bounds, GRID_SIZE, INITIAL_SPEED_MS, MIN_SPEED_MS, QUESTION_TIME_LIMIT,
    SCORE_PER_FOOD,
};
use snake_revival_server::engine::{GameEngine, GameEngineOptions, GameState};
use snake_revival_server::session::{GameInput, GameSession, Renderer};
use snake_revival_server::types::{
    Cell, Direction, GameLifecycle, GameSnapshot, RuntimeEvent, ScoreReport,
};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Number of autopilot games to play.
    #[arg(long)]
    games: Option<u32>,
    #[arg(long)]
    seed: Option<u64>,
    /// Movement ticks after which a game is stopped.
    #[arg(long)]
    max_ticks: Option<u64>,
    /// Misses before the correct answer on each revival. Every second miss
    /// lets the countdown run out instead of typing a wrong number.
    #[arg(long)]
    wrong_answers: Option<u32>,
    /// Decline every revival offer.
    #[arg(long)]
    decline: bool,
    /// Food eaten per life before the autopilot stops steering and lets the
    /// snake crash.
    #[arg(long)]
    food_per_life: Option<u32>,
    #[arg(long)]
    game_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug)]
struct GamePlan {
    name: String,
    seed: u32,
    max_ticks: u64,
    wrong_answers: u32,
    decline: bool,
    food_per_life: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum FinishReason {
    Declined,
    Reset,
    BoardFull,
    TickLimit,
}

#[derive(Clone, Debug, Serialize)]
struct GameResultLine {
    game: String,
    seed: u32,
    reason: FinishReason,
    ticks: u64,
    score: u32,
    #[serde(rename = "highestScore")]
    highest_score: u32,
    #[serde(rename = "foodEaten")]
    food_eaten: u32,
    deaths: u32,
    questions: u32,
    #[serde(rename = "wrongAnswers")]
    wrong_answers: u32,
    timeouts: u32,
    revivals: u32,
    #[serde(rename = "scoreReports")]
    score_reports: usize,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    frame: u64,
    message: String,
}

#[derive(Clone, Debug, Serialize)]
struct GameRunResult {
    #[serde(flatten)]
    result: GameResultLine,
    #[serde(rename = "anomalyRecords")]
    anomaly_records: Vec<AnomalyRecord>,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "gameId")]
    game_id: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "gameCount")]
    game_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageTicks")]
    average_ticks: u64,
    #[serde(rename = "bestScore")]
    best_score: u32,
    #[serde(rename = "reasonCounts")]
    reason_counts: BTreeMap<String, usize>,
    games: Vec<GameResultLine>,
}

#[derive(Clone, Debug, Serialize)]
struct StructuredLogLine {
    #[serde(rename = "timestampMs")]
    timestamp_ms: u64,
    level: String,
    event: String,
    #[serde(rename = "gameId")]
    game_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    game: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tick: Option<u64>,
    details: Value,
}

/// Counts events and checks every published frame.
#[derive(Debug, Default)]
struct FrameAudit {
    frames: u64,
    food_eaten: u32,
    deaths: u32,
    questions: u32,
    wrong_answers: u32,
    timeouts: u32,
    revivals: u32,
    resets: u32,
    declined: bool,
    anomalies: Vec<String>,
    anomaly_records: Vec<AnomalyRecord>,
    anomaly_seen: HashSet<String>,
}

impl Renderer for FrameAudit {
    fn render(&mut self, snapshot: &GameSnapshot) {
        self.frames += 1;
        for message in collect_snapshot_anomalies(snapshot) {
            push_anomaly(
                &mut self.anomalies,
                &mut self.anomaly_records,
                &mut self.anomaly_seen,
                self.frames,
                message,
            );
        }
        for event in &snapshot.events {
            match event {
                RuntimeEvent::FoodEaten { .. } => self.food_eaten += 1,
                RuntimeEvent::Died { .. } => self.deaths += 1,
                RuntimeEvent::QuestionIssued { .. } => self.questions += 1,
                RuntimeEvent::AnswerRejected { timed_out, .. } => {
                    if *timed_out {
                        self.timeouts += 1;
                    } else {
                        self.wrong_answers += 1;
                    }
                }
                RuntimeEvent::Revived { x, y } => {
                    let (min, max) = revival_bounds();
                    if !(min..=max).contains(x) || !(min..=max).contains(y) {
                        push_anomaly(
                            &mut self.anomalies,
                            &mut self.anomaly_records,
                            &mut self.anomaly_seen,
                            self.frames,
                            format!("revived head outside safe zone: ({x},{y})"),
                        );
                    }
                    self.revivals += 1;
                }
                RuntimeEvent::RevivalDeclined => self.declined = true,
                RuntimeEvent::Reset => self.resets += 1,
                _ => {}
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let plans = resolve_games(&cli);
    let run_started_at_ms = now_ms();
    let seed_hint = plans.first().map(|plan| plan.seed).unwrap_or(0);
    let game_id = cli
        .game_id
        .clone()
        .unwrap_or_else(|| default_game_id(seed_hint, run_started_at_ms));
    let mut has_anomaly = false;
    let mut game_results = Vec::new();
    let mut total_anomalies = 0usize;

    for plan in plans {
        emit_log(
            "info",
            "game_started",
            &game_id,
            Some(&plan.name),
            Some(plan.seed),
            None,
            json!({
                "maxTicks": plan.max_ticks,
                "wrongAnswers": plan.wrong_answers,
                "decline": plan.decline,
                "foodPerLife": plan.food_per_life,
            }),
        );
        let game_run = run_game(&plan);

        for anomaly in &game_run.anomaly_records {
            emit_log(
                "warn",
                "anomaly_detected",
                &game_id,
                Some(&plan.name),
                Some(plan.seed),
                None,
                json!({
                    "frame": anomaly.frame,
                    "message": anomaly.message,
                }),
            );
        }

        if !game_run.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += game_run.anomaly_records.len();

        emit_log(
            "info",
            "game_finished",
            &game_id,
            Some(&plan.name),
            Some(plan.seed),
            Some(game_run.result.ticks),
            json!({
                "reason": game_run.result.reason,
                "score": game_run.result.score,
                "highestScore": game_run.result.highest_score,
                "revivals": game_run.result.revivals,
                "anomalyCount": game_run.anomaly_records.len(),
            }),
        );

        match serde_json::to_string(&game_run.result) {
            Ok(line) => println!("{line}"),
            Err(error) => emit_log(
                "error",
                "result_serialize_failed",
                &game_id,
                Some(&plan.name),
                Some(plan.seed),
                None,
                json!({ "error": error.to_string() }),
            ),
        }
        game_results.push(game_run.result);
    }

    let summary = build_run_summary(
        game_id.clone(),
        run_started_at_ms,
        now_ms(),
        game_results,
        total_anomalies,
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                "error",
                "summary_write_failed",
                &game_id,
                None,
                None,
                None,
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    emit_log(
        "info",
        "run_finished",
        &game_id,
        None,
        None,
        None,
        json!({
            "gameCount": summary.game_count,
            "anomalyCount": summary.anomaly_count,
            "averageTicks": summary.average_ticks,
            "bestScore": summary.best_score,
            "reasonCounts": summary.reason_counts,
            "summaryOut": summary_out_written,
        }),
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

/// Plays one game on virtual time: the loop stands in for both clocks and
/// always fires the pulse the current timer plan asks for.
fn run_game(plan: &GamePlan) -> GameRunResult {
    let engine = GameEngine::new(GameEngineOptions::seeded(plan.seed));
    let mut session = GameSession::new(engine, FrameAudit::default(), Vec::<ScoreReport>::new());
    let mut misses_this_revival = 0u32;
    let mut food_at_life_start = 0u32;
    let mut steps = 0u64;
    // Guards against a lifecycle that stops accepting every input.
    let step_limit = plan.max_ticks * 4 + 1_000;

    let reason = loop {
        steps += 1;
        if steps > step_limit || session.engine().tick_count() >= plan.max_ticks {
            break FinishReason::TickLimit;
        }
        if session.renderer().resets > 0 {
            break FinishReason::Reset;
        }

        let state = session.engine().state().clone();
        match state.lifecycle {
            GameLifecycle::Running => {
                if state.is_frozen() {
                    break FinishReason::BoardFull;
                }
                let eaten_this_life = session.renderer().food_eaten - food_at_life_start;
                if eaten_this_life < plan.food_per_life {
                    if let Some(direction) = choose_direction(&state) {
                        if direction != state.direction {
                            session.handle(GameInput::Steer(direction));
                        }
                    }
                }
                let armed = session.timer_plan();
                session.handle_timer(GameInput::MovementTick, armed.generation);
            }
            GameLifecycle::AwaitingRevivalChoice => {
                misses_this_revival = 0;
                food_at_life_start = session.renderer().food_eaten;
                if plan.decline {
                    session.handle(GameInput::DeclineRevival);
                } else {
                    session.handle(GameInput::ChooseMathRevival);
                }
            }
            GameLifecycle::AnsweringQuestion => {
                let Some(question) = state.question.as_ref() else {
                    break FinishReason::TickLimit;
                };
                if misses_this_revival < plan.wrong_answers {
                    misses_this_revival += 1;
                    if misses_this_revival % 2 == 0 {
                        let armed = session.timer_plan();
                        for _ in 0..QUESTION_TIME_LIMIT {
                            session.handle_timer(GameInput::CountdownTick, armed.generation);
                        }
                    } else {
                        let wrong = question.answer + 1;
                        session.handle(GameInput::Answer(wrong.to_string()));
                    }
                } else {
                    session.handle(GameInput::Answer(question.answer.to_string()));
                }
            }
            GameLifecycle::Ended => {
                if session.renderer().declined {
                    break FinishReason::Declined;
                }
                break FinishReason::TickLimit;
            }
        }
    };

    // A declined game reports its final score with the reset that clears it.
    if reason == FinishReason::Declined {
        session.handle(GameInput::Reset);
    }

    let ticks = session.engine().tick_count();
    let score_reports = session.persister().len();
    let highest_score = session.engine().state().highest_score;
    let final_score = session
        .persister()
        .last()
        .filter(|_| matches!(reason, FinishReason::Declined | FinishReason::Reset))
        .map(|report| report.current)
        .unwrap_or(session.engine().state().score);
    let audit = session.renderer();

    GameRunResult {
        result: GameResultLine {
            game: plan.name.clone(),
            seed: plan.seed,
            reason,
            ticks,
            score: final_score,
            highest_score,
            food_eaten: audit.food_eaten,
            deaths: audit.deaths,
            questions: audit.questions,
            wrong_answers: audit.wrong_answers,
            timeouts: audit.timeouts,
            revivals: audit.revivals,
            score_reports,
            anomalies: audit.anomalies.clone(),
        },
        anomaly_records: audit.anomaly_records.clone(),
    }
}

/// Greedy autopilot: among the safe turns, take the one closest to the food.
fn choose_direction(state: &GameState) -> Option<Direction> {
    let head = state.head();
    let target = state.food?;
    Direction::ALL
        .into_iter()
        .filter(|dir| !dir.is_opposite(state.direction))
        .filter(|dir| {
            let (dx, dy) = dir.delta();
            is_free(state, Cell::new(head.x + dx, head.y + dy))
        })
        .min_by_key(|dir| {
            let (dx, dy) = dir.delta();
            let next = Cell::new(head.x + dx, head.y + dy);
            (next.x - target.x).abs() + (next.y - target.y).abs()
        })
}

fn is_free(state: &GameState, cell: Cell) -> bool {
    (0..GRID_SIZE).contains(&cell.x)
        && (0..GRID_SIZE).contains(&cell.y)
        && !state.snake.contains(&cell)
}

fn collect_snapshot_anomalies(snapshot: &GameSnapshot) -> Vec<String> {
    let mut anomalies = Vec::new();

    let unique: HashSet<Cell> = snapshot.snake_cells.iter().copied().collect();
    if unique.len() != snapshot.snake_cells.len() {
        anomalies.push("snake overlaps itself".to_string());
    }

    if let Some(food) = snapshot.food_cell {
        if !(0..GRID_SIZE).contains(&food.x) || !(0..GRID_SIZE).contains(&food.y) {
            anomalies.push(format!("food off grid: ({},{})", food.x, food.y));
        }
    }

    // A revived body may cover old food; only freshly placed food is checked.
    for event in &snapshot.events {
        if let RuntimeEvent::FoodPlaced { x, y } = event {
            if unique.contains(&Cell::new(*x, *y)) {
                anomalies.push(format!("food placed on snake: ({x},{y})"));
            }
        }
    }

    if snapshot.lifecycle == GameLifecycle::Running {
        if let Some(head) = snapshot.snake_cells.first() {
            if !(0..GRID_SIZE).contains(&head.x) || !(0..GRID_SIZE).contains(&head.y) {
                anomalies.push(format!("running head off grid: ({},{})", head.x, head.y));
            }
        }
    }

    if snapshot.score % SCORE_PER_FOOD != 0 {
        anomalies.push(format!("score not a food multiple: {}", snapshot.score));
    }
    if snapshot.highest_score < snapshot.score {
        anomalies.push(format!(
            "highest score below score: {} < {}",
            snapshot.highest_score, snapshot.score
        ));
    }
    if snapshot.speed_ms < MIN_SPEED_MS || snapshot.speed_ms > INITIAL_SPEED_MS {
        anomalies.push(format!("speed out of range: {}", snapshot.speed_ms));
    }
    if snapshot.lifecycle == GameLifecycle::AnsweringQuestion && snapshot.question.is_none() {
        anomalies.push("answering without a question".to_string());
    }
    anomalies
}

fn resolve_games(cli: &Cli) -> Vec<GamePlan> {
    let seed = normalize_seed(cli.seed.unwrap_or_else(now_ms));
    let games = cli.games.unwrap_or(3).clamp(1, 100);
    let max_ticks = cli.max_ticks.unwrap_or(5_000).clamp(1, 1_000_000);
    let wrong_answers = cli.wrong_answers.unwrap_or(0).min(10);
    let food_per_life = cli.food_per_life.unwrap_or(5);

    (0..games)
        .map(|idx| GamePlan {
            name: format!("autopilot-{}", idx + 1),
            seed: normalize_seed(seed as u64 + idx as u64),
            max_ticks,
            wrong_answers,
            decline: cli.decline,
            food_per_life,
        })
        .collect()
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    frame: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        frame,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_game_id(seed: u32, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    game_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    games: Vec<GameResultLine>,
    anomaly_count: usize,
) -> RunSummary {
    let game_count = games.len();
    let total_ticks: u64 = games.iter().map(|game| game.ticks).sum();
    let average_ticks = if game_count == 0 {
        0
    } else {
        total_ticks / game_count as u64
    };
    let mut reason_counts: BTreeMap<String, usize> = BTreeMap::new();
    for game in &games {
        *reason_counts
            .entry(finish_reason_key(game.reason).to_string())
            .or_insert(0) += 1;
    }
    let best_score = games
        .iter()
        .map(|game| game.highest_score)
        .max()
        .unwrap_or(0);
    RunSummary {
        game_id,
        started_at_ms,
        finished_at_ms,
        game_count,
        anomaly_count,
        average_ticks,
        best_score,
        reason_counts,
        games,
    }
}

fn emit_log(
    level: &str,
    event: &str,
    game_id: &str,
    game: Option<&str>,
    seed: Option<u32>,
    tick: Option<u64>,
    details: Value,
) {
    let log_line = StructuredLogLine {
        timestamp_ms: now_ms(),
        level: level.to_string(),
        event: event.to_string(),
        game_id: game_id.to_string(),
        game: game.map(|value| value.to_string()),
        seed,
        tick,
        details,
    };
    match serde_json::to_string(&log_line) {
        Ok(line) => eprintln!("{line}"),
        Err(error) => eprintln!("[simulate] failed to serialize log line {event}: {error}"),
    }
}

fn finish_reason_key(reason: FinishReason) -> &'static str {
    match reason {
        FinishReason::Declined => "declined",
        FinishReason::Reset => "reset",
        FinishReason::BoardFull => "board_full",
        FinishReason::TickLimit => "tick_limit",
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary)
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
    std::fs::write(path, summary_text)
}
