use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use snake_revival_server::engine::{GameEngine, GameEngineOptions};
use snake_revival_server::score_store::ScoreStore;
use snake_revival_server::server_protocol::{
    parse_client_message, ParsedClientMessage, ServerMessage,
};
use snake_revival_server::server_utils::{
    make_seed, parse_score_limit, resolve_port, resolve_score_db_path, resolve_static_dir,
    sanitize_name,
};
use snake_revival_server::session::{
    GameInput, GameSession, Renderer, ScorePersister, TimerPlan,
};
use snake_revival_server::types::{GameSnapshot, ScoreReport};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tower_http::services::{ServeDir, ServeFile};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

const OUTBOUND_QUEUE: usize = 256;
const SCORE_QUEUE: usize = 1024;

#[derive(Clone)]
struct AppState {
    scores: Arc<Mutex<ScoreStore>>,
    score_tx: mpsc::Sender<ScoreJob>,
}

#[derive(Debug)]
struct ScoreJob {
    name: String,
    report: ScoreReport,
}

#[derive(Debug, Deserialize)]
struct ScoreQuery {
    limit: Option<String>,
}

/// Pushes state frames into the connection's outbound queue.
struct ChannelRenderer {
    client_id: String,
    tx: mpsc::Sender<String>,
}

impl Renderer for ChannelRenderer {
    fn render(&mut self, snapshot: &GameSnapshot) {
        let Some(payload) = (ServerMessage::State { snapshot }).to_json() else {
            eprintln!("[server] failed to serialize state for {}", self.client_id);
            return;
        };
        if self.tx.try_send(payload).is_err() {
            eprintln!("[server] outbound queue full for {}, frame dropped", self.client_id);
        }
    }
}

/// Hands score reports to the writer task without waiting on disk.
struct ChannelPersister {
    name: String,
    tx: mpsc::Sender<ScoreJob>,
}

impl ScorePersister for ChannelPersister {
    fn report_score(&mut self, report: ScoreReport) {
        let job = ScoreJob {
            name: self.name.clone(),
            report,
        };
        if self.tx.try_send(job).is_err() {
            eprintln!(
                "[server] score queue unavailable, dropping report for {}",
                self.name
            );
        }
    }
}

type ConnectionSession = GameSession<ChannelRenderer, ChannelPersister>;

#[tokio::main]
async fn main() {
    let port = resolve_port(std::env::var("PORT").ok().as_deref());
    let score_path = resolve_score_db_path(std::env::var("SCORE_DB_PATH").ok().as_deref());
    println!("[server] score store: {}", score_path.to_string_lossy());

    let scores = Arc::new(Mutex::new(ScoreStore::new(score_path)));
    let (score_tx, score_rx) = mpsc::channel::<ScoreJob>(SCORE_QUEUE);
    start_score_writer(scores.clone(), score_rx);

    let state = AppState { scores, score_tx };
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/scores", get(scores_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let app = if let Some(static_dir) =
        resolve_static_dir(std::env::var("STATIC_DIR").ok().as_deref())
    {
        let index_file = static_dir.join("index.html");
        println!(
            "[server] static file root: {}",
            static_dir.to_string_lossy()
        );
        app.fallback_service(
            ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
        )
    } else {
        eprintln!("[server] static file root not found. serving the api only.");
        app
    };

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind server socket");

    println!("[server] listening on :{port}");
    axum::serve(listener, app)
        .await
        .expect("server runtime failed");
}

fn start_score_writer(scores: Arc<Mutex<ScoreStore>>, mut rx: mpsc::Receiver<ScoreJob>) {
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            let mut guard = scores.lock().await;
            record_job(&mut guard, job);
        }
    });
}

fn record_job(store: &mut ScoreStore, job: ScoreJob) {
    store.recorder(&job.name).report_score(job.report);
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn scores_handler(
    State(state): State<AppState>,
    Query(query): Query<ScoreQuery>,
) -> impl IntoResponse {
    let guard = state.scores.lock().await;
    Json(guard.build_response(parse_score_limit(query.limit.as_deref())))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: AppState, socket: WebSocket) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    let seed = make_seed();
    println!("[server] {client_id} connected (seed {seed})");
    let mut session = GameSession::new(
        GameEngine::new(GameEngineOptions::seeded(seed)),
        ChannelRenderer {
            client_id: client_id.clone(),
            tx: tx.clone(),
        },
        ChannelPersister {
            name: sanitize_name(""),
            tx: state.score_tx.clone(),
        },
    );

    let mut plan = session.timer_plan();
    let mut movement = arm(plan.movement);
    let mut countdown = arm(plan.countdown);

    loop {
        let next_plan = tokio::select! {
            received = ws_receiver.next() => {
                let Some(Ok(message)) = received else {
                    break;
                };
                let raw = match message {
                    Message::Text(raw) => raw.to_string(),
                    Message::Binary(raw) => match String::from_utf8(raw.to_vec()) {
                        Ok(text) => text,
                        Err(_) => {
                            send_error(&tx, "invalid utf8 message");
                            continue;
                        }
                    },
                    Message::Close(_) => break,
                    _ => continue,
                };
                handle_client_message(&mut session, &client_id, &tx, &raw)
            }
            _ = next_pulse(&mut movement) => {
                session.handle_timer(GameInput::MovementTick, plan.generation)
            }
            _ = next_pulse(&mut countdown) => {
                session.handle_timer(GameInput::CountdownTick, plan.generation)
            }
        };

        if next_plan != plan {
            if next_plan.movement != plan.movement || next_plan.generation != plan.generation {
                movement = arm(next_plan.movement);
            }
            if next_plan.countdown != plan.countdown || next_plan.generation != plan.generation {
                countdown = arm(next_plan.countdown);
            }
            plan = next_plan;
        }
    }

    println!(
        "[server] {client_id} disconnected after {} ticks (score {})",
        session.engine().tick_count(),
        session.engine().state().score
    );
    drop(session);
    drop(tx);
    let _ = writer.await;
}

fn handle_client_message(
    session: &mut ConnectionSession,
    client_id: &str,
    tx: &mpsc::Sender<String>,
    raw: &str,
) -> TimerPlan {
    let Some(message) = parse_client_message(raw) else {
        send_error(tx, "invalid message");
        return session.timer_plan();
    };

    match message {
        ParsedClientMessage::Hello { name } => {
            let name = sanitize_name(&name);
            println!("[server] {client_id} plays as {name}");
            session.persister_mut().name = name;
            session.timer_plan()
        }
        ParsedClientMessage::Ping { t } => {
            if let Some(payload) = (ServerMessage::Pong { t }).to_json() {
                let _ = tx.try_send(payload);
            }
            session.timer_plan()
        }
        ParsedClientMessage::Reset => {
            session.engine_mut().reseed(make_seed());
            session.handle(GameInput::Reset)
        }
        other => match other.into_game_input() {
            Some(input) => session.handle(input),
            None => session.timer_plan(),
        },
    }
}

fn send_error(tx: &mpsc::Sender<String>, message: &str) {
    if let Some(payload) = (ServerMessage::Error { message }).to_json() {
        let _ = tx.try_send(payload);
    }
}

/// First pulse lands one full period after arming.
fn arm(period: Option<Duration>) -> Option<Interval> {
    period.map(|period| {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    })
}

async fn next_pulse(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use snake_revival_server::types::GameLifecycle;

    fn make_test_session(
        capacity: usize,
    ) -> (
        ConnectionSession,
        mpsc::Receiver<String>,
        mpsc::Receiver<ScoreJob>,
        mpsc::Sender<String>,
    ) {
        let (tx, rx) = mpsc::channel::<String>(capacity);
        let (score_tx, score_rx) = mpsc::channel::<ScoreJob>(8);
        let session = GameSession::new(
            GameEngine::new(GameEngineOptions::seeded(7)),
            ChannelRenderer {
                client_id: "client_test".to_string(),
                tx: tx.clone(),
            },
            ChannelPersister {
                name: "Tester".to_string(),
                tx: score_tx,
            },
        );
        (session, rx, score_rx, tx)
    }

    #[test]
    fn new_session_sends_initial_state_frame() {
        let (_session, mut rx, _scores, _tx) = make_test_session(8);
        let frame = rx.try_recv().expect("state frame");
        let value: serde_json::Value = serde_json::from_str(&frame).expect("valid json");
        assert_eq!(value["type"], "state");
        assert_eq!(value["snapshot"]["lifecycle"], "running");
        assert_eq!(value["snapshot"]["snakeCells"][0]["x"], 5);
    }

    #[test]
    fn invalid_message_answers_with_error_frame() {
        let (mut session, mut rx, _scores, tx) = make_test_session(8);
        let _ = rx.try_recv();
        handle_client_message(&mut session, "client_test", &tx, "{oops");
        let frame = rx.try_recv().expect("error frame");
        assert_eq!(frame, r#"{"type":"error","message":"invalid message"}"#);
    }

    #[test]
    fn hello_renames_the_score_owner() {
        let (mut session, _rx, _scores, tx) = make_test_session(8);
        handle_client_message(
            &mut session,
            "client_test",
            &tx,
            r#"{"type":"hello","name":"  Zed  "}"#,
        );
        assert_eq!(session.persister().name, "Zed");
    }

    #[test]
    fn reset_message_reports_score_and_restarts() {
        let (mut session, _rx, mut scores, tx) = make_test_session(64);
        let plan = handle_client_message(&mut session, "client_test", &tx, r#"{"type":"reset"}"#);
        assert!(plan.movement.is_some());
        assert_eq!(session.engine().lifecycle(), GameLifecycle::Running);
        let job = scores.try_recv().expect("terminal score report");
        assert_eq!(job.name, "Tester");
        assert_eq!(job.report.current, 0);
    }

    #[test]
    fn queued_score_jobs_reach_the_store() {
        let path = std::env::temp_dir()
            .join(format!(
                "snake-server-scores-{}-{}",
                std::process::id(),
                rand::random::<u32>()
            ))
            .join("scores.json");
        let (mut session, _rx, mut scores, tx) = make_test_session(64);
        handle_client_message(&mut session, "client_test", &tx, r#"{"type":"reset"}"#);

        let mut store = ScoreStore::new(path.clone());
        while let Ok(job) = scores.try_recv() {
            record_job(&mut store, job);
        }
        let response = store.build_response(None);
        assert_eq!(response.entries.len(), 1);
        assert_eq!(response.entries[0].name, "Tester");
        assert_eq!(response.entries[0].reports, 1);

        if let Some(parent) = path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn full_outbound_queue_drops_frames_without_blocking() {
        let (mut session, _rx, _scores, tx) = make_test_session(1);
        for _ in 0..5 {
            handle_client_message(
                &mut session,
                "client_test",
                &tx,
                r#"{"type":"ping","t":1}"#,
            );
        }
        session.handle(GameInput::MovementTick);
        assert_eq!(session.engine().tick_count(), 1);
    }
}
