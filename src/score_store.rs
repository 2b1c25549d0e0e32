use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::session::ScorePersister;
use crate::types::{ScoreReport, ScoreTableEntry, ScoreTableResponse};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredScoreEntry {
    name: String,
    #[serde(rename = "bestScore", alias = "best_score")]
    best_score: u32,
    #[serde(rename = "lastScore", alias = "last_score", default)]
    last_score: u32,
    #[serde(default)]
    reports: u64,
    #[serde(rename = "updatedAtMs", alias = "updated_at_ms")]
    updated_at_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
struct ScoreStoreFile {
    version: u8,
    players: HashMap<String, StoredScoreEntry>,
}

#[derive(Clone, Debug, Deserialize)]
struct ScoreStoreFileRaw {
    version: u8,
    players: HashMap<String, serde_json::Value>,
}

/// Best score per player name, kept in a single JSON file.
pub struct ScoreStore {
    file_path: PathBuf,
    players: HashMap<String, StoredScoreEntry>,
}

impl ScoreStore {
    pub fn new(file_path: PathBuf) -> Self {
        let players = load_players(&file_path);
        Self { file_path, players }
    }

    fn record(&mut self, name: &str, report: ScoreReport) {
        let key = score_key(name);
        if key.is_empty() {
            return;
        }
        let now_ms = now_ms();
        let current = self
            .players
            .entry(key)
            .or_insert_with(|| StoredScoreEntry {
                name: name.trim().to_string(),
                best_score: 0,
                last_score: 0,
                reports: 0,
                updated_at_ms: now_ms,
            });

        current.name = name.trim().to_string();
        current.best_score = current
            .best_score
            .max(report.highest)
            .max(report.current);
        current.last_score = report.current;
        current.reports += 1;
        current.updated_at_ms = now_ms;

        self.save();
    }

    pub fn build_response(&self, requested_limit: Option<usize>) -> ScoreTableResponse {
        ScoreTableResponse {
            generated_at_iso: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            entries: self.get_top(requested_limit),
        }
    }

    pub fn recorder(&mut self, name: &str) -> PlayerScoreRecorder<'_> {
        PlayerScoreRecorder {
            store: self,
            name: name.to_string(),
        }
    }

    fn get_top(&self, requested_limit: Option<usize>) -> Vec<ScoreTableEntry> {
        let normalized_limit = requested_limit.unwrap_or(10).clamp(1, 100);
        let mut entries: Vec<ScoreTableEntry> = self
            .players
            .values()
            .map(|entry| ScoreTableEntry {
                name: entry.name.clone(),
                best_score: entry.best_score,
                last_score: entry.last_score,
                reports: entry.reports,
                updated_at_ms: entry.updated_at_ms,
            })
            .collect();

        entries.sort_by(|a, b| {
            b.best_score
                .cmp(&a.best_score)
                .then_with(|| a.updated_at_ms.cmp(&b.updated_at_ms))
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        entries.truncate(normalized_limit);
        entries
    }

    fn save(&self) {
        if let Some(parent) = self.file_path.parent() {
            if let Err(error) = fs::create_dir_all(parent) {
                eprintln!(
                    "[score-store] failed to create parent dir {}: {error}",
                    parent.display()
                );
                return;
            }
        }

        let payload = ScoreStoreFile {
            version: 1,
            players: self.players.clone(),
        };
        match serde_json::to_string_pretty(&payload) {
            Ok(text) => {
                if let Err(error) = fs::write(&self.file_path, text) {
                    eprintln!(
                        "[score-store] failed to write {}: {error}",
                        self.file_path.display()
                    );
                }
            }
            Err(error) => {
                eprintln!(
                    "[score-store] failed to serialize payload for {}: {error}",
                    self.file_path.display()
                );
            }
        }
    }
}

/// Binds the store to one player so it can sit behind a game session.
pub struct PlayerScoreRecorder<'a> {
    store: &'a mut ScoreStore,
    name: String,
}

impl ScorePersister for PlayerScoreRecorder<'_> {
    fn report_score(&mut self, report: ScoreReport) {
        self.store.record(&self.name, report);
    }
}

fn load_players(path: &Path) -> HashMap<String, StoredScoreEntry> {
    let text = match fs::read_to_string(path) {
        Ok(value) => value,
        Err(error) => {
            if error.kind() != std::io::ErrorKind::NotFound {
                eprintln!("[score-store] failed to read {}: {error}", path.display());
            }
            return HashMap::new();
        }
    };
    let parsed = match serde_json::from_str::<ScoreStoreFileRaw>(&text) {
        Ok(value) if value.version == 1 => value,
        Ok(value) => {
            eprintln!(
                "[score-store] unsupported version {} at {}",
                value.version,
                path.display()
            );
            return HashMap::new();
        }
        Err(error) => {
            eprintln!("[score-store] failed to parse {}: {error}", path.display());
            return HashMap::new();
        }
    };

    let mut sanitized = HashMap::<String, StoredScoreEntry>::new();
    for (player_key, raw_value) in parsed.players {
        let value: StoredScoreEntry = match serde_json::from_value(raw_value) {
            Ok(entry) => entry,
            Err(error) => {
                eprintln!(
                    "[score-store] failed to parse player entry '{}' in {}: {error}",
                    player_key,
                    path.display()
                );
                continue;
            }
        };
        let name = value.name.trim().to_string();
        let key = score_key(&name);
        if key.is_empty() {
            continue;
        }

        match sanitized.get_mut(&key) {
            Some(current) => {
                current.best_score = current.best_score.max(value.best_score);
                current.reports += value.reports;
                if value.updated_at_ms > current.updated_at_ms {
                    current.name = name;
                    current.last_score = value.last_score;
                    current.updated_at_ms = value.updated_at_ms;
                }
            }
            None => {
                sanitized.insert(key, StoredScoreEntry { name, ..value });
            }
        }
    }

    sanitized
}

fn score_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
