use serde::Serialize;
use serde_json::Value;

use crate::session::GameInput;
use crate::types::{Direction, GameSnapshot};

#[derive(Debug, PartialEq)]
pub enum ParsedClientMessage {
    Hello { name: String },
    Input { dir: Direction },
    Revive,
    Decline,
    Answer { value: String },
    Reset,
    Ping { t: f64 },
}

impl ParsedClientMessage {
    /// Game inputs carried by this message; `hello` and `ping` are handled by
    /// the connection itself.
    pub fn into_game_input(self) -> Option<GameInput> {
        match self {
            Self::Input { dir } => Some(GameInput::Steer(dir)),
            Self::Revive => Some(GameInput::ChooseMathRevival),
            Self::Decline => Some(GameInput::DeclineRevival),
            Self::Answer { value } => Some(GameInput::Answer(value)),
            Self::Reset => Some(GameInput::Reset),
            Self::Hello { .. } | Self::Ping { .. } => None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage<'a> {
    State { snapshot: &'a GameSnapshot },
    Pong { t: f64 },
    Error { message: &'a str },
}

impl ServerMessage<'_> {
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "hello" => {
            let name = object.get("name")?.as_str()?.to_string();
            Some(ParsedClientMessage::Hello { name })
        }
        "input" => {
            let dir = Direction::parse_move(object.get("dir")?.as_str()?)?;
            Some(ParsedClientMessage::Input { dir })
        }
        "revive" => Some(ParsedClientMessage::Revive),
        "decline" => Some(ParsedClientMessage::Decline),
        "answer" => {
            let value = answer_text(object.get("value")?)?;
            Some(ParsedClientMessage::Answer { value })
        }
        "reset" => Some(ParsedClientMessage::Reset),
        "ping" => {
            let t = object.get("t")?.as_f64()?;
            if !t.is_finite() {
                return None;
            }
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

// Answers arrive as typed text; numeric JSON is accepted and turned back into
// text so the engine applies a single parsing rule.
fn answer_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
