use serde::Serialize;

use crate::question::MathQuestion;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn parse_move(value: &str) -> Option<Self> {
        match value {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    pub fn is_opposite(self, other: Direction) -> bool {
        self.opposite() == other
    }

    /// Unit step on the grid. Rows grow downward.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameLifecycle {
    Running,
    AwaitingRevivalChoice,
    AnsweringQuestion,
    Ended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    Wall,
    SelfCollision,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeathRecord {
    #[serde(rename = "snakeAtDeath")]
    pub snake_at_death: Vec<Cell>,
    pub direction: Direction,
    pub head: Cell,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ScoreReport {
    pub current: u32,
    pub highest: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    FoodEaten {
        x: i32,
        y: i32,
        score: u32,
    },
    FoodPlaced {
        x: i32,
        y: i32,
    },
    BoardFull,
    Died {
        cause: DeathCause,
        x: i32,
        y: i32,
    },
    QuestionIssued {
        prompt: String,
        #[serde(rename = "attemptsLeft")]
        attempts_left: u32,
    },
    AnswerRejected {
        #[serde(rename = "attemptsLeft")]
        attempts_left: u32,
        #[serde(rename = "timedOut")]
        timed_out: bool,
    },
    Revived {
        x: i32,
        y: i32,
    },
    RevivalDeclined,
    Reset,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GameSnapshot {
    #[serde(rename = "snakeCells")]
    pub snake_cells: Vec<Cell>,
    #[serde(rename = "foodCell")]
    pub food_cell: Option<Cell>,
    pub score: u32,
    #[serde(rename = "highestScore")]
    pub highest_score: u32,
    #[serde(rename = "speedMs")]
    pub speed_ms: u64,
    pub direction: Direction,
    pub lifecycle: GameLifecycle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<MathQuestion>,
    #[serde(rename = "timeLeft", skip_serializing_if = "Option::is_none")]
    pub time_left: Option<u32>,
    #[serde(rename = "attemptsLeft", skip_serializing_if = "Option::is_none")]
    pub attempts_left: Option<u32>,
    pub generation: u64,
    pub events: Vec<RuntimeEvent>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScoreTableEntry {
    pub name: String,
    #[serde(rename = "bestScore")]
    pub best_score: u32,
    #[serde(rename = "lastScore")]
    pub last_score: u32,
    pub reports: u64,
    #[serde(rename = "updatedAtMs")]
    pub updated_at_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScoreTableResponse {
    #[serde(rename = "generatedAtIso")]
    pub generated_at_iso: String,
    pub entries: Vec<ScoreTableEntry>,
}
