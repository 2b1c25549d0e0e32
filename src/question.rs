use std::fmt;

use serde::Serialize;

use crate::rng::Rng;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum MathOperator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
}

impl MathOperator {
    pub const ALL: [MathOperator; 3] = [
        MathOperator::Add,
        MathOperator::Subtract,
        MathOperator::Multiply,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
        }
    }

    pub fn apply(self, lhs: i64, rhs: i64) -> i64 {
        match self {
            Self::Add => lhs + rhs,
            Self::Subtract => lhs - rhs,
            Self::Multiply => lhs * rhs,
        }
    }
}

impl fmt::Display for MathOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// The answer is kept server-side; only the operands reach the renderer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MathQuestion {
    pub num1: i64,
    pub num2: i64,
    pub operator: MathOperator,
    #[serde(skip)]
    pub answer: i64,
    pub prompt: String,
}

impl MathQuestion {
    pub fn new(num1: i64, operator: MathOperator, num2: i64) -> Self {
        Self {
            num1,
            num2,
            operator,
            answer: operator.apply(num1, num2),
            prompt: format!("{num1} {operator} {num2} = ?"),
        }
    }

    pub fn generate(rng: &mut Rng) -> Self {
        let operator = MathOperator::ALL[rng.pick_index(MathOperator::ALL.len())];
        let (num1, num2) = match operator {
            MathOperator::Add => (rng.range(0, 50), rng.range(0, 50)),
            MathOperator::Subtract => {
                let num1 = rng.range(50, 100);
                (num1, rng.range(0, num1))
            }
            MathOperator::Multiply => (rng.range(0, 12), rng.range(0, 12)),
        };
        Self::new(num1 as i64, operator, num2 as i64)
    }

    pub fn is_correct(&self, value: i64) -> bool {
        value == self.answer
    }
}

/// Reads the leading integer of what the player typed, so `"4.5"` and
/// `"4abc"` both read as 4. Input without leading digits counts as a wrong
/// answer, so `None` is never surfaced as an error.
pub fn parse_answer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let sign_len = usize::from(trimmed.starts_with(['+', '-']));
    let digit_len = trimmed[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digit_len == 0 {
        return None;
    }
    trimmed[..sign_len + digit_len].parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_questions_follow_operand_ranges() {
        let mut rng = Rng::new(2024);
        let mut seen = Vec::new();
        for _ in 0..3_000 {
            let question = MathQuestion::generate(&mut rng);
            match question.operator {
                MathOperator::Add => {
                    assert!((0..50).contains(&question.num1));
                    assert!((0..50).contains(&question.num2));
                }
                MathOperator::Subtract => {
                    assert!((50..100).contains(&question.num1));
                    assert!((0..question.num1).contains(&question.num2));
                    assert!(question.answer > 0);
                }
                MathOperator::Multiply => {
                    assert!((0..12).contains(&question.num1));
                    assert!((0..12).contains(&question.num2));
                }
            }
            assert_eq!(
                question.answer,
                question.operator.apply(question.num1, question.num2)
            );
            if !seen.contains(&question.operator) {
                seen.push(question.operator);
            }
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn prompt_matches_operands() {
        let question = MathQuestion::new(7, MathOperator::Multiply, 6);
        assert_eq!(question.prompt, "7 * 6 = ?");
        assert_eq!(question.answer, 42);
        assert!(question.is_correct(42));
        assert!(!question.is_correct(41));
    }

    #[test]
    fn serialized_question_hides_answer() {
        let question = MathQuestion::new(60, MathOperator::Subtract, 8);
        let value = serde_json::to_value(&question).expect("question should serialize");
        assert_eq!(value["operator"], "-");
        assert!(value.get("answer").is_none());
    }

    #[test]
    fn parse_answer_reads_leading_integer() {
        assert_eq!(parse_answer(" 42 "), Some(42));
        assert_eq!(parse_answer("-3"), Some(-3));
        assert_eq!(parse_answer("+5"), Some(5));
        assert_eq!(parse_answer("4.5"), Some(4));
        assert_eq!(parse_answer("4abc"), Some(4));
        assert_eq!(parse_answer("  -12 apples"), Some(-12));
    }

    #[test]
    fn parse_answer_treats_garbage_as_none() {
        assert_eq!(parse_answer(""), None);
        assert_eq!(parse_answer("abc"), None);
        assert_eq!(parse_answer("-"), None);
        assert_eq!(parse_answer("- 3"), None);
        assert_eq!(parse_answer(".5"), None);
        assert_eq!(parse_answer("99999999999999999999999"), None);
    }
}
