use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::VerifyError;
use crate::models::content::ExerciseKind;
use crate::models::points::PointTransaction;

/// A submitted answer, validated against the exercise kind at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmittedAnswer {
    Choice(f64),
    Boolean(bool),
    Pairs(Vec<(String, String)>),
    Order(Vec<f64>),
    Text(String),
}

impl SubmittedAnswer {
    /// Decodes a raw JSON answer into the shape `kind` expects.
    pub fn parse(kind: ExerciseKind, value: &Value) -> Result<Self, VerifyError> {
        match kind {
            ExerciseKind::MultipleChoice => value
                .as_f64()
                .map(SubmittedAnswer::Choice)
                .ok_or(VerifyError::InvalidAnswerFormat {
                    expected: "a numeric choice index",
                }),
            ExerciseKind::TrueFalse => value
                .as_bool()
                .map(SubmittedAnswer::Boolean)
                .ok_or(VerifyError::InvalidAnswerFormat {
                    expected: "a boolean",
                }),
            ExerciseKind::Matching => {
                let items = value.as_array().ok_or(VerifyError::InvalidAnswerFormat {
                    expected: "a list of [term, definition] pairs",
                })?;
                let pairs = items
                    .iter()
                    .map(|item| match item.as_array().map(Vec::as_slice) {
                        Some([Value::String(term), Value::String(definition)]) => {
                            Ok((term.clone(), definition.clone()))
                        }
                        _ => Err(VerifyError::MalformedPair),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SubmittedAnswer::Pairs(pairs))
            }
            ExerciseKind::Ordering => {
                let items = value.as_array().ok_or(VerifyError::InvalidAnswerFormat {
                    expected: "a list of item indices",
                })?;
                let order = items
                    .iter()
                    .map(|item| {
                        item.as_f64().ok_or(VerifyError::InvalidAnswerFormat {
                            expected: "a list of item indices",
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SubmittedAnswer::Order(order))
            }
            ExerciseKind::FillInBlank => value
                .as_str()
                .map(|s| SubmittedAnswer::Text(s.to_string()))
                .ok_or(VerifyError::InvalidAnswerFormat {
                    expected: "a string",
                }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExerciseAttemptRequest {
    pub answer: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseAttemptResponse {
    pub is_correct: bool,
    pub points: i32,
    pub transaction: Option<PointTransaction>,
    pub current_streak: u32,
    pub max_streak: u32,
    pub attempt_number: u32,
}
