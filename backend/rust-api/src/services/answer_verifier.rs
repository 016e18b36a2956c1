//! Exercise-type specific answer comparison.

use std::collections::HashMap;

use crate::errors::VerifyError;
use crate::models::answer::SubmittedAnswer;
use crate::models::content::{AnswerKey, Exercise};

/// Decides whether `submitted` answers `exercise` correctly.
///
/// Returns `Err` only when the submission has the wrong shape for the
/// exercise kind; a well-formed wrong answer is `Ok(false)`.
pub fn verify(exercise: &Exercise, submitted: &SubmittedAnswer) -> Result<bool, VerifyError> {
    match (&exercise.key, submitted) {
        (AnswerKey::MultipleChoice { correct_index }, SubmittedAnswer::Choice(index)) => {
            Ok(*index == f64::from(*correct_index))
        }
        (AnswerKey::TrueFalse { correct }, SubmittedAnswer::Boolean(value)) => {
            Ok(value == correct)
        }
        (AnswerKey::Matching { pairs }, SubmittedAnswer::Pairs(submitted)) => {
            Ok(matching_is_correct(pairs, submitted))
        }
        (AnswerKey::Ordering { correct_order }, SubmittedAnswer::Order(order)) => {
            Ok(order.len() == correct_order.len()
                && order
                    .iter()
                    .zip(correct_order)
                    .all(|(given, expected)| *given == f64::from(*expected)))
        }
        (AnswerKey::FillInBlank { correct }, SubmittedAnswer::Text(text)) => {
            Ok(text.trim().to_lowercase() == correct.trim().to_lowercase())
        }
        (key, _) => Err(VerifyError::InvalidAnswerFormat {
            expected: expected_shape(key),
        }),
    }
}

fn matching_is_correct(expected: &[(String, String)], submitted: &[(String, String)]) -> bool {
    if expected.len() != submitted.len() {
        return false;
    }
    let given: HashMap<&str, &str> = submitted
        .iter()
        .map(|(term, definition)| (term.as_str(), definition.as_str()))
        .collect();
    expected
        .iter()
        .all(|(term, definition)| given.get(term.as_str()) == Some(&definition.as_str()))
}

fn expected_shape(key: &AnswerKey) -> &'static str {
    match key {
        AnswerKey::MultipleChoice { .. } => "a numeric choice index",
        AnswerKey::TrueFalse { .. } => "a boolean",
        AnswerKey::Matching { .. } => "a list of [term, definition] pairs",
        AnswerKey::Ordering { .. } => "a list of item indices",
        AnswerKey::FillInBlank { .. } => "a string",
    }
}
