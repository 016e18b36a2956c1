use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::VerifyError;

/// Closed set of exercise kinds understood by the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    MultipleChoice,
    TrueFalse,
    Matching,
    Ordering,
    FillInBlank,
}

impl ExerciseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseKind::MultipleChoice => "multiple_choice",
            ExerciseKind::TrueFalse => "true_false",
            ExerciseKind::Matching => "matching",
            ExerciseKind::Ordering => "ordering",
            ExerciseKind::FillInBlank => "fill_in_blank",
        }
    }

    pub fn parse(value: &str) -> Result<Self, VerifyError> {
        match value {
            "multiple_choice" => Ok(ExerciseKind::MultipleChoice),
            "true_false" => Ok(ExerciseKind::TrueFalse),
            "matching" => Ok(ExerciseKind::Matching),
            "ordering" => Ok(ExerciseKind::Ordering),
            "fill_in_blank" => Ok(ExerciseKind::FillInBlank),
            other => Err(VerifyError::UnsupportedExerciseType(other.to_string())),
        }
    }
}

/// Type-specific answer key of an exercise.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerKey {
    MultipleChoice { correct_index: u32 },
    TrueFalse { correct: bool },
    Matching { pairs: Vec<(String, String)> },
    Ordering { correct_order: Vec<u32> },
    FillInBlank { correct: String },
}

impl AnswerKey {
    pub fn kind(&self) -> ExerciseKind {
        match self {
            AnswerKey::MultipleChoice { .. } => ExerciseKind::MultipleChoice,
            AnswerKey::TrueFalse { .. } => ExerciseKind::TrueFalse,
            AnswerKey::Matching { .. } => ExerciseKind::Matching,
            AnswerKey::Ordering { .. } => ExerciseKind::Ordering,
            AnswerKey::FillInBlank { .. } => ExerciseKind::FillInBlank,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "ExerciseDefinition")]
pub struct Exercise {
    pub id: String,
    pub prompt: String,
    pub choices: Vec<String>,
    pub items: Vec<String>,
    pub key: AnswerKey,
}

impl Exercise {
    pub fn kind(&self) -> ExerciseKind {
        self.key.kind()
    }

    /// Public projection of the exercise with the answer key removed.
    pub fn view(&self) -> ExerciseView {
        let (terms, mut definitions) = match &self.key {
            AnswerKey::Matching { pairs } => pairs.iter().cloned().unzip(),
            _ => (Vec::new(), Vec::new()),
        };
        definitions.sort();

        ExerciseView {
            id: self.id.clone(),
            kind: self.kind(),
            prompt: self.prompt.clone(),
            choices: self.choices.clone(),
            items: self.items.clone(),
            terms,
            definitions,
        }
    }
}

/// On-disk exercise format shared with the content authoring tools.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExerciseDefinition {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    question: String,
    #[serde(default)]
    choices: Vec<String>,
    #[serde(default)]
    correct_answer: Option<Value>,
    #[serde(default)]
    pairs: Vec<Vec<String>>,
    #[serde(default)]
    items: Vec<String>,
    #[serde(default)]
    correct_order: Vec<u32>,
}

impl TryFrom<ExerciseDefinition> for Exercise {
    type Error = VerifyError;

    fn try_from(def: ExerciseDefinition) -> Result<Self, Self::Error> {
        let invalid = |reason: &str| VerifyError::InvalidDefinition {
            exercise_id: def.id.clone(),
            reason: reason.to_string(),
        };

        let key = match ExerciseKind::parse(&def.kind)? {
            ExerciseKind::MultipleChoice => {
                let index = def
                    .correct_answer
                    .as_ref()
                    .and_then(Value::as_u64)
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(|| invalid("correctAnswer must be a choice index"))?;
                AnswerKey::MultipleChoice {
                    correct_index: index,
                }
            }
            ExerciseKind::TrueFalse => {
                let correct = def
                    .correct_answer
                    .as_ref()
                    .and_then(Value::as_bool)
                    .ok_or_else(|| invalid("correctAnswer must be a boolean"))?;
                AnswerKey::TrueFalse { correct }
            }
            ExerciseKind::Matching => {
                let mut pairs = Vec::with_capacity(def.pairs.len());
                for pair in &def.pairs {
                    match pair.as_slice() {
                        [term, definition] => pairs.push((term.clone(), definition.clone())),
                        _ => return Err(invalid("each pair must hold a term and a definition")),
                    }
                }
                AnswerKey::Matching { pairs }
            }
            ExerciseKind::Ordering => AnswerKey::Ordering {
                correct_order: def.correct_order.clone(),
            },
            ExerciseKind::FillInBlank => {
                let correct = def
                    .correct_answer
                    .as_ref()
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid("correctAnswer must be a string"))?;
                AnswerKey::FillInBlank {
                    correct: correct.to_string(),
                }
            }
        };

        Ok(Exercise {
            id: def.id,
            prompt: def.question,
            choices: def.choices,
            items: def.items,
            key,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub lesson_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

impl Lesson {
    pub fn exercise(&self, exercise_id: &str) -> Option<&Exercise> {
        self.exercises.iter().find(|e| e.id == exercise_id)
    }
}

#[derive(Debug, Clone)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub description: String,
    pub lessons: Vec<Lesson>,
}

impl Course {
    pub fn lesson(&self, lesson_id: &str) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.lesson_id == lesson_id)
    }
}

/// `root.json` of a course directory.
#[derive(Debug, Deserialize)]
pub struct CourseManifest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct ExerciseView {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ExerciseKind,
    pub prompt: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub terms: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub definitions: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonView {
    pub lesson_id: String,
    pub title: String,
    pub description: String,
    pub exercises: Vec<ExerciseView>,
}

impl From<&Lesson> for LessonView {
    fn from(lesson: &Lesson) -> Self {
        Self {
            lesson_id: lesson.lesson_id.clone(),
            title: lesson.title.clone(),
            description: lesson.description.clone(),
            exercises: lesson.exercises.iter().map(Exercise::view).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonSummary {
    pub lesson_id: String,
    pub title: String,
    pub exercise_count: usize,
}

#[derive(Debug, Serialize)]
pub struct CourseView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub lessons: Vec<LessonSummary>,
}

impl From<&Course> for CourseView {
    fn from(course: &Course) -> Self {
        Self {
            id: course.id.clone(),
            name: course.name.clone(),
            description: course.description.clone(),
            lessons: course
                .lessons
                .iter()
                .map(|l| LessonSummary {
                    lesson_id: l.lesson_id.clone(),
                    title: l.title.clone(),
                    exercise_count: l.exercises.len(),
                })
                .collect(),
        }
    }
}
