use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(CourseId);
id_newtype!(ExamId);
id_newtype!(QuestionId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    FreeText,
}

impl QuestionKind {
    /// Only a recognised choice discriminator with at least one option makes a
    /// multiple-choice question; everything else is answered as free text.
    pub fn classify(raw_type: Option<&str>, option_count: usize) -> Self {
        let is_choice = raw_type
            .map(|t| t.trim().to_ascii_lowercase())
            .is_some_and(|t| {
                matches!(
                    t.as_str(),
                    "mcq" | "multiple_choice" | "multiple-choice" | "multiplechoice"
                )
            });
        if is_choice && option_count > 0 {
            Self::MultipleChoice
        } else {
            Self::FreeText
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub kind: QuestionKind,
    pub choices: Vec<String>,
}

impl Question {
    pub fn free_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: QuestionId::new(id),
            text: text.into(),
            kind: QuestionKind::FreeText,
            choices: Vec::new(),
        }
    }

    pub fn multiple_choice(
        id: impl Into<String>,
        text: impl Into<String>,
        choices: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: QuestionId::new(id),
            text: text.into(),
            kind: QuestionKind::MultipleChoice,
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_multiple_choice(&self) -> bool {
        self.kind == QuestionKind::MultipleChoice
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exam {
    pub id: ExamId,
    pub title: String,
    pub created_at: Option<DateTime<Utc>>,
    pub questions: Vec<Question>,
}

impl Exam {
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    Correct,
    Incorrect,
}

impl CheckOutcome {
    /// Anything the grader reports other than "correct" counts against the user.
    pub fn from_grader(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("correct") {
            Self::Correct
        } else {
            Self::Incorrect
        }
    }

    pub fn is_correct(self) -> bool {
        self == Self::Correct
    }

    pub fn badge(self) -> &'static str {
        match self {
            Self::Correct => "Correct",
            Self::Incorrect => "Incorrect",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerCheck {
    pub question: String,
    pub user_answer: String,
    pub real_answer: String,
    pub outcome: CheckOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkingResult {
    pub exam_id: ExamId,
    pub checks: Vec<AnswerCheck>,
}

impl MarkingResult {
    pub fn has_results(&self) -> bool {
        !self.checks.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question: String,
    pub user_answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub exam_id: ExamId,
    pub user_id: UserId,
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub course_id: CourseId,
    pub course_name: Option<String>,
    pub exam_date: Option<chrono::NaiveDate>,
    pub exam_time: Option<chrono::NaiveTime>,
}
