use std::fmt;

use shared::domain::{AnswerCheck, ExamId, MarkingResult};

use crate::session::Cursor;

pub const NOT_AVAILABLE: &str = "Not available";

/// Aggregate score, always derived from the fetched checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub correct: usize,
    pub total: usize,
}

impl Score {
    pub fn from_checks(checks: &[AnswerCheck]) -> Self {
        Self {
            correct: checks.iter().filter(|c| c.outcome.is_correct()).count(),
            total: checks.len(),
        }
    }

    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f64 * 100.0 / self.total as f64
    }

    pub fn rounded_percentage(&self) -> u32 {
        self.percentage().round() as u32
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} ({}%)",
            self.correct,
            self.total,
            self.rounded_percentage()
        )
    }
}

/// What one review screen shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckView {
    pub position: String,
    pub question: String,
    pub badge: &'static str,
    pub user_answer: String,
    pub model_answer: String,
}

fn or_placeholder(value: &str) -> String {
    if value.trim().is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct ResultsReview {
    result: MarkingResult,
    cursor: Cursor,
}

impl ResultsReview {
    /// `None` when the result holds no checks: an empty result means marking
    /// has not produced anything yet.
    pub fn new(result: MarkingResult) -> Option<Self> {
        if !result.has_results() {
            return None;
        }
        let cursor = Cursor::new(result.checks.len());
        Some(Self { result, cursor })
    }

    pub fn exam_id(&self) -> &ExamId {
        &self.result.exam_id
    }

    pub fn checks(&self) -> &[AnswerCheck] {
        &self.result.checks
    }

    pub fn score(&self) -> Score {
        Score::from_checks(&self.result.checks)
    }

    pub fn current_index(&self) -> usize {
        self.cursor.index()
    }

    pub fn current_check(&self) -> Option<&AnswerCheck> {
        self.result.checks.get(self.cursor.index())
    }

    pub fn current_view(&self) -> Option<CheckView> {
        self.current_check().map(|check| CheckView {
            position: self.cursor.label(),
            question: or_placeholder(&check.question),
            badge: check.outcome.badge(),
            user_answer: or_placeholder(&check.user_answer),
            model_answer: or_placeholder(&check.real_answer),
        })
    }

    pub fn position_label(&self) -> String {
        self.cursor.label()
    }

    pub fn can_go_next(&self) -> bool {
        self.cursor.can_go_next()
    }

    pub fn can_go_previous(&self) -> bool {
        self.cursor.can_go_previous()
    }

    pub fn next(&mut self) -> bool {
        self.cursor.next()
    }

    pub fn previous(&mut self) -> bool {
        self.cursor.previous()
    }
}

#[cfg(test)]
#[path = "tests/review_tests.rs"]
mod tests;
