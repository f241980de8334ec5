use shared::domain::{CourseId, Exam, Question};
use storage::{AutosaveKey, SavedAnswers};
use tracing::warn;

use crate::error::SessionError;

/// One-item-at-a-time window over an ordered list. Moves are clamped at both
/// ends; there is no wraparound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    index: usize,
    len: usize,
}

impl Cursor {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn can_go_next(&self) -> bool {
        self.index + 1 < self.len
    }

    pub fn can_go_previous(&self) -> bool {
        self.index > 0
    }

    /// Returns whether the cursor actually moved.
    pub fn next(&mut self) -> bool {
        if self.can_go_next() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    pub fn previous(&mut self) -> bool {
        if self.can_go_previous() {
            self.index -= 1;
            true
        } else {
            false
        }
    }

    /// "k / total" with a 1-based k, or "0 / 0" for an empty list.
    pub fn label(&self) -> String {
        if self.len == 0 {
            return "0 / 0".to_string();
        }
        format!("{} / {}", self.index + 1, self.len)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Answering,
    Submitting,
    Submitted,
}

/// In-progress attempt at one exam.
#[derive(Debug, Clone)]
pub struct ExamSession {
    key: AutosaveKey,
    exam: Exam,
    answers: Vec<String>,
    cursor: Cursor,
    phase: SessionPhase,
}

impl ExamSession {
    pub fn new(course_id: CourseId, exam: Exam) -> Self {
        Self::with_saved(course_id, exam, None)
    }

    /// Opens an attempt, seeding answers from a previous autosave when that
    /// save fits the exam.
    pub fn with_saved(course_id: CourseId, exam: Exam, saved: Option<SavedAnswers>) -> Self {
        let key = AutosaveKey::new(course_id, exam.id.clone());
        let answers = seed_answers(exam.question_count(), saved, &key);
        let cursor = Cursor::new(exam.question_count());
        Self {
            key,
            exam,
            answers,
            cursor,
            phase: SessionPhase::Answering,
        }
    }

    pub fn key(&self) -> &AutosaveKey {
        &self.key
    }

    pub fn exam(&self) -> &Exam {
        &self.exam
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn question_count(&self) -> usize {
        self.exam.question_count()
    }

    pub fn current_index(&self) -> usize {
        self.cursor.index()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.exam.questions.get(self.cursor.index())
    }

    pub fn current_answer(&self) -> &str {
        self.answers
            .get(self.cursor.index())
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| !a.is_empty()).count()
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

    /// Replaces the answer at the current position only.
    pub fn answer(&mut self, value: impl Into<String>) -> Result<(), SessionError> {
        self.ensure_editable()?;
        let slot = self
            .answers
            .get_mut(self.cursor.index())
            .ok_or(SessionError::NoQuestion)?;
        *slot = value.into();
        Ok(())
    }

    /// Picks a choice of the current multiple-choice question by index and
    /// stores the choice text as the answer.
    pub fn choose(&mut self, choice_index: usize) -> Result<(), SessionError> {
        let choice = self
            .current_question()
            .and_then(|q| q.choices.get(choice_index))
            .cloned()
            .ok_or(SessionError::NoQuestion)?;
        self.answer(choice)
    }

    fn ensure_editable(&self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Answering => Ok(()),
            SessionPhase::Submitting => Err(SessionError::SubmissionInFlight),
            SessionPhase::Submitted => Err(SessionError::AlreadySubmitted),
        }
    }

    pub(crate) fn begin_submit(&mut self) -> Result<(), SessionError> {
        self.ensure_editable()?;
        self.phase = SessionPhase::Submitting;
        Ok(())
    }

    pub(crate) fn fail_submit(&mut self) {
        if self.phase == SessionPhase::Submitting {
            self.phase = SessionPhase::Answering;
        }
    }

    pub(crate) fn finish_submit(&mut self) {
        self.phase = SessionPhase::Submitted;
    }
}

/// Builds an answer set of exactly `question_count` slots. A save with more
/// slots than the exam has questions belongs to a different version of the
/// exam and is ignored.
pub fn seed_answers(
    question_count: usize,
    saved: Option<SavedAnswers>,
    key: &AutosaveKey,
) -> Vec<String> {
    let mut answers = vec![String::new(); question_count];
    let Some(saved) = saved else {
        return answers;
    };

    if saved.len() > question_count {
        warn!(
            course_id = %key.course_id,
            exam_id = %key.exam_id,
            saved = saved.len(),
            question_count,
            "discarding autosave that does not fit the exam"
        );
        return answers;
    }

    for (slot, value) in answers.iter_mut().zip(saved) {
        *slot = value.unwrap_or_default();
    }
    answers
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
