use std::sync::Arc;

use futures::future::join_all;
use shared::{
    domain::{CourseId, Exam, ExamId, SubmissionRecord, UserId},
    protocol::GenerateExamRequest,
};
use storage::AutosaveStore;
use tracing::{debug, info, warn};

use crate::{
    auth::AuthSession,
    error::SessionError,
    marking::MarkingTracker,
    review::ResultsReview,
    session::ExamSession,
    submission::build_submission,
    GradingService, Services,
};

/// Badge shown next to each exam in the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamStatus {
    NoResults,
    MarkingInProgress,
    ResultsAvailable,
}

impl ExamStatus {
    pub fn action_label(self) -> &'static str {
        match self {
            Self::NoResults => "Take Test",
            Self::MarkingInProgress => "Marking...",
            Self::ResultsAvailable => "View Results",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExamListing {
    pub exam: Exam,
    pub status: ExamStatus,
}

#[derive(Debug, Clone)]
pub enum ControllerView {
    Listing,
    Answering(ExamSession),
    Reviewing(ResultsReview),
}

/// An exam has results only when the grader returns at least one check.
/// Fetch failures read the same as "nothing yet".
pub async fn has_results(grading: &dyn GradingService, user_id: &UserId, exam_id: &ExamId) -> bool {
    match grading.fetch_results(user_id, exam_id).await {
        Ok(result) => result.has_results(),
        Err(err) => {
            debug!(exam_id = %exam_id, error = %err, "result probe failed; treating as no results");
            false
        }
    }
}

/// Drives one user's mock exams for one course: listing, answering with
/// autosave, submission and result review. Marking runs in the background on
/// the shared [`MarkingTracker`] and outlives view changes.
pub struct ExamController {
    auth: AuthSession,
    course_id: CourseId,
    services: Services,
    autosave: Arc<dyn AutosaveStore>,
    marking: MarkingTracker,
    exams: Vec<Exam>,
    view: ControllerView,
}

impl ExamController {
    pub fn new(
        auth: AuthSession,
        course_id: CourseId,
        services: Services,
        autosave: Arc<dyn AutosaveStore>,
    ) -> Self {
        let marking = MarkingTracker::new(Arc::clone(&services.grading));
        Self::with_tracker(auth, course_id, services, autosave, marking)
    }

    /// Shares an existing tracker so marking started from one controller is
    /// visible to another (e.g. a different course page).
    pub fn with_tracker(
        auth: AuthSession,
        course_id: CourseId,
        services: Services,
        autosave: Arc<dyn AutosaveStore>,
        marking: MarkingTracker,
    ) -> Self {
        Self {
            auth,
            course_id,
            services,
            autosave,
            marking,
            exams: Vec::new(),
            view: ControllerView::Listing,
        }
    }

    pub fn auth(&self) -> &AuthSession {
        &self.auth
    }

    pub fn course_id(&self) -> &CourseId {
        &self.course_id
    }

    pub fn marking(&self) -> &MarkingTracker {
        &self.marking
    }

    pub fn view(&self) -> &ControllerView {
        &self.view
    }

    pub fn exams(&self) -> &[Exam] {
        &self.exams
    }

    pub fn session(&self) -> Option<&ExamSession> {
        match &self.view {
            ControllerView::Answering(session) => Some(session),
            _ => None,
        }
    }

    pub fn review(&self) -> Option<&ResultsReview> {
        match &self.view {
            ControllerView::Reviewing(review) => Some(review),
            _ => None,
        }
    }

    fn session_mut(&mut self) -> Result<&mut ExamSession, SessionError> {
        match &mut self.view {
            ControllerView::Answering(session) => Ok(session),
            _ => Err(SessionError::NotAnswering),
        }
    }

    fn review_mut(&mut self) -> Result<&mut ResultsReview, SessionError> {
        match &mut self.view {
            ControllerView::Reviewing(review) => Ok(review),
            _ => Err(SessionError::NotReviewing),
        }
    }

    /// Fetches the course's exams and derives a status badge for each.
    pub async fn list_exams(&mut self) -> Result<Vec<ExamListing>, SessionError> {
        self.exams = self.services.quiz.list_exams(&self.course_id).await?;
        info!(course_id = %self.course_id, exams = self.exams.len(), "loaded exams");

        let statuses = join_all(self.exams.iter().map(|exam| self.exam_status(&exam.id))).await;
        Ok(self
            .exams
            .iter()
            .cloned()
            .zip(statuses)
            .map(|(exam, status)| ExamListing { exam, status })
            .collect())
    }

    pub async fn exam_status(&self, exam_id: &ExamId) -> ExamStatus {
        if self.marking.is_marking(exam_id).await {
            return ExamStatus::MarkingInProgress;
        }
        if self.marking.cached_result(exam_id).await.is_some() {
            return ExamStatus::ResultsAvailable;
        }
        if has_results(self.services.grading.as_ref(), self.auth.user_id(), exam_id).await {
            ExamStatus::ResultsAvailable
        } else {
            ExamStatus::NoResults
        }
    }

    async fn find_exam(&mut self, exam_id: &ExamId) -> Result<Exam, SessionError> {
        if let Some(exam) = self.exams.iter().find(|e| &e.id == exam_id) {
            return Ok(exam.clone());
        }
        self.exams = self.services.quiz.list_exams(&self.course_id).await?;
        self.exams
            .iter()
            .find(|e| &e.id == exam_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownExam(exam_id.clone()))
    }

    /// Enters answering for an exam, recovering autosaved answers.
    pub async fn open_exam(&mut self, exam_id: &ExamId) -> Result<&ExamSession, SessionError> {
        let exam = self.find_exam(exam_id).await?;
        self.close().await;

        let key = storage::AutosaveKey::new(self.course_id.clone(), exam.id.clone());
        let saved = match self.autosave.load_answers(&key).await {
            Ok(saved) => saved,
            Err(err) => {
                warn!(exam_id = %exam.id, error = %err, "could not read autosave; starting empty");
                None
            }
        };
        let recovered = saved.is_some();
        let session = ExamSession::with_saved(self.course_id.clone(), exam, saved);
        info!(
            exam_id = %exam_id,
            questions = session.question_count(),
            recovered,
            "opened exam"
        );
        self.view = ControllerView::Answering(session);
        self.session_mut()
            .map(|session| &*session)
    }

    async fn autosave_current(&self) {
        let Some(session) = self.session() else {
            return;
        };
        if let Err(err) = self
            .autosave
            .save_answers(session.key(), session.answers())
            .await
        {
            warn!(exam_id = %session.exam().id, error = %err, "autosave failed");
        }
    }

    /// Moves to the next question, autosaving when the cursor moves.
    pub async fn next(&mut self) -> Result<bool, SessionError> {
        let moved = self.session_mut()?.next();
        if moved {
            self.autosave_current().await;
        }
        Ok(moved)
    }

    pub async fn previous(&mut self) -> Result<bool, SessionError> {
        let moved = self.session_mut()?.previous();
        if moved {
            self.autosave_current().await;
        }
        Ok(moved)
    }

    pub fn answer(&mut self, value: impl Into<String>) -> Result<(), SessionError> {
        self.session_mut()?.answer(value)
    }

    pub fn choose(&mut self, choice_index: usize) -> Result<(), SessionError> {
        self.session_mut()?.choose(choice_index)
    }

    /// Submits the open attempt. On failure the attempt stays open with its
    /// answers intact. On success the autosave is dropped, the view returns to
    /// the listing and marking starts in the background.
    pub async fn submit(&mut self) -> Result<SubmissionRecord, SessionError> {
        let user_id = self.auth.user_id().clone();
        let record = {
            let session = self.session_mut()?;
            session.begin_submit()?;
            build_submission(session.exam(), &user_id, session.answers())
        };

        if let Err(err) = self.services.answers.submit_answers(&record).await {
            warn!(exam_id = %record.exam_id, error = %err, "submission failed");
            if let Ok(session) = self.session_mut() {
                session.fail_submit();
            }
            return Err(err.into());
        }

        let key = {
            let session = self.session_mut()?;
            session.finish_submit();
            session.key().clone()
        };
        // A submitted attempt never stays on screen, so close() cannot resave it.
        self.view = ControllerView::Listing;
        if let Err(err) = self.autosave.clear_answers(&key).await {
            warn!(exam_id = %key.exam_id, error = %err, "could not clear autosave after submission");
        }
        info!(exam_id = %record.exam_id, answers = record.answers.len(), "submitted answers");

        self.marking.start(user_id, record.exam_id.clone()).await;
        Ok(record)
    }

    /// Opens the results review for an exam.
    pub async fn open_results(&mut self, exam_id: &ExamId) -> Result<&ResultsReview, SessionError> {
        let result = match self.marking.cached_result(exam_id).await {
            Some(result) => result,
            None => {
                self.services
                    .grading
                    .fetch_results(self.auth.user_id(), exam_id)
                    .await?
            }
        };
        let review =
            ResultsReview::new(result).ok_or_else(|| SessionError::NoResults(exam_id.clone()))?;
        self.close().await;
        info!(exam_id = %exam_id, score = %review.score(), "opened results");
        self.view = ControllerView::Reviewing(review);
        self.review_mut().map(|review| &*review)
    }

    pub fn review_next(&mut self) -> Result<bool, SessionError> {
        Ok(self.review_mut()?.next())
    }

    pub fn review_previous(&mut self) -> Result<bool, SessionError> {
        Ok(self.review_mut()?.previous())
    }

    /// Returns to the listing. An attempt that was not submitted is autosaved
    /// first so it can be resumed.
    pub async fn close(&mut self) {
        if matches!(self.view, ControllerView::Answering(_)) {
            self.autosave_current().await;
        }
        self.view = ControllerView::Listing;
    }

    /// Generates a new mock exam for the course and refreshes the cached list.
    pub async fn generate_exam(
        &mut self,
        course_code: &str,
        title: &str,
    ) -> Result<Option<Exam>, SessionError> {
        let request = GenerateExamRequest::new(title, &self.course_id);
        let created = self
            .services
            .quiz
            .generate_exam(course_code, &request)
            .await?;
        if let Some(exam) = &created {
            info!(exam_id = %exam.id, questions = exam.question_count(), "generated exam");
            self.exams.retain(|e| e.id != exam.id);
            self.exams.push(exam.clone());
        }
        Ok(created)
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
