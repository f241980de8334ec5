use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    domain::{CourseId, Enrollment, Exam, ExamId, MarkingResult, SubmissionRecord, UserId},
    protocol::GenerateExamRequest,
};

pub mod auth;
pub mod controller;
pub mod error;
pub mod marking;
pub mod review;
pub mod schedule;
pub mod session;
pub mod submission;
pub mod transport;

pub use auth::AuthSession;
pub use controller::{has_results, ControllerView, ExamController, ExamListing, ExamStatus};
pub use error::{ClientError, ClientResult, SessionError};
pub use marking::{MarkingEvent, MarkingStatus, MarkingTask, MarkingTracker};
pub use review::{CheckView, ResultsReview, Score};
pub use session::{Cursor, ExamSession, SessionPhase};
pub use transport::ExamApiClient;

#[async_trait]
pub trait QuizService: Send + Sync {
    async fn list_exams(&self, course_id: &CourseId) -> ClientResult<Vec<Exam>>;
    /// Asks the backend to generate a fresh mock exam for the course. The
    /// created exam is returned when the backend echoes it back.
    async fn generate_exam(
        &self,
        course_code: &str,
        request: &GenerateExamRequest,
    ) -> ClientResult<Option<Exam>>;
}

#[async_trait]
pub trait AnswerService: Send + Sync {
    async fn submit_answers(&self, record: &SubmissionRecord) -> ClientResult<()>;
}

#[async_trait]
pub trait GradingService: Send + Sync {
    async fn mark_answers(&self, user_id: &UserId, exam_id: &ExamId) -> ClientResult<()>;
    async fn fetch_results(&self, user_id: &UserId, exam_id: &ExamId)
        -> ClientResult<MarkingResult>;
}

#[async_trait]
pub trait EnrollmentService: Send + Sync {
    async fn enrollment(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> ClientResult<Option<Enrollment>>;
}

/// The remote collaborators the controller talks to.
#[derive(Clone)]
pub struct Services {
    pub quiz: Arc<dyn QuizService>,
    pub answers: Arc<dyn AnswerService>,
    pub grading: Arc<dyn GradingService>,
}

impl Services {
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: QuizService + AnswerService + GradingService + 'static,
    {
        Self {
            quiz: backend.clone(),
            answers: backend.clone(),
            grading: backend,
        }
    }
}

#[cfg(test)]
#[path = "tests/fakes.rs"]
pub(crate) mod fakes;
