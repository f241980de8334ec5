use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::{
    domain::{CourseId, Enrollment, Exam, ExamId, MarkingResult, SubmissionRecord, UserId},
    error::ErrorDetail,
    protocol::{
        CheckedAnswersResponse, EnrollmentsResponse, GenerateExamRequest, GenerateExamResponse,
        QuizListResponse, SubmitAnswersRequest,
    },
};
use tracing::debug;
use url::Url;

use crate::{
    auth::AuthSession,
    error::{ClientError, ClientResult},
    AnswerService, EnrollmentService, GradingService, QuizService,
};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/v1";
const EXAM_PAGE_SIZE: u32 = 50;

/// REST client for the quiz, answer, grading and enrollment endpoints.
#[derive(Clone)]
pub struct ExamApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ExamApiClient {
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let parsed = Url::parse(base_url.trim())?;
        Ok(Self {
            http: Client::new(),
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn with_auth(mut self, auth: &AuthSession) -> Self {
        self.token = auth.token().map(str::to_string);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send_raw(&self, request: RequestBuilder) -> ClientResult<String> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                detail: ErrorDetail::extract(&body),
            });
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let body = self.send_raw(request).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl QuizService for ExamApiClient {
    async fn list_exams(&self, course_id: &CourseId) -> ClientResult<Vec<Exam>> {
        let request = self.http.get(self.endpoint("quiz/")).query(&[
            ("course_id", course_id.as_str().to_string()),
            ("include_questions", "true".to_string()),
            ("page", "1".to_string()),
            ("size", EXAM_PAGE_SIZE.to_string()),
        ]);
        let response: QuizListResponse = self.send_json(request).await?;
        let exams = response.into_exams();
        debug!(course_id = %course_id, exams = exams.len(), "fetched exams");
        Ok(exams)
    }

    async fn generate_exam(
        &self,
        course_code: &str,
        request: &GenerateExamRequest,
    ) -> ClientResult<Option<Exam>> {
        let http_request = self
            .http
            .post(self.endpoint(&format!(
                "ai/create-quiz-and-upload-questions/{course_code}"
            )))
            .query(request)
            .json(&serde_json::json!({}));
        let response: GenerateExamResponse = self.send_json(http_request).await?;
        if !response.success {
            return Err(ClientError::Generation(
                response
                    .error
                    .or(response.message)
                    .unwrap_or_else(|| "backend reported failure".to_string()),
            ));
        }
        Ok(response.quiz.map(Exam::from))
    }
}

#[async_trait]
impl AnswerService for ExamApiClient {
    async fn submit_answers(&self, record: &SubmissionRecord) -> ClientResult<()> {
        let request = self
            .http
            .post(self.endpoint("add-answers"))
            .json(&SubmitAnswersRequest::from(record));
        self.send_raw(request).await?;
        Ok(())
    }
}

#[async_trait]
impl GradingService for ExamApiClient {
    async fn mark_answers(&self, user_id: &UserId, exam_id: &ExamId) -> ClientResult<()> {
        let request = self
            .http
            .post(self.endpoint("ai/mark-answers"))
            .query(&[("user_id", user_id.as_str()), ("quiz_id", exam_id.as_str())]);
        self.send_raw(request).await?;
        Ok(())
    }

    async fn fetch_results(
        &self,
        user_id: &UserId,
        exam_id: &ExamId,
    ) -> ClientResult<MarkingResult> {
        let request = self
            .http
            .get(self.endpoint("ai/checked-answers"))
            .query(&[("user_id", user_id.as_str()), ("quiz_id", exam_id.as_str())]);
        let response: CheckedAnswersResponse = self.send_json(request).await?;
        Ok(MarkingResult {
            exam_id: exam_id.clone(),
            checks: response.into_checks(),
        })
    }
}

#[async_trait]
impl EnrollmentService for ExamApiClient {
    async fn enrollment(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> ClientResult<Option<Enrollment>> {
        let request = self
            .http
            .get(self.endpoint("enrollments"))
            .query(&[("user_id", user_id.as_str()), ("course_id", course_id.as_str())]);
        let response: EnrollmentsResponse = self.send_json(request).await?;
        Ok(response
            .enrollments
            .into_iter()
            .map(Enrollment::from)
            .find(|enrollment| &enrollment.course_id == course_id))
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
