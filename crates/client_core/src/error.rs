use shared::{
    domain::ExamId,
    error::{ApiError, ErrorCode},
};
use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid api base url: {0}")]
    Url(#[from] url::ParseError),
    #[error("exam generation failed: {0}")]
    Generation(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("{0}")]
    Unavailable(anyhow::Error),
}

impl ClientError {
    pub fn to_api_error(&self) -> ApiError {
        let code = match self {
            Self::Status { status, .. } => ErrorCode::from_status(*status),
            Self::Http(_) | Self::Unavailable(_) => ErrorCode::Unavailable,
            Self::Auth(_) => ErrorCode::Unauthorized,
            Self::Generation(_) | Self::Decode(_) | Self::Url(_) => ErrorCode::Internal,
        };
        ApiError::new(code, self.to_string())
    }
}

impl From<ClientError> for ApiError {
    fn from(value: ClientError) -> Self {
        value.to_api_error()
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no exam is open for answering")]
    NotAnswering,
    #[error("no results are open for review")]
    NotReviewing,
    #[error("exam {0} is not available for this course")]
    UnknownExam(ExamId),
    #[error("exam has no question at the current position")]
    NoQuestion,
    #[error("a submission for this exam is already in flight")]
    SubmissionInFlight,
    #[error("this exam attempt was already submitted")]
    AlreadySubmitted,
    #[error("no marking results for exam {0} yet")]
    NoResults(ExamId),
    #[error(transparent)]
    Remote(#[from] ClientError),
}

impl SessionError {
    /// The inline message a front end shows for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::Remote(err) => err.to_api_error().message,
            other => other.to_string(),
        }
    }
}
