use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{
    AnswerCheck, CheckOutcome, CourseId, Enrollment, Exam, ExamId, Question, QuestionId,
    QuestionKind, SubmissionRecord,
};

/// Backend ids arrive as UUID strings or integers depending on the table.
fn flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

/// Free text that should be a string but may arrive as a number or not at all.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn choice_text(item: serde_json::Value) -> Option<String> {
    match item {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Object(mut fields) => ["choice_text", "text"]
            .into_iter()
            .find_map(|key| match fields.remove(key) {
                Some(serde_json::Value::String(s)) => Some(s),
                _ => None,
            }),
        _ => None,
    }
}

/// Choice lists are model-generated and stored as raw JSON. Anything that is
/// not an array of strings or `{choice_text|text}` objects reads as no choices.
fn lenient_choices<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let Some(serde_json::Value::Array(items)) = value else {
        return Ok(Vec::new());
    };
    let choices: Option<Vec<String>> = items.into_iter().map(choice_text).collect();
    Ok(choices.unwrap_or_default())
}

/// Question lists keep every entry that decodes as an object; a non-array
/// reads as an empty exam.
fn lenient_questions<'de, D>(deserializer: D) -> Result<Vec<QuestionRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let Some(serde_json::Value::Array(items)) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, alias = "question", deserialize_with = "lenient_text")]
    pub question_text: Option<String>,
    #[serde(default, alias = "type", deserialize_with = "lenient_text")]
    pub question_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_choices")]
    pub options: Vec<String>,
    #[serde(default, deserialize_with = "lenient_choices")]
    pub choices: Vec<String>,
}

impl From<QuestionRecord> for Question {
    fn from(record: QuestionRecord) -> Self {
        let choices = if record.options.is_empty() {
            record.choices
        } else {
            record.options
        };
        let kind = QuestionKind::classify(record.question_type.as_deref(), choices.len());
        Question {
            id: QuestionId(record.id),
            text: record.question_text.unwrap_or_default(),
            kind,
            choices: match kind {
                QuestionKind::MultipleChoice => choices,
                QuestionKind::FreeText => Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizRecord {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_questions")]
    pub questions: Vec<QuestionRecord>,
}

impl From<QuizRecord> for Exam {
    fn from(record: QuizRecord) -> Self {
        let created_at = record
            .created_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|ts| ts.with_timezone(&Utc));
        Exam {
            id: ExamId(record.id),
            title: record.title.or(record.name).unwrap_or_default(),
            created_at,
            questions: record
                .questions
                .into_iter()
                .map(Question::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum QuizListResponse {
    List(Vec<QuizRecord>),
    Data { data: Vec<QuizRecord> },
    Quizzes { quizzes: Vec<QuizRecord> },
}

impl QuizListResponse {
    pub fn into_exams(self) -> Vec<Exam> {
        let records = match self {
            Self::List(records) => records,
            Self::Data { data } => data,
            Self::Quizzes { quizzes } => quizzes,
        };
        records.into_iter().map(Exam::from).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerPayload {
    pub question: String,
    pub user_answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitAnswersRequest {
    pub user_id: String,
    pub quiz_id: String,
    pub answers: Vec<AnswerPayload>,
}

impl From<&SubmissionRecord> for SubmitAnswersRequest {
    fn from(record: &SubmissionRecord) -> Self {
        Self {
            user_id: record.user_id.0.clone(),
            quiz_id: record.exam_id.0.clone(),
            answers: record
                .answers
                .iter()
                .map(|answer| AnswerPayload {
                    question: answer.question.clone(),
                    user_answer: answer.user_answer.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckedAnswerRecord {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default, rename = "userAnswer", alias = "user_answer")]
    pub user_answer: Option<String>,
    #[serde(default, rename = "realAnswer", alias = "real_answer")]
    pub real_answer: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
}

impl From<CheckedAnswerRecord> for AnswerCheck {
    fn from(record: CheckedAnswerRecord) -> Self {
        AnswerCheck {
            outcome: CheckOutcome::from_grader(record.result.as_deref().unwrap_or_default()),
            question: record.question.unwrap_or_default(),
            user_answer: record.user_answer.unwrap_or_default(),
            real_answer: record.real_answer.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CheckedAnswersResponse {
    List(Vec<CheckedAnswerRecord>),
    Checks { checks: Vec<CheckedAnswerRecord> },
}

impl CheckedAnswersResponse {
    pub fn into_checks(self) -> Vec<AnswerCheck> {
        let records = match self {
            Self::List(records) => records,
            Self::Checks { checks } => checks,
        };
        records.into_iter().map(AnswerCheck::from).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerateExamRequest {
    pub title: String,
    pub course_id: String,
    pub topic: String,
    pub description: String,
    pub time_limit: u32,
}

impl GenerateExamRequest {
    pub fn new(title: impl Into<String>, course_id: &CourseId) -> Self {
        Self {
            title: title.into(),
            course_id: course_id.0.clone(),
            topic: "Mock Exam".into(),
            description: "Generated by Mock Exam".into(),
            time_limit: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateExamResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub quiz: Option<QuizRecord>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CourseRef {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrollmentRecord {
    #[serde(default, deserialize_with = "flexible_id")]
    pub course_id: String,
    #[serde(default)]
    pub course: Option<CourseRef>,
    #[serde(default)]
    pub exam_date: Option<String>,
    #[serde(default)]
    pub exam_time: Option<String>,
}

impl From<EnrollmentRecord> for Enrollment {
    fn from(record: EnrollmentRecord) -> Self {
        let exam_date = record
            .exam_date
            .as_deref()
            .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok());
        let exam_time = record.exam_time.as_deref().and_then(|raw| {
            let raw = raw.trim();
            NaiveTime::parse_from_str(raw, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
                .ok()
        });
        Enrollment {
            course_id: CourseId(record.course_id),
            course_name: record.course.and_then(|course| course.name),
            exam_date,
            exam_time,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrollmentsResponse {
    #[serde(default)]
    pub enrollments: Vec<EnrollmentRecord>,
}
