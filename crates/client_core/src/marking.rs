use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use shared::domain::{AnswerCheck, ExamId, MarkingResult, UserId};
use tokio::{
    sync::{broadcast, RwLock},
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::{error::ClientResult, GradingService};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkingStatus {
    Pending,
    Done,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct MarkingTask {
    pub exam_id: ExamId,
    pub status: MarkingStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub checks: Vec<AnswerCheck>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkingEvent {
    Started { exam_id: ExamId },
    Completed { exam_id: ExamId, has_results: bool },
    Failed { exam_id: ExamId, reason: String },
}

/// Owns the background grading work for every exam submitted in this
/// process. Front ends read task state from here instead of tracking
/// in-flight marking themselves.
#[derive(Clone)]
pub struct MarkingTracker {
    grading: Arc<dyn GradingService>,
    tasks: Arc<RwLock<HashMap<ExamId, MarkingTask>>>,
    events: broadcast::Sender<MarkingEvent>,
}

impl MarkingTracker {
    pub fn new(grading: Arc<dyn GradingService>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            grading,
            tasks: Arc::new(RwLock::new(HashMap::new())),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MarkingEvent> {
        self.events.subscribe()
    }

    /// Triggers marking for the exam in the background and returns the task
    /// handle. Returns `None` when the exam is already being marked.
    pub async fn start(&self, user_id: UserId, exam_id: ExamId) -> Option<JoinHandle<()>> {
        {
            let mut tasks = self.tasks.write().await;
            if tasks
                .get(&exam_id)
                .is_some_and(|task| task.status == MarkingStatus::Pending)
            {
                return None;
            }
            tasks.insert(
                exam_id.clone(),
                MarkingTask {
                    exam_id: exam_id.clone(),
                    status: MarkingStatus::Pending,
                    started_at: Utc::now(),
                    finished_at: None,
                    checks: Vec::new(),
                },
            );
        }

        info!(user_id = %user_id, exam_id = %exam_id, "marking started");
        let _ = self.events.send(MarkingEvent::Started {
            exam_id: exam_id.clone(),
        });

        let grading = Arc::clone(&self.grading);
        let tasks = Arc::clone(&self.tasks);
        let events = self.events.clone();
        Some(tokio::spawn(async move {
            let outcome = run_marking(grading.as_ref(), &user_id, &exam_id).await;
            let event = {
                let mut tasks = tasks.write().await;
                let task = tasks.entry(exam_id.clone()).or_insert_with(|| MarkingTask {
                    exam_id: exam_id.clone(),
                    status: MarkingStatus::Pending,
                    started_at: Utc::now(),
                    finished_at: None,
                    checks: Vec::new(),
                });
                task.finished_at = Some(Utc::now());
                match outcome {
                    Ok(result) => {
                        let has_results = result.has_results();
                        info!(exam_id = %exam_id, checks = result.checks.len(), "marking finished");
                        task.status = MarkingStatus::Done;
                        task.checks = result.checks;
                        MarkingEvent::Completed {
                            exam_id: exam_id.clone(),
                            has_results,
                        }
                    }
                    Err(err) => {
                        warn!(exam_id = %exam_id, error = %err, "marking failed");
                        task.status = MarkingStatus::Failed(err.to_string());
                        MarkingEvent::Failed {
                            exam_id: exam_id.clone(),
                            reason: err.to_string(),
                        }
                    }
                }
            };
            let _ = events.send(event);
        }))
    }

    pub async fn status(&self, exam_id: &ExamId) -> Option<MarkingStatus> {
        self.tasks
            .read()
            .await
            .get(exam_id)
            .map(|task| task.status.clone())
    }

    pub async fn is_marking(&self, exam_id: &ExamId) -> bool {
        self.status(exam_id).await == Some(MarkingStatus::Pending)
    }

    pub async fn task(&self, exam_id: &ExamId) -> Option<MarkingTask> {
        self.tasks.read().await.get(exam_id).cloned()
    }

    /// Results fetched by a finished task, if it produced any.
    pub async fn cached_result(&self, exam_id: &ExamId) -> Option<MarkingResult> {
        let tasks = self.tasks.read().await;
        let task = tasks.get(exam_id)?;
        if task.status != MarkingStatus::Done || task.checks.is_empty() {
            return None;
        }
        Some(MarkingResult {
            exam_id: exam_id.clone(),
            checks: task.checks.clone(),
        })
    }

    pub async fn pending_exams(&self) -> Vec<ExamId> {
        let mut pending: Vec<ExamId> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|task| task.status == MarkingStatus::Pending)
            .map(|task| task.exam_id.clone())
            .collect();
        pending.sort();
        pending
    }
}

async fn run_marking(
    grading: &dyn GradingService,
    user_id: &UserId,
    exam_id: &ExamId,
) -> ClientResult<MarkingResult> {
    grading.mark_answers(user_id, exam_id).await?;
    grading.fetch_results(user_id, exam_id).await
}

#[cfg(test)]
#[path = "tests/marking_tests.rs"]
mod tests;
