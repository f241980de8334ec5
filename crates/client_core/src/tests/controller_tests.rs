use std::time::Duration;

use super::*;
use crate::{
    error::ClientError,
    fakes::{check, exam, text_questions, FakeBackend},
    MarkingEvent, SessionPhase,
};
use shared::domain::{CheckOutcome, Question, SubmittedAnswer};
use storage::{AutosaveKey, MemoryAutosaveStore};

struct Harness {
    backend: Arc<FakeBackend>,
    autosave: MemoryAutosaveStore,
    controller: ExamController,
}

fn harness(exams: Vec<Exam>) -> Harness {
    let backend = FakeBackend::with_exams(exams);
    let autosave = MemoryAutosaveStore::new();
    let controller = ExamController::new(
        AuthSession::new(UserId::new("user-1")),
        CourseId::new("course-c"),
        Services::from_backend(backend.clone()),
        Arc::new(autosave.clone()),
    );
    Harness {
        backend,
        autosave,
        controller,
    }
}

fn key(exam_id: &str) -> AutosaveKey {
    AutosaveKey::new(CourseId::new("course-c"), ExamId::new(exam_id))
}

async fn wait_for_marking(
    events: &mut tokio::sync::broadcast::Receiver<MarkingEvent>,
) -> MarkingEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await.expect("marking event") {
                MarkingEvent::Started { .. } => continue,
                other => return other,
            }
        }
    })
    .await
    .expect("marking finished in time")
}

#[tokio::test]
async fn listing_derives_badges_from_results_and_marking() {
    let mut h = harness(vec![
        exam("graded", text_questions(1)),
        exam("empty", text_questions(1)),
        exam("broken", text_questions(1)),
        exam("marking", text_questions(1)),
    ]);
    h.backend
        .set_results("graded", vec![check("Q1", CheckOutcome::Correct)]);
    h.backend.set_results("empty", Vec::new());
    h.backend.fail_results_for("broken");
    let gate = h.backend.gate_marking();
    h.controller
        .marking()
        .start(UserId::new("user-1"), ExamId::new("marking"))
        .await
        .expect("marking started");

    let listings = h.controller.list_exams().await.expect("listing");
    let labels: Vec<(&str, &str)> = listings
        .iter()
        .map(|l| (l.exam.id.as_str(), l.status.action_label()))
        .collect();
    assert_eq!(
        labels,
        vec![
            ("graded", "View Results"),
            ("empty", "Take Test"),
            ("broken", "Take Test"),
            ("marking", "Marking..."),
        ]
    );
    gate.add_permits(1);
}

#[tokio::test]
async fn opening_an_exam_recovers_autosaved_answers() {
    let mut h = harness(vec![exam("e", text_questions(3))]);
    h.autosave
        .save_answers(&key("e"), &["x".to_string(), String::new(), "y".to_string()])
        .await
        .expect("seed autosave");

    let session = h.controller.open_exam(&ExamId::new("e")).await.expect("open");
    assert_eq!(session.answers(), ["x", "", "y"]);
    assert_eq!(session.current_index(), 0);
}

#[tokio::test]
async fn unreadable_autosave_starts_empty() {
    let mut h = harness(vec![exam("e", text_questions(2))]);
    h.autosave.insert_raw(key("e"), "not json").await;

    let session = h.controller.open_exam(&ExamId::new("e")).await.expect("open");
    assert_eq!(session.answers(), ["", ""]);
}

#[tokio::test]
async fn cursor_moves_autosave_the_full_answer_set() {
    let mut h = harness(vec![exam("e", text_questions(3))]);
    h.controller.open_exam(&ExamId::new("e")).await.expect("open");

    h.controller.answer("one").expect("answer");
    assert!(!h.autosave.contains(&key("e")).await);

    assert!(h.controller.next().await.expect("next"));
    let saved = h.autosave.load_answers(&key("e")).await.expect("load");
    assert_eq!(saved, Some(vec![Some("one".to_string()), None, None]));

    h.controller.answer("two").expect("answer");
    assert!(h.controller.previous().await.expect("previous"));
    let saved = h.autosave.load_answers(&key("e")).await.expect("load");
    assert_eq!(
        saved,
        Some(vec![Some("one".to_string()), Some("two".to_string()), None])
    );
}

#[tokio::test]
async fn next_at_last_question_stays_put() {
    let mut h = harness(vec![exam("e", text_questions(2))]);
    h.controller.open_exam(&ExamId::new("e")).await.expect("open");
    assert!(h.controller.next().await.expect("next"));
    assert!(!h.controller.next().await.expect("clamped"));

    let session = h.controller.session().expect("answering");
    assert_eq!(session.current_index(), 1);
    assert!(!session.can_go_next());
}

#[tokio::test]
async fn submission_builds_record_clears_autosave_and_starts_marking() {
    let mut h = harness(vec![exam(
        "e",
        vec![
            Question::multiple_choice("q1", "Which?", ["A", "B"]),
            Question::free_text("q2", "Why?"),
        ],
    )]);
    h.backend.grade_on_mark(
        "e",
        vec![
            check("Which?", CheckOutcome::Correct),
            check("Why?", CheckOutcome::Incorrect),
        ],
    );
    let mut events = h.controller.marking().subscribe();

    h.controller.open_exam(&ExamId::new("e")).await.expect("open");
    h.controller.choose(1).expect("choose B");
    h.controller.next().await.expect("next");
    assert!(h.autosave.contains(&key("e")).await);

    let record = h.controller.submit().await.expect("submit");
    assert_eq!(
        record.answers,
        vec![
            SubmittedAnswer {
                question: "Which? A)A, B)B".into(),
                user_answer: "B".into(),
            },
            SubmittedAnswer {
                question: "Why?".into(),
                user_answer: String::new(),
            },
        ]
    );
    assert_eq!(h.backend.submissions(), vec![record.clone()]);
    assert!(!h.autosave.contains(&key("e")).await);
    assert!(matches!(h.controller.view(), ControllerView::Listing));

    assert_eq!(
        wait_for_marking(&mut events).await,
        MarkingEvent::Completed {
            exam_id: ExamId::new("e"),
            has_results: true
        }
    );
    assert_eq!(
        h.controller.exam_status(&ExamId::new("e")).await,
        ExamStatus::ResultsAvailable
    );

    let review = h
        .controller
        .open_results(&ExamId::new("e"))
        .await
        .expect("results");
    assert_eq!(review.score().rounded_percentage(), 50);
}

#[tokio::test]
async fn failed_submission_keeps_the_session_for_retry() {
    let mut h = harness(vec![exam("e", text_questions(2))]);
    h.controller.open_exam(&ExamId::new("e")).await.expect("open");
    h.controller.answer("keep me").expect("answer");
    h.controller.next().await.expect("next");
    h.backend.fail_submissions(Some("database offline"));

    let err = h.controller.submit().await.expect_err("submission fails");
    assert!(matches!(
        err,
        SessionError::Remote(ClientError::Status { status: 500, .. })
    ));
    assert!(err.user_message().contains("database offline"));

    let session = h.controller.session().expect("still answering");
    assert_eq!(session.phase(), SessionPhase::Answering);
    assert_eq!(session.answers(), ["keep me", ""]);
    assert!(h.autosave.contains(&key("e")).await);
    assert!(h.backend.mark_calls().is_empty());

    h.backend.fail_submissions(None);
    h.controller.submit().await.expect("retry succeeds");
    assert_eq!(h.backend.submissions().len(), 1);
}

#[tokio::test]
async fn marking_failure_leaves_exam_without_results() {
    let mut h = harness(vec![exam("e", text_questions(1))]);
    h.backend.fail_marking("grader crashed");
    let mut events = h.controller.marking().subscribe();

    h.controller.open_exam(&ExamId::new("e")).await.expect("open");
    h.controller.submit().await.expect("submit");

    assert!(matches!(
        wait_for_marking(&mut events).await,
        MarkingEvent::Failed { .. }
    ));
    let listings = h.controller.list_exams().await.expect("listing");
    assert_eq!(listings[0].status, ExamStatus::NoResults);
    assert_eq!(listings[0].status.action_label(), "Take Test");
}

#[tokio::test]
async fn empty_results_cannot_be_reviewed() {
    let mut h = harness(vec![exam("e", text_questions(1))]);
    h.backend.set_results("e", Vec::new());

    let err = h
        .controller
        .open_results(&ExamId::new("e"))
        .await
        .expect_err("no review");
    assert!(matches!(err, SessionError::NoResults(id) if id == ExamId::new("e")));
    assert!(matches!(h.controller.view(), ControllerView::Listing));
}

#[tokio::test]
async fn review_reports_sixty_percent_for_three_of_five() {
    let mut h = harness(vec![exam("e", text_questions(5))]);
    use CheckOutcome::*;
    h.backend.set_results(
        "e",
        [Correct, Correct, Incorrect, Correct, Incorrect]
            .into_iter()
            .enumerate()
            .map(|(i, o)| check(&format!("Q{i}"), o))
            .collect(),
    );

    h.controller
        .open_results(&ExamId::new("e"))
        .await
        .expect("review");
    assert!(h.controller.review_next().expect("next"));
    let review = h.controller.review().expect("reviewing");
    assert_eq!(review.position_label(), "2 / 5");
    assert_eq!(review.score().rounded_percentage(), 60);
}

#[tokio::test]
async fn closing_an_unsubmitted_attempt_autosaves_it() {
    let mut h = harness(vec![exam("e", text_questions(2))]);
    h.controller.open_exam(&ExamId::new("e")).await.expect("open");
    h.controller.answer("draft").expect("answer");
    h.controller.close().await;

    assert!(matches!(h.controller.view(), ControllerView::Listing));
    assert_eq!(
        h.autosave.load_answers(&key("e")).await.expect("load"),
        Some(vec![Some("draft".to_string()), None])
    );

    let session = h.controller.open_exam(&ExamId::new("e")).await.expect("reopen");
    assert_eq!(session.answers(), ["draft", ""]);
}

#[tokio::test]
async fn closing_after_submit_does_not_restore_the_autosave() {
    let mut h = harness(vec![exam("e", text_questions(2))]);
    h.controller.open_exam(&ExamId::new("e")).await.expect("open");
    h.controller.answer("final").expect("answer");
    h.controller.submit().await.expect("submit");
    h.controller.close().await;

    assert!(matches!(h.controller.view(), ControllerView::Listing));
    assert_eq!(h.autosave.load_answers(&key("e")).await.expect("load"), None);
}

#[tokio::test]
async fn actions_outside_answering_are_rejected() {
    let mut h = harness(vec![exam("e", text_questions(1))]);
    assert!(matches!(h.controller.next().await, Err(SessionError::NotAnswering)));
    assert!(matches!(h.controller.answer("x"), Err(SessionError::NotAnswering)));
    assert!(matches!(h.controller.submit().await, Err(SessionError::NotAnswering)));
    assert!(matches!(h.controller.review_next(), Err(SessionError::NotReviewing)));
}

#[tokio::test]
async fn unknown_exam_is_reported() {
    let mut h = harness(vec![exam("e", text_questions(1))]);
    let err = h
        .controller
        .open_exam(&ExamId::new("missing"))
        .await
        .expect_err("unknown");
    assert!(matches!(err, SessionError::UnknownExam(_)));
}

#[tokio::test]
async fn generated_exam_joins_the_cached_list() {
    let mut h = harness(Vec::new());
    *h.backend.generated.lock().expect("lock") =
        Some(Ok(Some(exam("fresh", text_questions(2)))));

    let created = h
        .controller
        .generate_exam("COMP3506", "Practice 1")
        .await
        .expect("generate")
        .expect("exam returned");
    assert_eq!(created.id, ExamId::new("fresh"));
    assert_eq!(h.controller.exams().len(), 1);

    let requests = h.backend.generate_requests.lock().expect("lock").clone();
    assert_eq!(requests[0].0, "COMP3506");
    assert_eq!(requests[0].1.course_id, "course-c");
    assert_eq!(requests[0].1.topic, "Mock Exam");

    h.controller
        .open_exam(&ExamId::new("fresh"))
        .await
        .expect("open generated exam");
}

#[tokio::test]
async fn generation_failure_is_surfaced() {
    let mut h = harness(Vec::new());
    *h.backend.generated.lock().expect("lock") =
        Some(Err(ClientError::Generation("no past papers".into())));

    let err = h
        .controller
        .generate_exam("COMP3506", "Practice 1")
        .await
        .expect_err("fails");
    assert!(err.user_message().contains("no past papers"));
}
