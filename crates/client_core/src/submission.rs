use shared::domain::{Exam, Question, SubmissionRecord, SubmittedAnswer, UserId};

/// "A", "B", ... for the first 26 choices, then the 1-based position.
pub fn choice_label(index: usize) -> String {
    if index < 26 {
        char::from(b'A' + index as u8).to_string()
    } else {
        (index + 1).to_string()
    }
}

/// Question text as the grader receives it. Choice questions carry their
/// options inline so the grader can judge a bare choice answer.
pub fn render_question(question: &Question) -> String {
    if !question.is_multiple_choice() || question.choices.is_empty() {
        return question.text.clone();
    }
    let options = question
        .choices
        .iter()
        .enumerate()
        .map(|(i, choice)| format!("{}){}", choice_label(i), choice))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{} {}", question.text, options)
}

pub fn build_submission(exam: &Exam, user_id: &UserId, answers: &[String]) -> SubmissionRecord {
    SubmissionRecord {
        exam_id: exam.id.clone(),
        user_id: user_id.clone(),
        answers: exam
            .questions
            .iter()
            .enumerate()
            .map(|(i, question)| SubmittedAnswer {
                question: render_question(question),
                user_answer: answers.get(i).cloned().unwrap_or_default(),
            })
            .collect(),
    }
}

#[cfg(test)]
#[path = "tests/submission_tests.rs"]
mod tests;
