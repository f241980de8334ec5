//! Line-oriented answering loop for `exam_cli take`.

use anyhow::Result;
use client_core::{
    submission::choice_label, ExamController, ExamSession, MarkingEvent, SessionError,
};
use shared::domain::{ExamId, Question};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

const HELP: &str = "commands: n (next), p (previous), a <answer> (answer; a letter picks a choice), s (submit), q (save and quit)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TakeCommand {
    Next,
    Previous,
    Answer(String),
    Submit,
    Quit,
    Help,
}

pub fn parse_command(line: &str) -> Option<TakeCommand> {
    let line = line.trim();
    let (head, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(head, rest)| (head, rest.trim()));
    match head {
        "n" | "next" => Some(TakeCommand::Next),
        "p" | "prev" | "previous" => Some(TakeCommand::Previous),
        "a" | "answer" => Some(TakeCommand::Answer(rest.to_string())),
        "s" | "submit" => Some(TakeCommand::Submit),
        "q" | "quit" => Some(TakeCommand::Quit),
        "h" | "help" | "?" => Some(TakeCommand::Help),
        _ => None,
    }
}

/// Maps a typed label ("b", "B") onto the question's choice index.
pub fn choice_index(question: &Question, input: &str) -> Option<usize> {
    if !question.is_multiple_choice() {
        return None;
    }
    (0..question.choices.len()).find(|&i| choice_label(i).eq_ignore_ascii_case(input.trim()))
}

pub fn render_current(session: &ExamSession) -> String {
    let Some(question) = session.current_question() else {
        return "This exam has no questions.".to_string();
    };
    let mut out = format!("[{}] {}\n", session.position_label(), question.text);
    for (i, choice) in question.choices.iter().enumerate() {
        out.push_str(&format!("  {}) {}\n", choice_label(i), choice));
    }
    let answer = session.current_answer();
    if answer.is_empty() {
        out.push_str("  answer: (none)\n");
    } else {
        out.push_str(&format!("  answer: {answer}\n"));
    }
    out
}

/// Runs the answering loop until the attempt is submitted or the user quits.
/// Returns `true` when the attempt was submitted.
pub async fn run<R, W>(
    controller: &mut ExamController,
    exam_id: &ExamId,
    mut input: R,
    mut output: W,
) -> Result<bool>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let session = controller.open_exam(exam_id).await?;
    let intro = format!(
        "{} ({} questions, {} answered)\n{HELP}\n{}",
        session.exam().title,
        session.question_count(),
        session.answered_count(),
        render_current(session)
    );
    output.write_all(intro.as_bytes()).await?;
    output.flush().await?;

    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line).await? == 0 {
            controller.close().await;
            return Ok(false);
        }
        let Some(command) = parse_command(&line) else {
            output.write_all(format!("{HELP}\n").as_bytes()).await?;
            continue;
        };

        let outcome = match command {
            TakeCommand::Next => controller.next().await.map(|_| ()),
            TakeCommand::Previous => controller.previous().await.map(|_| ()),
            TakeCommand::Answer(text) => {
                let picked = controller
                    .session()
                    .and_then(|s| s.current_question())
                    .and_then(|q| choice_index(q, &text));
                match picked {
                    Some(index) => controller.choose(index),
                    None => controller.answer(text),
                }
            }
            TakeCommand::Help => {
                output.write_all(format!("{HELP}\n").as_bytes()).await?;
                continue;
            }
            TakeCommand::Quit => {
                controller.close().await;
                output.write_all(b"answers saved\n").await?;
                return Ok(false);
            }
            TakeCommand::Submit => {
                if submit(controller, &mut output).await? {
                    return Ok(true);
                }
                Ok(())
            }
        };

        if let Err(err) = outcome {
            output
                .write_all(format!("error: {}\n", err.user_message()).as_bytes())
                .await?;
        }
        if let Some(session) = controller.session() {
            output.write_all(render_current(session).as_bytes()).await?;
        }
        output.flush().await?;
    }
}

/// Submits and waits for background marking to finish. A failed submission
/// leaves the attempt open and returns `false`.
async fn submit<W: AsyncWrite + Unpin>(controller: &mut ExamController, output: &mut W) -> Result<bool> {
    let mut events = controller.marking().subscribe();
    let record = match controller.submit().await {
        Ok(record) => record,
        Err(err @ (SessionError::Remote(_) | SessionError::SubmissionInFlight)) => {
            output
                .write_all(
                    format!(
                        "submission failed: {}\nanswers kept; type `s` to retry or `q` to quit\n",
                        err.user_message()
                    )
                    .as_bytes(),
                )
                .await?;
            return Ok(false);
        }
        Err(err) => return Err(err.into()),
    };
    output
        .write_all(format!("submitted {} answers; marking...\n", record.answers.len()).as_bytes())
        .await?;
    output.flush().await?;

    loop {
        match events.recv().await {
            Ok(MarkingEvent::Completed { exam_id, has_results }) if exam_id == record.exam_id => {
                let message = if has_results {
                    format!("marking finished; run `results {exam_id}` to review\n")
                } else {
                    "marking finished without results\n".to_string()
                };
                output.write_all(message.as_bytes()).await?;
                break;
            }
            Ok(MarkingEvent::Failed { exam_id, reason }) if exam_id == record.exam_id => {
                warn!(exam_id = %exam_id, reason = %reason, "marking failed");
                output.write_all(b"marking finished without results\n").await?;
                break;
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    output.flush().await?;
    Ok(true)
}

#[cfg(test)]
#[path = "tests/take_tests.rs"]
mod tests;
