use std::{collections::HashSet, path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    schedule::{exam_countdown, format_countdown},
    AuthSession, EnrollmentService, ExamApiClient, ExamController, Services,
};
use shared::domain::{CourseId, ExamId, UserId};
use storage::Storage;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod take;

use config::{load_settings, normalize_database_url, Overrides, Settings, DEFAULT_CONFIG_PATH};

#[derive(Parser, Debug)]
#[command(name = "exam_cli", about = "Take and review mock exams for a course")]
struct Cli {
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[arg(long)]
    api_base_url: Option<String>,
    #[arg(long)]
    database_url: Option<String>,
    /// Bearer token; the user id is read from its claims unless --user-id is set.
    #[arg(long)]
    token: Option<String>,
    #[arg(long)]
    user_id: Option<String>,
    #[arg(long)]
    course_id: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the course's mock exams with their status.
    List,
    /// Answer an exam interactively; answers are autosaved as you move.
    Take { exam_id: String },
    /// Print the marked answers and score for an exam.
    Results { exam_id: String },
    /// Ask the backend to generate a new mock exam.
    Generate {
        course_code: String,
        #[arg(long)]
        title: String,
    },
    /// Time left until the course's exam.
    Countdown,
}

fn resolve_auth(settings: &Settings) -> Result<AuthSession> {
    match (&settings.token, &settings.user_id) {
        (Some(token), Some(user_id)) => {
            Ok(AuthSession::new(UserId::new(user_id.clone())).with_token(token.clone()))
        }
        (Some(token), None) => Ok(AuthSession::from_token(token)?),
        (None, Some(user_id)) => Ok(AuthSession::new(UserId::new(user_id.clone()))),
        (None, None) => bail!("no user: pass --token or --user-id (or set APP__USER_ID)"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings(&cli.config);
    settings.apply_overrides(Overrides {
        api_base_url: cli.api_base_url,
        database_url: cli.database_url,
        token: cli.token,
        user_id: cli.user_id,
        course_id: cli.course_id,
    });

    let auth = resolve_auth(&settings)?;
    let course_id = settings
        .course_id
        .clone()
        .map(CourseId::new)
        .context("no course: pass --course-id (or set APP__COURSE_ID)")?;
    let client = ExamApiClient::new(&settings.api_base_url)?.with_auth(&auth);
    info!(api = client.base_url(), user_id = %auth.user_id(), course_id = %course_id, "starting");

    if let Command::Countdown = cli.command {
        return countdown(&client, &auth, &course_id).await;
    }

    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await?;
    storage.health_check().await?;
    let mut controller = ExamController::new(
        auth,
        course_id,
        Services::from_backend(Arc::new(client)),
        Arc::new(storage.clone()),
    );

    match cli.command {
        Command::List => list(&mut controller, &storage).await?,
        Command::Take { exam_id } => {
            let stdin = BufReader::new(tokio::io::stdin());
            take::run(&mut controller, &ExamId::new(exam_id), stdin, tokio::io::stdout()).await?;
        }
        Command::Results { exam_id } => results(&mut controller, &ExamId::new(exam_id)).await?,
        Command::Generate { course_code, title } => {
            match controller.generate_exam(&course_code, &title).await? {
                Some(exam) => println!(
                    "generated {} \"{}\" with {} questions",
                    exam.id,
                    exam.title,
                    exam.question_count()
                ),
                None => println!("exam generated; run `list` to see it"),
            }
        }
        Command::Countdown => {}
    }

    Ok(())
}

async fn list(controller: &mut ExamController, storage: &Storage) -> Result<()> {
    let listings = controller.list_exams().await?;
    if listings.is_empty() {
        println!("no mock exams for course {}", controller.course_id());
        return Ok(());
    }
    let drafts: HashSet<ExamId> = storage
        .list_entries(controller.course_id())
        .await?
        .into_iter()
        .map(|entry| entry.key.exam_id)
        .collect();
    for listing in listings {
        let draft = if drafts.contains(&listing.exam.id) { " (draft)" } else { "" };
        let created = listing
            .exam
            .created_at
            .map(|ts| ts.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12} {:<40} {:>3} q  {:<10}  [{}]{draft}",
            listing.exam.id.as_str(),
            listing.exam.title,
            listing.exam.question_count(),
            created,
            listing.status.action_label()
        );
    }
    Ok(())
}

async fn results(controller: &mut ExamController, exam_id: &ExamId) -> Result<()> {
    let mut review = controller.open_results(exam_id).await?.clone();
    println!("score: {}", review.score());
    loop {
        if let Some(view) = review.current_view() {
            println!("\n[{}] {} ({})", view.position, view.question, view.badge);
            println!("  your answer:  {}", view.user_answer);
            println!("  model answer: {}", view.model_answer);
        }
        if !review.next() {
            break;
        }
    }
    Ok(())
}

async fn countdown(client: &ExamApiClient, auth: &AuthSession, course_id: &CourseId) -> Result<()> {
    let Some(enrollment) = client.enrollment(auth.user_id(), course_id).await? else {
        println!("not enrolled in course {course_id}");
        return Ok(());
    };
    let name = enrollment
        .course_name
        .clone()
        .unwrap_or_else(|| course_id.to_string());
    match exam_countdown(&enrollment, chrono::Local::now().naive_local()) {
        Some(remaining) => println!("{name}: exam in {}", format_countdown(remaining)),
        None if enrollment.exam_date.is_none() => println!("{name}: no exam date set"),
        None => println!("{name}: exam has started or passed"),
    }
    Ok(())
}
