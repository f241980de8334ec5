use chrono::{Duration, NaiveDateTime, NaiveTime};
use shared::domain::Enrollment;

/// Exams without a recorded start time are assumed to start in the morning.
pub fn default_exam_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Time left until the enrolled course's exam, in the same (local) clock the
/// exam date was entered in. `None` when no date is known or the exam has
/// started.
pub fn exam_countdown(enrollment: &Enrollment, now: NaiveDateTime) -> Option<Duration> {
    let date = enrollment.exam_date?;
    let starts_at = date.and_time(enrollment.exam_time.unwrap_or_else(default_exam_time));
    let remaining = starts_at - now;
    (remaining > Duration::zero()).then_some(remaining)
}

pub fn format_countdown(remaining: Duration) -> String {
    let days = remaining.num_days();
    let hours = remaining.num_hours() - days * 24;
    let minutes = remaining.num_minutes() - remaining.num_hours() * 60;
    match (days, hours) {
        (0, 0) => format!("{minutes}m"),
        (0, _) => format!("{hours}h {minutes}m"),
        _ => format!("{days}d {hours}h {minutes}m"),
    }
}
