//! Placeholder substitution for template field values.
//!
//! Substitution is a literal, case-sensitive, global replace of every known
//! token. Tokens outside the table are left untouched so an operator's typo
//! shows up on the proof render instead of erroring.

use chrono::Local;

pub const TRAINING_PROVIDER: &str = "Philippine Safety Institute";

/// Values available to a single render.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderContext {
    pub trainee_name: String,
    pub course_name: String,
    /// Distinct display title; falls back to the course name.
    pub course_title: Option<String>,
    pub certificate_number: String,
    pub batch_number: String,
    /// Precomputed "held on" date string from the schedule.
    pub held_on: String,
}

/// `"juan"`, `"DELA CRUZ"` -> `"Juan"`, `"Dela Cruz"` (per word).
pub fn capitalize_words(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Capitalized first + middle-initial-with-period + capitalized last.
pub fn format_trainee_name(first: &str, middle_initial: Option<&str>, last: &str) -> String {
    let mut parts = vec![capitalize_words(first)];
    if let Some(mi) = middle_initial {
        let mi = mi.trim();
        if !mi.is_empty() {
            parts.push(format!("{}.", mi.to_uppercase()));
        }
    }
    parts.push(capitalize_words(last));
    parts.retain(|p| !p.is_empty());
    parts.join(" ")
}

/// Today's date in long form, e.g. "August 30, 2026".
pub fn long_form_today() -> String {
    Local::now().format("%B %-d, %Y").to_string()
}

fn table(ctx: &PlaceholderContext) -> [(&'static str, String); 11] {
    let today = long_form_today();
    let title = ctx
        .course_title
        .clone()
        .unwrap_or_else(|| ctx.course_name.clone());
    [
        ("{{trainee_name}}", ctx.trainee_name.clone()),
        ("{{course_name}}", ctx.course_name.clone()),
        ("{{course_title}}", title),
        ("{{completion_date}}", today.clone()),
        ("{{given_this}}", today),
        ("{{certificate_number}}", ctx.certificate_number.clone()),
        ("{{batch_number}}", ctx.batch_number.clone()),
        ("{{training_provider}}", TRAINING_PROVIDER.to_string()),
        ("{{schedule_range}}", ctx.held_on.clone()),
        ("{{held_on}}", ctx.held_on.clone()),
        // Reserved token, always substituted to nothing.
        ("{{trainee_picture}}", String::new()),
    ]
}

/// Replace every known token occurring in `value`.
pub fn substitute(value: &str, ctx: &PlaceholderContext) -> String {
    let mut result = value.to_string();
    for (token, replacement) in table(ctx) {
        if result.contains(token) {
            result = result.replace(token, &replacement);
        }
    }
    result
}
