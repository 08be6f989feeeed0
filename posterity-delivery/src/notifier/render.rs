use std::fmt::Write;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use super::LetterContent;

const SUBJECT: &str = "Letter from your past self";
const DATE_FORMAT: &str = "%B %-d, %Y";

/// A letter rendered for an email transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLetter {
    pub subject: String,
    pub text: String,
    pub html: String,
}

fn format_date(at: DateTime<Utc>, timezone: Tz) -> String {
    at.with_timezone(&timezone).format(DATE_FORMAT).to_string()
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render `letter` for a recipient called `name` (or "there" if unknown).
///
/// Dates are shown as calendar days in the letter's reference zone.
#[must_use]
pub fn render(name: Option<&str>, letter: &LetterContent) -> RenderedLetter {
    let name = name.filter(|n| !n.trim().is_empty()).unwrap_or("there");
    let written = format_date(letter.created_at, letter.timezone);
    let due = format_date(letter.due_at, letter.timezone);

    let subject = letter
        .title
        .as_deref()
        .filter(|t| !t.is_empty())
        .map_or_else(|| SUBJECT.to_string(), |t| format!("{t} - {SUBJECT}"));

    let mut text = format!(
        "You have a letter from your past self!\n\n\
         Hello {name},\n\n\
         You wrote this letter to yourself on {written}.\n\n\
         It was scheduled for delivery on {due}.\n\n"
    );
    if let Some(title) = letter.title.as_deref().filter(|t| !t.is_empty()) {
        let _ = writeln!(text, "{title}");
    }
    let _ = write!(
        text,
        "{}\n\nThank you for writing to your future self.",
        letter.body
    );

    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"></head>\n<body>\n\
         <h1>You have a letter from your past self!</h1>\n",
    );
    let _ = writeln!(html, "<p>Hello {},</p>", escape_html(name));
    let _ = writeln!(
        html,
        "<p>You wrote this letter to yourself on <strong>{written}</strong>.</p>"
    );
    let _ = writeln!(
        html,
        "<p>It was scheduled for delivery on <strong>{due}</strong>.</p>"
    );
    if let Some(title) = letter.title.as_deref().filter(|t| !t.is_empty()) {
        let _ = writeln!(html, "<h2>{}</h2>", escape_html(title));
    }
    for paragraph in letter.body.split("\n\n").filter(|p| !p.trim().is_empty()) {
        let _ = writeln!(
            html,
            "<p>{}</p>",
            escape_html(paragraph.trim()).replace('\n', "<br>")
        );
    }
    html.push_str("<p><em>Thank you for writing to your future self.</em></p>\n</body>\n</html>\n");

    RenderedLetter {
        subject,
        text,
        html,
    }
}
