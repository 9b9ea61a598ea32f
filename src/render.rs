//! Terminal rendering for occurrent types.
//!
//! This module provides an extension trait that adds colored terminal
//! rendering to occurrent-core types using owo_colors.

use chrono::NaiveDate;
use occurrent_core::{Generator, Occurrence, TimeSpan};
use owo_colors::OwoColorize;

/// Extension trait for terminal rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

impl Render for Generator {
    fn render(&self) -> String {
        let id = self.id.to_string();
        format!("{} {}", id.bold(), self.date_description().dimmed())
    }
}

impl Render for Occurrence {
    fn render(&self) -> String {
        let title = self
            .variation
            .as_ref()
            .and_then(|v| v.title.clone())
            .unwrap_or_else(|| self.generator.to_string());

        let mut line = format!("{} ", format_time(&self.varied));
        if self.cancelled {
            line.push_str(&title.red().strikethrough().to_string());
            line.push_str(&format!(" {}", "cancelled".red()));
        } else {
            line.push_str(&title);
        }

        if self.is_moved() {
            let moved = format!("moved from {}", self.unvaried);
            line.push_str(&format!(" {}", moved.yellow()));
        }
        if self.hidden_from_lists {
            line.push_str(&format!(" {}", "hidden".dimmed()));
        }

        let tag = format!("[{}]", self.generator);
        line.push_str(&format!(" {}", tag.dimmed()));
        line
    }
}

/// Print occurrences grouped by day.
pub fn print_agenda(occurrences: &[Occurrence], today: NaiveDate) {
    if occurrences.is_empty() {
        println!("{}", "No occurrences found".dimmed());
        return;
    }

    let mut current_date: Option<NaiveDate> = None;

    for occ in occurrences {
        let date = occ.varied.start_date();

        if current_date != Some(date) {
            if current_date.is_some() {
                println!();
            }
            println!("{}", format_date_label(date, today).bold());
            current_date = Some(date);
        }

        println!("  {}", occ.render());
    }
}

/// Format a date as a human-readable label (e.g. "Today", "Tomorrow", "Wed Feb 25")
fn format_date_label(date: NaiveDate, today: NaiveDate) -> String {
    match (date - today).num_days() {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        _ => date.format("%a %b %-d %Y").to_string(),
    }
}

/// Format the time portion of a span (e.g. "15:00", "15:00-16:30" or "all-day")
fn format_time(span: &TimeSpan) -> String {
    let text = match (span.start_time(), span.end_time()) {
        (None, _) => "all-day".to_string(),
        (Some(st), Some(et)) if span.end_date() == span.start_date() && et != st => {
            format!("{}-{}", st.format("%H:%M"), et.format("%H:%M"))
        }
        (Some(st), _) => st.format("%H:%M").to_string(),
    };
    format!("{:>11}", text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn test_date_labels() {
        assert_eq!(format_date_label(date(1, 9), date(1, 9)), "Today");
        assert_eq!(format_date_label(date(1, 10), date(1, 9)), "Tomorrow");
        assert_eq!(format_date_label(date(1, 16), date(1, 9)), "Tue Jan 16 2024");
    }

    #[test]
    fn test_time_column() {
        assert_eq!(format_time(&TimeSpan::on_date(date(1, 9))).trim(), "all-day");

        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let ten = NaiveTime::from_hms_opt(10, 30, 0).unwrap();
        let timed = TimeSpan::new(date(1, 9), Some(nine), None, Some(ten)).unwrap();
        assert_eq!(format_time(&timed).trim(), "09:00-10:30");

        let open = TimeSpan::new(date(1, 9), Some(nine), None, None).unwrap();
        assert_eq!(format_time(&open).trim(), "09:00");
    }
}
