use anyhow::Result;
use chrono::{Local, NaiveDate};
use occurrent_core::date_range::{DateRange, dates_for_month_of, parse_date};
use occurrent_core::query::occurrences_between;
use occurrent_core::{MemoryStore, OccurrentConfig, QueryWindow};

use crate::render;

/// How the window was asked for on the command line.
pub struct Span {
    pub from: Option<String>,
    pub to: Option<String>,
    pub week_of: Option<String>,
    pub month_of: Option<String>,
    pub weekend_of: Option<String>,
}

pub fn run(
    store: &MemoryStore,
    config: &OccurrentConfig,
    span: Span,
    hide_hidden: bool,
    json: bool,
) -> Result<()> {
    let today = Local::now().date_naive();
    let window = resolve_window(&span, config, today)?;

    let occurrences = occurrences_between(store, &window, hide_hidden)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&occurrences)?);
    } else {
        render::print_agenda(&occurrences, today);
    }

    Ok(())
}

fn resolve_window(span: &Span, config: &OccurrentConfig, today: NaiveDate) -> Result<QueryWindow> {
    let week = config.week();

    let days = if let Some(d) = &span.week_of {
        Some(week.dates_for_week_of(parse_date(d)?))
    } else if let Some(d) = &span.month_of {
        Some(dates_for_month_of(parse_date(d)?))
    } else if let Some(d) = &span.weekend_of {
        Some(week.dates_for_weekend_of(parse_date(d)?))
    } else {
        None
    };

    let window = match days {
        Some((first, last)) => QueryWindow::between(first, last)?,
        None => DateRange::from_args(
            span.from.as_deref(),
            span.to.as_deref(),
            today,
            config.default_days,
        )?,
    };
    Ok(window)
}
