use anyhow::Result;
use chrono::{Local, NaiveDateTime, NaiveTime};
use occurrent_core::date_range::parse_date;
use occurrent_core::query::{upcoming, upcoming_for};
use occurrent_core::{GeneratorId, GeneratorStore, MemoryStore, ReconcileOptions};

use crate::render;

pub fn run(
    store: &MemoryStore,
    after: Option<&str>,
    count: usize,
    generator: Option<&str>,
    hide_hidden: bool,
    json: bool,
) -> Result<()> {
    let now = Local::now().naive_local();
    let after: NaiveDateTime = match after {
        Some(s) => parse_date(s)?.and_time(NaiveTime::MIN),
        None => now,
    };
    let options = ReconcileOptions::with_hidden(hide_hidden);

    let occurrences = match generator {
        Some(id) => {
            let Some(generator) = store.generator(&GeneratorId::from(id))? else {
                let available: Vec<_> = store
                    .generators()?
                    .into_iter()
                    .map(|g| g.id.to_string())
                    .collect();
                anyhow::bail!(
                    "Generator '{}' not found. Available: {}",
                    id,
                    available.join(", ")
                );
            };
            upcoming_for(store, &generator, after, count, options)?
        }
        None => upcoming(store, after, count, options)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&occurrences)?);
    } else {
        render::print_agenda(&occurrences, now.date());
    }

    Ok(())
}
