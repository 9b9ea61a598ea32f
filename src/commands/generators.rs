use anyhow::Result;
use occurrent_core::{GeneratorStore, MemoryStore};
use owo_colors::OwoColorize;

use crate::render::Render;

pub fn run(store: &MemoryStore, json: bool) -> Result<()> {
    let generators = store.generators()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&generators)?);
        return Ok(());
    }

    if generators.is_empty() {
        println!("{}", "No generators defined".dimmed());
        return Ok(());
    }

    for generator in &generators {
        println!("{}", generator.render());
    }

    Ok(())
}
