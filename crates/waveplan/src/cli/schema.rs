//! `waveplan schema` command implementation.

use waveplan::ingest::input_schema;

/// Run the schema command.
pub fn run() -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&input_schema())?);
    Ok(())
}
