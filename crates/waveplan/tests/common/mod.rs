//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::process::{Command, Output};

use waveplan::ingest::{EdgeInput, GraphInput, ModuleInput};
use waveplan::{ConversionPlan, Planner, PlannerConfig};

/// Build a payload from module ids and `(importer, imported)` pairs.
pub fn graph(modules: &[&str], imports: &[(&str, &str)]) -> GraphInput {
    GraphInput {
        modules: modules.iter().map(|m| ModuleInput::new(*m, 100)).collect(),
        edges: imports
            .iter()
            .map(|(from, to)| EdgeInput::new(*from, *to))
            .collect(),
    }
}

/// Plan with the default configuration.
pub fn plan(input: GraphInput) -> ConversionPlan {
    plan_with(input, PlannerConfig::default())
}

/// Plan with a custom configuration.
pub fn plan_with(input: GraphInput, config: PlannerConfig) -> ConversionPlan {
    Planner::new(config)
        .expect("valid configuration")
        .plan(input)
        .expect("planning succeeds")
}

/// Write a payload as JSON.
pub fn write_graph(path: &Path, input: &GraphInput) {
    std::fs::write(path, serde_json::to_string_pretty(input).unwrap()).unwrap();
}

/// Run the waveplan binary in `dir`.
pub fn run_waveplan_in_dir(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_waveplan"))
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to execute waveplan")
}
