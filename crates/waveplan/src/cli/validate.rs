//! `waveplan validate` command implementation.

use std::path::PathBuf;

use anyhow::Context;
use colored::Colorize;
use waveplan::GraphInput;
use waveplan::graph::{Clustering, ModuleGraph};

use super::display;

/// Run the validate command.
pub fn run(graphs: &[PathBuf]) -> anyhow::Result<()> {
    let input = GraphInput::load_all(graphs).context("failed to load graph input")?;
    let graph = ModuleGraph::build(input)?;
    let clustering = Clustering::compute(&graph);

    println!("{}", "Graph is valid".green().bold());
    println!();
    display::print_count("Modules", graph.module_count());
    display::print_count("Import edges", graph.edge_count());
    if graph.dropped_self_loops() > 0 {
        display::print_count("Self-imports dropped", graph.dropped_self_loops());
    }
    println!();

    let cycles: Vec<_> = clustering
        .ids()
        .filter(|&c| clustering.is_cyclic(c))
        .collect();
    if cycles.is_empty() {
        println!("{}", "No import cycles detected.".green());
        return Ok(());
    }

    println!(
        "Found {} import cycles (each becomes one conversion unit):",
        cycles.len().to_string().yellow().bold()
    );
    println!();
    for (i, &cluster) in cycles.iter().enumerate() {
        let members = clustering.member_ids(&graph, cluster);
        println!(
            "  {} {} ({} modules):",
            "Cycle".yellow().bold(),
            i + 1,
            members.len()
        );
        display::print_list(members.iter().map(ToString::to_string), "");
    }

    Ok(())
}
