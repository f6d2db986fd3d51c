//! `waveplan plan` command implementation.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use waveplan::state::{self, StateFile};
use waveplan::{GraphInput, Planner, PlannerConfig, emit};

use super::display;

/// Arguments of the plan command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Graph payload files (JSON); several files are merged
    #[arg(required = true)]
    pub graphs: Vec<PathBuf>,

    /// Prior-state file with coverage and risk tags per module
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// Configuration file (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory the plan is written to
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Maximum modules per non-cyclic unit
    #[arg(long)]
    pub max_unit_size: Option<usize>,

    /// Advisory number of units worked on at once
    #[arg(long)]
    pub parallelism: Option<usize>,

    /// Coverage fraction below which shortfall counts as risk
    #[arg(long)]
    pub coverage_floor: Option<f64>,

    /// Fraction of units flagged as gateways
    #[arg(long)]
    pub gateway_fraction: Option<f64>,

    /// Print the plan as JSON instead of a summary
    #[arg(long)]
    pub json: bool,
}

impl PlanArgs {
    /// Configuration file values with command-line overrides applied.
    fn resolve_config(&self) -> anyhow::Result<PlannerConfig> {
        let mut config = match &self.config {
            Some(path) => PlannerConfig::load(path)
                .with_context(|| format!("failed to load configuration {}", path.display()))?,
            None => PlannerConfig::default(),
        };

        if let Some(size) = self.max_unit_size {
            config.max_unit_size = size;
        }
        if let Some(parallelism) = self.parallelism {
            config.parallelism = parallelism;
        }
        if let Some(floor) = self.coverage_floor {
            config.risk_coverage_floor = floor;
        }
        if let Some(fraction) = self.gateway_fraction {
            config.gateway_top_fraction = fraction;
        }
        Ok(config)
    }
}

/// Run the plan command.
pub fn run(args: &PlanArgs) -> anyhow::Result<()> {
    // Configuration is validated before any graph is read
    let planner = Planner::new(args.resolve_config()?)?;

    let mut input = GraphInput::load_all(&args.graphs).context("failed to load graph input")?;

    let enrichment = match &args.state {
        Some(path) => {
            let source = StateFile::load(path)
                .with_context(|| format!("failed to load prior state {}", path.display()))?;
            Some(state::enrich(&mut input, &source))
        }
        None => None,
    };

    let plan = planner.plan(input)?;
    let written = emit::write_plan(&args.output, &plan)
        .with_context(|| format!("failed to write plan to {}", args.output.display()))?;

    if args.json {
        print!("{}", emit::to_json(&plan)?);
    } else {
        display::print_plan_summary(&plan, enrichment.as_ref(), &written);
    }

    Ok(())
}
