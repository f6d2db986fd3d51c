//! # Waveplan: conversion scheduling for module-by-module migrations
//!
//! Waveplan takes the import graph of a codebase that is being migrated one
//! module at a time and turns it into an ordered plan:
//!
//! - import cycles are collapsed into clusters that must move together
//! - modules are grouped into conversion units by directory
//! - units are layered into waves, each depending only on earlier waves
//! - every unit gets a risk level and an effort estimate
//! - the critical path and the gateway units that block the most work are reported
//!
//! The engine is a pure function from graph, optional risk attributes and
//! configuration to a [`ConversionPlan`]. It keeps no state between runs.
//!
//! ## Quick Start
//!
//! ```no_run
//! use waveplan::{GraphInput, Planner, PlannerConfig};
//! use std::path::Path;
//!
//! let input = GraphInput::load(Path::new("graph.json"))?;
//! let plan = Planner::new(PlannerConfig::default())?.plan(input)?;
//!
//! for wave in &plan.waves {
//!     println!("wave {}: {} units", wave.number, wave.units.len());
//! }
//! waveplan::emit::write_plan(Path::new("out"), &plan)?;
//! # Ok::<(), waveplan::Error>(())
//! ```

#![forbid(unsafe_code)]

pub mod analysis;
pub mod config;
pub mod domain;
pub mod effort;
pub mod emit;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod plan;
pub mod risk;
pub mod schedule;
pub mod state;
pub mod units;

pub use config::PlannerConfig;
pub use domain::{ModuleId, RiskLevel, RiskTag, Severity};
pub use effort::{EffortModel, LinearEffort};
pub use error::{Error, GraphIntegrityError, InvariantViolation, Result};
pub use ingest::GraphInput;
pub use plan::{ConversionPlan, Planner};
pub use state::{RiskAttributeSource, StateFile};
