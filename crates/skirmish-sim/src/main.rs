//! # Skirmish Sim
//!
//! Headless harness for the combat core. Loads a TOML configuration, runs a
//! scripted player-versus-boss encounter at a fixed timestep and reports the
//! emitted events.
//!
//! ```text
//! skirmish-sim [CONFIG] [--json] [--boss NAME] [--seconds N] [--write-default PATH]
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod scenario;

use anyhow::{bail, Context, Result};
use skirmish_combat::config::CombatConfig;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::scenario::ScenarioOptions;

/// Parsed command line.
#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    json: bool,
    boss: Option<String>,
    seconds: Option<u64>,
    write_default: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json" => parsed.json = true,
            "--boss" => parsed.boss = Some(args.next().context("--boss needs a name")?),
            "--seconds" => {
                let value = args.next().context("--seconds needs a value")?;
                parsed.seconds = Some(value.parse().with_context(|| format!("bad --seconds '{value}'"))?);
            },
            "--write-default" => {
                parsed.write_default = Some(PathBuf::from(
                    args.next().context("--write-default needs a path")?,
                ));
            },
            flag if flag.starts_with("--") => bail!("unknown flag {flag}"),
            path => {
                if parsed.config.is_some() {
                    bail!("more than one config path given");
                }
                parsed.config = Some(PathBuf::from(path));
            },
        }
    }
    Ok(parsed)
}

/// Main entry point.
fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    // Logs go to stderr so --json output stays machine readable
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("skirmish=info".parse()?))
        .init();

    if let Some(path) = &args.write_default {
        CombatConfig::default().save_to(path)?;
        info!("Wrote default combat config to {}", path.display());
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => CombatConfig::load_from(path),
        None => CombatConfig::default(),
    };

    let mut opts = ScenarioOptions::default();
    if let Some(boss) = args.boss {
        opts.boss_profile = boss;
    }
    if let Some(seconds) = args.seconds {
        opts.max_duration_ms = seconds.saturating_mul(1000);
    }

    info!("Skirmish sim starting ({} vs player)", opts.boss_profile);
    let json = args.json;
    let summary = scenario::run(config, opts, |event| {
        if json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!("Failed to encode {} event: {e}", event.name()),
            }
        }
    })?;

    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        info!(
            "Encounter ended: {:?} after {:.1}s ({} ticks)",
            summary.outcome,
            summary.elapsed_ms as f32 / 1000.0,
            summary.ticks
        );
        info!(
            "Player hp {:.1}, dealt {:.1}, taken {:.1}, avoided {} telegraphs, boss phase {}",
            summary.player_hp,
            summary.damage_dealt,
            summary.damage_taken,
            summary.telegraphs_avoided,
            summary.boss_phase
        );
        for (name, count) in &summary.events {
            info!("  {name}: {count}");
        }
    }
    Ok(())
}
