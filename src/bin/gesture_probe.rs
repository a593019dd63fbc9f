// src/bin/gesture_probe.rs - classify landmark frames read from stdin, one JSON line each
use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::warn;

use gesture_tree::landmarks::{Landmark, LandmarkFrame};
use gesture_tree::{EngineConfig, FormationState, GestureClassifier, GestureSignal};

/// Reads `null`, `[[x, y, z], ...]` or `[{"x":..,"y":..,"z":..}, ...]` per line
/// and prints the resulting gesture signal and formation.
#[derive(Debug, Parser)]
#[command(name = "gesture_probe", version, about)]
struct Args {
    /// Engine configuration (JSON) to take gesture thresholds from
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFrame {
    Triples(Vec<[f32; 3]>),
    Points(Vec<Landmark>),
}

#[derive(Debug, Serialize)]
struct ProbeLine {
    line: usize,
    signal: GestureSignal,
    formation: FormationState,
}

fn parse_frame(text: &str) -> Result<Option<LandmarkFrame>> {
    let raw: Option<RawFrame> = serde_json::from_str(text).context("not a landmark frame")?;
    let frame = match raw {
        None => None,
        Some(RawFrame::Triples(triples)) => Some(LandmarkFrame::from_triples(&triples)?),
        Some(RawFrame::Points(points)) => Some(LandmarkFrame::from_points(&points)?),
    };
    Ok(frame)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => EngineConfig::load_or_default().context("failed to load default config")?,
    };

    let mut classifier = GestureClassifier::new(config.gesture);
    let mut formation = FormationState::default();

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line.context("failed to read stdin")?;
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        let frame = match parse_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("line {}: {:#}", index + 1, e);
                continue;
            }
        };

        let signal = classifier.classify(frame.as_ref());
        formation = formation.next(&signal);
        let output = ProbeLine {
            line: index + 1,
            signal,
            formation,
        };
        writeln!(out, "{}", serde_json::to_string(&output)?)?;
    }

    out.flush()?;
    Ok(())
}
