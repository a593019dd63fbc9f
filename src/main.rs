// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

use gesture_tree::source::{GestureFeed, SimulatedHand};
use gesture_tree::telemetry::{default_output_dir, SessionRecorder};
use gesture_tree::{Engine, EngineConfig, GestureClassifier};

const FRAME_RATE: u32 = 60;

/// Headless run of the formation engine driven by a scripted hand.
#[derive(Debug, Parser)]
#[command(name = "gesture_tree", version, about)]
struct Args {
    /// Engine configuration (JSON). Defaults to the per-user config file if present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// How long to run, in seconds
    #[arg(long, default_value_t = 24)]
    seconds: u32,

    /// Number of placeholder photos to hang in the tree
    #[arg(long, default_value_t = 12)]
    photos: usize,

    /// Where session telemetry is written
    #[arg(long)]
    output: Option<PathBuf>,

    /// Step the scripted hand on a fixed clock instead of the live feed task
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => EngineConfig::load_or_default().context("failed to load default config")?,
    };

    let mut engine = Engine::new(config.clone()).context("failed to build engine")?;
    engine
        .photos_mut()
        .add_photos((0..args.photos).map(|i| format!("photo_{:03}.jpg", i)));

    let output_dir = args.output.clone().unwrap_or_else(default_output_dir);
    let mut recorder = SessionRecorder::new(&output_dir, None);
    let total_ticks = args.seconds * FRAME_RATE;

    if args.offline {
        run_offline(&mut engine, &mut recorder, &config, total_ticks);
    } else {
        run_live(&mut engine, &mut recorder, &config, total_ticks).await?;
    }

    let csv_path = recorder.export_csv().context("failed to export tick data")?;
    let summary_path = recorder
        .export_summary()
        .context("failed to export session summary")?;
    let summary = recorder.summary();

    println!("Session {} finished", summary.session);
    println!("  ticks:             {}", summary.ticks);
    println!("  detection rate:    {:.1}%", summary.detection_rate * 100.0);
    println!("  formation changes: {}", summary.formation_changes);
    println!("  picks:             {} direct, {} random", summary.direct_picks, summary.random_picks);
    println!("  data:              {}", csv_path.display());
    println!("  summary:           {}", summary_path.display());
    Ok(())
}

fn run_offline(engine: &mut Engine, recorder: &mut SessionRecorder, config: &EngineConfig, total_ticks: u32) {
    let hand = SimulatedHand::new();
    let mut classifier = GestureClassifier::new(config.gesture.clone());
    let dt = 1.0 / FRAME_RATE as f32;

    for step in 0..total_ticks {
        let t = step as f32 * dt;
        let signal = classifier.classify(hand.frame_at(t).as_ref());
        let frame = engine.tick(&signal, dt);
        recorder.record(&signal, &frame);
        if step % FRAME_RATE == 0 {
            info!(
                "t={:.0}s formation={} active={:?} error={:.3}",
                frame.elapsed, frame.formation, frame.active, frame.convergence_error
            );
        }
    }
}

async fn run_live(
    engine: &mut Engine,
    recorder: &mut SessionRecorder,
    config: &EngineConfig,
    total_ticks: u32,
) -> Result<()> {
    let classifier = GestureClassifier::new(config.gesture.clone());
    let feed = GestureFeed::spawn(SimulatedHand::new(), classifier, &config.source);

    let mut ticker = tokio::time::interval(Duration::from_secs_f32(1.0 / FRAME_RATE as f32));
    let mut last = Instant::now();
    for step in 0..total_ticks {
        ticker.tick().await;
        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f32();
        last = now;

        let snapshot = feed.latest();
        let frame = engine.tick(&snapshot.signal, dt);
        recorder.record(&snapshot.signal, &frame);

        if step % FRAME_RATE == 0 {
            info!(
                "t={:.0}s formation={} active={:?} inference={:.2}ms detection={:.0}%",
                frame.elapsed,
                frame.formation,
                frame.active,
                snapshot.metrics.avg_inference_ms,
                snapshot.metrics.detection_rate * 100.0
            );
        }
    }

    feed.shutdown().await.context("landmark feed did not stop cleanly")?;
    Ok(())
}
