// src/source.rs - landmark sources and the background task that classifies them
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f32::consts::TAU;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{EngineError, Result};
use crate::gesture::{GestureClassifier, GestureSignal};
use crate::landmarks::{
    Landmark, LandmarkFrame, FINGER_CHAINS, INDEX_TIP, LANDMARK_COUNT, MIDDLE_MCP, THUMB_TIP, WRIST,
};

/// Anything that turns "now" into zero or one hand. Runs on a blocking
/// thread, so `detect` may take as long as inference takes.
pub trait LandmarkSource: Send + 'static {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn detect(&mut self, timestamp: Duration) -> Result<Option<LandmarkFrame>>;

    fn release(&mut self) {}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub cadence_ms: u64,
    pub open_attempts: u32,
    pub retry_delay_ms: u64,
    pub metrics_window: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            cadence_ms: 33,
            open_attempts: 3,
            retry_delay_ms: 500,
            metrics_window: 30,
        }
    }
}

impl SourceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cadence_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "source cadence_ms must be positive".to_string(),
            ));
        }
        if self.open_attempts == 0 || self.metrics_window == 0 {
            return Err(EngineError::InvalidConfig(
                "source open_attempts and metrics_window must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FeedMetrics {
    pub frames: u64,
    pub avg_inference_ms: f32,
    /// Inferences per second the source could sustain at the average latency
    pub inference_rate: f32,
    /// Share of the window in which a hand was found
    pub detection_rate: f32,
}

struct MetricsWindow {
    capacity: usize,
    latencies: VecDeque<f32>,
    detections: VecDeque<bool>,
    frames: u64,
}

impl MetricsWindow {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            latencies: VecDeque::with_capacity(capacity),
            detections: VecDeque::with_capacity(capacity),
            frames: 0,
        }
    }

    fn record(&mut self, latency: Duration, detected: bool) -> FeedMetrics {
        if self.latencies.len() == self.capacity {
            self.latencies.pop_front();
            self.detections.pop_front();
        }
        self.latencies.push_back(latency.as_secs_f32() * 1000.0);
        self.detections.push_back(detected);
        self.frames += 1;

        let n = self.latencies.len() as f32;
        let avg_inference_ms = self.latencies.iter().sum::<f32>() / n;
        let inference_rate = if avg_inference_ms > 0.0 {
            1000.0 / avg_inference_ms
        } else {
            0.0
        };
        let detection_rate = self.detections.iter().filter(|d| **d).count() as f32 / n;

        FeedMetrics {
            frames: self.frames,
            avg_inference_ms,
            inference_rate,
            detection_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FeedSnapshot {
    pub signal: GestureSignal,
    /// 0 until the first classified frame
    pub sequence: u64,
    pub metrics: FeedMetrics,
}

/// Handle to the landmark task. The task is the only writer of the
/// snapshot; readers take the latest value without waiting.
pub struct GestureFeed {
    snapshot: watch::Receiver<FeedSnapshot>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl GestureFeed {
    /// Spawn the feed on the current tokio runtime.
    pub fn spawn<S: LandmarkSource>(source: S, classifier: GestureClassifier, config: &SourceConfig) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(FeedSnapshot::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_feed(source, classifier, config.clone(), snapshot_tx, shutdown_rx));
        Self {
            snapshot: snapshot_rx,
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }

    pub fn latest(&self) -> FeedSnapshot {
        *self.snapshot.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.snapshot.clone()
    }

    /// Stop the task and wait until the source has been released.
    pub async fn shutdown(mut self) -> Result<()> {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| EngineError::SourceUnavailable(format!("feed task failed: {}", e)))?;
        }
        Ok(())
    }
}

impl Drop for GestureFeed {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

fn stop_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// Open the source on a blocking thread, retrying after a delay. Hands the
/// source back with whether it opened, or nothing if `open` panicked.
async fn open_with_retry<S: LandmarkSource>(
    mut source: S,
    config: &SourceConfig,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<(S, bool)> {
    for attempt in 1..=config.open_attempts {
        let joined = tokio::task::spawn_blocking(move || {
            let result = source.open();
            (source, result)
        })
        .await;
        let result = match joined {
            Ok((returned, result)) => {
                source = returned;
                result
            }
            Err(e) => {
                error!("opening landmark source panicked: {}", e);
                return None;
            }
        };
        match result {
            Ok(()) => return Some((source, true)),
            Err(e) => {
                warn!("opening landmark source failed (attempt {}/{}): {}", attempt, config.open_attempts, e);
            }
        }
        if stop_requested(shutdown) {
            return Some((source, false));
        }
        if attempt < config.open_attempts {
            tokio::select! {
                biased;
                _ = shutdown.changed() => return Some((source, false)),
                _ = sleep(Duration::from_millis(config.retry_delay_ms)) => {}
            }
        }
    }
    Some((source, false))
}

async fn run_feed<S: LandmarkSource>(
    source: S,
    mut classifier: GestureClassifier,
    config: SourceConfig,
    snapshot: watch::Sender<FeedSnapshot>,
    mut shutdown: watch::Receiver<bool>,
) {
    let Some((mut source, opened)) = open_with_retry(source, &config, &mut shutdown).await else {
        return;
    };
    if !opened {
        if !stop_requested(&shutdown) {
            warn!("landmark source unavailable, publishing no hand until shutdown");
            while !stop_requested(&shutdown) {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        }
        source.release();
        return;
    }
    if stop_requested(&shutdown) {
        source.release();
        return;
    }
    info!("landmark feed started, cadence {} ms", config.cadence_ms);

    let started = Instant::now();
    let mut ticker = interval(Duration::from_millis(config.cadence_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut metrics = MetricsWindow::new(config.metrics_window);
    let mut sequence = 0u64;
    let mut was_detected = false;
    let mut slot = Some(source);

    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || stop_requested(&shutdown) {
                    break;
                }
            }
            _ = ticker.tick() => {
                let Some(mut current) = slot.take() else {
                    break;
                };
                let timestamp = started.elapsed();
                let began = Instant::now();
                let joined = tokio::task::spawn_blocking(move || {
                    let result = current.detect(timestamp);
                    (current, result)
                })
                .await;
                let (current, result) = match joined {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!("landmark detection panicked: {}", e);
                        return;
                    }
                };
                slot = Some(current);

                if stop_requested(&shutdown) {
                    debug!("discarding landmark result that arrived after shutdown");
                    break;
                }

                let frame = match result {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("landmark detection failed: {}", e);
                        None
                    }
                };
                let signal = classifier.classify(frame.as_ref());
                if signal.detected != was_detected {
                    debug!("hand {}", if signal.detected { "found" } else { "lost" });
                    was_detected = signal.detected;
                }

                sequence += 1;
                let metrics = metrics.record(began.elapsed(), signal.detected);
                snapshot.send_replace(FeedSnapshot {
                    signal,
                    sequence,
                    metrics,
                });
            }
        }
    }

    if let Some(mut source) = slot {
        source.release();
    }
    info!("landmark feed stopped after {} frames", sequence);
}

/// Build a plausible right hand around `palm` (landmark 9). Every
/// fingertip sits `reach` from the wrist, so grip openness equals `reach`.
/// With `pinch` the thumb tip touches the index tip.
pub fn synthetic_hand(palm_x: f32, palm_y: f32, reach: f32, pinch: bool) -> LandmarkFrame {
    let mut points = [Landmark::default(); LANDMARK_COUNT];
    let wrist = (palm_x, palm_y + 0.1);
    points[WRIST] = Landmark::new(wrist.0, wrist.1, 0.0);

    let at = |p: (f32, f32)| Landmark::new(p.0, p.1, 0.0);
    let lerp = |a: (f32, f32), b: (f32, f32), t: f32| at((a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t));

    // index, middle, ring, pinky fan out from the wrist
    let spread = [-0.45f32, -0.15, 0.15, 0.45];
    for (chain, angle) in FINGER_CHAINS[1..].iter().zip(spread) {
        let dir = (angle.sin(), -angle.cos());
        let knuckle = (wrist.0 + dir.0 * 0.1, wrist.1 + dir.1 * 0.1);
        let tip = (wrist.0 + dir.0 * reach, wrist.1 + dir.1 * reach);
        points[chain[0]] = at(knuckle);
        points[chain[1]] = lerp(knuckle, tip, 1.0 / 3.0);
        points[chain[2]] = lerp(knuckle, tip, 2.0 / 3.0);
        points[chain[3]] = at(tip);
    }
    points[MIDDLE_MCP] = Landmark::new(palm_x, palm_y, 0.0);

    let thumb_tip = if pinch {
        (points[INDEX_TIP].x + 0.01, points[INDEX_TIP].y)
    } else {
        (wrist.0 - reach * 0.85, wrist.1 - reach * 0.25)
    };
    let thumb = FINGER_CHAINS[0];
    for (i, &idx) in thumb[..3].iter().enumerate() {
        points[idx] = lerp(wrist, thumb_tip, (i + 1) as f32 / 4.0);
    }
    points[THUMB_TIP] = at(thumb_tip);

    LandmarkFrame::new(points)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandPhase {
    Fist,
    Open,
    Neutral,
    Pinch,
    Missing,
}

/// Scripted hand for demos and tests: a 12 s loop through every gesture
/// while the palm drifts around the frame.
#[derive(Debug, Clone)]
pub struct SimulatedHand {
    period: f32,
    opened: bool,
}

impl SimulatedHand {
    pub const PERIOD_SECS: f32 = 12.0;

    pub fn new() -> Self {
        Self {
            period: Self::PERIOD_SECS,
            opened: false,
        }
    }

    pub fn phase_at(&self, t: f32) -> HandPhase {
        match t.rem_euclid(self.period) {
            x if x < 3.0 => HandPhase::Fist,
            x if x < 6.0 => HandPhase::Open,
            x if x < 7.0 => HandPhase::Neutral,
            x if x < 9.0 => HandPhase::Pinch,
            x if x < 10.0 => HandPhase::Missing,
            _ => HandPhase::Open,
        }
    }

    pub fn frame_at(&self, t: f32) -> Option<LandmarkFrame> {
        let palm_x = 0.5 + 0.25 * (t * TAU / 6.0).sin();
        let palm_y = 0.5 + 0.15 * (t * TAU / 4.0).cos();
        match self.phase_at(t) {
            HandPhase::Fist => Some(synthetic_hand(palm_x, palm_y, 0.15, false)),
            HandPhase::Open => Some(synthetic_hand(palm_x, palm_y, 0.5, false)),
            HandPhase::Neutral => Some(synthetic_hand(palm_x, palm_y, 0.32, false)),
            // hold still while pinching so picks are repeatable
            HandPhase::Pinch => Some(synthetic_hand(0.5, 0.5, 0.32, true)),
            HandPhase::Missing => None,
        }
    }
}

impl Default for SimulatedHand {
    fn default() -> Self {
        Self::new()
    }
}

impl LandmarkSource for SimulatedHand {
    fn open(&mut self) -> Result<()> {
        self.opened = true;
        debug!("simulated hand ready");
        Ok(())
    }

    fn detect(&mut self, timestamp: Duration) -> Result<Option<LandmarkFrame>> {
        if !self.opened {
            return Err(EngineError::SourceUnavailable("simulated hand not opened".to_string()));
        }
        Ok(self.frame_at(timestamp.as_secs_f32()))
    }

    fn release(&mut self) {
        self.opened = false;
    }
}
