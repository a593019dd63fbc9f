// src/telemetry.rs
use chrono::Local;
use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::engine::FrameSnapshot;
use crate::error::Result;
use crate::gesture::{FormationState, GestureSignal};
use crate::selection::SelectionEvent;

#[derive(Debug, Clone, Serialize)]
pub struct TickRecord {
    pub tick: u64,
    pub elapsed: f32,
    pub detected: bool,
    pub cursor_x: Option<f32>,
    pub cursor_y: Option<f32>,
    pub is_pinching: bool,
    pub is_fist: bool,
    pub is_open: bool,
    pub formation: FormationState,
    pub rotation_x: f32,
    pub rotation_y: f32,
    pub star_y: f32,
    pub convergence_error: f32,
    pub active_photo: Option<String>,
    pub event: &'static str,
    pub event_id: Option<String>,
}

impl TickRecord {
    pub fn new(signal: &GestureSignal, frame: &FrameSnapshot) -> Self {
        let cursor = signal.cursor();
        Self {
            tick: frame.tick,
            elapsed: frame.elapsed,
            detected: signal.detected,
            cursor_x: cursor.map(|c| c.0),
            cursor_y: cursor.map(|c| c.1),
            is_pinching: signal.detected && signal.is_pinching,
            is_fist: signal.detected && signal.is_fist,
            is_open: signal.detected && signal.is_open,
            formation: frame.formation,
            rotation_x: frame.rotation.0,
            rotation_y: frame.rotation.1,
            star_y: frame.star.position[1],
            convergence_error: frame.convergence_error,
            active_photo: frame.active.clone(),
            event: frame.event.as_str(),
            event_id: frame.event.id().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session: String,
    pub ticks: usize,
    pub duration_secs: f32,
    pub detection_rate: f32,
    pub formation_changes: usize,
    pub explode_share: f32,
    pub direct_picks: usize,
    pub random_picks: usize,
    pub history_resets: usize,
    pub releases: usize,
}

/// Default export location: `~/Documents/GestureTree`, or `./output`.
pub fn default_output_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.document_dir().map(|p| p.join("GestureTree")))
        .unwrap_or_else(|| PathBuf::from("./output"))
}

pub struct SessionRecorder {
    output_dir: PathBuf,
    session_name: String,
    records: Vec<TickRecord>,
    summary: SessionSummary,
    last_formation: Option<FormationState>,
    detected_ticks: usize,
    explode_ticks: usize,
}

impl SessionRecorder {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(|| {
            format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))
        });

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            summary: SessionSummary {
                session: session_name.clone(),
                ..SessionSummary::default()
            },
            session_name,
            records: Vec::new(),
            last_formation: None,
            detected_ticks: 0,
            explode_ticks: 0,
        }
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    pub fn records(&self) -> &[TickRecord] {
        &self.records
    }

    pub fn record(&mut self, signal: &GestureSignal, frame: &FrameSnapshot) {
        if signal.detected {
            self.detected_ticks += 1;
        }
        if frame.formation.is_exploded() {
            self.explode_ticks += 1;
        }
        if let Some(last) = self.last_formation {
            if last != frame.formation {
                self.summary.formation_changes += 1;
            }
        }
        self.last_formation = Some(frame.formation);

        match &frame.event {
            SelectionEvent::Picked { .. } => self.summary.direct_picks += 1,
            SelectionEvent::RandomPick { history_reset, .. } => {
                self.summary.random_picks += 1;
                if *history_reset {
                    self.summary.history_resets += 1;
                }
            }
            SelectionEvent::Released { .. } => self.summary.releases += 1,
            SelectionEvent::Idle => {}
        }

        self.summary.duration_secs = frame.elapsed;
        self.records.push(TickRecord::new(signal, frame));
    }

    pub fn summary(&self) -> SessionSummary {
        let ticks = self.records.len();
        let share = |n: usize| if ticks == 0 { 0.0 } else { n as f32 / ticks as f32 };
        SessionSummary {
            ticks,
            detection_rate: share(self.detected_ticks),
            explode_share: share(self.explode_ticks),
            ..self.summary.clone()
        }
    }

    pub fn export_csv(&self) -> Result<PathBuf> {
        let csv_path = self.session_dir().join("ticks.csv");

        // Create directory if it doesn't exist
        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(&csv_path)?;
        let mut writer = Writer::from_writer(file);
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(csv_path)
    }

    pub fn export_summary(&self) -> Result<PathBuf> {
        let path = self.session_dir().join("summary.json");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_string_pretty(&self.summary())?)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::Engine;

    fn open_hand() -> GestureSignal {
        GestureSignal {
            cursor_x: 0.4,
            cursor_y: 0.6,
            is_pinching: false,
            is_fist: false,
            is_open: true,
            detected: true,
        }
    }

    #[test]
    fn test_session_name_defaults_to_timestamp() {
        let recorder = SessionRecorder::new("/tmp", None);
        assert!(recorder.session_name().starts_with("session_"));
        assert_eq!(recorder.session_name().len(), "session_20240101_120000".len());

        let named = SessionRecorder::new("/tmp", Some("demo".to_string()));
        assert_eq!(named.session_dir(), PathBuf::from("/tmp/demo"));
    }

    #[test]
    fn test_summary_counts_ticks() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let mut recorder = SessionRecorder::new("/tmp", Some("counts".to_string()));

        let idle = GestureSignal::default();
        for signal in [idle, open_hand(), open_hand(), idle] {
            let frame = engine.tick(&signal, 0.02);
            recorder.record(&signal, &frame);
        }

        let summary = recorder.summary();
        assert_eq!(summary.ticks, 4);
        assert_eq!(summary.formation_changes, 1);
        assert!((summary.detection_rate - 0.5).abs() < 1e-6);
        assert!((summary.explode_share - 0.75).abs() < 1e-6);
        assert!((summary.duration_secs - 0.08).abs() < 1e-5);

        let first = &recorder.records()[0];
        assert_eq!(first.cursor_x, None);
        assert!(!first.is_fist);
        assert_eq!(first.event, "idle");
    }

    #[test]
    fn test_export_writes_session_files() {
        let root = std::env::temp_dir().join(format!("gesture_tree_telemetry_{}", uuid::Uuid::new_v4()));
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let mut recorder = SessionRecorder::new(&root, Some("export".to_string()));
        for _ in 0..3 {
            let frame = engine.tick(&open_hand(), 0.016);
            recorder.record(&open_hand(), &frame);
        }

        let csv_path = recorder.export_csv().unwrap();
        assert_eq!(csv_path, root.join("export").join("ticks.csv"));
        let text = std::fs::read_to_string(&csv_path).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("tick,elapsed,detected"));
        assert_eq!(lines.count(), 3);

        let summary_path = recorder.export_summary().unwrap();
        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(summary_path).unwrap()).unwrap();
        assert_eq!(summary["ticks"], 3);
        assert_eq!(summary["session"], "export");

        std::fs::remove_dir_all(root).ok();
    }
}
