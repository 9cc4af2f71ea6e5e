use anyhow::{Context as _, Result};
use rollcall_core::session::CaptureSettings;
use rollcall_core::RosterLayout;
use rollcall_vision::MODEL_FILE;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration, built once at startup.
///
/// Layered as: defaults, then an optional TOML file, then `ROLLCALL_*`
/// environment variables. Command-line flags are applied last by `main`.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Root directory holding one sub-directory per registered person.
    pub face_data_dir: PathBuf,
    /// Attendance CSV file.
    pub ledger_path: PathBuf,
    /// V4L2 device path.
    pub camera_device: String,
    /// Directory containing the SCRFD model.
    pub model_dir: PathBuf,
    /// Reference images captured per registration.
    pub max_samples: usize,
    /// Frames discarded after opening the camera.
    pub warmup_frames: usize,
    /// Capture presses ignored for this long after a saved sample.
    pub capture_cooldown_ms: u64,
    /// Detections below this score are ignored.
    pub min_face_confidence: f32,
    /// Geometry of the live roster buttons.
    pub roster: RosterLayout,
}

/// Every key optional; absent keys keep the lower layer's value.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    face_data_dir: Option<PathBuf>,
    ledger_path: Option<PathBuf>,
    camera_device: Option<String>,
    model_dir: Option<PathBuf>,
    max_samples: Option<usize>,
    warmup_frames: Option<usize>,
    capture_cooldown_ms: Option<u64>,
    min_face_confidence: Option<f32>,
    roster: Option<RosterLayout>,
}

impl Config {
    /// Load from `file` (or `$ROLLCALL_CONFIG`) and the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_with(file, |key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`] with an explicit environment lookup.
    pub fn load_with(file: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::defaults(&env);

        let file = file
            .map(Path::to_path_buf)
            .or_else(|| env("ROLLCALL_CONFIG").map(PathBuf::from));
        if let Some(path) = file {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            let parsed: FileConfig = toml::from_str(&text)
                .with_context(|| format!("parsing config file {}", path.display()))?;
            config.apply_file(parsed);
            tracing::debug!(path = %path.display(), "applied config file");
        }

        config.apply_env(&env);
        config.max_samples = config.max_samples.max(1);
        Ok(config)
    }

    fn defaults(env: &impl Fn(&str) -> Option<String>) -> Self {
        let data_home = env("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = env("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            });

        Self {
            face_data_dir: PathBuf::from("FaceData"),
            ledger_path: PathBuf::from("Attendance.csv"),
            camera_device: "/dev/video0".to_string(),
            model_dir: data_home.join("rollcall").join("models"),
            max_samples: 1,
            warmup_frames: 4,
            capture_cooldown_ms: 500,
            min_face_confidence: 0.5,
            roster: RosterLayout::default(),
        }
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(v) = file.face_data_dir {
            self.face_data_dir = v;
        }
        if let Some(v) = file.ledger_path {
            self.ledger_path = v;
        }
        if let Some(v) = file.camera_device {
            self.camera_device = v;
        }
        if let Some(v) = file.model_dir {
            self.model_dir = v;
        }
        if let Some(v) = file.max_samples {
            self.max_samples = v;
        }
        if let Some(v) = file.warmup_frames {
            self.warmup_frames = v;
        }
        if let Some(v) = file.capture_cooldown_ms {
            self.capture_cooldown_ms = v;
        }
        if let Some(v) = file.min_face_confidence {
            self.min_face_confidence = v;
        }
        if let Some(v) = file.roster {
            self.roster = v;
        }
    }

    fn apply_env(&mut self, env: &impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("ROLLCALL_DATA_DIR") {
            self.face_data_dir = PathBuf::from(v);
        }
        if let Some(v) = env("ROLLCALL_LEDGER") {
            self.ledger_path = PathBuf::from(v);
        }
        if let Some(v) = env("ROLLCALL_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Some(v) = env("ROLLCALL_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        self.max_samples = parsed(env, "ROLLCALL_MAX_SAMPLES", self.max_samples);
        self.warmup_frames = parsed(env, "ROLLCALL_WARMUP_FRAMES", self.warmup_frames);
        self.capture_cooldown_ms =
            parsed(env, "ROLLCALL_CAPTURE_COOLDOWN_MS", self.capture_cooldown_ms);
        self.min_face_confidence =
            parsed(env, "ROLLCALL_MIN_FACE_CONFIDENCE", self.min_face_confidence);
    }

    /// Path to the SCRFD detection model.
    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(MODEL_FILE)
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            max_samples: self.max_samples,
            cooldown: Duration::from_millis(self.capture_cooldown_ms),
        }
    }
}

/// Parse `key` if set and valid; otherwise keep `current`.
fn parsed<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
    current: T,
) -> T {
    match env(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting");
            current
        }),
        None => current,
    }
}
