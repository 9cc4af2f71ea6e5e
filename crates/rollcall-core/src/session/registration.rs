//! Registration session: name entry, then reference-image capture.
//!
//! ```text
//! Idle → AwaitingName → CapturingSamples → Done
//!             │                │
//!             └──────→ Aborted ←┘
//! ```
//!
//! A sample is saved only when the current frame has a face in it and the
//! operator presses capture. The camera is held only while capturing and is
//! dropped on every exit path.

use super::{SessionError, StopReason};
use crate::capture::{
    locate_or_empty, CameraProvider, Command, FaceLocator, FrameSource, OperatorEvent, Overlay,
    Surface,
};
use crate::registry::{Identity, Registry, RegistryError};
use crate::types::Point;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Where the sample counter is drawn on the frame.
const STATUS_ANCHOR: Point = Point { x: 10, y: 30 };

/// Per-registration capture limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Samples to save before the session completes. At least 1.
    pub max_samples: usize,
    /// Capture presses within this window after a save are ignored.
    pub cooldown: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            max_samples: 1,
            cooldown: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationState {
    Idle,
    AwaitingName,
    CapturingSamples { captured: usize },
    Done { captured: usize },
    Aborted { captured: usize, reason: StopReason },
}

impl RegistrationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RegistrationState::Done { .. } | RegistrationState::Aborted { .. }
        )
    }

    pub fn captured(&self) -> usize {
        match self {
            RegistrationState::Idle | RegistrationState::AwaitingName => 0,
            RegistrationState::CapturingSamples { captured }
            | RegistrationState::Done { captured }
            | RegistrationState::Aborted { captured, .. } => *captured,
        }
    }
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationState::Idle => write!(f, "idle"),
            RegistrationState::AwaitingName => write!(f, "awaiting a name"),
            RegistrationState::CapturingSamples { captured } => {
                write!(f, "capturing ({captured} saved)")
            }
            RegistrationState::Done { captured } => write!(f, "done ({captured} saved)"),
            RegistrationState::Aborted { captured, reason } => {
                write!(f, "aborted ({reason}, {captured} saved)")
            }
        }
    }
}

/// One registration, from name entry to the last saved sample.
pub struct RegistrationSession<'r> {
    registry: &'r Registry,
    settings: CaptureSettings,
    state: RegistrationState,
    identity: Option<Identity>,
    camera: Option<Box<dyn FrameSource>>,
    saved: Vec<PathBuf>,
}

impl<'r> RegistrationSession<'r> {
    pub fn new(registry: &'r Registry, settings: CaptureSettings) -> Self {
        Self {
            registry,
            settings: CaptureSettings {
                max_samples: settings.max_samples.max(1),
                ..settings
            },
            state: RegistrationState::Idle,
            identity: None,
            camera: None,
            saved: Vec::new(),
        }
    }

    pub fn state(&self) -> &RegistrationState {
        &self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Reference images written by this session.
    pub fn saved(&self) -> &[PathBuf] {
        &self.saved
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// `Idle → AwaitingName`.
    pub fn begin(&mut self) -> Result<(), SessionError> {
        self.expect_state("begin", |s| matches!(s, RegistrationState::Idle))?;
        self.state = RegistrationState::AwaitingName;
        Ok(())
    }

    /// Register `name` and open the camera.
    ///
    /// A blank name, a registry failure or an unavailable camera moves the
    /// session to `Aborted` and returns the error.
    pub fn submit_name(
        &mut self,
        name: &str,
        camera: &dyn CameraProvider,
    ) -> Result<&Identity, SessionError> {
        self.expect_state("submit a name", |s| {
            matches!(s, RegistrationState::AwaitingName)
        })?;

        let identity = match self.registry.register(name) {
            Ok(identity) => identity,
            Err(RegistryError::Invalid(e)) => {
                self.abort(StopReason::InvalidName);
                return Err(e.into());
            }
            Err(e) => {
                self.abort(StopReason::Failed(e.to_string()));
                return Err(e.into());
            }
        };

        let source = match camera.open() {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(error = %e, "could not open camera for registration");
                self.identity = Some(identity);
                self.abort(StopReason::CameraUnavailable(e.to_string()));
                return Err(e.into());
            }
        };

        tracing::info!(
            name = %identity.name,
            max_samples = self.settings.max_samples,
            "registration capturing"
        );
        self.camera = Some(source);
        self.state = RegistrationState::CapturingSamples { captured: 0 };
        Ok(self.identity.insert(identity))
    }

    /// Drive the capture loop until the session reaches a terminal state.
    ///
    /// Frame loss and operator quit end the session normally (see
    /// [`RegistrationSession::state`]); surface or storage failures abort it
    /// and are returned. Saved samples are kept either way.
    pub fn run(
        &mut self,
        locator: &mut dyn FaceLocator,
        surface: &mut dyn Surface,
    ) -> Result<&RegistrationState, SessionError> {
        self.expect_state("capture", |s| {
            matches!(s, RegistrationState::CapturingSamples { .. })
        })?;

        let result = self.capture_loop(locator, surface);
        if let Err(e) = &result {
            if !self.state.is_terminal() {
                self.abort(StopReason::Failed(e.to_string()));
            }
        }
        self.release_camera();

        tracing::info!(state = %self.state, saved = self.saved.len(), "registration finished");
        result.map(|()| &self.state)
    }

    fn capture_loop(
        &mut self,
        locator: &mut dyn FaceLocator,
        surface: &mut dyn Surface,
    ) -> Result<(), SessionError> {
        let Some(identity) = self.identity.clone() else {
            return Err(SessionError::InvalidTransition {
                action: "capture without an identity",
                state: self.state.clone(),
            });
        };
        let max = self.settings.max_samples;
        let mut last_save: Option<Instant> = None;

        while let RegistrationState::CapturingSamples { mut captured } = self.state {
            if captured >= max {
                self.state = RegistrationState::Done { captured };
                break;
            }

            let Some(camera) = self.camera.as_mut() else {
                self.abort(StopReason::CameraUnavailable("camera not open".into()));
                break;
            };
            let frame = match camera.acquire_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(error = %e, captured, "frame lost during registration");
                    self.abort(StopReason::FrameLost(e.to_string()));
                    break;
                }
            };

            let faces = locate_or_empty(locator, &frame);
            let mut overlays: Vec<Overlay> = faces.iter().cloned().map(Overlay::Face).collect();
            overlays.push(Overlay::Text {
                at: STATUS_ANCHOR,
                text: format!("Samples: {captured}/{max}"),
            });
            surface.render(&frame, &overlays)?;

            while let Some(event) = surface.poll_event()? {
                let OperatorEvent::Key(key) = event else {
                    continue;
                };
                match Command::from_key(key) {
                    Some(Command::Quit) => {
                        self.state = if captured == 0 {
                            RegistrationState::Aborted {
                                captured,
                                reason: StopReason::OperatorQuit,
                            }
                        } else {
                            RegistrationState::Done { captured }
                        };
                        break;
                    }
                    Some(Command::Capture) => {
                        if faces.is_empty() {
                            tracing::debug!(seq = frame.sequence, "capture ignored: no face in frame");
                            continue;
                        }
                        if last_save.is_some_and(|t| t.elapsed() < self.settings.cooldown) {
                            tracing::debug!("capture ignored: cooling down");
                            continue;
                        }

                        let path = self.registry.save_reference(&identity, &frame)?;
                        self.saved.push(path);
                        last_save = Some(Instant::now());
                        captured += 1;
                        tracing::info!(captured, max, "saved sample");

                        if captured >= max {
                            self.state = RegistrationState::Done { captured };
                            break;
                        }
                        self.state = RegistrationState::CapturingSamples { captured };
                    }
                    None => {}
                }
            }
        }

        Ok(())
    }

    fn abort(&mut self, reason: StopReason) {
        self.state = RegistrationState::Aborted {
            captured: self.state.captured(),
            reason,
        };
        self.release_camera();
    }

    fn release_camera(&mut self) {
        if self.camera.take().is_some() {
            tracing::debug!("camera released");
        }
    }

    fn expect_state(
        &self,
        action: &'static str,
        ok: impl Fn(&RegistrationState) -> bool,
    ) -> Result<(), SessionError> {
        if ok(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                action,
                state: self.state.clone(),
            })
        }
    }
}
