//! Interactive sessions: registration and attendance.

pub mod attendance;
pub mod registration;

use crate::capture::{CaptureError, SurfaceError};
use crate::error::ValidationError;
use crate::ledger::LedgerError;
use crate::registry::RegistryError;
use std::fmt;
use thiserror::Error;

pub use attendance::{mark_manual, run_live, select_entry, LiveOutcome};
pub use registration::{CaptureSettings, RegistrationSession, RegistrationState};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error("no people registered in the system")]
    NoIdentities,
    #[error("cannot {action} while registration is {state}")]
    InvalidTransition {
        action: &'static str,
        state: RegistrationState,
    },
}

/// Why a session ended early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    OperatorQuit,
    InvalidName,
    CameraUnavailable(String),
    FrameLost(String),
    Failed(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::OperatorQuit => write!(f, "operator quit"),
            StopReason::InvalidName => write!(f, "invalid name"),
            StopReason::CameraUnavailable(e) => write!(f, "camera unavailable: {e}"),
            StopReason::FrameLost(e) => write!(f, "failed to grab frame: {e}"),
            StopReason::Failed(e) => write!(f, "{e}"),
        }
    }
}
