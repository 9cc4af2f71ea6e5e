//! rollcall-core — Attendance ledger and person registry.
//!
//! Holds the per-day deduplicating ledger, the on-disk identity directory,
//! the clickable roster layout and the registration/attendance sessions.
//! Cameras, face detection and the operator's screen are consumed through
//! the traits in [`capture`].

pub mod capture;
pub mod clock;
pub mod error;
pub mod ledger;
pub mod registry;
pub mod roster;
pub mod session;
pub mod types;

pub use capture::{
    CameraProvider, CaptureError, Command, DetectError, FaceLocator, FrameSource, OperatorEvent,
    Overlay, Surface, SurfaceError,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::ValidationError;
pub use ledger::{Ledger, LedgerError, LedgerView, MalformedRow, MarkOutcome};
pub use registry::{Identity, Registry, RegistryError};
pub use roster::{Roster, RosterLayout};
pub use session::{SessionError, StopReason};
pub use types::{AttendanceRecord, BoundingBox, Frame, Point, Rect};
