//! Attendance sessions: pick a name from a numbered list, or click it on
//! the live feed. Both routes end in [`Ledger::mark`].

use super::{SessionError, StopReason};
use crate::capture::{
    locate_or_empty, CameraProvider, Command, FaceLocator, OperatorEvent, Overlay, Surface,
};
use crate::clock::Clock;
use crate::error::ValidationError;
use crate::ledger::{Ledger, MarkOutcome};
use crate::roster::Roster;
use crate::types::Point;

const INSTRUCTIONS: &str = "Click on name to mark attendance";
/// Distance of the instruction line from the bottom of the frame.
const INSTRUCTIONS_MARGIN: u32 = 30;

/// Resolve a 1-based menu selection against `names`.
pub fn select_entry<'a>(names: &'a [String], input: &str) -> Result<&'a str, ValidationError> {
    let trimmed = input.trim();
    let selection: i64 = trimmed
        .parse()
        .map_err(|_| ValidationError::NotANumber(trimmed.to_string()))?;

    if selection < 1 || selection as usize > names.len() {
        return Err(ValidationError::OutOfRange {
            selection,
            len: names.len(),
        });
    }
    Ok(&names[selection as usize - 1])
}

/// Mark the person chosen by `input` from the numbered list `names`.
///
/// Invalid input is rejected before the ledger is touched.
pub fn mark_manual<C: Clock>(
    ledger: &Ledger<C>,
    names: &[String],
    input: &str,
) -> Result<MarkOutcome, SessionError> {
    if names.is_empty() {
        return Err(SessionError::NoIdentities);
    }
    let name = select_entry(names, input)?;
    Ok(ledger.mark(name)?)
}

/// How a live session went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveOutcome {
    /// Every mark attempt, in click order.
    pub marks: Vec<MarkOutcome>,
    pub stop: StopReason,
    pub frames: u64,
}

impl LiveOutcome {
    pub fn marked_count(&self) -> usize {
        self.marks.iter().filter(|m| m.is_marked()).count()
    }
}

/// Show the roster over the live feed and mark whoever the operator clicks.
///
/// Detected faces are drawn for feedback only; the clicked button alone
/// decides whose row is written. Runs until the operator quits or a frame
/// cannot be grabbed. The camera is dropped before returning, on every path.
pub fn run_live<C: Clock>(
    ledger: &Ledger<C>,
    roster: &Roster,
    camera: &dyn CameraProvider,
    locator: &mut dyn FaceLocator,
    surface: &mut dyn Surface,
) -> Result<LiveOutcome, SessionError> {
    if roster.is_empty() {
        return Err(SessionError::NoIdentities);
    }

    let mut source = camera.open()?;
    tracing::info!(entries = roster.len(), "live attendance started");

    let buttons = roster.overlays();
    let mut marks = Vec::new();
    let mut status: Option<String> = None;
    let mut frames = 0u64;

    let stop = 'session: loop {
        let frame = match source.acquire_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, frames, "frame lost during live attendance");
                break StopReason::FrameLost(e.to_string());
            }
        };
        frames += 1;

        let mut overlays = buttons.clone();
        overlays.extend(locate_or_empty(locator, &frame).into_iter().map(Overlay::Face));
        overlays.push(Overlay::Text {
            at: Point::new(10, frame.height.saturating_sub(INSTRUCTIONS_MARGIN)),
            text: INSTRUCTIONS.to_string(),
        });
        if let Some(text) = &status {
            overlays.push(Overlay::Text {
                at: Point::new(10, frame.height.saturating_sub(INSTRUCTIONS_MARGIN / 2)),
                text: text.clone(),
            });
        }
        surface.render(&frame, &overlays)?;

        while let Some(event) = surface.poll_event()? {
            match event {
                OperatorEvent::Key(key) => {
                    if Command::from_key(key) == Some(Command::Quit) {
                        break 'session StopReason::OperatorQuit;
                    }
                }
                OperatorEvent::Click(point) => {
                    let Some(name) = roster.select(point) else {
                        tracing::debug!(x = point.x, y = point.y, "click missed the roster");
                        continue;
                    };
                    let outcome = ledger.mark(name)?;
                    status = Some(outcome.to_string());
                    marks.push(outcome);
                }
            }
        }
    };

    drop(source);
    tracing::info!(%stop, frames, marks = marks.len(), "live attendance ended; camera released");

    Ok(LiveOutcome {
        marks,
        stop,
        frames,
    })
}
