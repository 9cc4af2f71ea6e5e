//! The interactive menu loop.
//!
//! Errors from a single action are printed and the menu comes back; only
//! "Exit" or end of input leaves the loop.

use crate::config::Config;
use crate::devices::{Devices, NoFaces};
use crate::menu::{MenuChoice, MENU};
use anyhow::{Context as _, Result};
use rollcall_core::registry::normalize_key;
use rollcall_core::session::{self, RegistrationSession, RegistrationState};
use rollcall_core::{FaceLocator, Ledger, Registry, Roster};
use std::io::{BufRead, Write};

const REGISTER_HINT: &str = "SPACE capture | q quit";
const LIVE_HINT: &str = "Click a name to mark attendance | q quit";

/// Stores shared by every action, opened once at startup.
pub struct Context {
    pub config: Config,
    pub registry: Registry,
    pub ledger: Ledger,
}

impl Context {
    /// Create the face-data root and the ledger (with header) if missing.
    pub fn open(config: Config) -> Result<Self> {
        let registry = Registry::new(&config.face_data_dir);
        registry
            .initialize()
            .context("initializing face data directory")?;
        let ledger = Ledger::new(&config.ledger_path);
        ledger.initialize().context("initializing attendance ledger")?;

        tracing::info!(
            face_data = %config.face_data_dir.display(),
            ledger = %config.ledger_path.display(),
            "stores ready"
        );
        Ok(Self {
            config,
            registry,
            ledger,
        })
    }
}

pub struct ControlLoop<'c, D, R, W> {
    ctx: &'c Context,
    devices: D,
    // Loaded on first use and kept for later sessions.
    locator: Option<Box<dyn FaceLocator>>,
    input: R,
    output: W,
}

impl<'c, D: Devices, R: BufRead, W: Write> ControlLoop<'c, D, R, W> {
    pub fn new(ctx: &'c Context, devices: D, input: R, output: W) -> Self {
        Self {
            ctx,
            devices,
            locator: None,
            input,
            output,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        loop {
            write!(self.output, "{MENU}")?;
            let Some(line) = self.prompt("Enter your choice (1-5): ")? else {
                writeln!(self.output)?;
                break;
            };

            let choice = match MenuChoice::parse(&line) {
                Ok(choice) => choice,
                Err(e) => {
                    tracing::debug!(error = %e, "rejected menu input");
                    writeln!(self.output, "Invalid choice. Please try again.")?;
                    continue;
                }
            };

            let result = match choice {
                MenuChoice::Register => self.register(),
                MenuChoice::MarkManual => self.mark_manual(),
                MenuChoice::MarkLive => self.mark_live(),
                MenuChoice::View => self.view(),
                MenuChoice::Exit => break,
            };
            if let Err(e) = result {
                tracing::warn!(action = %choice, error = %format!("{e:#}"), "action failed");
                writeln!(self.output, "Error: {e:#}")?;
            }
        }

        writeln!(self.output, "Exiting...")?;
        Ok(())
    }

    /// Print `text` and read one line. `None` at end of input.
    fn prompt(&mut self, text: &str) -> Result<Option<String>> {
        write!(self.output, "{text}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn ensure_locator(&mut self) -> Result<()> {
        if self.locator.is_none() {
            self.locator = Some(self.devices.load_locator()?);
        }
        Ok(())
    }

    fn register(&mut self) -> Result<()> {
        let ctx = self.ctx;
        let Some(name) = self.prompt("Enter person's name: ")? else {
            return Ok(());
        };

        // Report a bad name before anything else can fail.
        normalize_key(&name)?;

        let mut session = RegistrationSession::new(&ctx.registry, ctx.config.capture_settings());
        session.begin()?;

        // Without a detector the capture guard can never pass.
        self.ensure_locator()?;

        let identity = session.submit_name(&name, self.devices.camera())?.clone();
        writeln!(
            self.output,
            "Capturing {} image(s) for {}...",
            session.settings().max_samples,
            identity.name
        )?;

        let mut surface = self.devices.open_surface(REGISTER_HINT)?;
        let locator = self
            .locator
            .as_deref_mut()
            .context("face detector not loaded")?;
        let result = session.run(locator, surface.as_mut()).cloned();
        drop(surface);

        match result? {
            RegistrationState::Done { captured } => writeln!(
                self.output,
                "Registration complete for {}: {captured} image(s) saved in {}",
                identity.name,
                identity.dir.display()
            )?,
            RegistrationState::Aborted { captured, reason } => writeln!(
                self.output,
                "Registration of {} stopped ({reason}); {captured} image(s) saved",
                identity.name
            )?,
            other => tracing::warn!(state = %other, "registration ended in a non-terminal state"),
        }
        Ok(())
    }

    fn mark_manual(&mut self) -> Result<()> {
        let ctx = self.ctx;
        let names = ctx.registry.list()?;
        if names.is_empty() {
            writeln!(self.output, "No people registered in the system.")?;
            return Ok(());
        }

        writeln!(self.output, "\nRegistered People:")?;
        for (i, name) in names.iter().enumerate() {
            writeln!(self.output, "{}. {name}", i + 1)?;
        }
        let Some(input) = self.prompt("Enter number of person to mark attendance: ")? else {
            return Ok(());
        };

        let outcome = session::mark_manual(&ctx.ledger, &names, &input)?;
        writeln!(self.output, "{outcome}")?;
        Ok(())
    }

    fn mark_live(&mut self) -> Result<()> {
        let ctx = self.ctx;
        let names = ctx.registry.list()?;
        if names.is_empty() {
            writeln!(self.output, "No people registered in the system.")?;
            return Ok(());
        }
        let roster = Roster::new(names, ctx.config.roster);

        // Faces are only drawn for feedback here, so carry on without them.
        if let Err(e) = self.ensure_locator() {
            tracing::warn!(error = %format!("{e:#}"), "face detector unavailable");
            writeln!(
                self.output,
                "Face detection unavailable ({e:#}); continuing without face boxes."
            )?;
        }
        let mut fallback = NoFaces;
        let locator: &mut dyn FaceLocator = match self.locator.as_deref_mut() {
            Some(locator) => locator,
            None => &mut fallback,
        };

        let mut surface = self.devices.open_surface(LIVE_HINT)?;
        let result = session::run_live(
            &ctx.ledger,
            &roster,
            self.devices.camera(),
            locator,
            surface.as_mut(),
        );
        drop(surface);

        let outcome = result?;
        for mark in &outcome.marks {
            writeln!(self.output, "{mark}")?;
        }
        writeln!(
            self.output,
            "Camera attendance ended ({}): {} marked",
            outcome.stop,
            outcome.marked_count()
        )?;
        Ok(())
    }

    fn view(&mut self) -> Result<()> {
        let view = self.ctx.ledger.view()?;
        let Some(header) = &view.header else {
            writeln!(self.output, "No attendance records found.")?;
            return Ok(());
        };

        writeln!(self.output, "\n----- Attendance Records -----")?;
        writeln!(self.output, "{}", header.join(" | "))?;
        for record in &view.records {
            writeln!(
                self.output,
                "{} | {} | {}",
                record.name,
                record.date_string(),
                record.time_string()
            )?;
        }
        if !view.malformed.is_empty() {
            writeln!(
                self.output,
                "({} malformed row(s) skipped)",
                view.malformed.len()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use rollcall_core::{
        BoundingBox, CameraProvider, CaptureError, DetectError, Frame, FrameSource,
        OperatorEvent, Overlay, Point, Surface, SurfaceError,
    };
    use std::collections::VecDeque;
    use std::path::Path;

    struct LoopSource;

    impl FrameSource for LoopSource {
        fn acquire_frame(&mut self) -> Result<Frame, CaptureError> {
            Ok(Frame::filled(320, 240, 128))
        }
    }

    struct StaticCamera;

    impl CameraProvider for StaticCamera {
        fn open(&self) -> Result<Box<dyn FrameSource>, CaptureError> {
            Ok(Box::new(LoopSource))
        }
    }

    struct OneFace;

    impl FaceLocator for OneFace {
        fn locate(&mut self, _frame: &Frame) -> Result<Vec<BoundingBox>, DetectError> {
            Ok(vec![BoundingBox {
                x: 120.0,
                y: 60.0,
                width: 80.0,
                height: 100.0,
                confidence: 0.9,
            }])
        }
    }

    /// One batch of events per render; quits once the script runs out.
    struct Scripted {
        batches: VecDeque<Vec<OperatorEvent>>,
        pending: VecDeque<OperatorEvent>,
    }

    impl Surface for Scripted {
        fn render(&mut self, _frame: &Frame, _overlays: &[Overlay]) -> Result<(), SurfaceError> {
            let batch = self
                .batches
                .pop_front()
                .unwrap_or_else(|| vec![OperatorEvent::Key('q')]);
            self.pending.extend(batch);
            Ok(())
        }

        fn poll_event(&mut self) -> Result<Option<OperatorEvent>, SurfaceError> {
            Ok(self.pending.pop_front())
        }
    }

    struct FakeDevices {
        camera: StaticCamera,
        detector: bool,
        script: Vec<Vec<Vec<OperatorEvent>>>,
    }

    impl FakeDevices {
        fn new(detector: bool, script: Vec<Vec<Vec<OperatorEvent>>>) -> Self {
            Self {
                camera: StaticCamera,
                detector,
                script,
            }
        }
    }

    impl Devices for FakeDevices {
        fn camera(&self) -> &dyn CameraProvider {
            &self.camera
        }

        fn load_locator(&mut self) -> Result<Box<dyn FaceLocator>> {
            if !self.detector {
                bail!("model file not found");
            }
            Ok(Box::new(OneFace))
        }

        fn open_surface(&mut self, _hint: &str) -> Result<Box<dyn Surface>, SurfaceError> {
            let batches = if self.script.is_empty() {
                Vec::new()
            } else {
                self.script.remove(0)
            };
            Ok(Box::new(Scripted {
                batches: batches.into(),
                pending: VecDeque::new(),
            }))
        }
    }

    fn context(dir: &Path) -> Context {
        let mut config = Config::load_with(None, |_| None).unwrap();
        config.face_data_dir = dir.join("FaceData");
        config.ledger_path = dir.join("Attendance.csv");
        config.capture_cooldown_ms = 0;
        Context::open(config).unwrap()
    }

    fn drive(ctx: &Context, devices: FakeDevices, input: &str) -> String {
        let mut output = Vec::new();
        ControlLoop::new(ctx, devices, input.as_bytes(), &mut output)
            .run()
            .unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_view_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let out = drive(&ctx, FakeDevices::new(true, vec![]), "4\n5\n");
        assert!(out.contains("----- Attendance Records -----\nName | Date | Time\n\n====="));
        assert!(!out.contains("No attendance records found."));
        assert!(out.ends_with("Exiting...\n"));
    }

    #[test]
    fn test_view_missing_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        std::fs::remove_file(ctx.ledger.path()).unwrap();

        let out = drive(&ctx, FakeDevices::new(true, vec![]), "4\n5\n");
        assert!(out.contains("No attendance records found."));
        assert!(!out.contains("Name | Date | Time"));
    }

    #[test]
    fn test_invalid_choice_and_end_of_input() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let out = drive(&ctx, FakeDevices::new(true, vec![]), "9\n");
        assert!(out.contains("Invalid choice. Please try again."));
        assert!(out.ends_with("Exiting...\n"));
    }

    #[test]
    fn test_manual_mark_then_view() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        ctx.registry.register("Alice").unwrap();
        ctx.registry.register("Bob Smith").unwrap();

        let out = drive(&ctx, FakeDevices::new(true, vec![]), "2\n2\n2\n2\n4\n5\n");
        assert!(out.contains("1. Alice\n2. Bob Smith\n"));
        assert!(out.contains("Marked attendance for Bob Smith at "));
        assert!(out.contains("Bob Smith is already marked for "));
        assert!(out.contains("Name | Date | Time\nBob Smith | "));

        assert_eq!(ctx.ledger.view().unwrap().records.len(), 1);
    }

    #[test]
    fn test_manual_bad_selection_keeps_menu_running() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        ctx.registry.register("Alice").unwrap();

        let out = drive(&ctx, FakeDevices::new(true, vec![]), "2\nabc\n2\n7\n4\n5\n");
        assert_eq!(out.matches("Error: ").count(), 2);
        assert!(out.contains("Name | Date | Time\n\n====="));
        assert!(ctx.ledger.view().unwrap().records.is_empty());
    }

    #[test]
    fn test_manual_with_nobody_registered() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let out = drive(&ctx, FakeDevices::new(true, vec![]), "2\n3\n5\n");
        assert_eq!(out.matches("No people registered in the system.").count(), 2);
    }

    #[test]
    fn test_register_captures_a_sample() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let script = vec![vec![vec![OperatorEvent::Key(' ')]]];

        let out = drive(&ctx, FakeDevices::new(true, script), "1\nBob Smith\n5\n");
        assert!(out.contains("Registration complete for Bob Smith: 1 image(s) saved"));
        assert!(dir.path().join("FaceData/Bob_Smith/face_0.jpg").exists());
        assert_eq!(ctx.registry.list().unwrap(), vec!["Bob Smith"]);
    }

    #[test]
    fn test_register_blank_name_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let out = drive(&ctx, FakeDevices::new(true, vec![]), "1\n   \n5\n");
        assert!(out.contains("Error: name cannot be empty"));
        assert!(ctx.registry.list().unwrap().is_empty());
    }

    #[test]
    fn test_register_blank_name_wins_over_missing_detector() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let out = drive(&ctx, FakeDevices::new(false, vec![]), "1\n\n5\n");
        assert!(out.contains("Error: name cannot be empty"));
        assert!(!out.contains("model file not found"));
    }

    #[test]
    fn test_register_needs_detector() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let out = drive(&ctx, FakeDevices::new(false, vec![]), "1\nAlice\n5\n");
        assert!(out.contains("Error: model file not found"));
        assert!(ctx.registry.list().unwrap().is_empty());
    }

    #[test]
    fn test_live_click_marks_attendance() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        ctx.registry.register("Alice").unwrap();
        ctx.registry.register("Bob").unwrap();

        // Bob's button spans y 50..80.
        let script = vec![vec![
            vec![OperatorEvent::Click(Point::new(50, 60))],
            vec![OperatorEvent::Click(Point::new(50, 60))],
        ]];
        let out = drive(&ctx, FakeDevices::new(false, script), "3\n5\n");

        assert!(out.contains("Face detection unavailable"));
        assert!(out.contains("Marked attendance for Bob at "));
        assert!(out.contains("Bob is already marked for "));
        assert!(out.contains("Camera attendance ended (operator quit): 1 marked"));

        let records = ctx.ledger.view().unwrap().records;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Bob");
    }
}
