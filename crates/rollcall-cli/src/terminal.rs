//! Camera preview drawn in the terminal with half-block cells.
//!
//! Each character cell shows two vertically stacked pixels: `▀` painted
//! with the upper pixel as foreground and the lower as background. Mouse
//! clicks are mapped back into frame coordinates through the same
//! [`Viewport`] used for drawing.

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{
    self, disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{cursor, execute, queue};
use rollcall_core::{Frame, OperatorEvent, Overlay, Point, Rect, Surface, SurfaceError};
use std::io::{self, Stdout, Write};
use std::time::Duration;

type Rgb = (u8, u8, u8);

const FACE_COLOR: Rgb = (255, 0, 0);
const BUTTON_COLOR: Rgb = (0, 160, 0);
const LABEL_COLOR: Rgb = (255, 255, 255);
const TEXT_COLOR: Rgb = (0, 255, 0);

/// Uniform scale from frame pixels to half-block pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Frame pixels per half-block pixel, same on both axes.
    pub scale: f32,
    pub cols: u16,
    pub rows: u16,
    frame_width: u32,
    frame_height: u32,
}

impl Viewport {
    /// Fit a `frame_width × frame_height` frame into `cols × rows` cells,
    /// keeping the aspect ratio.
    pub fn fit(frame_width: u32, frame_height: u32, cols: u16, rows: u16) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        let sx = frame_width.max(1) as f32 / cols as f32;
        let sy = frame_height.max(1) as f32 / (rows as f32 * 2.0);
        let scale = sx.max(sy);

        let used_cols = ((frame_width as f32 / scale).ceil() as u16).clamp(1, cols);
        let used_rows = ((frame_height as f32 / (scale * 2.0)).ceil() as u16).clamp(1, rows);

        Self {
            scale,
            cols: used_cols,
            rows: used_rows,
            frame_width,
            frame_height,
        }
    }

    /// Frame coordinates at the centre of a terminal cell, or `None` when
    /// the cell lies outside the drawn frame.
    pub fn cell_to_frame(&self, col: u16, row: u16) -> Option<Point> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        let x = ((col as f32 + 0.5) * self.scale) as u32;
        let y = ((row as f32 * 2.0 + 1.0) * self.scale) as u32;
        (x < self.frame_width && y < self.frame_height).then(|| Point::new(x, y))
    }

    fn to_cell_pixel(&self, x: u32, y: u32) -> (usize, usize) {
        (
            (x as f32 / self.scale) as usize,
            (y as f32 / self.scale) as usize,
        )
    }
}

/// A rendered picture: half-block pixels plus text laid over cells.
#[derive(Debug, Clone)]
pub struct Canvas {
    pub cols: usize,
    pub rows: usize,
    pixels: Vec<Rgb>,
    glyphs: Vec<Option<(char, Rgb)>>,
}

impl Canvas {
    /// Sample `frame` through `viewport` and draw `overlays` on top.
    pub fn rasterize(frame: &Frame, overlays: &[Overlay], viewport: &Viewport) -> Self {
        let cols = viewport.cols as usize;
        let rows = viewport.rows as usize;
        let mut canvas = Self {
            cols,
            rows,
            pixels: vec![(0, 0, 0); cols * rows * 2],
            glyphs: vec![None; cols * rows],
        };

        for py in 0..rows * 2 {
            for px in 0..cols {
                let fx = ((px as f32 + 0.5) * viewport.scale) as u32;
                let fy = ((py as f32 + 0.5) * viewport.scale) as u32;
                if let Some(g) = frame.pixel(fx, fy) {
                    canvas.pixels[py * cols + px] = (g, g, g);
                }
            }
        }

        for overlay in overlays {
            match overlay {
                Overlay::Face(bbox) => {
                    let rect = bbox.to_rect(frame.width, frame.height);
                    canvas.outline(viewport, rect, FACE_COLOR);
                }
                Overlay::Button { rect, label } => {
                    canvas.fill(viewport, *rect, BUTTON_COLOR);
                    // Label sits inside the button, near its top-left corner.
                    let at = Point::new(rect.x + 5, rect.y + rect.height / 2);
                    canvas.text(viewport, at, label, LABEL_COLOR);
                }
                Overlay::Text { at, text } => canvas.text(viewport, *at, text, TEXT_COLOR),
            }
        }
        canvas
    }

    #[cfg(test)]
    fn pixel(&self, px: usize, py: usize) -> Option<Rgb> {
        (px < self.cols && py < self.rows * 2).then(|| self.pixels[py * self.cols + px])
    }

    #[cfg(test)]
    fn glyph(&self, col: usize, row: usize) -> Option<char> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.glyphs[row * self.cols + col].map(|(c, _)| c)
    }

    fn set(&mut self, px: usize, py: usize, color: Rgb) {
        if px < self.cols && py < self.rows * 2 {
            self.pixels[py * self.cols + px] = color;
        }
    }

    fn fill(&mut self, viewport: &Viewport, rect: Rect, color: Rgb) {
        let (x0, y0) = viewport.to_cell_pixel(rect.x, rect.y);
        let (x1, y1) = viewport.to_cell_pixel(rect.x + rect.width, rect.y + rect.height);
        for py in y0..=y1 {
            for px in x0..=x1 {
                self.set(px, py, color);
            }
        }
    }

    fn outline(&mut self, viewport: &Viewport, rect: Rect, color: Rgb) {
        let (x0, y0) = viewport.to_cell_pixel(rect.x, rect.y);
        let (x1, y1) = viewport.to_cell_pixel(rect.x + rect.width, rect.y + rect.height);
        for px in x0..=x1 {
            self.set(px, y0, color);
            self.set(px, y1, color);
        }
        for py in y0..=y1 {
            self.set(x0, py, color);
            self.set(x1, py, color);
        }
    }

    fn text(&mut self, viewport: &Viewport, at: Point, text: &str, color: Rgb) {
        let (px, py) = viewport.to_cell_pixel(at.x, at.y);
        let row = py / 2;
        if row >= self.rows {
            return;
        }
        for (i, c) in text.chars().enumerate() {
            let col = px + i;
            if col >= self.cols {
                break;
            }
            self.glyphs[row * self.cols + col] = Some((c, color));
        }
    }
}

/// The operator's terminal, switched into an alternate screen with mouse
/// capture for the lifetime of one session. Dropping it restores the
/// terminal.
pub struct TerminalSurface {
    out: Stdout,
    hint: String,
    viewport: Option<Viewport>,
}

impl TerminalSurface {
    /// Take over the terminal. `hint` is shown on the bottom line.
    pub fn enter(hint: &str) -> io::Result<Self> {
        enable_raw_mode()?;

        let mut out = io::stdout();
        if let Err(err) = execute!(out, EnterAlternateScreen, EnableMouseCapture, cursor::Hide) {
            let _ = disable_raw_mode();
            return Err(err);
        }

        tracing::debug!("terminal surface entered");
        Ok(Self {
            out,
            hint: hint.to_string(),
            viewport: None,
        })
    }

    fn draw(&mut self, canvas: &Canvas, hint_row: u16) -> io::Result<()> {
        queue!(self.out, cursor::MoveTo(0, 0))?;
        for row in 0..canvas.rows {
            queue!(self.out, cursor::MoveTo(0, row as u16))?;
            for col in 0..canvas.cols {
                let (top, bottom) = (
                    canvas.pixels[row * 2 * canvas.cols + col],
                    canvas.pixels[(row * 2 + 1) * canvas.cols + col],
                );
                match canvas.glyphs[row * canvas.cols + col] {
                    Some((c, fg)) => queue!(
                        self.out,
                        SetForegroundColor(rgb(fg)),
                        SetBackgroundColor(rgb(bottom)),
                        Print(c)
                    )?,
                    None => queue!(
                        self.out,
                        SetForegroundColor(rgb(top)),
                        SetBackgroundColor(rgb(bottom)),
                        Print('▀')
                    )?,
                }
            }
        }
        queue!(
            self.out,
            ResetColor,
            cursor::MoveTo(0, hint_row),
            terminal::Clear(terminal::ClearType::CurrentLine),
            Print(&self.hint)
        )?;
        self.out.flush()
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        let _ = execute!(
            self.out,
            ResetColor,
            cursor::Show,
            DisableMouseCapture,
            LeaveAlternateScreen
        );
        let _ = disable_raw_mode();
        tracing::debug!("terminal surface restored");
    }
}

impl Surface for TerminalSurface {
    fn render(&mut self, frame: &Frame, overlays: &[Overlay]) -> Result<(), SurfaceError> {
        let (cols, rows) = terminal::size()?;
        // Last line is reserved for the hint.
        let viewport = Viewport::fit(frame.width, frame.height, cols, rows.saturating_sub(1));
        if self.viewport.is_some_and(|v| v != viewport) {
            execute!(self.out, terminal::Clear(terminal::ClearType::All))?;
        }
        self.viewport = Some(viewport);

        let canvas = Canvas::rasterize(frame, overlays, &viewport);
        self.draw(&canvas, rows.saturating_sub(1))?;
        Ok(())
    }

    fn poll_event(&mut self) -> Result<Option<OperatorEvent>, SurfaceError> {
        while event::poll(Duration::ZERO)? {
            if let Some(ev) = translate(event::read()?, self.viewport.as_ref()) {
                return Ok(Some(ev));
            }
        }
        Ok(None)
    }
}

/// Map a terminal event to operator input. Esc and Ctrl-C quit.
fn translate(ev: Event, viewport: Option<&Viewport>) -> Option<OperatorEvent> {
    match ev {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        }) => match code {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                Some(OperatorEvent::Key('q'))
            }
            KeyCode::Esc => Some(OperatorEvent::Key('q')),
            KeyCode::Char(c) => Some(OperatorEvent::Key(c)),
            _ => None,
        },
        Event::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            ..
        }) => viewport?
            .cell_to_frame(column, row)
            .map(OperatorEvent::Click),
        _ => None,
    }
}

fn rgb((r, g, b): Rgb) -> Color {
    Color::Rgb { r, g, b }
}
