//! Clickable roster drawn over the live feed.
//!
//! Entries are stacked top to bottom: entry `i` spans
//! `offset_i ..= offset_i + button_height` vertically, where
//! `offset_i = spacing + i * (button_height + spacing)`, and
//! `left ..= right` horizontally.

use crate::capture::Overlay;
use crate::types::{Point, Rect};
use serde::Deserialize;

/// Geometry of the roster buttons, in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RosterLayout {
    pub left: u32,
    pub right: u32,
    pub button_height: u32,
    pub spacing: u32,
}

impl Default for RosterLayout {
    fn default() -> Self {
        Self {
            left: 10,
            right: 200,
            button_height: 30,
            spacing: 10,
        }
    }
}

impl RosterLayout {
    /// Top edge of entry `index`.
    pub fn offset(&self, index: usize) -> u32 {
        self.spacing + index as u32 * (self.button_height + self.spacing)
    }

    /// Clickable band of entry `index`.
    pub fn band(&self, index: usize) -> Rect {
        Rect {
            x: self.left,
            y: self.offset(index),
            width: self.right.saturating_sub(self.left),
            height: self.button_height,
        }
    }

    /// Index of the entry under `point`, among `len` entries.
    pub fn hit_test(&self, len: usize, point: Point) -> Option<usize> {
        if point.x < self.left || point.x > self.right {
            return None;
        }
        (0..len).find(|&i| self.band(i).contains(point))
    }
}

/// Snapshot of registered names laid out as buttons.
///
/// Taken once when a live session starts; the session keeps using it even if
/// the registry changes underneath.
#[derive(Debug, Clone)]
pub struct Roster {
    names: Vec<String>,
    layout: RosterLayout,
}

impl Roster {
    pub fn new(names: Vec<String>, layout: RosterLayout) -> Self {
        Self { names, layout }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn layout(&self) -> &RosterLayout {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name under `point`, if any.
    pub fn select(&self, point: Point) -> Option<&str> {
        self.layout
            .hit_test(self.names.len(), point)
            .map(|i| self.names[i].as_str())
    }

    /// One button overlay per entry.
    pub fn overlays(&self) -> Vec<Overlay> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| Overlay::Button {
                rect: self.layout.band(i),
                label: name.clone(),
            })
            .collect()
    }
}
