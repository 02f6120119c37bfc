use std::fmt;
use std::path::PathBuf;

/// Screen-coordinate point (primary monitor, physical pixels)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One accepted template match, in frame coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub center_x: i32,
    pub center_y: i32,
    pub width: u32,
    pub height: u32,
    pub score: f64,
}

impl Match {
    pub fn center(&self) -> Point {
        Point::new(self.center_x, self.center_y)
    }
}

/// Keys the dispatcher needs beyond plain text entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Alt,
    Shift,
    Backspace,
}

/// Named reference image slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Target,
    Button,
    Approved,
    Stop,
}

impl Slot {
    pub const ALL: [Slot; 4] = [Slot::Target, Slot::Button, Slot::Approved, Slot::Stop];

    pub fn file_name(self) -> &'static str {
        match self {
            Slot::Target => "keep.png",
            Slot::Button => "btn.png",
            Slot::Approved => "approved.png",
            Slot::Stop => "stop.png",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Slot::Target => "target",
            Slot::Button => "button",
            Slot::Approved => "approved",
            Slot::Stop => "stop",
        }
    }

    pub fn is_required(self) -> bool {
        matches!(self, Slot::Target | Slot::Button)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Presence report for one reference image slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotInfo {
    pub slot: Slot,
    pub path: PathBuf,
    /// `None` when the file is absent or cannot be decoded
    pub size: Option<(u32, u32)>,
}

/// What one scan cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Stopped,
    Acted,
    NoAction,
}

/// Lifecycle of one scan loop instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopped,
    /// Reference images could not be loaded; no cycle ever ran
    Failed,
}

/// Update from the scan loop to the presentation
#[derive(Debug, Clone)]
pub enum LoopEvent {
    State(LoopState),
    Status(String),
    Templates(Vec<SlotInfo>),
}
