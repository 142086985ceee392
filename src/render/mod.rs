//! Render surface abstraction.
//!
//! The board only ever talks to a [`Surface`]: an ordered composition of
//! positioned elements that can be added, removed, cropped and brought to the
//! front. [`Composition`] is the in-memory implementation used headless and
//! in tests.

mod composition;

pub use composition::Composition;

use serde::Deserialize;

use crate::error::SurfaceError;
use crate::events::OutageKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub(crate) u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PixelMode {
    #[default]
    Mono,
    Greyscale,
    Rgb,
}

/// Content of the time column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeGlyph {
    Text(String),
    Vehicle,
    VehicleBlink { visible: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    /// Two stacked lines sliding up: the outgoing service above the incoming one.
    Banner { outgoing: String, incoming: String },
    /// Blank strip hiding the lower half of a banner.
    Cover,
    Destination { text: String, via: String },
    ServiceNumber(String),
    Time(TimeGlyph),
    NoServices,
    Outage {
        kind: OutageKind,
        detail: Option<String>,
    },
    Splash { title: String, subtitle: String },
    Clock(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub kind: ElementKind,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Crop offset into the element's own content.
    pub offset: (i32, i32),
}

impl Element {
    pub fn new(kind: ElementKind, x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            kind,
            x,
            y,
            width,
            height,
            offset: (0, 0),
        }
    }
}

pub trait Surface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn mode(&self) -> PixelMode;
    /// Rendered width of `text` in pixels.
    fn text_width(&self, text: &str) -> u32;
    fn add(&mut self, element: Element) -> ElementId;
    fn remove(&mut self, id: ElementId) -> Result<(), SurfaceError>;
    fn replace(&mut self, id: ElementId, kind: ElementKind) -> Result<(), SurfaceError>;
    fn set_offset(&mut self, id: ElementId, x: i32, y: i32) -> Result<(), SurfaceError>;
    /// Re-composite the element on top of everything else.
    fn refresh(&mut self, id: ElementId) -> Result<(), SurfaceError>;
}

/// Panel-level controls used by the energy saver.
pub trait PanelControl {
    fn set_contrast(&mut self, level: u8);
    fn show(&mut self);
    fn hide(&mut self);
}

/// Remove an element, tolerating one that is already gone.
pub fn remove_quietly<S: Surface + ?Sized>(surface: &mut S, id: Option<ElementId>) {
    if let Some(id) = id {
        if let Err(err) = surface.remove(id) {
            tracing::trace!(error = %err, "ignoring stale element removal");
        }
    }
}
