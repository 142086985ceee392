use crate::error::SurfaceError;

use super::{Element, ElementId, ElementKind, PanelControl, PixelMode, Surface};

/// Width of one glyph in the monospace metrics.
const GLYPH_WIDTH: u32 = 6;

/// In-memory composition; the last element is the topmost.
#[derive(Debug)]
pub struct Composition {
    width: u32,
    height: u32,
    mode: PixelMode,
    next_id: u64,
    elements: Vec<(ElementId, Element)>,
    contrast: u8,
    visible: bool,
}

impl Composition {
    pub fn new(width: u32, height: u32, mode: PixelMode) -> Self {
        Self {
            width,
            height,
            mode,
            next_id: 1,
            elements: Vec::new(),
            contrast: u8::MAX,
            visible: true,
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements
            .iter()
            .find(|(candidate, _)| *candidate == id)
            .map(|(_, element)| element)
    }

    /// Elements bottom to top.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().map(|(_, element)| element)
    }

    pub fn count(&self, predicate: impl Fn(&ElementKind) -> bool) -> usize {
        self.elements()
            .filter(|element| predicate(&element.kind))
            .count()
    }

    /// Kinds of all elements bottom to top, for comparing whole frames.
    pub fn snapshot(&self) -> Vec<ElementKind> {
        self.elements().map(|element| element.kind.clone()).collect()
    }

    pub fn contrast(&self) -> u8 {
        self.contrast
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    fn position(&self, id: ElementId) -> Result<usize, SurfaceError> {
        self.elements
            .iter()
            .position(|(candidate, _)| *candidate == id)
            .ok_or(SurfaceError::ElementAbsent(id))
    }
}

impl Surface for Composition {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn mode(&self) -> PixelMode {
        self.mode
    }

    fn text_width(&self, text: &str) -> u32 {
        let glyphs = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
        glyphs.saturating_mul(GLYPH_WIDTH)
    }

    fn add(&mut self, element: Element) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        self.elements.push((id, element));
        id
    }

    fn remove(&mut self, id: ElementId) -> Result<(), SurfaceError> {
        let index = self.position(id)?;
        self.elements.remove(index);
        Ok(())
    }

    fn replace(&mut self, id: ElementId, kind: ElementKind) -> Result<(), SurfaceError> {
        let index = self.position(id)?;
        self.elements[index].1.kind = kind;
        Ok(())
    }

    fn set_offset(&mut self, id: ElementId, x: i32, y: i32) -> Result<(), SurfaceError> {
        let index = self.position(id)?;
        self.elements[index].1.offset = (x, y);
        Ok(())
    }

    fn refresh(&mut self, id: ElementId) -> Result<(), SurfaceError> {
        let index = self.position(id)?;
        let entry = self.elements.remove(index);
        self.elements.push(entry);
        Ok(())
    }
}

impl PanelControl for Composition {
    fn set_contrast(&mut self, level: u8) {
        self.contrast = level;
    }

    fn show(&mut self) {
        self.visible = true;
    }

    fn hide(&mut self) {
        self.visible = false;
    }
}
