use std::sync::Arc;

use tracing::trace;

use crate::render::{Element, ElementId, ElementKind, Surface, TimeGlyph, remove_quietly};
use crate::service::{DisplayTime, DisplayTimeFormatter, ServiceRecord};

use super::Frame;
use super::sync::{RowId, Synchroniser};

pub const ROW_HEIGHT: u32 = 16;
const NUMBER_WIDTH: u32 = 30;
const NUMBER_WIDTH_LARGE: u32 = 45;
const GLYPH_WIDTH: u32 = 16;
const TIME_PADDING: u32 = 5;
const VIA_GAP: u32 = 6;
const SCROLL_TAIL: u32 = 10;

/// Animation knobs shared by every row of a board.
#[derive(Debug, Clone)]
pub struct RowSettings {
    /// Pixels per tick for both the reveal and the via scroll.
    pub speed: u32,
    /// Ticks spent in each waiting state.
    pub delay: u32,
    pub reduced_animations: bool,
    pub large_line_names: bool,
    /// Prefix the line with its place in the fetched list.
    pub show_index: bool,
    pub formatter: DisplayTimeFormatter,
}

impl Default for RowSettings {
    fn default() -> Self {
        Self {
            speed: 3,
            delay: 30,
            reduced_animations: false,
            large_line_names: false,
            show_index: false,
            formatter: DisplayTimeFormatter::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    WaitOpening,
    OpeningScroll,
    OpeningEnd,
    ScrollDecider,
    ScrollingWait,
    Scrolling,
    WaitSync,
    WaitStud,
    StudScroll,
    StudEnd,
    Stud,
}

impl RowState {
    /// The reveal has finished and the card elements (if any) are on screen.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            Self::ScrollDecider | Self::ScrollingWait | Self::Scrolling | Self::WaitSync | Self::Stud
        )
    }

    fn refreshes_time(&self) -> bool {
        matches!(
            self,
            Self::ScrollDecider | Self::ScrollingWait | Self::Scrolling | Self::WaitSync
        )
    }
}

/// A row asking the board what it should show next (1-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardRequest {
    pub row: usize,
}

#[derive(Debug, Default)]
struct Card {
    banner: Option<ElementId>,
    cover: Option<ElementId>,
    number: Option<ElementId>,
    destination: Option<ElementId>,
    time: Option<ElementId>,
}

impl Card {
    fn ids(&self) -> [Option<ElementId>; 5] {
        [
            self.banner,
            self.cover,
            self.number,
            self.destination,
            self.time,
        ]
    }
}

/// Per-row animation state machine.
#[derive(Debug)]
pub struct RowAnimator {
    id: RowId,
    position: usize,
    settings: Arc<RowSettings>,
    service: ServiceRecord,
    state: RowState,
    reveal: u32,
    scroll: u32,
    max_scroll: u32,
    ticks: u32,
    blink_visible: bool,
    card: Card,
}

impl RowAnimator {
    pub fn new<S: Surface + ?Sized>(
        id: RowId,
        position: usize,
        service: ServiceRecord,
        settings: Arc<RowSettings>,
        surface: &mut S,
        sync: &mut Synchroniser,
    ) -> Self {
        sync.register(id, true);
        let mut row = Self {
            id,
            position,
            settings,
            service: ServiceRecord::empty(),
            state: RowState::Stud,
            reveal: 0,
            scroll: 0,
            max_scroll: 0,
            ticks: 0,
            blink_visible: true,
            card: Card::default(),
        };
        row.change_card(service, surface, sync);
        row
    }

    pub fn id(&self) -> RowId {
        self.id
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn state(&self) -> RowState {
        self.state
    }

    pub fn service(&self) -> &ServiceRecord {
        &self.service
    }

    pub fn scroll_offset(&self) -> u32 {
        self.scroll
    }

    pub fn max_scroll(&self) -> u32 {
        self.max_scroll
    }

    pub fn reveal_offset(&self) -> u32 {
        self.reveal
    }

    pub fn has_banner(&self) -> bool {
        self.card.banner.is_some()
    }

    fn top(&self) -> i32 {
        i32::try_from(self.position as u32 * ROW_HEIGHT).unwrap_or(i32::MAX)
    }

    fn request(&self) -> CardRequest {
        CardRequest {
            row: self.position + 1,
        }
    }

    /// Advance by one frame. Returns a request when the row finished its cycle.
    pub fn tick<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        sync: &mut Synchroniser,
        frame: &Frame,
    ) -> Option<CardRequest> {
        self.refresh_stale_time(surface, frame);
        self.follow_blink(surface, frame);

        match self.state {
            RowState::WaitOpening => {
                if !self.is_waiting() {
                    self.state = RowState::OpeningScroll;
                }
            }
            RowState::WaitStud => {
                if !self.is_waiting() {
                    self.state = RowState::StudScroll;
                }
            }
            RowState::OpeningScroll | RowState::StudScroll => self.advance_reveal(surface),
            RowState::OpeningEnd => {
                self.remove_banner(surface);
                self.attach_card(surface);
                sync.set_ready(self.id);
                self.state = RowState::ScrollDecider;
            }
            RowState::StudEnd => {
                self.remove_banner(surface);
                sync.set_ready(self.id);
                self.state = RowState::Stud;
            }
            RowState::ScrollDecider => self.decide(sync),
            RowState::ScrollingWait => {
                if !self.is_waiting() {
                    self.state = RowState::Scrolling;
                }
            }
            RowState::Scrolling => {
                if self.scroll < self.max_scroll {
                    self.scroll = (self.scroll + self.settings.speed).min(self.max_scroll);
                    self.apply_scroll(surface);
                } else {
                    self.state = RowState::WaitSync;
                }
            }
            RowState::WaitSync => {
                if self.scroll != 0 {
                    self.scroll = 0;
                    self.apply_scroll(surface);
                }
                if !self.is_waiting() {
                    return Some(self.request());
                }
            }
            RowState::Stud => {
                if !self.is_waiting() {
                    return Some(self.request());
                }
            }
        }
        None
    }

    /// Show a different service, replaying the two-line slide.
    pub fn change_card<S: Surface + ?Sized>(
        &mut self,
        service: ServiceRecord,
        surface: &mut S,
        sync: &mut Synchroniser,
    ) {
        if service.is_empty() && self.service.is_empty() {
            self.clear_elements(surface);
            self.ticks = 0;
            self.state = RowState::Stud;
            sync.set_ready(self.id);
            return;
        }

        trace!(
            row = self.position + 1,
            from = self.service.id(),
            to = service.id(),
            "changing card"
        );
        sync.set_busy(self.id);
        self.clear_elements(surface);

        let width = surface.width();
        let top = self.top();
        self.card.banner = Some(surface.add(Element::new(
            ElementKind::Banner {
                outgoing: banner_line(&self.service),
                incoming: banner_line(&service),
            },
            0,
            top,
            width,
            ROW_HEIGHT * 2,
        )));
        self.card.cover = Some(surface.add(Element::new(
            ElementKind::Cover,
            0,
            top + ROW_HEIGHT as i32,
            width,
            ROW_HEIGHT,
        )));

        self.service = service;
        self.reveal = 0;
        self.scroll = 0;
        self.max_scroll = 0;
        self.ticks = 0;
        self.state = if self.service.is_empty() {
            RowState::WaitStud
        } else {
            RowState::WaitOpening
        };
    }

    /// Same journey, fresh data: swap the time text and re-arm the cycle
    /// without replaying the slide.
    pub fn update_card<S: Surface + ?Sized>(
        &mut self,
        service: ServiceRecord,
        surface: &mut S,
        sync: &mut Synchroniser,
    ) {
        self.service = service;
        if !self.state.is_settled() {
            // OpeningEnd builds the card from the record just stored.
            return;
        }
        self.ticks = 0;
        if self.service.is_empty() {
            self.clear_elements(surface);
            self.state = RowState::Stud;
            sync.set_ready(self.id);
            return;
        }
        if self.card.destination.is_none() {
            self.attach_card(surface);
        } else {
            self.scroll = 0;
            self.apply_scroll(surface);
            self.replace_time(surface);
        }
        self.state = RowState::ScrollDecider;
        sync.set_ready(self.id);
    }

    /// Swap in newer data for the displayed journey, leaving the animation
    /// phase untouched.
    pub fn replace_service<S: Surface + ?Sized>(&mut self, service: ServiceRecord, surface: &mut S) {
        let show_index = self.settings.show_index;
        let relabel = self.service.label(show_index) != service.label(show_index);
        self.service = service;
        if let Some(number) = self.card.number.filter(|_| relabel) {
            let kind = ElementKind::ServiceNumber(self.service.label(show_index));
            if let Err(err) = surface.replace(number, kind) {
                trace!(error = %err, "service number vanished");
            }
        }
        if self.card.time.is_some() {
            self.replace_time(surface);
        }
    }

    /// Bring this row's elements back above anything drawn by the row above.
    pub fn redraw<S: Surface + ?Sized>(&self, surface: &mut S) {
        for id in self.card.ids().into_iter().flatten() {
            if let Err(err) = surface.refresh(id) {
                trace!(error = %err, "skipping redraw of stale element");
            }
        }
    }

    /// Release every element and leave the barrier.
    pub fn delete<S: Surface + ?Sized>(mut self, surface: &mut S, sync: &mut Synchroniser) {
        self.clear_elements(surface);
        sync.forget(self.id);
    }

    fn is_waiting(&mut self) -> bool {
        self.ticks += 1;
        if self.ticks > self.settings.delay {
            self.ticks = 0;
            return false;
        }
        true
    }

    fn decide(&mut self, sync: &mut Synchroniser) {
        if !sync.is_synchronised() || self.is_waiting() {
            return;
        }
        if self.service.is_empty() {
            self.state = RowState::Stud;
            sync.set_ready(self.id);
            return;
        }
        sync.set_busy(self.id);
        self.state = if self.settings.reduced_animations {
            RowState::WaitSync
        } else {
            RowState::ScrollingWait
        };
    }

    fn advance_reveal<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        if self.reveal < ROW_HEIGHT {
            self.reveal = (self.reveal + self.settings.speed).min(ROW_HEIGHT);
            if let Some(banner) = self.card.banner {
                if let Err(err) = surface.set_offset(banner, 0, self.reveal as i32) {
                    trace!(error = %err, "banner vanished during reveal");
                }
            }
            return;
        }
        self.state = match self.state {
            RowState::StudScroll => RowState::StudEnd,
            _ => RowState::OpeningEnd,
        };
    }

    fn refresh_stale_time<S: Surface + ?Sized>(&mut self, surface: &mut S, frame: &Frame) {
        if !self.state.refreshes_time() {
            return;
        }
        let formatter = &self.settings.formatter;
        if !self.service.needs_refresh(formatter, frame.now) {
            return;
        }
        self.service.refresh(formatter, frame.now);
        self.blink_visible = frame.blink_visible;
        self.replace_time(surface);
    }

    fn follow_blink<S: Surface + ?Sized>(&mut self, surface: &mut S, frame: &Frame) {
        if self.blink_visible == frame.blink_visible {
            return;
        }
        self.blink_visible = frame.blink_visible;
        if self.card.time.is_some() && self.service.display().is_blinking() {
            self.replace_time(surface);
        }
    }

    fn apply_scroll<S: Surface + ?Sized>(&self, surface: &mut S) {
        if let Some(destination) = self.card.destination {
            if let Err(err) = surface.set_offset(destination, self.scroll as i32, 0) {
                trace!(error = %err, "destination vanished during scroll");
            }
        }
    }

    fn time_glyph<S: Surface + ?Sized>(&self, surface: &S) -> (TimeGlyph, u32) {
        match self.service.display() {
            DisplayTime::Arriving => (TimeGlyph::Vehicle, GLYPH_WIDTH),
            DisplayTime::ArrivingBlink => (
                TimeGlyph::VehicleBlink {
                    visible: self.blink_visible,
                },
                GLYPH_WIDTH,
            ),
            other => {
                let text = other.to_string();
                let width = surface.text_width(&text) + TIME_PADDING;
                (TimeGlyph::Text(text), width)
            }
        }
    }

    fn replace_time<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        remove_quietly(surface, self.card.time.take());
        let (glyph, width) = self.time_glyph(surface);
        let x = surface.width().saturating_sub(width) as i32;
        self.card.time = Some(surface.add(Element::new(
            ElementKind::Time(glyph),
            x,
            self.top(),
            width,
            ROW_HEIGHT,
        )));
    }

    fn attach_card<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        if self.service.is_empty() {
            return;
        }
        let top = self.top();
        let width = surface.width();
        let number_width = if self.settings.large_line_names || self.settings.show_index {
            NUMBER_WIDTH_LARGE
        } else {
            NUMBER_WIDTH
        };
        let (_, time_width) = self.time_glyph(surface);
        let visible = width.saturating_sub(number_width + time_width);

        self.max_scroll = if self.service.via().is_empty() {
            0
        } else {
            let via_start = visible.max(surface.text_width(self.service.destination()) + VIA_GAP);
            via_start + surface.text_width(self.service.via()) + SCROLL_TAIL
        };
        self.scroll = 0;

        self.card.number = Some(surface.add(Element::new(
            ElementKind::ServiceNumber(self.service.label(self.settings.show_index)),
            0,
            top,
            number_width,
            ROW_HEIGHT,
        )));
        self.card.destination = Some(surface.add(Element::new(
            ElementKind::Destination {
                text: self.service.destination().to_string(),
                via: self.service.via().to_string(),
            },
            number_width as i32,
            top,
            visible,
            ROW_HEIGHT,
        )));
        self.replace_time(surface);
    }

    fn remove_banner<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        remove_quietly(surface, self.card.banner.take());
        remove_quietly(surface, self.card.cover.take());
    }

    fn clear_elements<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        self.remove_banner(surface);
        remove_quietly(surface, self.card.number.take());
        remove_quietly(surface, self.card.destination.take());
        remove_quietly(surface, self.card.time.take());
    }
}

fn banner_line(service: &ServiceRecord) -> String {
    if service.is_empty() {
        return String::new();
    }
    format!(
        "{} {} {}",
        service.line(),
        service.destination(),
        service.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{Composition, PixelMode};
    use chrono::{DateTime, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().unwrap()
    }

    fn frame() -> Frame {
        Frame {
            now: now(),
            blink_visible: true,
        }
    }

    fn settings(delay: u32, reduced: bool) -> Arc<RowSettings> {
        Arc::new(RowSettings {
            speed: 4,
            delay,
            reduced_animations: reduced,
            ..RowSettings::default()
        })
    }

    fn service(id: &str, minutes: i64, via: &str) -> ServiceRecord {
        ServiceRecord::new(
            id,
            "7",
            "Bern",
            via,
            now() + chrono::Duration::minutes(minutes),
            None,
        )
        .with_display(&DisplayTimeFormatter::default(), now())
    }

    fn run_until<S: Surface>(
        row: &mut RowAnimator,
        surface: &mut S,
        sync: &mut Synchroniser,
        limit: usize,
        stop: impl Fn(&RowAnimator) -> bool,
    ) -> Option<CardRequest> {
        for _ in 0..limit {
            if let Some(request) = row.tick(surface, sync, &frame()) {
                return Some(request);
            }
            if stop(row) {
                return None;
            }
        }
        panic!("row stuck in {:?}", row.state());
    }

    #[test]
    fn full_cycle_reaches_request_within_budget() {
        let mut surface = Composition::new(256, 64, PixelMode::Mono);
        let mut sync = Synchroniser::new();
        let mut row = RowAnimator::new(
            RowId(1),
            1,
            service("a", 5, "Zollikofen, Schüpfen"),
            settings(2, false),
            &mut surface,
            &mut sync,
        );
        assert_eq!(row.state(), RowState::WaitOpening);
        assert!(!sync.is_ready(RowId(1)));
        assert!(row.has_banner());

        let request = run_until(&mut row, &mut surface, &mut sync, 500, |_| false);
        assert_eq!(request, Some(CardRequest { row: 2 }));
        assert_eq!(row.state(), RowState::WaitSync);
        assert_eq!(row.scroll_offset(), 0);
        assert!(!row.has_banner());
        assert_eq!(
            surface.count(|kind| matches!(kind, ElementKind::Destination { .. })),
            1
        );
    }

    #[test]
    fn show_index_labels_and_widens_number_column() {
        let mut surface = Composition::new(256, 64, PixelMode::Mono);
        let mut sync = Synchroniser::new();
        let settings = Arc::new(RowSettings {
            delay: 0,
            show_index: true,
            ..RowSettings::default()
        });
        let mut row = RowAnimator::new(
            RowId(1),
            0,
            service("a", 5, "").with_position(3),
            settings,
            &mut surface,
            &mut sync,
        );
        run_until(&mut row, &mut surface, &mut sync, 50, |row| {
            row.state() == RowState::ScrollDecider
        });

        let number = |surface: &Composition| {
            surface
                .elements()
                .find_map(|element| match &element.kind {
                    ElementKind::ServiceNumber(text) => Some((text.clone(), element.width)),
                    _ => None,
                })
                .expect("number element")
        };
        assert_eq!(number(&surface), ("3.7".to_string(), NUMBER_WIDTH_LARGE));

        row.replace_service(service("a", 4, "").with_position(1), &mut surface);
        assert_eq!(number(&surface).0, "1.7");
    }

    #[test]
    fn reveal_ends_attach_card_and_mark_ready() {
        let mut surface = Composition::new(256, 64, PixelMode::Mono);
        let mut sync = Synchroniser::new();
        let mut row = RowAnimator::new(
            RowId(1),
            0,
            service("a", 5, ""),
            settings(0, false),
            &mut surface,
            &mut sync,
        );
        run_until(&mut row, &mut surface, &mut sync, 50, |row| {
            row.state() == RowState::ScrollDecider
        });
        assert!(sync.is_ready(RowId(1)));
        assert_eq!(row.reveal_offset(), ROW_HEIGHT);
        assert_eq!(surface.count(|kind| matches!(kind, ElementKind::Banner { .. })), 0);
        assert_eq!(surface.count(|kind| matches!(kind, ElementKind::Cover)), 0);
        assert_eq!(surface.len(), 3);
    }

    #[test]
    fn decider_holds_while_another_row_is_busy() {
        let mut surface = Composition::new(256, 64, PixelMode::Mono);
        let mut sync = Synchroniser::new();
        sync.register(RowId(99), false);
        let mut row = RowAnimator::new(
            RowId(1),
            0,
            service("a", 5, "Somewhere"),
            settings(0, false),
            &mut surface,
            &mut sync,
        );
        for _ in 0..200 {
            row.tick(&mut surface, &mut sync, &frame());
        }
        assert_eq!(row.state(), RowState::ScrollDecider);

        sync.set_ready(RowId(99));
        row.tick(&mut surface, &mut sync, &frame());
        assert_eq!(row.state(), RowState::ScrollingWait);
        assert!(!sync.is_ready(RowId(1)));
    }

    #[test]
    fn reduced_animations_skip_horizontal_scroll() {
        let mut surface = Composition::new(256, 64, PixelMode::Mono);
        let mut sync = Synchroniser::new();
        let mut row = RowAnimator::new(
            RowId(1),
            2,
            service("a", 5, "A very long list of intermediate stops"),
            settings(1, true),
            &mut surface,
            &mut sync,
        );
        let mut seen_scrolling = false;
        for _ in 0..200 {
            seen_scrolling |= row.state() == RowState::Scrolling;
            if row.tick(&mut surface, &mut sync, &frame()).is_some() {
                break;
            }
        }
        assert!(!seen_scrolling);
        assert_eq!(row.state(), RowState::WaitSync);
    }

    #[test]
    fn empty_row_idles_in_stud_and_requests() {
        let mut surface = Composition::new(256, 64, PixelMode::Mono);
        let mut sync = Synchroniser::new();
        let mut row = RowAnimator::new(
            RowId(1),
            2,
            ServiceRecord::empty(),
            settings(3, false),
            &mut surface,
            &mut sync,
        );
        assert_eq!(row.state(), RowState::Stud);
        assert!(surface.is_empty());
        assert!(sync.is_ready(RowId(1)));
        let request = run_until(&mut row, &mut surface, &mut sync, 10, |_| false);
        assert_eq!(request, Some(CardRequest { row: 3 }));
    }

    #[test]
    fn change_to_empty_plays_stud_cycle() {
        let mut surface = Composition::new(256, 64, PixelMode::Mono);
        let mut sync = Synchroniser::new();
        let mut row = RowAnimator::new(
            RowId(1),
            1,
            service("a", 5, ""),
            settings(0, false),
            &mut surface,
            &mut sync,
        );
        run_until(&mut row, &mut surface, &mut sync, 50, |row| {
            row.state() == RowState::ScrollDecider
        });

        row.change_card(ServiceRecord::empty(), &mut surface, &mut sync);
        assert_eq!(row.state(), RowState::WaitStud);
        run_until(&mut row, &mut surface, &mut sync, 50, |row| {
            row.state() == RowState::Stud
        });
        assert!(surface.is_empty());
        assert!(sync.is_ready(RowId(1)));
    }

    #[test]
    fn update_card_with_same_journey_skips_banner() {
        let mut surface = Composition::new(256, 64, PixelMode::Mono);
        let mut sync = Synchroniser::new();
        let mut row = RowAnimator::new(
            RowId(1),
            0,
            service("a", 5, "Via"),
            settings(0, false),
            &mut surface,
            &mut sync,
        );
        run_until(&mut row, &mut surface, &mut sync, 200, |row| {
            row.state() == RowState::Scrolling && row.scroll_offset() > 0
        });

        row.update_card(service("a", 1, "Via"), &mut surface, &mut sync);
        assert_eq!(row.state(), RowState::ScrollDecider);
        assert_eq!(row.scroll_offset(), 0);
        assert!(!row.has_banner());
        assert!(sync.is_ready(RowId(1)));
        assert!(surface.snapshot().contains(&ElementKind::Time(TimeGlyph::Text(
            " Due".to_string()
        ))));
        assert_eq!(surface.len(), 3);
    }

    #[test]
    fn update_card_during_reveal_keeps_animating() {
        let mut surface = Composition::new(256, 64, PixelMode::Mono);
        let mut sync = Synchroniser::new();
        let mut row = RowAnimator::new(
            RowId(1),
            0,
            service("a", 5, ""),
            settings(0, false),
            &mut surface,
            &mut sync,
        );
        row.tick(&mut surface, &mut sync, &frame());
        row.update_card(service("a", 8, ""), &mut surface, &mut sync);
        assert!(row.has_banner());
        run_until(&mut row, &mut surface, &mut sync, 50, |row| {
            row.state() == RowState::ScrollDecider
        });
        assert!(surface.snapshot().contains(&ElementKind::Time(TimeGlyph::Text(
            " 8 min".to_string()
        ))));
    }

    #[test]
    fn stale_countdown_is_regenerated_in_place() {
        let mut surface = Composition::new(256, 64, PixelMode::Mono);
        let mut sync = Synchroniser::new();
        let mut row = RowAnimator::new(
            RowId(1),
            0,
            service("a", 5, ""),
            settings(1_000, false),
            &mut surface,
            &mut sync,
        );
        run_until(&mut row, &mut surface, &mut sync, 2_000, |row| {
            row.state() == RowState::ScrollDecider
        });
        let later = Frame {
            now: now() + chrono::Duration::seconds(150),
            blink_visible: true,
        };
        row.tick(&mut surface, &mut sync, &later);
        assert_eq!(row.state(), RowState::ScrollDecider);
        assert_eq!(row.service().display(), &DisplayTime::Minutes(2));
        assert!(surface.snapshot().contains(&ElementKind::Time(TimeGlyph::Text(
            " 2 min".to_string()
        ))));
    }

    #[test]
    fn delete_releases_everything() {
        let mut surface = Composition::new(256, 64, PixelMode::Mono);
        let mut sync = Synchroniser::new();
        let row = RowAnimator::new(
            RowId(4),
            1,
            service("a", 5, ""),
            settings(0, false),
            &mut surface,
            &mut sync,
        );
        row.delete(&mut surface, &mut sync);
        assert!(surface.is_empty());
        assert!(sync.is_empty());
    }
}
