//! Board controller: three rows, the pinned/rotating policy, outages and
//! the empty "dead" state.

mod rotation;
mod row;
mod sync;

pub use rotation::{Partition, RotationState, partition};
pub use row::{CardRequest, ROW_HEIGHT, RowAnimator, RowSettings, RowState};
pub use sync::{RowId, Synchroniser};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, trace, warn};

use crate::events::{FetchUpdate, Outage};
use crate::render::{Element, ElementId, ElementKind, Surface, remove_quietly};
use crate::service::ServiceRecord;
use crate::slot::UpdateSlot;

/// Number of service rows on the panel.
pub const ROWS: usize = 3;

/// Per-frame inputs shared by every row.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub now: DateTime<Utc>,
    pub blink_visible: bool,
}

/// How the board asks for fresh data.
pub trait FetchTrigger {
    /// The configured interval since the last fetch has elapsed.
    fn fetch_due(&self) -> bool;
    /// Start a fetch unless one is already running. Returns whether one was started.
    fn request_fetch(&self) -> bool;
    /// Hold or release the periodic fetches. On-demand requests are unaffected.
    fn pause_periodic(&self, paused: bool);
}

#[derive(Debug, Clone)]
pub struct BoardOptions {
    /// Keep the earliest service on the top row.
    pub pin_earliest: bool,
    /// Ticks between forced rotations, `0` disables them.
    pub forced_rotation_every: u32,
    /// Ticks spent showing "no services" before the next fetch attempt.
    pub recovery_ticks: u32,
    pub row: Arc<RowSettings>,
}

impl Default for BoardOptions {
    fn default() -> Self {
        Self {
            pin_earliest: true,
            forced_rotation_every: 30 * 4,
            recovery_ticks: 100,
            row: Arc::new(RowSettings::default()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardPhase {
    /// No data applied yet, or the panel was switched off.
    AwaitingData,
    Live,
    /// The last successful fetch returned no services.
    Dead,
    Outage,
}

pub struct Board<S, T> {
    surface: S,
    fetch: T,
    updates: UpdateSlot<FetchUpdate>,
    options: BoardOptions,
    sync: Synchroniser,
    next_row: u64,
    services: Vec<ServiceRecord>,
    rows: Vec<RowAnimator>,
    rotation: RotationState,
    phase: BoardPhase,
    outage: Option<Outage>,
    overlay: Option<ElementId>,
    recovery: u32,
    ticks: u64,
    rotated_this_tick: bool,
}

impl<S: Surface, T: FetchTrigger> Board<S, T> {
    pub fn new(surface: S, fetch: T, updates: UpdateSlot<FetchUpdate>, options: BoardOptions) -> Self {
        Self {
            surface,
            fetch,
            updates,
            options,
            sync: Synchroniser::new(),
            next_row: 1,
            services: Vec::new(),
            rows: Vec::with_capacity(ROWS),
            rotation: RotationState::default(),
            phase: BoardPhase::AwaitingData,
            outage: None,
            overlay: None,
            recovery: 0,
            ticks: 0,
            rotated_this_tick: false,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn fetcher(&self) -> &T {
        &self.fetch
    }

    pub fn phase(&self) -> BoardPhase {
        self.phase
    }

    pub fn outage(&self) -> Option<&Outage> {
        self.outage.as_ref()
    }

    pub fn rows(&self) -> &[RowAnimator] {
        &self.rows
    }

    pub fn services(&self) -> &[ServiceRecord] {
        &self.services
    }

    pub fn rotation_index(&self) -> usize {
        self.rotation.index()
    }

    pub fn synchroniser(&self) -> &Synchroniser {
        &self.sync
    }

    pub fn partition(&self) -> Partition {
        partition(&self.services, self.options.pin_earliest)
    }

    /// Ids currently assigned to the rows, top to bottom.
    pub fn shown_ids(&self) -> Vec<&str> {
        self.rows.iter().map(|row| row.service().id()).collect()
    }

    /// Apply at most one pending update, then advance the animation by one frame.
    pub fn tick(&mut self, frame: &Frame) {
        if let Some(update) = self.updates.take() {
            self.apply_update(update, frame.now);
        }

        match self.phase {
            BoardPhase::AwaitingData => {
                if self.fetch.fetch_due() {
                    self.fetch.request_fetch();
                }
            }
            BoardPhase::Outage => {
                if self.fetch.fetch_due() && self.fetch.request_fetch() {
                    debug!("retrying feed while outage overlay is shown");
                }
            }
            BoardPhase::Dead => {
                self.recovery += 1;
                if self.recovery >= self.options.recovery_ticks {
                    self.recovery = 0;
                    if self.fetch.request_fetch() {
                        debug!("recovery interval elapsed; fetching");
                    }
                }
            }
            BoardPhase::Live => self.tick_rows(frame),
        }
    }

    pub fn apply_update(&mut self, update: FetchUpdate, now: DateTime<Utc>) {
        match update {
            FetchUpdate::Services(services) => {
                info!(services = services.len(), phase = ?self.phase, "applying feed update");
                self.clear_outage();
                if services.is_empty() {
                    self.services.clear();
                    self.enter_dead();
                } else if self.phase == BoardPhase::Live {
                    self.update_display_with_new_data(services, now);
                } else {
                    remove_quietly(&mut self.surface, self.overlay.take());
                    self.services = services;
                    self.build_rows(now);
                }
            }
            FetchUpdate::Outage(outage) => self.show_outage(outage),
        }
        // Only the recovery interval fetches while "no services" is shown.
        self.fetch.pause_periodic(self.phase == BoardPhase::Dead);
    }

    /// Tear everything down, e.g. while the panel is switched off.
    pub fn suspend(&mut self) {
        self.teardown_rows();
        remove_quietly(&mut self.surface, self.overlay.take());
        self.outage = None;
        self.services.clear();
        self.phase = BoardPhase::AwaitingData;
        self.fetch.pause_periodic(false);
        info!("board suspended");
    }

    pub fn resume(&mut self) {
        if self.fetch.request_fetch() {
            info!("board resumed; fetching");
        }
    }

    /// Release every element and hand the surface back.
    pub fn shutdown(mut self) -> S {
        self.teardown_rows();
        remove_quietly(&mut self.surface, self.overlay.take());
        self.surface
    }

    fn tick_rows(&mut self, frame: &Frame) {
        self.rotated_this_tick = false;
        for index in 0..self.rows.len() {
            let request = self.rows[index].tick(&mut self.surface, &mut self.sync, frame);
            if let Some(request) = request {
                self.request_card_change(request, frame.now);
            }
        }

        self.ticks += 1;
        let every = u64::from(self.options.forced_rotation_every);
        if every > 0 && self.ticks % every == 0 {
            self.force_rotation(frame.now);
        }
    }

    fn request_card_change(&mut self, request: CardRequest, now: DateTime<Utc>) {
        if self.fetch.fetch_due() {
            if self.fetch.request_fetch() {
                debug!(row = request.row, "fetch due; deferring card change");
            }
            return;
        }
        match request.row {
            2 => self.rotate(now, "row"),
            row @ 1..=ROWS => {
                let index = row - 1;
                let target = self.targets().swap_remove(index);
                self.assign(index, target, now);
            }
            row => warn!(row, "card change requested for unknown row"),
        }
    }

    fn force_rotation(&mut self, now: DateTime<Utc>) {
        // Nothing to rotate with a single rotating service.
        if self.partition().rotating.len() <= 1 {
            return;
        }
        self.rotate(now, "forced");
    }

    fn rotate(&mut self, now: DateTime<Utc>, reason: &'static str) {
        if self.rotated_this_tick {
            trace!(reason, "rotation already ran this tick");
            return;
        }
        self.rotated_this_tick = true;

        if !self.partition().rotating.is_empty() {
            self.rotation.advance();
        }
        let first = self.first_rotating_row();
        let targets = self.targets();
        for (index, target) in targets.into_iter().enumerate().skip(first) {
            self.assign(index, target, now);
        }
        debug!(index = self.rotation.index(), reason, "rotated window");
    }

    fn update_display_with_new_data(&mut self, services: Vec<ServiceRecord>, now: DateTime<Utc>) {
        let Partition { rotating, .. } = partition(&services, self.options.pin_earliest);
        let first = self.first_rotating_row();

        let primary = self
            .rows
            .get(first)
            .map(|row| (0, row.service().id().to_string()));
        let visible = self
            .rows
            .iter()
            .enumerate()
            .map(|(index, row)| (index.saturating_sub(first), row.service().id().to_string()));
        let candidates: Vec<(usize, String)> = primary.into_iter().chain(visible).collect();
        let anchored = self.rotation.reanchor(
            &rotating,
            candidates.iter().map(|(slot, id)| (*slot, id.as_str())),
        );
        match anchored {
            Some(index) => trace!(index, "re-anchored rotation"),
            None => debug!(
                index = self.rotation.index(),
                "no visible service in new data; keeping rotation index"
            ),
        }

        self.services = services;
        let settings = Arc::clone(&self.options.row);
        let targets = self.targets();
        for (index, target) in targets.into_iter().enumerate() {
            let target = target.with_display(&settings.formatter, now);
            let row = &mut self.rows[index];
            if row.service().id() == target.id() {
                row.replace_service(target, &mut self.surface);
            } else {
                row.change_card(target, &mut self.surface, &mut self.sync);
                self.redraw_below(index);
            }
        }
    }

    fn assign(&mut self, index: usize, target: ServiceRecord, now: DateTime<Utc>) {
        let target = target.with_display(&self.options.row.formatter, now);
        let Some(row) = self.rows.get_mut(index) else {
            return;
        };
        if row.service().id() == target.id() {
            row.update_card(target, &mut self.surface, &mut self.sync);
        } else {
            row.change_card(target, &mut self.surface, &mut self.sync);
            self.redraw_below(index);
        }
    }

    fn redraw_below(&mut self, index: usize) {
        if let Some(below) = self.rows.get(index + 1) {
            below.redraw(&mut self.surface);
        }
    }

    fn first_rotating_row(&self) -> usize {
        usize::from(self.options.pin_earliest)
    }

    /// What each row should show for the current data and rotation index.
    fn targets(&self) -> Vec<ServiceRecord> {
        let Partition { pinned, rotating } = self.partition();
        if self.options.pin_earliest {
            let mut targets = vec![pinned.unwrap_or_else(ServiceRecord::empty)];
            targets.extend(self.rotation.window(&rotating, ROWS - 1));
            targets
        } else {
            self.rotation.window(&rotating, ROWS)
        }
    }

    fn build_rows(&mut self, now: DateTime<Utc>) {
        self.teardown_rows();
        self.rotation.reset();
        self.ticks = 0;
        let settings = Arc::clone(&self.options.row);
        let targets = self.targets();
        for (position, target) in targets.into_iter().enumerate() {
            let id = RowId(self.next_row);
            self.next_row += 1;
            let row = RowAnimator::new(
                id,
                position,
                target.with_display(&settings.formatter, now),
                Arc::clone(&settings),
                &mut self.surface,
                &mut self.sync,
            );
            self.rows.push(row);
        }
        self.phase = BoardPhase::Live;
        info!(ids = ?self.shown_ids(), "rows built");
    }

    fn teardown_rows(&mut self) {
        for row in self.rows.drain(..) {
            row.delete(&mut self.surface, &mut self.sync);
        }
    }

    fn enter_dead(&mut self) {
        if self.phase == BoardPhase::Dead {
            return;
        }
        warn!("feed returned no services");
        self.teardown_rows();
        remove_quietly(&mut self.surface, self.overlay.take());
        self.overlay = Some(self.add_overlay(ElementKind::NoServices));
        self.rotation.reset();
        self.recovery = 0;
        self.phase = BoardPhase::Dead;
    }

    fn show_outage(&mut self, outage: Outage) {
        if let Some(current) = &self.outage {
            if *current == outage {
                return;
            }
            if current.kind == outage.kind {
                if let Some(overlay) = self.overlay {
                    let kind = ElementKind::Outage {
                        kind: outage.kind,
                        detail: outage.detail.clone(),
                    };
                    if let Err(err) = self.surface.replace(overlay, kind) {
                        trace!(error = %err, "outage overlay vanished");
                    }
                }
                self.outage = Some(outage);
                return;
            }
        }

        warn!(
            kind = %outage.kind,
            detail = outage.detail.as_deref().unwrap_or(""),
            "showing outage overlay"
        );
        self.teardown_rows();
        remove_quietly(&mut self.surface, self.overlay.take());
        self.overlay = Some(self.add_overlay(ElementKind::Outage {
            kind: outage.kind,
            detail: outage.detail.clone(),
        }));
        self.outage = Some(outage);
        self.phase = BoardPhase::Outage;
    }

    fn clear_outage(&mut self) {
        if let Some(outage) = self.outage.take() {
            info!(kind = %outage.kind, "feed recovered");
            remove_quietly(&mut self.surface, self.overlay.take());
        }
    }

    fn add_overlay(&mut self, kind: ElementKind) -> ElementId {
        let width = self.surface.width();
        let height = self.surface.height();
        self.surface.add(Element::new(kind, 0, 0, width, height))
    }
}
