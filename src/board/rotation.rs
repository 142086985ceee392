use std::collections::HashSet;

use crate::service::{EMPTY_SERVICE_ID, ServiceRecord};

/// Split of the current services into the pinned row and the rotating rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub pinned: Option<ServiceRecord>,
    pub rotating: Vec<ServiceRecord>,
}

/// Pin the earliest arrival (when enabled) and dedupe the remainder by id.
pub fn partition(services: &[ServiceRecord], pin_earliest: bool) -> Partition {
    let pinned = if pin_earliest {
        services.iter().min_by_key(|service| service.arrival()).cloned()
    } else {
        None
    };

    let mut seen: HashSet<&str> = HashSet::new();
    if let Some(pinned) = &pinned {
        seen.insert(pinned.id());
    }
    let rotating = services
        .iter()
        .filter(|service| !service.is_empty() && seen.insert(service.id()))
        .cloned()
        .collect();

    Partition { pinned, rotating }
}

/// Cycling index whose window is what the rotating rows display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationState {
    index: usize,
}

impl RotationState {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }

    pub fn advance(&mut self) {
        self.index = self.index.wrapping_add(1);
    }

    /// Services for `size` consecutive rows starting at the current index.
    ///
    /// Slots past the end of a short list get the empty sentinel instead of
    /// repeating a service already on screen.
    pub fn window(&self, rotating: &[ServiceRecord], size: usize) -> Vec<ServiceRecord> {
        let len = rotating.len();
        (0..size)
            .map(|slot| {
                if slot < len {
                    rotating[(self.index + slot) % len].clone()
                } else {
                    ServiceRecord::empty()
                }
            })
            .collect()
    }

    /// Move the index so the first matching `(slot, id)` candidate keeps its
    /// slot in the new list. Returns the new index, or `None` when nothing
    /// matched and the index was left alone.
    pub fn reanchor<'a>(
        &mut self,
        rotating: &[ServiceRecord],
        candidates: impl IntoIterator<Item = (usize, &'a str)>,
    ) -> Option<usize> {
        let len = rotating.len();
        if len == 0 {
            return None;
        }
        for (slot, id) in candidates {
            if id == EMPTY_SERVICE_ID {
                continue;
            }
            if let Some(position) = rotating.iter().position(|service| service.id() == id) {
                self.index = (position + len - slot % len) % len;
                return Some(self.index);
            }
        }
        None
    }
}
