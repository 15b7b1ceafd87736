//! # Slot Guard
//!
//! At most one active workflow per [`Slot`]. A slot moves
//! `Idle -> Launching -> Running -> Idle`; the `Launching` reservation is held
//! across the kickoff call so two submits cannot both pass the check.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::LaunchError;
use crate::models::Slot;

/// Occupancy of one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotOccupancy {
    #[default]
    Idle,
    /// Reserved while the kickoff request is in flight
    Launching,
    /// An invocation is being polled
    Running(Uuid),
}

impl SlotOccupancy {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Shared per-slot reservation table
#[derive(Debug, Clone, Default)]
pub struct SlotGuard {
    slots: Arc<Mutex<HashMap<Slot, SlotOccupancy>>>,
}

impl SlotGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn occupancy(&self, slot: Slot) -> SlotOccupancy {
        self.slots.lock().get(&slot).copied().unwrap_or_default()
    }

    /// Reserved or running
    pub fn is_active(&self, slot: Slot) -> bool {
        self.occupancy(slot).is_active()
    }

    /// Reserve an idle slot for a launch
    pub fn try_reserve(&self, slot: Slot) -> Result<SlotPermit, LaunchError> {
        let mut slots = self.slots.lock();
        let occupancy = slots.entry(slot).or_default();
        if occupancy.is_active() {
            return Err(LaunchError::SlotBusy { slot });
        }
        *occupancy = SlotOccupancy::Launching;
        debug!(slot = %slot, "Slot reserved");

        Ok(SlotPermit {
            guard: self.clone(),
            slot,
            committed: false,
        })
    }

    /// Free a running slot if it still belongs to `invocation_id`
    pub fn release(&self, slot: Slot, invocation_id: Uuid) -> bool {
        let mut slots = self.slots.lock();
        match slots.get(&slot) {
            Some(SlotOccupancy::Running(current)) if *current == invocation_id => {
                slots.insert(slot, SlotOccupancy::Idle);
                debug!(slot = %slot, invocation_id = %invocation_id, "Slot released");
                true
            }
            _ => false,
        }
    }

    fn cancel_reservation(&self, slot: Slot) {
        let mut slots = self.slots.lock();
        if slots.get(&slot) == Some(&SlotOccupancy::Launching) {
            slots.insert(slot, SlotOccupancy::Idle);
            debug!(slot = %slot, "Slot reservation abandoned");
        }
    }
}

/// A held `Launching` reservation.
///
/// Dropping the permit without [`SlotPermit::commit`] frees the slot.
#[derive(Debug)]
pub struct SlotPermit {
    guard: SlotGuard,
    slot: Slot,
    committed: bool,
}

impl SlotPermit {
    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Mark the slot as running `invocation_id`
    pub fn commit(mut self, invocation_id: Uuid) {
        self.guard
            .slots
            .lock()
            .insert(self.slot, SlotOccupancy::Running(invocation_id));
        self.committed = true;
    }
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        if !self.committed {
            self.guard.cancel_reservation(self.slot);
        }
    }
}
