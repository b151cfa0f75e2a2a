//! The fixed-capacity slot pool: M pre-allocated chip buffers, each guarded
//! by its own mutex. All access is try-lock only.

use std::sync::{Mutex, TryLockError};

/// One pre-allocated chip buffer plus its readiness bit. Both fields are
/// inside the mutex: inspecting or mutating either requires the lock.
pub struct Slot {
    pub ready: bool,
    pub imagery: Vec<u8>,
    pub label: Option<Vec<u8>>,
    /// Chip-coordinate origin of the chip currently held, valid only while
    /// `ready == true`. Used only for logging and testing, never for
    /// control flow.
    pub origin: (usize, usize),
}

impl Slot {
    fn new(imagery_size: usize, label_size: Option<usize>) -> Self {
        Slot {
            ready: false,
            imagery: vec![0u8; imagery_size],
            label: label_size.map(|n| vec![0u8; n]),
            origin: (0, 0),
        }
    }
}

/// M fixed slots. Producers and the consumer both only ever try-lock a
/// slot; a failed attempt means "move on to the next slot", never "wait".
pub struct SlotPool {
    slots: Vec<Mutex<Slot>>,
}

impl SlotPool {
    pub fn new(n_slots: usize, imagery_size: usize, label_size: Option<usize>) -> Self {
        let slots = (0..n_slots)
            .map(|_| Mutex::new(Slot::new(imagery_size, label_size)))
            .collect();
        SlotPool { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Attempts to lock slot `index`. Returns `None` if another holder has
    /// it right now; the caller must move to a different slot, never wait.
    pub fn try_lock(&self, index: usize) -> Option<std::sync::MutexGuard<'_, Slot>> {
        match self.slots[index].try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::WouldBlock) => None,
            Err(TryLockError::Poisoned(poisoned)) => {
                // A worker panicked while holding this slot. The slot's
                // invariants (ready/buffers) are still structurally intact
                // for our purposes, so recover it rather than wedging this
                // slot forever.
                Some(poisoned.into_inner())
            }
        }
    }
}
