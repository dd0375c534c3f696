// Async command handlers wrapping the blocking core - one file per domain
pub mod icons;
pub mod packaging;

use parking_lot::Mutex;

/// Admits one running job at a time.
pub struct JobSlot {
    active: Mutex<Option<String>>,
}

impl JobSlot {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
        }
    }

    /// Claim the slot for `label`, or report what is already running.
    pub fn acquire(&self, label: &str) -> Result<SlotGuard<'_>, String> {
        let mut active = self.active.lock();
        if let Some(current) = active.as_ref() {
            return Err(format!("Another job is already running: {}", current));
        }
        *active = Some(label.to_string());
        Ok(SlotGuard { slot: self })
    }

    pub fn is_busy(&self) -> bool {
        self.active.lock().is_some()
    }
}

impl Default for JobSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases its slot when dropped.
pub struct SlotGuard<'a> {
    slot: &'a JobSlot,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        *self.slot.active.lock() = None;
    }
}

lazy_static::lazy_static! {
    pub static ref BUILD_SLOT: JobSlot = JobSlot::new();
    pub static ref GENERATION_SLOT: JobSlot = JobSlot::new();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_admits_one_job() {
        let slot = JobSlot::new();
        let guard = slot.acquire("first").unwrap();
        assert!(slot.is_busy());

        let err = slot.acquire("second").err().unwrap();
        assert!(err.contains("first"));

        drop(guard);
        assert!(!slot.is_busy());
        assert!(slot.acquire("third").is_ok());
    }
}
