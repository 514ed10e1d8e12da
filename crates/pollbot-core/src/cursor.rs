use crate::messaging::types::RawUpdate;

/// Offset that asks `getUpdates` for only the most recent update.
pub const SEED_OFFSET: i64 = -1;

/// Next unseen `update_id`, sent as `offset` on every fetch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateCursor {
    next: i64,
}

impl UpdateCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(&self) -> i64 {
        self.next
    }

    /// Move past the first update of `batch`. Never moves backwards.
    ///
    /// Returns whether the cursor changed.
    pub fn advance(&mut self, batch: &[RawUpdate]) -> bool {
        let Some(first) = batch.first() else {
            return false;
        };
        let candidate = first.update_id.saturating_add(1);
        if candidate > self.next {
            self.next = candidate;
            true
        } else {
            false
        }
    }
}
