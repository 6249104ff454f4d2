use crate::protocol::packet::client::play::EditBook;
use std::time::{Duration, Instant};

/// Edits are forwarded at most this often; the client sends one per keystroke.
pub const BOOK_EDIT_INTERVAL: Duration = Duration::from_secs(1);

/// Holds back book edits so the backend is not flooded with them.
#[derive(Debug, Default)]
pub struct BookEditCache {
    pending: Option<EditBook>,
    last_sent: Option<Instant>,
}

impl BookEditCache {
    /// Replaces any edit still waiting to be sent.
    pub fn set(&mut self, edit: EditBook) {
        self.pending = Some(edit);
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Takes the pending edit if enough time has passed since the last one.
    pub fn take_due(&mut self, now: Instant) -> Option<EditBook> {
        if let Some(last) = self.last_sent {
            if now.saturating_duration_since(last) < BOOK_EDIT_INTERVAL {
                return None;
            }
        }
        let edit = self.pending.take()?;
        self.last_sent = Some(now);
        Some(edit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(page: &str) -> EditBook {
        EditBook {
            slot: 0,
            pages: vec![page.to_owned()],
            title: None,
        }
    }

    #[test]
    fn throttles_to_latest_edit() {
        let start = Instant::now();
        let mut cache = BookEditCache::default();
        cache.set(edit("a"));
        assert_eq!(cache.take_due(start).unwrap().pages, vec!["a"]);

        cache.set(edit("b"));
        cache.set(edit("c"));
        assert!(cache.take_due(start + Duration::from_millis(500)).is_none());
        let sent = cache.take_due(start + Duration::from_millis(1000)).unwrap();
        assert_eq!(sent.pages, vec!["c"]);
        assert!(!cache.has_pending());
    }
}
