use ahash::AHashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advancement {
    pub title: String,
    pub parent: Option<String>,
    pub done: bool,
}

/// Advancements the backend has sent, and which tab the player has open.
#[derive(Debug, Default)]
pub struct AdvancementCache {
    advancements: AHashMap<String, Advancement>,
    current_tab: Option<String>,
}

impl AdvancementCache {
    pub fn store(&mut self, id: impl Into<String>, advancement: Advancement) {
        self.advancements.insert(id.into(), advancement);
    }

    pub fn get(&self, id: &str) -> Option<&Advancement> {
        self.advancements.get(id)
    }

    /// Handles the `reset` flag of an advancement update.
    pub fn reset(&mut self) {
        self.advancements.clear();
    }

    pub fn len(&self) -> usize {
        self.advancements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.advancements.is_empty()
    }

    pub fn current_tab(&self) -> Option<&str> {
        self.current_tab.as_deref()
    }

    /// Returns whether the tab actually changed.
    pub fn set_current_tab(&mut self, tab: Option<String>) -> bool {
        if self.current_tab == tab {
            return false;
        }
        self.current_tab = tab;
        true
    }
}
