use ahash::AHashMap;

/// Recipes the backend announced, with the network ids the frontend
/// knows them by.
#[derive(Debug)]
pub struct RecipeCache {
    network_ids: AHashMap<String, u32>,
    next_network_id: u32,
    /// Last unparsed recipe list, for the translators.
    raw: Vec<u8>,
}

impl Default for RecipeCache {
    fn default() -> Self {
        Self {
            network_ids: AHashMap::new(),
            // Network id 0 is invalid on the frontend.
            next_network_id: 1,
            raw: Vec::new(),
        }
    }
}

impl RecipeCache {
    /// Replaces the whole recipe book.
    pub fn replace(&mut self, raw: Vec<u8>) {
        self.network_ids.clear();
        self.next_network_id = 1;
        self.raw = raw;
    }

    pub fn register(&mut self, recipe: impl Into<String>) -> u32 {
        let next = &mut self.next_network_id;
        *self.network_ids.entry(recipe.into()).or_insert_with(|| {
            let id = *next;
            *next += 1;
            id
        })
    }

    pub fn network_id(&self, recipe: &str) -> Option<u32> {
        self.network_ids.get(recipe).copied()
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.network_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.network_ids.is_empty()
    }
}
