use crate::{frontend::Form, session::Session};
use ahash::AHashMap;

/// Called with the pressed button, or `None` if the form was closed.
pub type FormHandler = Box<dyn FnOnce(&mut Session, Option<usize>) + Send>;

/// Forms shown to the player that are waiting for an answer.
#[derive(Default)]
pub struct FormCache {
    next_id: u32,
    pending: AHashMap<u32, (Form, FormHandler)>,
}

impl FormCache {
    /// Registers a form and returns the id it must be shown with.
    pub fn register(&mut self, form: Form, handler: FormHandler) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.pending.insert(id, (form, handler));
        id
    }

    pub fn take(&mut self, id: u32) -> Option<(Form, FormHandler)> {
        self.pending.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drops every handler without calling it.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
