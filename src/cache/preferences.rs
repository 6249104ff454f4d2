/// Client-side display preferences, combined with what the backend allows.
#[derive(Debug)]
pub struct PreferencesCache {
    pub prefer_show_coordinates: bool,
    /// Cleared when the backend enables reduced debug info.
    pub server_allows_coordinates: bool,
    pub show_custom_skulls: bool,
    pub cooldown: CooldownStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CooldownStyle {
    #[default]
    Title,
    ActionBar,
    Disabled,
}

impl Default for PreferencesCache {
    fn default() -> Self {
        Self {
            prefer_show_coordinates: true,
            server_allows_coordinates: true,
            show_custom_skulls: true,
            cooldown: CooldownStyle::default(),
        }
    }
}

impl PreferencesCache {
    pub fn show_coordinates(&self) -> bool {
        self.prefer_show_coordinates && self.server_allows_coordinates
    }
}
