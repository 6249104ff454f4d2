/// Rain and thunder as last announced by the backend.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct WeatherCache {
    pub raining: bool,
    pub rain_strength: f32,
    pub thunder_strength: f32,
}

impl WeatherCache {
    pub fn is_thundering(&self) -> bool {
        self.thunder_strength > 0.0
    }
}
