use ahash::AHashMap;

/// Network ids of the status effects the session itself cares about.
pub mod effects {
    pub const HASTE: i32 = 2;
    pub const MINING_FATIGUE: i32 = 3;
    pub const CONDUIT_POWER: i32 = 28;
}

/// Status effects active on the local player, keyed by effect id.
#[derive(Debug, Default)]
pub struct EffectCache {
    amplifiers: AHashMap<i32, i8>,
}

impl EffectCache {
    pub fn apply(&mut self, effect: i32, amplifier: i8) {
        self.amplifiers.insert(effect, amplifier);
    }

    pub fn remove(&mut self, effect: i32) {
        self.amplifiers.remove(&effect);
    }

    /// Effect level (amplifier + 1), or 0 when inactive.
    pub fn level(&self, effect: i32) -> i32 {
        self.amplifiers
            .get(&effect)
            .map_or(0, |&amplifier| i32::from(amplifier) + 1)
    }

    pub fn haste(&self) -> i32 {
        self.level(effects::HASTE)
    }

    pub fn conduit_power(&self) -> i32 {
        self.level(effects::CONDUIT_POWER)
    }

    pub fn mining_fatigue(&self) -> i32 {
        self.level(effects::MINING_FATIGUE)
    }

    pub fn clear(&mut self) {
        self.amplifiers.clear();
    }
}
