use crate::position::{Rotation, Vec3};

/// How far a reported position may be from the teleport target and
/// still count as confirming it.
pub const TELEPORT_TOLERANCE: f64 = 0.1;
/// Unconfirming movements tolerated before the teleport is sent again.
pub const RESEND_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Teleport {
    pub position: Vec3,
    pub rotation: Rotation,
    pub teleport_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TeleportCheck {
    /// Nothing outstanding, movement can be forwarded.
    Clear,
    /// The movement confirms the teleport.
    Confirmed(Teleport),
    /// Still waiting; drop the movement.
    Waiting,
    /// Waited too long; send the teleport to the client again.
    Resend(Teleport),
}

/// The one teleport the client has not confirmed yet.
#[derive(Debug, Default)]
pub struct TeleportCache {
    outstanding: Option<Teleport>,
    unconfirmed_moves: u32,
}

impl TeleportCache {
    /// Starts tracking a teleport, replacing any older one.
    pub fn issue(&mut self, teleport: Teleport) {
        self.outstanding = Some(teleport);
        self.unconfirmed_moves = 0;
    }

    pub fn outstanding(&self) -> Option<&Teleport> {
        self.outstanding.as_ref()
    }

    /// Checks a movement the client reported against the outstanding teleport.
    pub fn check(&mut self, position: Vec3) -> TeleportCheck {
        let Some(teleport) = self.outstanding else {
            return TeleportCheck::Clear;
        };

        let horizontal_ok = (position.x - teleport.position.x).abs() <= TELEPORT_TOLERANCE
            && (position.z - teleport.position.z).abs() <= TELEPORT_TOLERANCE;
        let vertical_ok = (position.y - teleport.position.y).abs() <= TELEPORT_TOLERANCE;
        if horizontal_ok && vertical_ok {
            self.outstanding = None;
            self.unconfirmed_moves = 0;
            return TeleportCheck::Confirmed(teleport);
        }

        self.unconfirmed_moves += 1;
        if self.unconfirmed_moves >= RESEND_THRESHOLD {
            self.unconfirmed_moves = 0;
            TeleportCheck::Resend(teleport)
        } else {
            TeleportCheck::Waiting
        }
    }

    pub fn clear(&mut self) {
        self.outstanding = None;
        self.unconfirmed_moves = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teleport() -> Teleport {
        Teleport {
            position: Vec3::new(10.0, 64.0, 10.0),
            rotation: Rotation::default(),
            teleport_id: 7,
        }
    }

    #[test]
    fn confirms_within_tolerance() {
        let mut cache = TeleportCache::default();
        assert_eq!(cache.check(Vec3::ZERO), TeleportCheck::Clear);
        cache.issue(teleport());
        assert_eq!(
            cache.check(Vec3::new(10.05, 64.05, 9.95)),
            TeleportCheck::Confirmed(teleport())
        );
        assert!(cache.outstanding().is_none());
    }

    #[test]
    fn resends_after_threshold() {
        let mut cache = TeleportCache::default();
        cache.issue(teleport());
        let far = Vec3::new(0.0, 64.0, 0.0);
        for _ in 1..RESEND_THRESHOLD {
            assert_eq!(cache.check(far), TeleportCheck::Waiting);
        }
        assert_eq!(cache.check(far), TeleportCheck::Resend(teleport()));
        assert_eq!(cache.check(far), TeleportCheck::Waiting);
    }
}
