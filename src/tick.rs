//! The per-session tick: what runs every 50 ms and in which order.
//!
//! The policies here are plain functions over session state so they can
//! be tested without a session. [`Session::tick_at`] evaluates them in
//! order and applies the resulting effects.
//!
//! [`Session::tick_at`]: crate::session::Session::tick_at

use crate::{
    player::ARM_SWING_INACTIVE,
    position::Vec3,
};
use std::{
    future,
    time::{Duration, Instant},
};
use tokio::time::{Interval, MissedTickBehavior};

pub const TICK_INTERVAL: Duration = Duration::from_millis(50);
/// A position is re-sent once the player has been still for longer than
/// this, so the
/// backend keeps applying gravity and collision to an idle player.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(3000);

/// Base arm swing length in ticks.
const ARM_SWING_TICKS: i32 = 6;

/// Something a tick step asks the session to do.
#[derive(Debug, Clone, PartialEq)]
pub enum TickEffect {
    /// Send the player's position to the backend.
    SendPosition(Vec3),
    /// Reset the movement timer without sending anything.
    TouchMovement,
    EnterBorderFog,
    ExitBorderFog,
    DrawBorderWall,
    /// The arm swing finished while sneaking.
    AttemptBlock,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Heartbeat {
    NotDue,
    /// Due, but the collision check vetoed the packet.
    Suppressed,
    Send(Vec3),
}

/// Decides whether an idle player needs a position heartbeat.
/// `adjust` runs only when one is due and may veto it by returning `None`.
pub fn heartbeat(
    now: Instant,
    last_movement: Instant,
    spawned: bool,
    adjust: impl FnOnce() -> Option<Vec3>,
) -> Heartbeat {
    if !spawned || now.saturating_duration_since(last_movement) <= HEARTBEAT_INTERVAL {
        return Heartbeat::NotDue;
    }
    match adjust() {
        Some(position) => Heartbeat::Send(position),
        None => Heartbeat::Suppressed,
    }
}

impl Heartbeat {
    pub fn effects(self) -> Vec<TickEffect> {
        match self {
            Heartbeat::NotDue => Vec::new(),
            Heartbeat::Suppressed => vec![TickEffect::TouchMovement],
            Heartbeat::Send(position) => {
                vec![TickEffect::SendPosition(position), TickEffect::TouchMovement]
            }
        }
    }
}

/// Fog and wall effects for the current border proximity.
/// Entering and leaving the warning area each yield exactly one fog effect.
pub fn border_effects(in_warning_area: bool, within_warning: bool, close_to_border: bool) -> Vec<TickEffect> {
    let show_fog = !within_warning;
    let mut effects = Vec::new();
    if show_fog || close_to_border {
        effects.push(TickEffect::DrawBorderWall);
        if show_fog && !in_warning_area {
            effects.push(TickEffect::EnterBorderFog);
        }
    }
    if !show_fog && in_warning_area {
        effects.push(TickEffect::ExitBorderFog);
    }
    effects
}

/// Length of an arm swing in ticks. Haste and conduit power speed it
/// up (the stronger of the two counts), mining fatigue slows it down.
pub fn arm_swing_duration(haste: i32, conduit_power: i32, mining_fatigue: i32) -> i32 {
    let haste = haste.max(conduit_power);
    if haste > 0 {
        ARM_SWING_TICKS - haste
    } else if mining_fatigue > 0 {
        ARM_SWING_TICKS + mining_fatigue * 2
    } else {
        ARM_SWING_TICKS
    }
}

/// Advances the arm swing counter. Returns the new counter and the
/// effects to apply.
pub fn arm_swing(ticks: i32, duration: i32, sneaking: bool) -> (i32, Vec<TickEffect>) {
    if ticks < 0 {
        return (ticks, Vec::new());
    }
    let ticks = ticks + 1;
    if ticks < duration {
        return (ticks, Vec::new());
    }
    let effects = if sneaking {
        vec![TickEffect::AttemptBlock]
    } else {
        Vec::new()
    };
    (ARM_SWING_INACTIVE, effects)
}

/// Drives the 50 ms tick of one session. Inactive until started.
#[derive(Default)]
pub struct TickScheduler {
    interval: Option<Interval>,
    ticks: u64,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts ticking. Must be called from within the runtime.
    pub fn start(&mut self) {
        if self.interval.is_some() {
            return;
        }
        let mut interval = tokio::time::interval_at(
            tokio::time::Instant::now() + TICK_INTERVAL,
            TICK_INTERVAL,
        );
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.interval = Some(interval);
    }

    pub fn cancel(&mut self) {
        self.interval = None;
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub(crate) fn record_tick(&mut self) {
        self.ticks += 1;
    }

    /// Resolves at the next tick, or never if the scheduler is stopped.
    pub async fn wait(&mut self) {
        match &mut self.interval {
            Some(interval) => {
                interval.tick().await;
            }
            None => future::pending().await,
        }
    }
}
