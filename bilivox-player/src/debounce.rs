//! Per-guild, per-action debounce and action locks
//!
//! Rapid duplicate commands (double-clicked UI buttons, repeated slash
//! commands) must not produce double state transitions. The gate tracks
//! when each (guild, action) pair last fired and drops repeats inside the
//! debounce window; action locks cover longer operations that must not
//! overlap.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use bilivox_common::GuildId;

/// Entry count past which expired timestamps are swept out.
const CLEANUP_THRESHOLD: usize = 100;

/// Timestamps older than this are considered expired during a sweep.
const STALE_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
pub struct CommandGate {
    locks: Mutex<HashSet<(GuildId, &'static str)>>,
    last_fired: Mutex<HashMap<(GuildId, &'static str), Instant>>,
}

impl CommandGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the action lock for this guild; false when already held.
    pub fn acquire(&self, guild: GuildId, action: &'static str) -> bool {
        self.locks
            .lock()
            .expect("command gate lock poisoned")
            .insert((guild, action))
    }

    pub fn release(&self, guild: GuildId, action: &'static str) {
        self.locks
            .lock()
            .expect("command gate lock poisoned")
            .remove(&(guild, action));
    }

    /// True when the same action already fired within `window` for this
    /// guild; otherwise records the current instant and lets it through.
    pub fn should_debounce(&self, guild: GuildId, action: &'static str, window: Duration) -> bool {
        let mut last_fired = self.last_fired.lock().expect("command gate lock poisoned");
        let now = Instant::now();
        if let Some(last) = last_fired.get(&(guild, action)) {
            if now.duration_since(*last) < window {
                return true;
            }
        }
        last_fired.insert((guild, action), now);
        if last_fired.len() > CLEANUP_THRESHOLD {
            last_fired.retain(|_, at| now.duration_since(*at) <= STALE_AFTER);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debounce_drops_rapid_repeats() {
        let gate = CommandGate::new();
        let guild = GuildId(1);
        let window = Duration::from_millis(200);

        assert!(!gate.should_debounce(guild, "skip", window));
        assert!(gate.should_debounce(guild, "skip", window));
    }

    #[test]
    fn debounce_is_per_guild_and_action() {
        let gate = CommandGate::new();
        let window = Duration::from_millis(200);

        assert!(!gate.should_debounce(GuildId(1), "skip", window));
        // Different action and different guild both pass
        assert!(!gate.should_debounce(GuildId(1), "previous", window));
        assert!(!gate.should_debounce(GuildId(2), "skip", window));
    }

    #[test]
    fn debounce_expires_after_window() {
        let gate = CommandGate::new();
        let guild = GuildId(1);
        let window = Duration::from_millis(10);

        assert!(!gate.should_debounce(guild, "skip", window));
        std::thread::sleep(Duration::from_millis(20));
        assert!(!gate.should_debounce(guild, "skip", window));
    }

    #[test]
    fn acquire_and_release() {
        let gate = CommandGate::new();
        let guild = GuildId(7);

        assert!(gate.acquire(guild, "play"));
        assert!(!gate.acquire(guild, "play"));
        gate.release(guild, "play");
        assert!(gate.acquire(guild, "play"));
    }
}
