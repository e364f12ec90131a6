use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use types::{Epoch, Slot};

/// A source of wall-clock time for the fork choice.
///
/// All slot and epoch arithmetic is done by `ForkChoice` against its genesis time, the clock only
/// reports the present time.
pub trait Clock: Send + Sync {
    /// Returns the present time as a duration since the UNIX epoch.
    ///
    /// Returns `None` if the present time is before the UNIX epoch (unlikely).
    fn now_duration(&self) -> Option<Duration>;
}

/// Reads the time from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeClock;

impl Clock for SystemTimeClock {
    fn now_duration(&self) -> Option<Duration> {
        SystemTime::now().duration_since(UNIX_EPOCH).ok()
    }
}

/// A clock which only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<RwLock<Duration>>,
}

impl ManualClock {
    pub fn new(now: Duration) -> Self {
        Self {
            now: Arc::new(RwLock::new(now)),
        }
    }

    pub fn set_current_time(&self, now: Duration) {
        *self.now.write() = now;
    }

    pub fn advance_time(&self, duration: Duration) {
        let mut now = self.now.write();
        *now = now.saturating_add(duration);
    }

    /// Set the time to `offset` into `slot`, for a chain which started at `genesis_time` seconds
    /// with slots of `seconds_per_slot`.
    pub fn set_slot(&self, genesis_time: u64, seconds_per_slot: u64, slot: Slot, offset: Duration) {
        let slot_start = Duration::from_secs(
            genesis_time.saturating_add(slot.as_u64().saturating_mul(seconds_per_slot)),
        );
        self.set_current_time(slot_start.saturating_add(offset));
    }
}

impl Clock for ManualClock {
    fn now_duration(&self) -> Option<Duration> {
        Some(*self.now.read())
    }
}

/// Slot arithmetic relative to a genesis time, in seconds since the UNIX epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SlotTimes {
    pub genesis_time: u64,
    pub seconds_per_slot: u64,
    pub slots_per_epoch: u64,
}

impl SlotTimes {
    /// The slot at `now`. Times before genesis are in slot 0.
    pub fn slot_of(&self, now: Duration) -> Slot {
        now.as_secs()
            .checked_sub(self.genesis_time)
            .and_then(|since_genesis| since_genesis.checked_div(self.seconds_per_slot))
            .map_or(Slot::new(0), Slot::new)
    }

    pub fn epoch_of(&self, now: Duration) -> Epoch {
        self.slot_of(now).epoch(self.slots_per_epoch)
    }

    /// The start of `slot` as a duration since the UNIX epoch.
    pub fn start_of(&self, slot: Slot) -> Duration {
        Duration::from_secs(
            self.genesis_time
                .saturating_add(slot.as_u64().saturating_mul(self.seconds_per_slot)),
        )
    }

    /// How far `now` is into `slot`, or zero if `slot` has not started.
    pub fn delay_into(&self, slot: Slot, now: Duration) -> Duration {
        now.saturating_sub(self.start_of(slot))
    }

    /// How far `slot` lies from the start of its epoch.
    pub fn slots_since_epoch_start(&self, slot: Slot) -> u64 {
        slot.as_u64()
            .checked_rem(self.slots_per_epoch)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMES: SlotTimes = SlotTimes {
        genesis_time: 100,
        seconds_per_slot: 12,
        slots_per_epoch: 32,
    };

    #[test]
    fn before_genesis_is_slot_zero() {
        assert_eq!(TIMES.slot_of(Duration::from_secs(0)), Slot::new(0));
        assert_eq!(TIMES.slot_of(Duration::from_secs(99)), Slot::new(0));
    }

    #[test]
    fn slot_and_epoch_of() {
        assert_eq!(TIMES.slot_of(Duration::from_secs(100)), Slot::new(0));
        assert_eq!(TIMES.slot_of(Duration::from_secs(111)), Slot::new(0));
        assert_eq!(TIMES.slot_of(Duration::from_secs(112)), Slot::new(1));
        assert_eq!(
            TIMES.epoch_of(Duration::from_secs(100 + 12 * 32)),
            Epoch::new(1)
        );
    }

    #[test]
    fn delay_into_slot() {
        let now = Duration::from_millis(112_500);
        assert_eq!(TIMES.delay_into(Slot::new(1), now), Duration::from_millis(500));
        assert_eq!(TIMES.delay_into(Slot::new(2), now), Duration::from_secs(0));
    }

    #[test]
    fn zero_slot_duration_does_not_panic() {
        let times = SlotTimes {
            seconds_per_slot: 0,
            slots_per_epoch: 0,
            ..TIMES
        };
        assert_eq!(times.slot_of(Duration::from_secs(1_000)), Slot::new(0));
        assert_eq!(times.slots_since_epoch_start(Slot::new(5)), 0);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(Duration::from_secs(5));
        let other = clock.clone();

        clock.advance_time(Duration::from_secs(2));
        assert_eq!(other.now_duration(), Some(Duration::from_secs(7)));

        other.set_slot(100, 12, Slot::new(2), Duration::from_secs(1));
        assert_eq!(clock.now_duration(), Some(Duration::from_secs(125)));
    }
}
