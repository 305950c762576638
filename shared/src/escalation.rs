//! Auto-call countdown.
//!
//! Counts down once per second while the session is active and online. When
//! the count reaches zero the emergency number is dialed, exactly once. An
//! explicit cancel (or a manual call) disarms it for the rest of the session.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationState {
    Counting,
    Fired,
    Cancelled,
}

/// Outcome of one second of countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationTick {
    /// Offline: the count holds where it is.
    Suppressed,
    Counting { remaining: u8 },
    /// The count just reached zero. Dial now.
    Fire,
    /// Already fired or cancelled.
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoEscalation {
    start: u8,
    remaining: u8,
    state: EscalationState,
}

impl AutoEscalation {
    #[must_use]
    pub fn new(start: u8) -> Self {
        let start = start.max(1);
        Self {
            start,
            remaining: start,
            state: EscalationState::Counting,
        }
    }

    pub fn tick(&mut self, online: bool) -> EscalationTick {
        if self.state != EscalationState::Counting {
            return EscalationTick::Idle;
        }
        if !online {
            return EscalationTick::Suppressed;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.state = EscalationState::Fired;
            EscalationTick::Fire
        } else {
            EscalationTick::Counting {
                remaining: self.remaining,
            }
        }
    }

    /// Disarms a pending countdown. Returns `false` if it had already fired
    /// or was already cancelled.
    pub fn cancel(&mut self) -> bool {
        if self.state == EscalationState::Counting {
            self.state = EscalationState::Cancelled;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub const fn remaining(&self) -> u8 {
        self.remaining
    }

    #[must_use]
    pub const fn start(&self) -> u8 {
        self.start
    }

    #[must_use]
    pub const fn state(&self) -> EscalationState {
        self.state
    }

    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.state == EscalationState::Fired
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.state == EscalationState::Counting
    }
}

impl Default for AutoEscalation {
    fn default() -> Self {
        Self::new(crate::AUTO_CALL_COUNTDOWN_START)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fires_on_tenth_online_tick() {
        let mut esc = AutoEscalation::new(10);
        for expected in (1..10).rev() {
            assert_eq!(esc.tick(true), EscalationTick::Counting { remaining: expected });
        }
        assert_eq!(esc.tick(true), EscalationTick::Fire);
        assert!(esc.has_fired());
        assert_eq!(esc.remaining(), 0);
    }

    #[test]
    fn never_fires_twice() {
        let mut esc = AutoEscalation::new(3);
        let fires = (0..50)
            .filter(|_| esc.tick(true) == EscalationTick::Fire)
            .count();
        assert_eq!(fires, 1);
        assert_eq!(esc.remaining(), 0);
    }

    #[test]
    fn cancel_before_zero_prevents_fire() {
        let mut esc = AutoEscalation::new(10);
        for _ in 0..7 {
            esc.tick(true);
        }
        assert_eq!(esc.remaining(), 3);
        assert!(esc.cancel());
        for _ in 0..100 {
            assert_eq!(esc.tick(true), EscalationTick::Idle);
        }
        assert!(!esc.has_fired());
        assert!(!esc.cancel());
    }

    #[test]
    fn offline_holds_the_count() {
        let mut esc = AutoEscalation::new(10);
        esc.tick(true);
        esc.tick(true);
        for _ in 0..30 {
            assert_eq!(esc.tick(false), EscalationTick::Suppressed);
        }
        assert_eq!(esc.remaining(), 8);
        assert!(esc.is_armed());
        assert_eq!(esc.tick(true), EscalationTick::Counting { remaining: 7 });
    }

    #[test]
    fn cancel_after_fire_is_noop() {
        let mut esc = AutoEscalation::new(1);
        assert_eq!(esc.tick(true), EscalationTick::Fire);
        assert!(!esc.cancel());
        assert_eq!(esc.state(), EscalationState::Fired);
    }

    proptest! {
        #[test]
        fn fires_at_most_once_and_only_after_enough_online_ticks(
            ticks in prop::collection::vec(any::<bool>(), 0..60),
            cancel_at in prop::option::of(0usize..60),
        ) {
            let mut esc = AutoEscalation::new(10);
            let mut online_ticks = 0usize;
            let mut fires = 0usize;
            for (i, online) in ticks.iter().enumerate() {
                if cancel_at == Some(i) {
                    esc.cancel();
                }
                if esc.is_armed() && *online {
                    online_ticks += 1;
                }
                if esc.tick(*online) == EscalationTick::Fire {
                    fires += 1;
                    prop_assert_eq!(online_ticks, 10);
                }
            }
            prop_assert!(fires <= 1);
            prop_assert!(esc.remaining() <= 10);
        }
    }
}
