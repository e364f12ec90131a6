//! The `Slot` and `Epoch` types are defined as new types over u64 to enforce type-safety between
//! the two types.
//!
//! `Slot` and `Epoch` have implementations which permit conversion, comparison and math operations
//! between each and `u64`, however specifically not between each other.
//!
//! All math operations on `Slot` and `Epoch` are saturating, they never wrap.
//!
//! It would be easy to define `PartialOrd` and other traits generically across all types which
//! implement `Into<u64>`, however this would allow operations between `Slots` and `Epochs` which
//! may lead to programming errors which are not detected by the compiler.
use serde_derive::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

#[derive(Eq, Clone, Copy, Default, Serialize, Deserialize, Hash)]
#[serde(transparent)]
pub struct Slot(u64);

#[derive(Eq, Clone, Copy, Default, Serialize, Deserialize, Hash)]
#[serde(transparent)]
pub struct Epoch(u64);

macro_rules! impl_common {
    ($main: ident) => {
        impl $main {
            pub const fn new(n: u64) -> $main {
                $main(n)
            }

            pub const fn as_u64(&self) -> u64 {
                self.0
            }

            pub fn saturating_sub<T: Into<$main>>(&self, other: T) -> $main {
                $main(self.0.saturating_sub(other.into().0))
            }

            pub fn saturating_add<T: Into<$main>>(&self, other: T) -> $main {
                $main(self.0.saturating_add(other.into().0))
            }
        }

        impl From<u64> for $main {
            fn from(n: u64) -> $main {
                $main(n)
            }
        }

        impl From<$main> for u64 {
            fn from(value: $main) -> u64 {
                value.0
            }
        }

        impl fmt::Display for $main {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $main {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}({})", stringify!($main), self.0)
            }
        }

        impl_math_between!($main, $main);
        impl_math_between!($main, u64);
    };
}

macro_rules! impl_math_between {
    ($main: ident, $other: ident) => {
        impl PartialOrd<$other> for $main {
            /// Utilizes `partial_cmp` on the underlying `u64`.
            fn partial_cmp(&self, other: &$other) -> Option<Ordering> {
                Some(self.0.cmp(&u64::from(*other)))
            }
        }

        impl PartialEq<$other> for $main {
            fn eq(&self, other: &$other) -> bool {
                self.0 == u64::from(*other)
            }
        }

        impl Add<$other> for $main {
            type Output = $main;

            fn add(self, other: $other) -> $main {
                $main(self.0.saturating_add(u64::from(other)))
            }
        }

        impl AddAssign<$other> for $main {
            fn add_assign(&mut self, other: $other) {
                self.0 = self.0.saturating_add(u64::from(other));
            }
        }

        impl Sub<$other> for $main {
            type Output = $main;

            fn sub(self, other: $other) -> $main {
                $main(self.0.saturating_sub(u64::from(other)))
            }
        }

        impl SubAssign<$other> for $main {
            fn sub_assign(&mut self, other: $other) {
                self.0 = self.0.saturating_sub(u64::from(other));
            }
        }
    };
}

impl_common!(Slot);
impl_common!(Epoch);

impl Ord for Slot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl Ord for Epoch {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl Slot {
    pub fn epoch(self, slots_per_epoch: u64) -> Epoch {
        self.0
            .checked_div(slots_per_epoch)
            .map_or(Epoch::new(0), Epoch::new)
    }
}

impl Epoch {
    /// The first slot in the epoch.
    pub fn start_slot(self, slots_per_epoch: u64) -> Slot {
        Slot::from(self.0.saturating_mul(slots_per_epoch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_epoch_conversion() {
        let slots_per_epoch = 32;

        assert_eq!(Slot::new(0).epoch(slots_per_epoch), Epoch::new(0));
        assert_eq!(Slot::new(31).epoch(slots_per_epoch), Epoch::new(0));
        assert_eq!(Slot::new(32).epoch(slots_per_epoch), Epoch::new(1));
        assert_eq!(Slot::new(65).epoch(slots_per_epoch), Epoch::new(2));
    }

    #[test]
    fn zero_slots_per_epoch_does_not_panic() {
        assert_eq!(Slot::new(100).epoch(0), Epoch::new(0));
    }

    #[test]
    fn start_slots() {
        let slots_per_epoch = 8;

        assert_eq!(Epoch::new(0).start_slot(slots_per_epoch), Slot::new(0));
        assert_eq!(Epoch::new(3).start_slot(slots_per_epoch), Slot::new(24));
        assert_eq!(
            Epoch::new(u64::MAX).start_slot(slots_per_epoch),
            Slot::new(u64::MAX)
        );
    }

    #[test]
    fn math_saturates() {
        assert_eq!(Slot::new(1) - 2, Slot::new(0));
        assert_eq!(Slot::new(u64::MAX) + 1, Slot::new(u64::MAX));
        assert_eq!(Epoch::new(3) - Epoch::new(1), Epoch::new(2));
        assert_eq!(Epoch::new(5).saturating_sub(7u64), Epoch::new(0));

        let mut slot = Slot::new(10);
        slot += 5;
        assert_eq!(slot, 15);
        slot -= 20;
        assert_eq!(slot, 0);
    }

    #[test]
    fn ordering_with_u64() {
        assert!(Slot::new(3) > 2);
        assert!(Epoch::new(3) < Epoch::new(4));
        assert_eq!(Slot::new(9).saturating_add(Slot::new(1)), 10);
    }
}
