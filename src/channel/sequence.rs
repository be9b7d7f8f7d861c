use std::fmt::{Display, Formatter};
use std::ops::{Add, AddAssign, Sub};

/// Per-channel packet sequence number. This is a logical counter - it is wide enough that it
///  does not overflow in a realistic session, and wrap-around happens only in the modulo
///  addressing of the window slots.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct SequenceNumber(u64);

impl Display for SequenceNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SequenceNumber {
    pub const ZERO: SequenceNumber = SequenceNumber(0);

    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn to_raw(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> SequenceNumber {
        *self + 1
    }
}

impl Add<u64> for SequenceNumber {
    type Output = SequenceNumber;

    fn add(self, rhs: u64) -> Self::Output {
        SequenceNumber(self.0.saturating_add(rhs))
    }
}

impl AddAssign<u64> for SequenceNumber {
    fn add_assign(&mut self, rhs: u64) {
        *self = *self + rhs;
    }
}

impl Sub for SequenceNumber {
    type Output = u64;

    /// distance between two sequence numbers, 0 if `rhs` is ahead of `self`
    fn sub(self, rhs: SequenceNumber) -> Self::Output {
        self.0.saturating_sub(rhs.0)
    }
}
