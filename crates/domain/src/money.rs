//! Money amounts in integer minor units.

use serde::{Deserialize, Serialize};

/// Money amount represented in cents to avoid floating point issues.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = 10.00)
    cents: i64,
}

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates an amount from whole currency units.
    pub fn from_units(units: i64) -> Self {
        Self {
            cents: units * 100,
        }
    }

    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the whole-unit portion.
    pub fn units(&self) -> i64 {
        self.cents / 100
    }

    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u64) -> Money {
        Money {
            cents: self.cents * quantity as i64,
        }
    }

    /// Takes a whole-number percentage, rounding down.
    pub fn percent(&self, percentage: u32) -> Money {
        Money {
            cents: self.cents * i64::from(percentage) / 100,
        }
    }

    /// Splits the amount evenly over `count`, rounding down. Zero for a zero count.
    pub fn divide(&self, count: u64) -> Money {
        if count == 0 {
            return Money::zero();
        }
        Money {
            cents: self.cents / count as i64,
        }
    }

    /// How many whole `step` amounts fit in this amount. Zero if `step` is not positive.
    pub fn whole_multiples_of(&self, step: Money) -> u64 {
        if step.cents <= 0 || self.cents <= 0 {
            return 0;
        }
        (self.cents / step.cents) as u64
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        write!(
            f,
            "{sign}{}.{:02}",
            self.units().abs(),
            (self.cents % 100).abs()
        )
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents + rhs.cents,
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents - rhs.cents,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents += rhs.cents;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}
