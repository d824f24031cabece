//! Exact rational time.
//!
//! All tick offsets and durations are kept as reduced fractions so voices
//! with different tuplet ratios can be compared without floating-point
//! drift. `value()` exists for pixel geometry and cost math only.

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub};

use num_rational::Ratio;

use crate::error::{FormatError, Result};

/// A reduced fraction with a positive denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fraction(Ratio<i64>);

impl Fraction {
    /// Build `numerator / denominator`, failing on a zero denominator.
    pub fn new(numerator: i64, denominator: i64) -> Result<Self> {
        if denominator == 0 {
            return Err(FormatError::Arithmetic(format!(
                "{numerator}/0 has a zero denominator"
            )));
        }
        Ok(Fraction(Ratio::new(numerator, denominator)))
    }

    pub fn from_integer(n: i64) -> Self {
        Fraction(Ratio::from_integer(n))
    }

    pub fn zero() -> Self {
        Self::from_integer(0)
    }

    pub fn one() -> Self {
        Self::from_integer(1)
    }

    pub fn numerator(&self) -> i64 {
        *self.0.numer()
    }

    pub fn denominator(&self) -> i64 {
        *self.0.denom()
    }

    /// Multiply by `numerator / denominator`.
    pub fn multiply(self, numerator: i64, denominator: i64) -> Result<Self> {
        self.checked_mul(Fraction::new(numerator, denominator)?)
    }

    /// `self + rhs`, failing instead of overflowing.
    pub fn checked_add(self, rhs: Fraction) -> Result<Self> {
        narrow(self.wide() + rhs.wide(), || format!("{self} + {rhs} overflows"))
    }

    /// `self * rhs`, failing instead of overflowing.
    pub fn checked_mul(self, rhs: Fraction) -> Result<Self> {
        narrow(self.wide() * rhs.wide(), || format!("{self} * {rhs} overflows"))
    }

    fn wide(&self) -> Ratio<i128> {
        Ratio::new_raw(self.numerator() as i128, self.denominator() as i128)
    }

    pub fn is_zero(&self) -> bool {
        self.numerator() == 0
    }

    /// Floating approximation. Never use it to decide tick equality.
    pub fn value(&self) -> f64 {
        self.numerator() as f64 / self.denominator() as f64
    }

    /// Position of this fraction on an integer grid of `resolution` steps per
    /// tick. Fails if the fraction does not land exactly on the grid.
    pub fn scaled_to(&self, resolution: i64) -> Result<i64> {
        if resolution <= 0 || resolution % self.denominator() != 0 {
            return Err(FormatError::Arithmetic(format!(
                "{self} is not representable with resolution {resolution}"
            )));
        }
        self.numerator()
            .checked_mul(resolution / self.denominator())
            .ok_or_else(|| {
                FormatError::Arithmetic(format!("{self} overflows at resolution {resolution}"))
            })
    }
}

fn narrow(wide: Ratio<i128>, describe: impl FnOnce() -> String) -> Result<Fraction> {
    match (i64::try_from(*wide.numer()), i64::try_from(*wide.denom())) {
        (Ok(numer), Ok(denom)) => Ok(Fraction(Ratio::new_raw(numer, denom))),
        _ => Err(FormatError::Arithmetic(describe())),
    }
}

impl Default for Fraction {
    fn default() -> Self {
        Fraction::zero()
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator(), self.denominator())
    }
}

impl Add for Fraction {
    type Output = Fraction;

    fn add(self, rhs: Fraction) -> Fraction {
        Fraction(self.0 + rhs.0)
    }
}

impl AddAssign for Fraction {
    fn add_assign(&mut self, rhs: Fraction) {
        self.0 += rhs.0;
    }
}

impl Sub for Fraction {
    type Output = Fraction;

    fn sub(self, rhs: Fraction) -> Fraction {
        Fraction(self.0 - rhs.0)
    }
}

impl Mul for Fraction {
    type Output = Fraction;

    fn mul(self, rhs: Fraction) -> Fraction {
        Fraction(self.0 * rhs.0)
    }
}

/// Greatest common divisor of two integers (always non-negative).
pub fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Least common multiple of two integers. `lcm(0, n)` is `n`.
pub fn lcm(a: i64, b: i64) -> i64 {
    if a == 0 {
        return b.abs();
    }
    if b == 0 {
        return a.abs();
    }
    (a / gcd(a, b) * b).abs()
}

/// `lcm` that fails instead of overflowing.
pub fn checked_lcm(a: i64, b: i64) -> Result<i64> {
    if a == 0 || b == 0 {
        return Ok(lcm(a, b));
    }
    (a / gcd(a, b))
        .checked_mul(b)
        .map(i64::abs)
        .ok_or_else(|| FormatError::Arithmetic(format!("lcm({a}, {b}) overflows")))
}
