//! Exact numbers for constant folding. Rationals stay exact until they overflow, anything touching
//! a float becomes a float.

use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Always reduced with a positive denominator.
    Rational { numer: i64, denom: i64 },
    Float(f64),
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.abs()
}

impl Number {
    pub fn integer(n: i64) -> Self {
        Self::Rational { numer: n, denom: 1 }
    }

    pub fn zero() -> Self {
        Self::integer(0)
    }

    pub fn one() -> Self {
        Self::integer(1)
    }

    /// Reduced `numer / denom`. Returns `None` for a zero denominator.
    pub fn rational(numer: i64, denom: i64) -> Option<Self> {
        Self::from_i128(numer as i128, denom as i128)
    }

    fn from_i128(numer: i128, denom: i128) -> Option<Self> {
        if denom == 0 {
            return None;
        }
        let sign = if denom < 0 { -1 } else { 1 };
        let divisor = gcd(numer, denom).max(1);
        let numer = sign * numer / divisor;
        let denom = sign * denom / divisor;
        match (i64::try_from(numer), i64::try_from(denom)) {
            (Ok(numer), Ok(denom)) => Some(Self::Rational { numer, denom }),
            _ => Some(Self::Float(numer as f64 / denom as f64)),
        }
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Number::Rational { numer, denom } => numer as f64 / denom as f64,
            Number::Float(f) => f,
        }
    }

    pub fn is_zero(self) -> bool {
        self.to_f64() == 0.0
    }

    pub fn is_one(self) -> bool {
        matches!(self, Number::Rational { numer: 1, denom: 1 })
    }

    pub fn is_negative(self) -> bool {
        self.to_f64() < 0.0
    }

    pub fn as_integer(self) -> Option<i64> {
        match self {
            Number::Rational { numer, denom: 1 } => Some(numer),
            _ => None,
        }
    }

    pub fn add(self, other: Number) -> Number {
        match (self, other) {
            (
                Number::Rational { numer: a, denom: b },
                Number::Rational { numer: c, denom: d },
            ) => {
                let (a, b, c, d) = (a as i128, b as i128, c as i128, d as i128);
                Self::from_i128(a * d + c * b, b * d).unwrap_or(Number::Float(f64::NAN))
            }
            (l, r) => Number::Float(l.to_f64() + r.to_f64()),
        }
    }

    pub fn mul(self, other: Number) -> Number {
        match (self, other) {
            (
                Number::Rational { numer: a, denom: b },
                Number::Rational { numer: c, denom: d },
            ) => Self::from_i128(a as i128 * c as i128, b as i128 * d as i128)
                .unwrap_or(Number::Float(f64::NAN)),
            (l, r) => Number::Float(l.to_f64() * r.to_f64()),
        }
    }

    /// `self ** exponent`, or `None` when the result is not a plain real number (a zero base with
    /// a negative exponent, a negative base with a fractional exponent) or would stop being exact
    /// (a rational base with a fractional exponent, like `2 ** (1/2)`).
    pub fn pow(self, exponent: Number) -> Option<Number> {
        if self.is_zero() && exponent.is_negative() {
            return None;
        }
        match (self, exponent.as_integer()) {
            (Number::Rational { numer, denom }, Some(e)) => {
                let (numer, denom) = if e < 0 { (denom, numer) } else { (numer, denom) };
                let e = u32::try_from(e.unsigned_abs()).ok();
                let exact = e.and_then(|e| {
                    let n = (numer as i128).checked_pow(e)?;
                    let d = (denom as i128).checked_pow(e)?;
                    Self::from_i128(n, d)
                });
                Some(exact.unwrap_or_else(|| Number::Float(self.to_f64().powf(exponent.to_f64()))))
            }
            (Number::Rational { .. }, None) if matches!(exponent, Number::Rational { .. }) => None,
            (base, _) => {
                let value = base.to_f64().powf(exponent.to_f64());
                if value.is_nan() {
                    None
                } else {
                    Some(Number::Float(value))
                }
            }
        }
    }

    /// Remainder with the sign of the divisor. `None` when dividing by zero.
    pub fn modulo(self, divisor: Number) -> Option<Number> {
        if divisor.is_zero() {
            return None;
        }
        match (self, divisor) {
            (
                Number::Rational { numer: a, denom: b },
                Number::Rational { numer: c, denom: d },
            ) => {
                let (a, b, c, d) = (a as i128, b as i128, c as i128, d as i128);
                // a/b mod c/d == ((a*d) mod (c*b)) / (b*d)
                let divisor = c * b;
                let remainder = (a * d).rem_euclid(divisor);
                let remainder = if divisor < 0 && remainder != 0 {
                    remainder + divisor
                } else {
                    remainder
                };
                Self::from_i128(remainder, b * d)
            }
            (l, r) => {
                let (l, r) = (l.to_f64(), r.to_f64());
                Some(Number::Float(l - r * (l / r).floor()))
            }
        }
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::Rational { numer, denom: 1 } => write!(f, "{numer}"),
            Number::Rational { numer, denom } => write!(f, "{numer}/{denom}"),
            Number::Float(x) => write!(f, "{x:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(n: i64, d: i64) -> Number {
        Number::rational(n, d).unwrap()
    }

    #[test]
    fn rationals_reduce() {
        assert_eq!(r(2, 4), r(1, 2));
        assert_eq!(r(3, -6), Number::Rational { numer: -1, denom: 2 });
        assert_eq!(Number::rational(1, 0), None);
    }

    #[test]
    fn arithmetic_stays_exact() {
        assert_eq!(r(1, 3).add(r(1, 6)), r(1, 2));
        assert_eq!(r(2, 3).mul(Number::integer(3)), Number::integer(2));
        assert_eq!(Number::integer(1).add(Number::Float(0.5)), Number::Float(1.5));
    }

    #[test]
    fn powers() {
        assert_eq!(Number::integer(2).pow(Number::integer(-1)), Some(r(1, 2)));
        assert_eq!(r(2, 3).pow(Number::integer(2)), Some(r(4, 9)));
        assert_eq!(Number::integer(2).pow(r(1, 2)), None);
        assert_eq!(Number::zero().pow(Number::integer(-2)), None);
        assert_eq!(Number::Float(4.0).pow(r(1, 2)), Some(Number::Float(2.0)));
        assert_eq!(
            Number::integer(10).pow(Number::integer(30)),
            Some(Number::Float(1e30))
        );
    }

    #[test]
    fn modulo_takes_sign_of_divisor() {
        assert_eq!(Number::integer(7).modulo(Number::integer(3)), Some(Number::integer(1)));
        assert_eq!(Number::integer(-7).modulo(Number::integer(3)), Some(Number::integer(2)));
        assert_eq!(Number::integer(7).modulo(Number::integer(-3)), Some(Number::integer(-2)));
        assert_eq!(r(7, 2).modulo(Number::integer(2)), Some(r(3, 2)));
        assert_eq!(Number::integer(1).modulo(Number::zero()), None);
    }
}
