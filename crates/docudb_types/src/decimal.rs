//! Arbitrary precision decimal numbers with HALF_UP rounding.
//!
//! Fixed point columns (`DECIMAL(p, s)`) and the fractional seconds of
//! timestamps both route through [`Decimal::fit`], which rounds a value to a
//! declared scale and then checks that the result still fits the declared
//! precision.
//!
//! Precision is counted the way SQL engines report it for a literal: the number
//! of digits in the plain representation of the absolute value after trailing
//! zeros are stripped, so `0.05` has precision 3 and `20.00` has precision 2.

use crate::error::{TypeError, TypeResult};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Largest scale magnitude a parsed literal may carry. Rescaling materializes
/// one digit per unit of scale, so unbounded exponents are refused up front.
const MAX_LITERAL_SCALE: i32 = 4096;

/// An exact decimal value: `(-1)^negative * digits * 10^-scale`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal {
    negative: bool,
    /// Unscaled magnitude, ASCII digits without leading zeros ("0" for zero).
    digits: String,
    scale: i32,
}

impl Decimal {
    /// Zero with the given scale.
    #[must_use]
    pub fn zero(scale: i32) -> Self {
        Self {
            negative: false,
            digits: "0".to_string(),
            scale,
        }
    }

    /// Creates a decimal from an integer.
    #[must_use]
    pub fn from_i64(value: i64) -> Self {
        Self::new(value < 0, value.unsigned_abs().to_string(), 0)
    }

    /// Creates a decimal from the shortest representation of a double.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidFormat` error for NaN and infinities.
    pub fn from_f64(value: f64) -> TypeResult<Self> {
        if !value.is_finite() {
            return Err(TypeError::format("number", format!("{value} is not finite")));
        }
        format!("{value}").parse()
    }

    fn new(negative: bool, digits: String, scale: i32) -> Self {
        let trimmed = digits.trim_start_matches('0');
        let digits = if trimmed.is_empty() {
            "0".to_string()
        } else {
            trimmed.to_string()
        };
        let negative = negative && digits != "0";
        Self {
            negative,
            digits,
            scale,
        }
    }

    /// Number of digits to the right of the decimal point (may be negative).
    #[must_use]
    pub const fn scale(&self) -> i32 {
        self.scale
    }

    /// Whether the value is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.digits == "0"
    }

    /// Whether the value is strictly negative.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.negative
    }

    /// Rescales to `new_scale`, rounding HALF_UP when digits are dropped.
    #[must_use]
    pub fn set_scale(&self, new_scale: i32) -> Self {
        let shift = i64::from(new_scale) - i64::from(self.scale);
        if shift >= 0 {
            if self.is_zero() {
                return Self::zero(new_scale);
            }
            let pad = usize::try_from(shift).unwrap_or(usize::MAX);
            let mut digits = self.digits.clone();
            digits.extend(std::iter::repeat('0').take(pad));
            return Self::new(self.negative, digits, new_scale);
        }

        let len = self.digits.len();
        let drop = match usize::try_from(-shift) {
            Ok(drop) if drop <= len => drop,
            _ => return Self::zero(new_scale),
        };
        let (kept, dropped) = self.digits.split_at(len - drop);
        let round_up = dropped.as_bytes().first().is_some_and(|d| *d >= b'5');
        let kept = if kept.is_empty() { "0" } else { kept };
        let digits = if round_up {
            increment(kept)
        } else {
            kept.to_string()
        };
        Self::new(self.negative, digits, new_scale)
    }

    /// Removes trailing zeros from the unscaled value, lowering the scale.
    #[must_use]
    pub fn strip_trailing_zeros(&self) -> Self {
        if self.is_zero() {
            return Self::zero(0);
        }
        let trimmed = self.digits.trim_end_matches('0');
        let removed = i32::try_from(self.digits.len() - trimmed.len()).unwrap_or(i32::MAX);
        Self::new(
            self.negative,
            trimmed.to_string(),
            self.scale.saturating_sub(removed),
        )
    }

    /// Absolute value.
    #[must_use]
    pub fn abs(&self) -> Self {
        Self::new(false, self.digits.clone(), self.scale)
    }

    /// Plain (non-scientific) string form, keeping the scale's trailing zeros.
    #[must_use]
    pub fn to_plain_string(&self) -> String {
        let mut out = String::new();
        if self.negative {
            out.push('-');
        }
        if self.scale <= 0 {
            out.push_str(&self.digits);
            if !self.is_zero() {
                out.extend(std::iter::repeat('0').take(self.scale.unsigned_abs() as usize));
            }
            return out;
        }
        let scale = self.scale as usize;
        let padded = if self.digits.len() <= scale {
            let mut padded = "0".repeat(scale + 1 - self.digits.len());
            padded.push_str(&self.digits);
            padded
        } else {
            self.digits.clone()
        };
        let point = padded.len() - scale;
        out.push_str(&padded[..point]);
        out.push('.');
        out.push_str(&padded[point..]);
        out
    }

    /// Number of significant digits, counted on the stripped plain form.
    #[must_use]
    pub fn precision(&self) -> usize {
        let plain = self.strip_trailing_zeros().abs().to_plain_string();
        if plain.contains('.') {
            plain.len() - 1
        } else {
            plain.len()
        }
    }

    /// Rounds to `scale` (if given) and checks the result fits `precision`.
    ///
    /// Without a scale the value keeps its own scale and only the precision is
    /// checked.
    ///
    /// # Errors
    ///
    /// Returns `ConstraintViolation` if the rounded value needs more than
    /// `precision` digits.
    pub fn fit(&self, precision: u32, scale: Option<i32>) -> TypeResult<Self> {
        let rounded = match scale {
            Some(scale) => self.set_scale(scale),
            None => self.clone(),
        };
        let found = rounded.precision();
        if found > precision as usize {
            return Err(TypeError::constraint(format!(
                "found number with precision {found} but maximum permitted precision is {precision}"
            )));
        }
        Ok(rounded)
    }

    /// Rounds HALF_UP to at most `digits` significant digits.
    #[must_use]
    pub fn round_significant(&self, digits: u32) -> Self {
        let len = self.digits.len();
        if self.is_zero() || len <= digits as usize {
            return self.clone();
        }
        let excess = i32::try_from(len - digits as usize).unwrap_or(i32::MAX);
        self.set_scale(self.scale.saturating_sub(excess))
    }

    /// Lossy conversion to a double.
    #[must_use]
    pub fn to_f64(&self) -> f64 {
        self.to_plain_string().parse().unwrap_or(0.0)
    }

    /// Exact JSON number with the same digits and scale.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidFormat` error if the plain string is not accepted as a
    /// JSON number.
    pub fn to_json_number(&self) -> TypeResult<serde_json::Number> {
        serde_json::from_str::<serde_json::Number>(&self.to_plain_string())
            .map_err(|e| TypeError::format("number", e.to_string()))
    }

    fn cmp_magnitude(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        let a = self.set_scale(scale);
        let b = other.set_scale(scale);
        a.digits
            .len()
            .cmp(&b.digits.len())
            .then_with(|| a.digits.cmp(&b.digits))
    }
}

fn increment(digits: &str) -> String {
    let mut bytes = digits.as_bytes().to_vec();
    for byte in bytes.iter_mut().rev() {
        if *byte == b'9' {
            *byte = b'0';
        } else {
            *byte += 1;
            return String::from_utf8_lossy(&bytes).into_owned();
        }
    }
    let mut out = String::with_capacity(bytes.len() + 1);
    out.push('1');
    out.push_str(&String::from_utf8_lossy(&bytes));
    out
}

impl FromStr for Decimal {
    type Err = TypeError;

    fn from_str(s: &str) -> TypeResult<Self> {
        let invalid = || TypeError::format("number", format!("{s} is not a valid number"));
        let text = s.trim();
        let (negative, rest) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };
        let (mantissa, exponent) = match rest.find(['e', 'E']) {
            Some(pos) => {
                let exp: i32 = rest[pos + 1..].parse().map_err(|_| invalid())?;
                (&rest[..pos], exp)
            }
            None => (rest, 0),
        };
        let (int_part, frac_part) = match mantissa.split_once('.') {
            Some((int_part, frac_part)) => (int_part, frac_part),
            None => (mantissa, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        let scale = i32::try_from(frac_part.len())
            .ok()
            .and_then(|len| len.checked_sub(exponent))
            .filter(|scale| (-MAX_LITERAL_SCALE..=MAX_LITERAL_SCALE).contains(scale))
            .ok_or_else(invalid)?;
        Ok(Self::new(negative, format!("{int_part}{frac_part}"), scale))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_plain_string())
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => self.cmp_magnitude(other),
            (true, true) => other.cmp_magnitude(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn parse_and_print() {
        assert_eq!(d("19.999").to_plain_string(), "19.999");
        assert_eq!(d("-0.050").to_plain_string(), "-0.050");
        assert_eq!(d("1e3").to_plain_string(), "1000");
        assert_eq!(d("1.5E-2").to_plain_string(), "0.015");
        assert_eq!(d("+7").to_plain_string(), "7");
        assert_eq!(d(".5").to_plain_string(), "0.5");
        assert_eq!(d("-0").to_plain_string(), "0");
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<Decimal>().is_err());
        assert!("abc".parse::<Decimal>().is_err());
        assert!("1.2.3".parse::<Decimal>().is_err());
        assert!("1e".parse::<Decimal>().is_err());
        assert!(".".parse::<Decimal>().is_err());
    }

    #[test]
    fn exponents_are_bounded() {
        for literal in ["1e2147483647", "1e1000000000", "1e-2147483648", "1e4097", "1e-4097"] {
            assert!(
                matches!(literal.parse::<Decimal>(), Err(TypeError::InvalidFormat { .. })),
                "{literal} should be rejected"
            );
        }
        assert_eq!(d("1e4096").precision(), 4097);
        assert_eq!(d("1e-4096").scale(), 4096);
        // A long fraction pushes the scale past the bound too.
        let long = format!("0.{}", "1".repeat(4097));
        assert!(long.parse::<Decimal>().is_err());
    }

    #[test]
    fn rescaling_across_the_whole_range_does_not_overflow() {
        let value = d("1.5");
        assert!(value.set_scale(i32::MIN).is_zero());
        assert_eq!(d("-25").set_scale(i32::MIN).to_plain_string(), "0");
        let tiny = Decimal::zero(i32::MIN).strip_trailing_zeros();
        assert!(tiny.is_zero());
        assert_eq!(d("1e-4096").round_significant(1).scale(), 4096);
    }

    #[test]
    fn half_up_rounding() {
        assert_eq!(d("19.999").set_scale(2).to_plain_string(), "20.00");
        assert_eq!(d("2.345").set_scale(2).to_plain_string(), "2.35");
        assert_eq!(d("2.344").set_scale(2).to_plain_string(), "2.34");
        assert_eq!(d("-2.345").set_scale(2).to_plain_string(), "-2.35");
        assert_eq!(d("0.004").set_scale(2).to_plain_string(), "0.00");
        assert_eq!(d("0.005").set_scale(2).to_plain_string(), "0.01");
        assert_eq!(d("12").set_scale(2).to_plain_string(), "12.00");
    }

    #[test]
    fn negative_scale_rounding() {
        assert_eq!(d("1250").set_scale(-2).to_plain_string(), "1300");
        assert_eq!(d("999999999").set_scale(-9).to_plain_string(), "1000000000");
        assert_eq!(d("49").set_scale(-3).to_plain_string(), "0");
    }

    #[test]
    fn precision_counts_stripped_digits() {
        assert_eq!(d("20.00").precision(), 2);
        assert_eq!(d("0.05").precision(), 3);
        assert_eq!(d("-123.4500").precision(), 5);
        assert_eq!(d("1000").precision(), 4);
    }

    #[test]
    fn fit_checks_precision_after_rounding() {
        let fitted = d("19.999").fit(10, Some(2)).unwrap();
        assert_eq!(fitted.to_plain_string(), "20.00");
        assert!(matches!(
            d("123456.7").fit(4, Some(2)),
            Err(TypeError::ConstraintViolation { .. })
        ));
        assert_eq!(d("12.5").fit(3, None).unwrap().to_plain_string(), "12.5");
        // 999_999_999 ns rounded to whole seconds no longer fits 9 digits.
        assert!(d("999999999").fit(9, Some(-9)).is_err());
    }

    #[test]
    fn significant_digit_rounding() {
        assert_eq!(d("3.14159").round_significant(3).to_plain_string(), "3.14");
        assert_eq!(d("99.96").round_significant(3).to_plain_string(), "100.0");
        assert_eq!(d("12").round_significant(5).to_plain_string(), "12");
    }

    #[test]
    fn ordering_is_numeric() {
        assert!(d("2.5") > d("2.49"));
        assert!(d("-1") < d("0.001"));
        assert!(d("-2.5") < d("-2.49"));
        assert_eq!(d("1.50").cmp(&d("1.5")), Ordering::Equal);
        assert!(d("100") > d("99.999"));
    }

    #[test]
    fn json_number_keeps_scale() {
        let number = d("20.00").to_json_number().unwrap();
        assert_eq!(number.to_string(), "20.00");
    }

    #[test]
    fn from_f64_uses_shortest_form() {
        assert_eq!(Decimal::from_f64(19.999).unwrap().to_plain_string(), "19.999");
        assert!(Decimal::from_f64(f64::NAN).is_err());
    }
}
