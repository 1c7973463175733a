//! Length parsing, formatting, and the canonical internal unit.
//!
//! Everything inside the engine is a [`Length`]: a signed count of
//! nanometres. 1 mm = 1_000_000 nm and 1 in = 25_400_000 nm, so every inch
//! fraction down to 1/64 and every metric entry down to six decimal places
//! converts exactly. Unit conversion happens only here, at the system
//! boundary; repeated conversions elsewhere cannot accumulate error.

use crate::error::ParseError;
use crate::util::div_round_half_away;
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Nanometres per millimetre.
pub const NM_PER_MM: i64 = 1_000_000;
/// Nanometres per inch (25.4 mm exactly).
pub const NM_PER_INCH: i64 = 25_400_000;

/// Unit mode for operator-facing text; internal values are always canonical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitMode {
    Inch,
    Metric,
}

/// Canonical length: signed nanometres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Length(i64);

impl Length {
    pub const ZERO: Length = Length(0);

    #[inline]
    pub const fn from_nm(nm: i64) -> Self {
        Length(nm)
    }

    #[inline]
    pub const fn from_mm(mm: i64) -> Self {
        Length(mm * NM_PER_MM)
    }

    #[inline]
    pub const fn from_inches(inches: i64) -> Self {
        Length(inches * NM_PER_INCH)
    }

    #[inline]
    pub const fn as_nm(self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn abs(self) -> Self {
        Length(self.0.abs())
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl Add for Length {
    type Output = Length;
    #[inline]
    fn add(self, rhs: Length) -> Length {
        Length(self.0 + rhs.0)
    }
}

impl Sub for Length {
    type Output = Length;
    #[inline]
    fn sub(self, rhs: Length) -> Length {
        Length(self.0 - rhs.0)
    }
}

impl Neg for Length {
    type Output = Length;
    #[inline]
    fn neg(self) -> Length {
        Length(-self.0)
    }
}

impl AddAssign for Length {
    #[inline]
    fn add_assign(&mut self, rhs: Length) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Length {
    #[inline]
    fn sub_assign(&mut self, rhs: Length) {
        self.0 -= rhs.0;
    }
}

impl fmt::Display for Length {
    /// Millimetres at micrometre precision, mainly for logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}mm", format_length(*self, UnitMode::Metric, 3))
    }
}

/// Parse an operator-entered length.
///
/// Metric mode accepts a plain decimal in millimetres (`"152.4"`, up to six
/// decimal places). Inch mode accepts a whole number (`"12"`), a fraction
/// (`"3/8"`), a mixed form (`"12-3/4"`), or a decimal (`"0.5"`).
///
/// Fails with [`ParseError::InvalidFormat`] on anything outside that grammar
/// (zero denominators included) and [`ParseError::OutOfRange`] when the
/// value converts to more than `max`.
pub fn parse_length(text: &str, mode: UnitMode, max: Length) -> Result<Length, ParseError> {
    let s = text.trim();
    if s.is_empty() {
        return Err(ParseError::InvalidFormat("empty input"));
    }
    let nm = match mode {
        UnitMode::Metric => parse_decimal(s, NM_PER_MM)?,
        UnitMode::Inch => parse_inch(s)?,
    };
    if nm > i128::from(max.as_nm()) {
        return Err(ParseError::OutOfRange);
    }
    // Grammar admits no sign, so nm is non-negative and the max check above
    // bounds it within i64.
    Ok(Length::from_nm(nm as i64))
}

fn parse_inch(s: &str) -> Result<i128, ParseError> {
    if let Some((whole, frac)) = s.split_once('-') {
        if whole.is_empty() {
            return Err(ParseError::InvalidFormat("missing whole part"));
        }
        let whole_nm = digits(whole)? * i128::from(NM_PER_INCH);
        Ok(whole_nm + parse_fraction(frac)?)
    } else if s.contains('/') {
        parse_fraction(s)
    } else {
        parse_decimal(s, NM_PER_INCH)
    }
}

/// `N/D` inches, rounded to the nearest nanometre (ties away from zero).
fn parse_fraction(s: &str) -> Result<i128, ParseError> {
    let Some((num, den)) = s.split_once('/') else {
        return Err(ParseError::InvalidFormat("expected a fraction"));
    };
    let num = digits(num)?;
    let den = digits(den)?;
    if den == 0 {
        return Err(ParseError::InvalidFormat("zero denominator"));
    }
    Ok(div_round_half_away(num * i128::from(NM_PER_INCH), den))
}

/// `W` or `W.F` in the given unit (`nm_per_unit` nanometres per whole unit).
fn parse_decimal(s: &str, nm_per_unit: i64) -> Result<i128, ParseError> {
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(ParseError::InvalidFormat("no digits"));
    }
    if s.contains('.') && frac.is_empty() {
        return Err(ParseError::InvalidFormat("trailing decimal point"));
    }
    if frac.len() > 6 {
        return Err(ParseError::InvalidFormat("too many decimal places"));
    }
    let whole = if whole.is_empty() { 0 } else { digits(whole)? };
    let mut nm = whole * i128::from(nm_per_unit);
    if !frac.is_empty() {
        let scale = 10_i128.pow(frac.len() as u32);
        nm += div_round_half_away(digits(frac)? * i128::from(nm_per_unit), scale);
    }
    Ok(nm)
}

/// Strict non-empty ASCII-digit run. Length-capped so the i128 arithmetic
/// above cannot overflow; anything longer is out of range anyway.
fn digits(s: &str) -> Result<i128, ParseError> {
    if s.is_empty() {
        return Err(ParseError::InvalidFormat("missing digits"));
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidFormat("unexpected character"));
    }
    if s.len() > 18 {
        return Err(ParseError::OutOfRange);
    }
    Ok(s.bytes().fold(0_i128, |acc, b| {
        acc * 10 + i128::from(b - b'0')
    }))
}

/// Format a canonical length for display; the inverse of [`parse_length`] up
/// to the rounding the precision implies.
///
/// In inch mode `precision` is the fraction denominator (e.g. 16 for
/// sixteenths) and the output is `W`, `N/D`, or `W-N/D` with the fraction
/// reduced. In metric mode `precision` is the number of decimal places
/// (0..=6). Rounding is always half away from zero.
pub fn format_length(len: Length, mode: UnitMode, precision: u32) -> String {
    match mode {
        UnitMode::Inch => format_inch(len, precision.max(1)),
        UnitMode::Metric => format_metric(len, precision.min(6)),
    }
}

fn format_inch(len: Length, denominator: u32) -> String {
    let den = i128::from(denominator);
    let ticks = div_round_half_away(i128::from(len.as_nm()) * den, i128::from(NM_PER_INCH));
    let sign = if ticks < 0 { "-" } else { "" };
    let ticks = ticks.unsigned_abs();
    let whole = ticks / denominator as u128;
    let num = ticks % denominator as u128;
    if num == 0 {
        return format!("{sign}{whole}");
    }
    let g = crate::util::gcd_u64(num as u64, u64::from(denominator));
    let (num, den) = (num as u64 / g, u64::from(denominator) / g);
    if whole == 0 {
        format!("{sign}{num}/{den}")
    } else {
        format!("{sign}{whole}-{num}/{den}")
    }
}

fn format_metric(len: Length, decimals: u32) -> String {
    let unit = 10_i128.pow(6 - decimals);
    let scaled = div_round_half_away(i128::from(len.as_nm()), unit);
    let sign = if scaled < 0 { "-" } else { "" };
    let scaled = scaled.unsigned_abs();
    if decimals == 0 {
        return format!("{sign}{scaled}");
    }
    let pow = 10_u128.pow(decimals);
    let whole = scaled / pow;
    let frac = scaled % pow;
    format!("{sign}{whole}.{frac:0width$}", width = decimals as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: Length = Length::from_mm(10_000);

    #[test]
    fn inch_constant_is_exact() {
        assert_eq!(Length::from_inches(1).as_nm(), 25_400_000);
        assert_eq!(Length::from_mm(254).as_nm(), Length::from_inches(10).as_nm());
    }

    #[test]
    fn mixed_fraction_parses_exactly() {
        let l = parse_length("12-3/4", UnitMode::Inch, MAX).unwrap();
        assert_eq!(l.as_nm(), 12 * NM_PER_INCH + (3 * NM_PER_INCH) / 4);
    }

    #[test]
    fn sixty_fourths_are_exact() {
        let l = parse_length("1/64", UnitMode::Inch, MAX).unwrap();
        assert_eq!(l.as_nm(), 396_875);
    }

    #[test]
    fn metric_decimal_parses_exactly() {
        let l = parse_length("152.4", UnitMode::Metric, MAX).unwrap();
        assert_eq!(l, Length::from_inches(6));
    }

    #[test]
    fn format_reduces_fractions() {
        let l = parse_length("12-12/16", UnitMode::Inch, MAX).unwrap();
        assert_eq!(format_length(l, UnitMode::Inch, 16), "12-3/4");
    }

    #[test]
    fn negative_lengths_format_with_sign() {
        let l = Length::from_nm(-(NM_PER_INCH * 3 / 8));
        assert_eq!(format_length(l, UnitMode::Inch, 16), "-3/8");
        assert_eq!(format_length(Length::from_mm(-1), UnitMode::Metric, 2), "-1.00");
    }
}
