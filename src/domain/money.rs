use std::fmt;

/// Money is represented as integer minor units (cents) to avoid floating-point issues.
/// For EUR/USD, 1 unit = 100 cents, so 50.00 = 5000 cents.
pub type Cents = i64;

/// Format cents as a human-readable currency string.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.unsigned_abs();
    let units = abs_cents / 100;
    let remainder = abs_cents % 100;
    format!("{}{}.{:02}", sign, units, remainder)
}

/// Parse a decimal string into cents.
/// Example: "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let (negative, input) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };

    let (units_str, decimal_str) = match input.split_once('.') {
        Some((units, decimals)) => (units, decimals),
        None => (input, ""),
    };

    if decimal_str.contains('.') || (units_str.is_empty() && decimal_str.is_empty()) {
        return Err(ParseCentsError::InvalidFormat);
    }
    if !units_str.chars().all(|c| c.is_ascii_digit())
        || !decimal_str.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?
    };

    // More than 2 decimal places are truncated
    let decimal_cents: i64 = match decimal_str.len() {
        0 => 0,
        1 => decimal_str.parse::<i64>().map_err(|_| ParseCentsError::InvalidFormat)? * 10,
        _ => decimal_str[..2]
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?,
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(decimal_cents))
        .ok_or(ParseCentsError::OutOfRange)?;
    Ok(if negative { -cents } else { cents })
}

/// Convert a raw numeric amount, already expressed in minor units, into cents.
///
/// This is the entry point for amounts arriving as plain numbers (JSON bodies,
/// form posts). Only finite, positive, whole values are accepted.
pub fn cents_from_number(value: f64) -> Result<Cents, ParseCentsError> {
    if !value.is_finite() {
        return Err(ParseCentsError::NotFinite);
    }
    if value <= 0.0 {
        return Err(ParseCentsError::NotPositive);
    }
    if value.fract() != 0.0 {
        return Err(ParseCentsError::FractionalMinorUnits);
    }
    // i64::MAX is not exactly representable; 2^63 is the first value past it
    if value >= 9_223_372_036_854_775_808.0 {
        return Err(ParseCentsError::OutOfRange);
    }
    Ok(value as Cents)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
    NotFinite,
    NotPositive,
    FractionalMinorUnits,
    OutOfRange,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::NotFinite => write!(f, "amount is not a finite number"),
            ParseCentsError::NotPositive => write!(f, "amount must be positive"),
            ParseCentsError::FractionalMinorUnits => {
                write!(f, "amount must be a whole number of minor units")
            }
            ParseCentsError::OutOfRange => write!(f, "amount is out of range"),
        }
    }
}

impl std::error::Error for ParseCentsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(5000), "50.00");
        assert_eq!(format_cents(1234), "12.34");
        assert_eq!(format_cents(1), "0.01");
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(-5000), "-50.00");
        assert_eq!(format_cents(-1), "-0.01");
    }

    #[test]
    fn test_parse_cents() {
        assert_eq!(parse_cents("50.00"), Ok(5000));
        assert_eq!(parse_cents("50"), Ok(5000));
        assert_eq!(parse_cents("12.5"), Ok(1250));
        assert_eq!(parse_cents(".50"), Ok(50));
        assert_eq!(parse_cents("-50.00"), Ok(-5000));
        assert_eq!(parse_cents("100.999"), Ok(10099)); // Truncates
    }

    #[test]
    fn test_parse_cents_invalid() {
        assert!(parse_cents("abc").is_err());
        assert!(parse_cents("12.34.56").is_err());
        assert!(parse_cents("").is_err());
        assert!(parse_cents("1.x").is_err());
        assert!(parse_cents("--5").is_err());
        assert!(parse_cents("-").is_err());
        assert_eq!(
            parse_cents("99999999999999999"),
            Err(ParseCentsError::OutOfRange)
        );
    }

    #[test]
    fn test_cents_from_number() {
        assert_eq!(cents_from_number(50.0), Ok(50));
        assert_eq!(cents_from_number(0.0), Err(ParseCentsError::NotPositive));
        assert_eq!(cents_from_number(-5.0), Err(ParseCentsError::NotPositive));
        assert_eq!(cents_from_number(f64::NAN), Err(ParseCentsError::NotFinite));
        assert_eq!(
            cents_from_number(f64::INFINITY),
            Err(ParseCentsError::NotFinite)
        );
        assert_eq!(
            cents_from_number(10.5),
            Err(ParseCentsError::FractionalMinorUnits)
        );
        assert_eq!(cents_from_number(1e19), Err(ParseCentsError::OutOfRange));
    }
}
