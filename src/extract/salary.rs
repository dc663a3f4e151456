use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// ISO 4217 codes recognized in front of an amount.
const CURRENCY_CODES: &[&str] = &[
    "NGN", "GHS", "KES", "ZAR", "EGP", "UGX", "TZS", "RWF", "XOF", "XAF", "MAD", "USD", "EUR",
    "GBP", "CAD", "AUD", "CHF", "AED", "INR", "JPY", "CNY",
];

/// `<CODE|symbol> <amount>[ - <CODE|symbol>? <amount>]`
static SALARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    let codes = CURRENCY_CODES.join("|");
    Regex::new(&format!(
        r"(?x)
        (?:\b(?P<code>{codes})\s*|(?P<sym>[₦$£€])\s*)
        (?P<min>\d[\d,]*(?:\.\d+)?)
        (?:\s*[-–—]\s*(?:(?:{codes})\s*|[₦$£€]\s*)?(?P<max>\d[\d,]*(?:\.\d+)?))?
        "
    ))
    .expect("salary pattern is valid")
});

/// A recognized pay figure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub currency_code: String,
    pub min_amount: u64,
    pub max_amount: Option<u64>,
}

impl SalaryRange {
    pub fn new(currency_code: impl Into<String>, min_amount: u64, max_amount: Option<u64>) -> Self {
        // A range that starts and ends on the same figure is a single amount
        let max_amount = max_amount.filter(|max| *max != min_amount);
        Self {
            currency_code: currency_code.into(),
            min_amount,
            max_amount,
        }
    }

    /// Find the first salary figure in a line of text.
    pub fn parse(line: &str) -> Option<Self> {
        Self::find(line).map(|(salary, _)| salary)
    }

    /// Like [`SalaryRange::parse`], also returning the byte span it matched.
    pub fn find(line: &str) -> Option<(Self, Range<usize>)> {
        let caps = SALARY_RE.captures(line)?;
        let span = caps.get(0)?.range();

        let currency = match (caps.name("code"), caps.name("sym")) {
            (Some(code), _) => code.as_str().to_string(),
            (None, Some(sym)) => symbol_to_code(sym.as_str())?.to_string(),
            (None, None) => return None,
        };

        let min = parse_amount(caps.name("min")?.as_str())?;
        let max = caps.name("max").and_then(|m| parse_amount(m.as_str()));

        Some((Self::new(currency, min, max), span))
    }
}

impl fmt::Display for SalaryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.currency_code, group_thousands(self.min_amount))?;
        if let Some(max) = self.max_amount {
            write!(f, " - {} {}", self.currency_code, group_thousands(max))?;
        }
        Ok(())
    }
}

fn symbol_to_code(symbol: &str) -> Option<&'static str> {
    match symbol {
        "₦" => Some("NGN"),
        "$" => Some("USD"),
        "£" => Some("GBP"),
        "€" => Some("EUR"),
        _ => None,
    }
}

/// Whole units only; any fractional part is dropped.
pub fn parse_amount(raw: &str) -> Option<u64> {
    let whole = raw.split('.').next().unwrap_or(raw);
    let digits: String = whole.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// `1234567` -> `1,234,567`
pub fn group_thousands(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        let salary = SalaryRange::parse("NGN 150,000 - 250,000").unwrap();
        assert_eq!(salary, SalaryRange::new("NGN", 150_000, Some(250_000)));
        assert_eq!(salary.to_string(), "NGN 150,000 - NGN 250,000");
    }

    #[test]
    fn test_parse_single_amount() {
        let salary = SalaryRange::parse("NGN 80,000").unwrap();
        assert_eq!(salary.max_amount, None);
        assert_eq!(salary.to_string(), "NGN 80,000");
        assert!(!salary.to_string().contains(" - "));
    }

    #[test]
    fn test_parse_repeated_code_and_symbols() {
        assert_eq!(
            SalaryRange::parse("Pay: NGN 75,000 - NGN 100,000 monthly").unwrap().to_string(),
            "NGN 75,000 - NGN 100,000"
        );
        assert_eq!(
            SalaryRange::parse("₦1200000.50").unwrap(),
            SalaryRange::new("NGN", 1_200_000, None)
        );
        assert_eq!(SalaryRange::parse("$90,000 – $120,000").unwrap().currency_code, "USD");
    }

    #[test]
    fn test_parse_rejects_plain_text() {
        assert!(SalaryRange::parse("Lagos Full Time").is_none());
        assert!(SalaryRange::parse("150,000").is_none());
        assert!(SalaryRange::parse("Confidential").is_none());
        assert!(SalaryRange::parse("ICT 3").is_none());
        assert!(SalaryRange::parse("Level 2 ABC 400").is_none());
    }

    #[test]
    fn test_find_reports_span() {
        let line = "Lagos NGN 80,000 monthly";
        let (salary, span) = SalaryRange::find(line).unwrap();
        assert_eq!(salary, SalaryRange::new("NGN", 80_000, None));
        assert_eq!(&line[span], "NGN 80,000");
    }

    #[test]
    fn test_equal_bounds_collapse() {
        assert_eq!(SalaryRange::new("NGN", 5, Some(5)).to_string(), "NGN 5");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }
}
