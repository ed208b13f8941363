use std::fmt;
use std::str::FromStr;

use crate::error::PortalError;

/// Single-digit prefixes assigned to individual and collective taxpayers.
const PREFIXES_ONE: [&str; 6] = ["1", "2", "3", "5", "6", "8"];
/// Two-digit prefixes for special issuing categories.
const PREFIXES_TWO: [&str; 12] = [
    "45", "70", "71", "72", "74", "75", "77", "79", "90", "91", "98", "99",
];

/// Check a candidate taxpayer number (NIF) against the mod-11 check digit scheme.
///
/// Accepts anything printable (strings or plain integers). Never fails: input
/// that is not a 9-digit string with a known prefix is simply invalid.
///
/// `100000002` is a documented test number that is never assigned.
pub fn is_valid_nif<T: ToString + ?Sized>(value: &T) -> bool {
    let nif = value.to_string();
    if nif.chars().count() != 9 {
        return false;
    }

    let one = nif.get(..1).is_some_and(|p| PREFIXES_ONE.contains(&p));
    let two = nif.get(..2).is_some_and(|p| PREFIXES_TWO.contains(&p));
    if !one && !two {
        return false;
    }

    let digits: Option<Vec<u32>> = nif.chars().map(|c| c.to_digit(10)).collect();
    let Some(digits) = digits else {
        return false;
    };

    let total: u32 = digits[..8]
        .iter()
        .zip((2..=9).rev())
        .map(|(d, w)| d * w)
        .sum();
    let modulo11 = total % 11;
    let check_digit = if modulo11 < 2 { 0 } else { 11 - modulo11 };

    digits[8] == check_digit
}

/// A taxpayer number that passed [`is_valid_nif`]. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nif(String);

impl Nif {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Nif {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_valid_nif(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(PortalError::Validation(s.to_string()))
        }
    }
}

impl fmt::Display for Nif {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Tests ──
