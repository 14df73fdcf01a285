//! Storage quantity arithmetic.
//!
//! Quantities are whole mebibytes. The accepted text form is
//! `<digits><unit>` with unit one of `Mi`, `Gi`, `Ti`, or the bare `M`, `G`,
//! `T`, which by default mean the same as their binary counterparts.

use std::fmt;
use std::str::FromStr;

use pvc_config::BareUnitPolicy;

use crate::error::SizeError;

const MI: u64 = 1;
const GI: u64 = 1024;
const TI: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorageQuantity(u64);

impl StorageQuantity {
    pub const fn from_mib(mib: u64) -> Self {
        Self(mib)
    }

    pub const fn as_mib(self) -> u64 {
        self.0
    }

    /// parse with bare units aliased to binary units
    pub fn parse(s: &str) -> Result<Self, SizeError> {
        Self::parse_with(s, BareUnitPolicy::Alias)
    }

    pub fn parse_with(s: &str, bare_units: BareUnitPolicy) -> Result<Self, SizeError> {
        let invalid = || SizeError::InvalidSizeFormat(s.to_owned());

        let digits_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, unit) = s.split_at(digits_end);
        if digits.is_empty() {
            return Err(invalid());
        }

        let multiplier = match unit {
            "Mi" => MI,
            "Gi" => GI,
            "Ti" => TI,
            "M" | "G" | "T" if bare_units == BareUnitPolicy::Reject => {
                return Err(SizeError::BareUnitRejected(s.to_owned()))
            }
            "M" => MI,
            "G" => GI,
            "T" => TI,
            _ => return Err(invalid()),
        };

        let value: u64 = digits.parse().map_err(|_| invalid())?;
        value.checked_mul(multiplier).map(Self).ok_or_else(invalid)
    }

    /// sum of both quantities, saturating at the largest representable size
    pub fn add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn less_or_equal(self, other: Self) -> bool {
        self.0 <= other.0
    }
}

/// Canonical text for a MiB count: the largest unit that divides it exactly.
pub fn format(mib: u64) -> String {
    if mib % TI == 0 {
        format!("{}Ti", mib / TI)
    } else if mib % GI == 0 {
        format!("{}Gi", mib / GI)
    } else {
        format!("{mib}Mi")
    }
}

/// `current + step`, both given as text
pub fn compute_new_size(current: &str, step: &str) -> Result<String, SizeError> {
    let current = StorageQuantity::parse(current)?;
    let step = StorageQuantity::parse(step)?;
    Ok(current.add(step).to_string())
}

pub fn is_smaller_or_equal(a: &str, b: &str) -> Result<bool, SizeError> {
    Ok(StorageQuantity::parse(a)?.less_or_equal(StorageQuantity::parse(b)?))
}

impl fmt::Display for StorageQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format(self.0))
    }
}

impl FromStr for StorageQuantity {
    type Err = SizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod test {

    use pvc_config::BareUnitPolicy;

    use super::compute_new_size;
    use super::format;
    use super::is_smaller_or_equal;
    use super::StorageQuantity;
    use crate::error::SizeError;

    #[test]
    fn test_parse_units() {
        assert_eq!(StorageQuantity::parse("500Mi"), Ok(StorageQuantity::from_mib(500)));
        assert_eq!(StorageQuantity::parse("2Gi"), Ok(StorageQuantity::from_mib(2048)));
        assert_eq!(StorageQuantity::parse("1Ti"), Ok(StorageQuantity::from_mib(1024 * 1024)));
        assert_eq!(StorageQuantity::parse("0Mi"), Ok(StorageQuantity::from_mib(0)));
    }

    #[test]
    fn test_bare_units_alias_binary() {
        assert_eq!(StorageQuantity::parse("10G"), StorageQuantity::parse("10Gi"));
        assert_eq!(StorageQuantity::parse("3M"), StorageQuantity::parse("3Mi"));
        assert_eq!(StorageQuantity::parse("1T"), StorageQuantity::parse("1Ti"));
    }

    #[test]
    fn test_bare_units_rejected_by_policy() {
        assert_eq!(
            StorageQuantity::parse_with("10G", BareUnitPolicy::Reject),
            Err(SizeError::BareUnitRejected("10G".to_owned()))
        );
        assert_eq!(
            StorageQuantity::parse_with("10Gi", BareUnitPolicy::Reject),
            Ok(StorageQuantity::from_mib(10 * 1024))
        );
    }

    #[test]
    fn test_parse_invalid() {
        for input in [
            "", "10", "-5Mi", "10Xi", "10.5Gi", "Gi", " 1Gi", "1Gi ", "1Gib", "1gi", "+1Gi",
            "1_000Mi",
        ] {
            assert_eq!(
                StorageQuantity::parse(input),
                Err(SizeError::InvalidSizeFormat(input.to_owned())),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn test_parse_overflow() {
        assert!(StorageQuantity::parse("99999999999999999999999Mi").is_err());
        assert!(StorageQuantity::parse(&format!("{}Ti", u64::MAX)).is_err());
    }

    #[test]
    fn test_format_largest_whole_unit() {
        assert_eq!(format(1536), "1536Mi");
        assert_eq!(format(1024), "1Gi");
        assert_eq!(format(3 * 1024 * 1024), "3Ti");
        assert_eq!(format(1024 * 1024 + 1024), "1025Gi");
        assert_eq!(format(1), "1Mi");
        assert_eq!(format(0), "0Ti");
    }

    #[test]
    fn test_format_round_trip() {
        for mib in [0, 1, 500, 1023, 1024, 1536, 2048, 1024 * 1024, 5 * 1024 * 1024 + 1, u64::MAX] {
            let text = format(mib);
            assert_eq!(StorageQuantity::parse(&text), Ok(StorageQuantity::from_mib(mib)), "{text}");
        }
    }

    #[test]
    fn test_compute_new_size() {
        assert_eq!(compute_new_size("1Gi", "1Gi").expect("size"), "2Gi");
        assert_eq!(compute_new_size("524Mi", "500Mi").expect("size"), "1Gi");
        assert_eq!(compute_new_size("500Mi", "600Mi").expect("size"), "1100Mi");
        assert_eq!(compute_new_size("1Gi", "500Mi").expect("size"), "1524Mi");
        assert_eq!(compute_new_size("1Gi", "512Mi").expect("size"), "1536Mi");
        assert!(compute_new_size("1Gi", "1.5Gi").is_err());
    }

    #[test]
    fn test_less_or_equal() {
        assert!(is_smaller_or_equal("1Gi", "1024Mi").expect("compare"));
        assert!(!is_smaller_or_equal("2Gi", "1Gi").expect("compare"));
        assert!(is_smaller_or_equal("1Ti", "1024Gi").expect("compare"));
        assert!(is_smaller_or_equal("1Mi", "1G").expect("compare"));
    }

    #[test]
    fn test_add_saturates() {
        let max = StorageQuantity::from_mib(u64::MAX);
        assert_eq!(max.add(StorageQuantity::from_mib(1)), max);
    }
}
