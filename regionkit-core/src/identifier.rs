//! Query-side identifier validation.
//!
//! Region codes are constrained to [`REGION_CODE_RANGE`] by convention. The
//! golden source does not encode the range and the store does not enforce it;
//! only incoming request parameters are checked here.

use std::ops::RangeInclusive;

use thiserror::Error;

use crate::EntityKind;

/// Valid numeric range for region identifiers.
pub const REGION_CODE_RANGE: RangeInclusive<u32> = 11..=94;

/// Rejection raised before a query reaches the store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidIdentifier {
    /// The identifier contained something other than ASCII digits.
    #[error("{kind} id '{input}' must be numeric")]
    NotNumeric {
        /// Kind the identifier was meant to address.
        kind: EntityKind,
        /// The rejected input.
        input: String,
    },
    /// A region identifier fell outside [`REGION_CODE_RANGE`].
    #[error("{kind} id {value} is outside the valid range {min}..={max}")]
    OutOfRange {
        /// Kind the identifier was meant to address.
        kind: EntityKind,
        /// Parsed identifier value.
        value: u64,
        /// Lower bound of the valid range.
        min: u32,
        /// Upper bound of the valid range.
        max: u32,
    },
}

/// Validate a raw identifier addressing a row of `kind`.
///
/// Returns the trimmed identifier on success. Every kind requires ASCII
/// digits; region identifiers must also fall inside [`REGION_CODE_RANGE`].
///
/// # Examples
/// ```
/// use regionkit_core::{EntityKind, InvalidIdentifier, validate_identifier};
///
/// assert_eq!(validate_identifier(EntityKind::Region, "11"), Ok("11".to_owned()));
/// assert!(matches!(
///     validate_identifier(EntityKind::Region, "95"),
///     Err(InvalidIdentifier::OutOfRange { value: 95, .. })
/// ));
/// assert!(matches!(
///     validate_identifier(EntityKind::District, "11.01"),
///     Err(InvalidIdentifier::NotNumeric { .. })
/// ));
/// ```
pub fn validate_identifier(kind: EntityKind, raw: &str) -> Result<String, InvalidIdentifier> {
    let trimmed = raw.trim();
    let not_numeric = || InvalidIdentifier::NotNumeric {
        kind,
        input: raw.to_owned(),
    };
    if trimmed.is_empty() || !trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(not_numeric());
    }
    if kind.is_root() {
        check_region_range(kind, trimmed)?;
    }
    Ok(trimmed.to_owned())
}

fn check_region_range(kind: EntityKind, digits: &str) -> Result<(), InvalidIdentifier> {
    let out_of_range = |value: u64| InvalidIdentifier::OutOfRange {
        kind,
        value,
        min: *REGION_CODE_RANGE.start(),
        max: *REGION_CODE_RANGE.end(),
    };
    // Digits-only input can still overflow; saturate so it reports as out of range.
    let value = digits.parse::<u64>().unwrap_or(u64::MAX);
    let in_range = u32::try_from(value).is_ok_and(|code| REGION_CODE_RANGE.contains(&code));
    if in_range {
        Ok(())
    } else {
        Err(out_of_range(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("11")]
    #[case("94")]
    #[case(" 32 ")]
    fn accepts_region_codes_in_range(#[case] raw: &str) {
        assert_eq!(
            validate_identifier(EntityKind::Region, raw),
            Ok(raw.trim().to_owned())
        );
    }

    #[rstest]
    #[case("10", 10)]
    #[case("95", 95)]
    #[case("0011000", 11_000)]
    #[case("99999999999999999999999", u64::MAX)]
    fn rejects_region_codes_out_of_range(#[case] raw: &str, #[case] value: u64) {
        let err = validate_identifier(EntityKind::Region, raw).expect_err("out of range");
        assert_eq!(
            err,
            InvalidIdentifier::OutOfRange {
                kind: EntityKind::Region,
                value,
                min: 11,
                max: 94,
            }
        );
    }

    #[rstest]
    #[case(EntityKind::Region, "aceh")]
    #[case(EntityKind::SubRegion, "")]
    #[case(EntityKind::District, "-11")]
    #[case(EntityKind::Settlement, "11 01")]
    fn rejects_non_numeric_input(#[case] kind: EntityKind, #[case] raw: &str) {
        assert!(matches!(
            validate_identifier(kind, raw),
            Err(InvalidIdentifier::NotNumeric { .. })
        ));
    }

    #[rstest]
    fn leaves_non_root_codes_unbounded() {
        assert_eq!(
            validate_identifier(EntityKind::Settlement, "1101012001"),
            Ok("1101012001".to_owned())
        );
    }
}
