//! Dataset Loader: golden-source CSV rows to typed entities.
//!
//! Files carry no header row. Columns are `id, parent_id, name`, with the
//! parent column omitted for the root kind. Fields are trimmed and trailing
//! extra fields are ignored.

use std::io::Read;

use csv::{ByteRecord, ReaderBuilder, StringRecord, Trim};
use log::{debug, warn};
use regionkit_core::{Entity, EntityKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::{GoldenSource, SourceError};

/// What to do with a row that does not describe a valid entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MalformedPolicy {
    /// Log and collect the row, then keep loading.
    #[default]
    Skip,
    /// Fail the whole load on the first malformed row.
    Abort,
}

/// Why a row was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum MalformedReason {
    /// The row had fewer fields than the kind requires.
    #[error("expected {expected} fields but found {found}")]
    TooFewFields {
        /// Fields required by the kind.
        expected: usize,
        /// Fields present in the row.
        found: usize,
    },
    /// A required field was empty after trimming.
    #[error("field '{field}' is empty")]
    EmptyField {
        /// Name of the empty field.
        field: &'static str,
    },
    /// A field was not valid UTF-8.
    #[error("column {column} is not valid UTF-8")]
    InvalidUtf8 {
        /// One-based column of the offending field.
        column: usize,
    },
}

/// A golden-source row that was not loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRow {
    /// One-based line number in the source.
    pub line: u64,
    /// The row's fields, re-joined with commas.
    pub raw: String,
    /// Rejection cause.
    #[serde(flatten)]
    pub reason: MalformedReason,
}

/// Result of loading one golden-source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Kind the rows were loaded as.
    pub kind: EntityKind,
    /// Well-formed entities, in source order.
    pub entities: Vec<Entity>,
    /// Rows skipped under [`MalformedPolicy::Skip`].
    pub rejected: Vec<RejectedRow>,
}

/// Errors raised while loading a golden-source file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    /// The stream could not be opened.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// The CSV stream could not be read.
    #[error("failed to read {kind} rows from {location}")]
    Read {
        /// Kind being loaded.
        kind: EntityKind,
        /// Location of the stream.
        location: String,
        /// Parser failure.
        #[source]
        source: csv::Error,
    },
    /// A malformed row was found under [`MalformedPolicy::Abort`].
    #[error("malformed {kind} row at {location}:{}: {}", .row.line, .row.reason)]
    Malformed {
        /// Kind being loaded.
        kind: EntityKind,
        /// Location of the stream.
        location: String,
        /// The offending row.
        row: RejectedRow,
    },
}

/// Load every row of `kind` from `source`.
pub fn load<G>(source: &G, kind: EntityKind, policy: MalformedPolicy) -> Result<LoadReport, LoadError>
where
    G: GoldenSource + ?Sized,
{
    let reader = source.open(kind)?;
    load_from_reader(reader, kind, policy, &source.describe(kind))
}

/// Load rows of `kind` from an already-open CSV stream.
///
/// `location` names the stream in logs and errors.
///
/// # Examples
/// ```
/// use regionkit_core::{Entity, EntityKind};
/// use regionkit_data::{MalformedPolicy, load_from_reader};
///
/// let csv = "11,Aceh\n12,Sumut\n13,\n";
/// let report = load_from_reader(csv.as_bytes(), EntityKind::Region, MalformedPolicy::Skip, "inline")
///     .expect("load regions");
/// assert_eq!(report.entities, vec![Entity::root("11", "Aceh"), Entity::root("12", "Sumut")]);
/// assert_eq!(report.rejected.len(), 1);
/// ```
pub fn load_from_reader<R: Read>(
    reader: R,
    kind: EntityKind,
    policy: MalformedPolicy,
    location: &str,
) -> Result<LoadReport, LoadError> {
    let mut csv = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut entities = Vec::new();
    let mut rejected = Vec::new();
    for record in csv.byte_records() {
        let record = record.map_err(|source| LoadError::Read {
            kind,
            location: location.to_owned(),
            source,
        })?;
        let line = record.position().map_or(0, csv::Position::line);
        let parsed = decode_record(record).and_then(|fields| {
            parse_record(kind, &fields)
                .map_err(|reason| (fields.iter().collect::<Vec<_>>().join(","), reason))
        });
        match parsed {
            Ok(entity) => entities.push(entity),
            Err((raw, reason)) => {
                let row = RejectedRow { line, raw, reason };
                if policy == MalformedPolicy::Abort {
                    warn!(
                        "aborting {kind} load on malformed row at {location}:{}: {}",
                        row.line, row.reason
                    );
                    return Err(LoadError::Malformed {
                        kind,
                        location: location.to_owned(),
                        row,
                    });
                }
                warn!(
                    "skipping malformed {kind} row at {location}:{}: {}",
                    row.line, row.reason
                );
                rejected.push(row);
            }
        }
    }
    debug!(
        "loaded {} {} from {location} ({} rejected)",
        entities.len(),
        kind.plural(),
        rejected.len()
    );
    Ok(LoadReport {
        kind,
        entities,
        rejected,
    })
}

/// Decode a raw row, keeping a lossy rendering when a field is not UTF-8.
fn decode_record(record: ByteRecord) -> Result<StringRecord, (String, MalformedReason)> {
    match StringRecord::from_byte_record(record) {
        Ok(mut fields) => {
            fields.trim();
            Ok(fields)
        }
        Err(err) => {
            let column = err.utf8_error().field() + 1;
            let raw = err
                .into_byte_record()
                .iter()
                .map(String::from_utf8_lossy)
                .collect::<Vec<_>>()
                .join(",");
            Err((raw, MalformedReason::InvalidUtf8 { column }))
        }
    }
}

fn parse_record(kind: EntityKind, record: &StringRecord) -> Result<Entity, MalformedReason> {
    let expected = kind.field_count();
    if record.len() < expected {
        return Err(MalformedReason::TooFewFields {
            expected,
            found: record.len(),
        });
    }
    let field = |index: usize, name: &'static str| match record.get(index) {
        Some(value) if !value.is_empty() => Ok(value.to_owned()),
        _ => Err(MalformedReason::EmptyField { field: name }),
    };
    if kind.is_root() {
        Ok(Entity::root(field(0, "id")?, field(1, "name")?))
    } else {
        Ok(Entity::child(
            field(0, "id")?,
            field(1, "parent_id")?,
            field(2, "name")?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::capture_logs;
    use log::Level;
    use rstest::rstest;

    fn load_str(csv: &str, kind: EntityKind, policy: MalformedPolicy) -> Result<LoadReport, LoadError> {
        load_from_reader(csv.as_bytes(), kind, policy, "inline.csv")
    }

    #[rstest]
    fn loads_child_rows_in_order() {
        let report = load_str(
            "1101,11,KABUPATEN SIMEULUE\n1102, 11 , KABUPATEN ACEH SINGKIL \n",
            EntityKind::SubRegion,
            MalformedPolicy::Skip,
        )
        .expect("load sub-regions");
        assert_eq!(
            report.entities,
            vec![
                Entity::child("1101", "11", "KABUPATEN SIMEULUE"),
                Entity::child("1102", "11", "KABUPATEN ACEH SINGKIL"),
            ]
        );
        assert!(report.rejected.is_empty());
    }

    #[rstest]
    fn quoted_names_may_contain_commas() {
        let report = load_str(
            "110101,1101,\"TEUPAH SELATAN, SIMEULUE\"\n",
            EntityKind::District,
            MalformedPolicy::Abort,
        )
        .expect("load districts");
        assert_eq!(report.entities[0].name, "TEUPAH SELATAN, SIMEULUE");
    }

    #[rstest]
    fn ignores_extra_trailing_fields() {
        let report = load_str("11,Aceh,unused\n", EntityKind::Region, MalformedPolicy::Abort)
            .expect("load regions");
        assert_eq!(report.entities, vec![Entity::root("11", "Aceh")]);
    }

    #[rstest]
    #[case("13,\n", MalformedReason::EmptyField { field: "name" })]
    #[case("13\n", MalformedReason::TooFewFields { expected: 2, found: 1 })]
    #[case(",Aceh\n", MalformedReason::EmptyField { field: "id" })]
    fn skip_policy_collects_rejected_rows(#[case] bad_row: &str, #[case] reason: MalformedReason) {
        let csv = format!("11,Aceh\n{bad_row}12,Sumut\n");
        let report = load_str(&csv, EntityKind::Region, MalformedPolicy::Skip).expect("load");
        assert_eq!(
            report.entities,
            vec![Entity::root("11", "Aceh"), Entity::root("12", "Sumut")]
        );
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].line, 2);
        assert_eq!(report.rejected[0].reason, reason);
    }

    #[rstest]
    fn abort_policy_fails_on_first_malformed_row() {
        let err = load_str("11,Aceh\n13,\n12,Sumut\n", EntityKind::Region, MalformedPolicy::Abort)
            .expect_err("abort on malformed row");
        match err {
            LoadError::Malformed { kind, row, .. } => {
                assert_eq!(kind, EntityKind::Region);
                assert_eq!(row.line, 2);
                assert_eq!(row.raw, "13,");
            }
            other => panic!("expected malformed error, got {other:?}"),
        }
    }

    #[rstest]
    fn child_row_requires_parent() {
        let report = load_str("1101,,Simeulue\n", EntityKind::SubRegion, MalformedPolicy::Skip)
            .expect("load");
        assert!(report.entities.is_empty());
        assert_eq!(
            report.rejected[0].reason,
            MalformedReason::EmptyField { field: "parent_id" }
        );
    }

    #[rstest]
    fn skip_policy_keeps_rows_around_invalid_utf8() {
        let bytes: &[u8] = b"11,Aceh\n13,Ac\xffeh\n12,Sumut\n";
        let report = load_from_reader(bytes, EntityKind::Region, MalformedPolicy::Skip, "inline.csv")
            .expect("load regions");
        assert_eq!(
            report.entities,
            vec![Entity::root("11", "Aceh"), Entity::root("12", "Sumut")]
        );
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].line, 2);
        assert_eq!(report.rejected[0].raw, "13,Ac\u{fffd}eh");
        assert_eq!(
            report.rejected[0].reason,
            MalformedReason::InvalidUtf8 { column: 2 }
        );
    }

    #[rstest]
    fn abort_policy_fails_on_invalid_utf8() {
        let bytes: &[u8] = b"11,Aceh\n13,Ac\xffeh\n";
        let err = load_from_reader(bytes, EntityKind::Region, MalformedPolicy::Abort, "inline.csv")
            .expect_err("abort on invalid utf-8");
        match err {
            LoadError::Malformed { row, .. } => {
                assert_eq!(row.line, 2);
                assert_eq!(row.reason, MalformedReason::InvalidUtf8 { column: 2 });
            }
            other => panic!("expected malformed error, got {other:?}"),
        }
    }

    #[rstest]
    fn abort_policy_logs_the_rejected_row() {
        let (outcome, logs) = capture_logs(|| {
            load_str("11,Aceh\n13,\n", EntityKind::Region, MalformedPolicy::Abort)
        });
        assert!(outcome.is_err());
        assert!(logs.iter().any(|entry| {
            entry.level == Level::Warn
                && entry.message.contains("aborting region load")
                && entry.message.contains("inline.csv:2")
        }));
    }
}
