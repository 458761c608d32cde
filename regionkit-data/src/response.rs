//! Transport-agnostic response envelopes.
//!
//! Maps query and import results onto the status codes and JSON bodies of the
//! REST surface: lists and entities as plain JSON with 200, imports as a 201
//! confirmation, and every failure as `{status, message, error, timestamp}`.

use chrono::{DateTime, Utc};
use regionkit_core::{EntityKind, StoreError};
use serde::Serialize;
use serde_json::Value;

use crate::{
    query::{Found, Lookup, QueryError},
    sync::{SyncError, SyncReport},
};

/// Status codes used by the REST surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u16")]
pub enum ResponseStatus {
    /// 200.
    Ok,
    /// 201.
    Created,
    /// 400.
    BadRequest,
    /// 404.
    NotFound,
    /// 500.
    InternalError,
}

impl ResponseStatus {
    /// Numeric HTTP status code.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Created => 201,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::InternalError => 500,
        }
    }

    /// Standard reason phrase.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Created => "Created",
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Not Found",
            Self::InternalError => "Internal Server Error",
        }
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Ok | Self::Created)
    }
}

impl From<ResponseStatus> for u16 {
    fn from(status: ResponseStatus) -> Self {
        status.code()
    }
}

/// Confirmation or error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    /// Status code.
    pub status: ResponseStatus,
    /// Human-readable summary.
    pub message: String,
    /// Error detail, present on failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the envelope was produced.
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    /// Envelope stamped with the current time.
    pub fn new(status: ResponseStatus, message: impl Into<String>, error: Option<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error,
            timestamp: Utc::now(),
        }
    }

    fn failure(status: ResponseStatus, message: impl Into<String>, error: &dyn std::error::Error) -> Self {
        Self::new(status, message, Some(error_chain(error)))
    }
}

/// A response ready to be written by a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// JSON payload returned with status 200.
    Data(Value),
    /// Confirmation or error envelope.
    Envelope(Envelope),
}

impl Reply {
    /// Status code of the reply.
    #[must_use]
    pub const fn status(&self) -> ResponseStatus {
        match self {
            Self::Data(_) => ResponseStatus::Ok,
            Self::Envelope(envelope) => envelope.status,
        }
    }

    /// JSON body of the reply.
    pub fn body(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Data(value) => Ok(value.clone()),
            Self::Envelope(envelope) => serde_json::to_value(envelope),
        }
    }
}

/// Map a listing result: rows give 200, no rows give 404.
pub fn reply_list(kind: EntityKind, result: Result<Lookup, QueryError>) -> Reply {
    match result {
        Ok(lookup) if lookup.entities.is_empty() => Reply::Envelope(Envelope::new(
            ResponseStatus::NotFound,
            format!("no {} found", kind.plural()),
            None,
        )),
        Ok(lookup) => data(kind, &lookup.entities),
        Err(err) => query_failure(kind, &err),
    }
}

/// Map a single-row lookup: a row gives 200, none gives 404.
pub fn reply_entity(kind: EntityKind, raw_id: &str, result: Result<Found, QueryError>) -> Reply {
    match result {
        Ok(Found {
            entity: Some(entity),
            ..
        }) => data(kind, &entity),
        Ok(Found { entity: None, .. }) => Reply::Envelope(Envelope::new(
            ResponseStatus::NotFound,
            format!("{kind} {} not found", raw_id.trim()),
            None,
        )),
        Err(err) => query_failure(kind, &err),
    }
}

/// Map an import result.
///
/// A run that wrote every partition gives 201. A malformed row under the
/// abort policy gives 400. A missing source, failed partitions or
/// cancelled partitions give 500.
pub fn reply_import(kind: EntityKind, result: Result<SyncReport, SyncError>) -> Reply {
    match result {
        Ok(report) if report.is_complete() => {
            let mut message = format!(
                "imported {} {} in {} partitions",
                report.rows_written,
                kind.plural(),
                report.partitions
            );
            if !report.rejected.is_empty() {
                message.push_str(&format!("; skipped {} malformed rows", report.rejected.len()));
            }
            Reply::Envelope(Envelope::new(ResponseStatus::Created, message, None))
        }
        Ok(report) => {
            let detail = report.failures.first().map_or_else(
                || format!("{} partitions cancelled", report.cancelled),
                |failure| {
                    format!(
                        "partition {} ({} rows): {}",
                        failure.key,
                        failure.size,
                        error_chain(&failure.error)
                    )
                },
            );
            Reply::Envelope(Envelope::new(
                ResponseStatus::InternalError,
                format!(
                    "{kind} import incomplete: {} of {} partitions written",
                    report.succeeded, report.partitions
                ),
                Some(detail),
            ))
        }
        Err(err) if err.is_malformed() => Reply::Envelope(Envelope::failure(
            ResponseStatus::BadRequest,
            format!("malformed {kind} source data"),
            &err,
        )),
        Err(err) => Reply::Envelope(Envelope::failure(
            ResponseStatus::InternalError,
            format!("{kind} import failed"),
            &err,
        )),
    }
}

fn data<T: Serialize + ?Sized>(kind: EntityKind, payload: &T) -> Reply {
    match serde_json::to_value(payload) {
        Ok(value) => Reply::Data(value),
        Err(err) => Reply::Envelope(Envelope::failure(
            ResponseStatus::InternalError,
            format!("failed to encode {}", kind.plural()),
            &err,
        )),
    }
}

fn query_failure(kind: EntityKind, err: &QueryError) -> Reply {
    let status = match err {
        QueryError::Invalid(_) | QueryError::Store(StoreError::InvalidAncestor { .. }) => {
            ResponseStatus::BadRequest
        }
        _ => ResponseStatus::InternalError,
    };
    let message = match status {
        ResponseStatus::BadRequest => format!("invalid {kind} request"),
        _ => format!("failed to query {}", kind.plural()),
    };
    Reply::Envelope(Envelope::failure(status, message, err))
}

/// Render an error and its sources as one line.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
