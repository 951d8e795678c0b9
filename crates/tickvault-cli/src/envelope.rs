//! Machine-readable response envelope for all command output.
//!
//! Every command renders one envelope: `{meta, data, errors}`. Warnings
//! (per-ticker skips, truncated results) ride in the metadata; typed
//! analytics failures land in the errors array so callers can still read
//! the metadata of a failed call.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Envelope construction failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeViolation {
    #[error("request id must be at least 8 characters")]
    InvalidRequestId,
    #[error("trace id must be 32 lowercase hex characters")]
    InvalidTraceId,
    #[error("schema version '{value}' must match vMAJOR.MINOR.PATCH")]
    InvalidSchemaVersion { value: String },
    #[error("source chain must not be empty")]
    EmptySourceChain,
    #[error("error code must not be empty")]
    EmptyErrorCode,
    #[error("error message must not be empty")]
    EmptyErrorMessage,
}

/// Data sources a command can touch, reported in envelope metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceId {
    /// The upstream chart endpoint (or its offline synthesizer).
    ChartApi,
    /// The local DuckDB warehouse.
    Warehouse,
    /// A holdings disclosure file on disk.
    HoldingsFile,
}

impl SourceId {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ChartApi => "chart-api",
            Self::Warehouse => "warehouse",
            Self::HoldingsFile => "holdings-file",
        }
    }
}

/// Standard response envelope for all tickvault machine-readable output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub meta: EnvelopeMeta,
    pub data: T,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<EnvelopeError>,
}

impl<T> Envelope<T> {
    pub fn with_errors(
        meta: EnvelopeMeta,
        data: T,
        errors: Vec<EnvelopeError>,
    ) -> Result<Self, EnvelopeViolation> {
        meta.validate_schema_compliance()?;
        for error in &errors {
            error.validate()?;
        }

        Ok(Self { meta, data, errors })
    }
}

/// Metadata attached to every envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeMeta {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    pub schema_version: String,
    pub generated_at: String,
    pub source_chain: Vec<SourceId>,
    pub latency_ms: u64,
    pub cache_hit: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl EnvelopeMeta {
    pub fn new(
        request_id: impl Into<String>,
        schema_version: impl Into<String>,
        source_chain: Vec<SourceId>,
        latency_ms: u64,
        cache_hit: bool,
    ) -> Result<Self, EnvelopeViolation> {
        let meta = Self {
            request_id: request_id.into(),
            trace_id: None,
            schema_version: schema_version.into(),
            generated_at: now_rfc3339(),
            source_chain,
            latency_ms,
            cache_hit,
            warnings: Vec::new(),
        };
        meta.validate_schema_compliance()?;
        Ok(meta)
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Result<Self, EnvelopeViolation> {
        let trace_id = trace_id.into();
        if !is_valid_trace_id(trace_id.as_str()) {
            return Err(EnvelopeViolation::InvalidTraceId);
        }

        self.trace_id = Some(trace_id);
        Ok(self)
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn validate_schema_compliance(&self) -> Result<(), EnvelopeViolation> {
        if self.request_id.trim().len() < 8 {
            return Err(EnvelopeViolation::InvalidRequestId);
        }

        if let Some(trace_id) = &self.trace_id {
            if !is_valid_trace_id(trace_id.as_str()) {
                return Err(EnvelopeViolation::InvalidTraceId);
            }
        }

        if !is_valid_schema_version(&self.schema_version) {
            return Err(EnvelopeViolation::InvalidSchemaVersion {
                value: self.schema_version.clone(),
            });
        }

        if self.source_chain.is_empty() {
            return Err(EnvelopeViolation::EmptySourceChain);
        }

        Ok(())
    }
}

/// Structured error payload for partial or failed responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl EnvelopeError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Self, EnvelopeViolation> {
        let error = Self {
            code: code.into(),
            message: message.into(),
            retryable: None,
        };
        error.validate()?;
        Ok(error)
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }

    pub fn validate(&self) -> Result<(), EnvelopeViolation> {
        if self.code.trim().is_empty() {
            return Err(EnvelopeViolation::EmptyErrorCode);
        }

        if self.message.trim().is_empty() {
            return Err(EnvelopeViolation::EmptyErrorMessage);
        }

        Ok(())
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

fn is_valid_schema_version(value: &str) -> bool {
    let Some(version) = value.strip_prefix('v') else {
        return false;
    };

    let mut parts = version.split('.');
    let major = parts.next();
    let minor = parts.next();
    let patch = parts.next();

    if parts.next().is_some() {
        return false;
    }

    [major, minor, patch].iter().all(|part| {
        part.is_some_and(|segment| {
            !segment.is_empty() && segment.chars().all(|ch| ch.is_ascii_digit())
        })
    })
}

fn is_valid_trace_id(value: &str) -> bool {
    value.len() == 32
        && value.chars().all(|ch| ch.is_ascii_hexdigit())
        && value.chars().any(|ch| ch != '0')
}
