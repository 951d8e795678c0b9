use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::envelope::{EnvelopeMeta, EnvelopeViolation, SourceId};

/// Request identifier (UUID v4) for end-to-end request tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Distributed tracing identifier (W3C-style 16-byte hex trace id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(String);

impl TraceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for TraceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Canonical command metadata payload used to construct envelope metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub request_id: RequestId,
    pub trace_id: TraceId,
    pub source_chain: Vec<SourceId>,
    pub latency_ms: u64,
    pub cache_hit: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Metadata {
    pub fn new(
        source_chain: Vec<SourceId>,
        latency_ms: u64,
        cache_hit: bool,
    ) -> Result<Self, EnvelopeViolation> {
        if source_chain.is_empty() {
            return Err(EnvelopeViolation::EmptySourceChain);
        }

        Ok(Self {
            request_id: RequestId::new_v4(),
            trace_id: TraceId::new(),
            source_chain,
            latency_ms,
            cache_hit,
            warnings: Vec::new(),
        })
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn into_envelope_meta(
        self,
        schema_version: &str,
    ) -> Result<EnvelopeMeta, EnvelopeViolation> {
        let mut envelope_meta = EnvelopeMeta::new(
            self.request_id.to_string(),
            schema_version,
            self.source_chain,
            self.latency_ms,
            self.cache_hit,
        )?
        .with_trace_id(self.trace_id.to_string())?;

        for warning in self.warnings {
            envelope_meta.push_warning(warning);
        }

        Ok(envelope_meta)
    }
}
