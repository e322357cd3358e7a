use thiserror::Error;

use crate::config::GlobalConfig;
use crate::executor::context::RunContext;
use crate::metrics::Metrics;
use crate::response::CheckSet;
use crate::template::TemplateError;

/// Shared collaborators one iteration runs against.
#[derive(Clone, Copy)]
pub struct IterationOptions<'a> {
    pub config: &'a GlobalConfig,
    pub context: &'a RunContext,
    pub metrics: &'a Metrics,
}

/// Outcome of one executed iteration, handed back to the caller after the
/// checks have been reported to the metrics registry.
#[derive(Debug, Clone)]
pub struct IterationReport {
    pub endpoint: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub duration_ms: u64,
    pub slow: bool,
    pub checks: CheckSet,
    pub passed: bool,
}

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("{kind} body requires an object content structure")]
    InvalidContent { kind: &'static str },
}

/// Body ready to hand to the transport, with the Content-Type decision
/// already made: raw carries an explicit type, url-encoded pairs get the
/// fixed form type from the transport, multipart leaves the header to the
/// transport's boundary handling.
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedBody {
    Raw { content_type: String, text: String },
    UrlEncoded { pairs: Vec<(String, String)> },
    Multipart { fields: Vec<(String, String)> },
}
