//! Maps a GPU name token to exactly one driver index.
//!
//! Resolution is a pure function of the enumeration and the policy. Ties are
//! a hard failure: picking the first of several matches would silently run
//! the workload on a GPU nobody asked for.

use crate::core::accelerator::AcceleratorRecord;
use crate::error::{GuardError, Result};

/// How the target GPU is chosen for one run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchPolicy {
    /// Substring matched case-insensitively against the GPU name
    pub token: String,
    /// Explicit index that bypasses matching entirely
    pub override_index: Option<u32>,
    /// Try index 0 when the query failed. The restricted probe must still
    /// find the token in GPU 0's name before it is accepted.
    pub fallback_to_first: bool,
}

impl MatchPolicy {
    pub fn by_token<S: Into<String>>(token: S) -> Self {
        Self {
            token: token.into(),
            ..Default::default()
        }
    }

    pub fn with_override(mut self, index: u32) -> Self {
        self.override_index = Some(index);
        self
    }

    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_to_first = enabled;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Matched,
    Override,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub index: u32,
    pub source: ResolutionSource,
}

pub type ResolutionResult = Result<Resolution>;

/// Resolve the policy against one enumeration attempt.
///
/// `enumeration` is the raw outcome of the query so that an override can
/// still short-circuit a failed query, and the fallback can see why the
/// query failed.
pub fn resolve(
    enumeration: std::result::Result<&[AcceleratorRecord], &GuardError>,
    policy: &MatchPolicy,
) -> ResolutionResult {
    if let Some(index) = policy.override_index {
        log::warn!(
            "GPU override in effect: using index {} without matching '{}'",
            index,
            policy.token
        );
        return Ok(Resolution {
            index,
            source: ResolutionSource::Override,
        });
    }

    let records = match enumeration {
        Ok(records) => records,
        Err(err) if policy.fallback_to_first => {
            log::warn!(
                "GPU query failed ({}); trying GPU 0, its name is checked against '{}' before launch",
                err,
                policy.token
            );
            return Ok(Resolution {
                index: 0,
                source: ResolutionSource::Fallback,
            });
        }
        Err(err) => return Err(clone_query_error(err)),
    };

    let matched: Vec<&AcceleratorRecord> =
        records.iter().filter(|r| r.matches(&policy.token)).collect();

    match matched.as_slice() {
        [only] => Ok(Resolution {
            index: only.index,
            source: ResolutionSource::Matched,
        }),
        [] => {
            let no_match = GuardError::NoMatch {
                token: policy.token.clone(),
                available: describe_available(records),
            };
            if policy.fallback_to_first {
                Err(refuse_fallback(records, &policy.token, &no_match))
            } else {
                Err(no_match)
            }
        }
        many => Err(GuardError::AmbiguousMatch {
            token: policy.token.clone(),
            candidates: many.iter().map(|r| r.to_string()).collect(),
        }),
    }
}

// A complete list without a match already shows GPU 0 is not the one asked for.
fn refuse_fallback(records: &[AcceleratorRecord], token: &str, cause: &GuardError) -> GuardError {
    match records.iter().find(|r| r.index == 0) {
        Some(first) => GuardError::fallback_refused(format!(
            "GPU 0 is '{}', which does not contain '{}' ({})",
            first.name, token, cause
        )),
        None => GuardError::fallback_refused(format!("no GPU with index 0 ({})", cause)),
    }
}

fn describe_available(records: &[AcceleratorRecord]) -> String {
    if records.is_empty() {
        return "no GPUs reported".to_string();
    }
    let names: Vec<String> = records.iter().map(|r| r.to_string()).collect();
    format!("available: {}", names.join(", "))
}

// GuardError wraps io::Error and is not Clone; query errors never carry one.
fn clone_query_error(err: &GuardError) -> GuardError {
    match err {
        GuardError::ToolUnavailable(msg) => GuardError::ToolUnavailable(msg.clone()),
        GuardError::QueryFailed(msg) => GuardError::QueryFailed(msg.clone()),
        other => GuardError::query_failed(other.to_string()),
    }
}
