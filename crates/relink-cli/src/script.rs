//! Simulation script parsing.
//!
//! A script is a comma-separated list of steps, each a raw status token
//! with an optional `@offset_ms` measured from the start of the replay.
//! Bare tokens run 500ms after the previous step.

use std::time::Duration;

use crate::error::{CliError, Result};

/// Fallback script for `relink simulate` with no `--script`.
pub const DEFAULT_SCRIPT: &str = "connecting@0,open@400,closed@3000,connecting@3100,open@4000";

/// One step of a simulated status sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptStep {
    /// Raw status token to inject.
    pub token: String,
    /// Offset from the start of the replay.
    pub at: Duration,
}

/// Parse a script string.
pub fn parse(script: &str) -> Result<Vec<ScriptStep>> {
    let mut steps = Vec::new();
    let mut previous = Duration::ZERO;

    for (index, raw_step) in script.split(',').enumerate() {
        let raw_step = raw_step.trim();
        if raw_step.is_empty() {
            continue;
        }
        let (token, at) = match raw_step.split_once('@') {
            Some((token, offset)) => {
                let millis: u64 = offset.trim().parse().map_err(|_| CliError::Script {
                    reason: format!("step {index}: bad offset {offset:?}"),
                })?;
                (token.trim(), Duration::from_millis(millis))
            }
            None => (raw_step, previous + Duration::from_millis(500)),
        };
        if token.is_empty() {
            return Err(CliError::Script {
                reason: format!("step {index}: empty token"),
            });
        }
        if at < previous {
            return Err(CliError::Script {
                reason: format!("step {index}: offsets must not go backwards"),
            });
        }
        previous = at;
        steps.push(ScriptStep {
            token: token.to_string(),
            at,
        });
    }

    if steps.is_empty() {
        return Err(CliError::Script {
            reason: "script contains no steps".into(),
        });
    }
    Ok(steps)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
