use crate::error::{DeppyError, Result};
use crate::process::CommandRunner;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

pub const DEFAULT_NCU_COMMAND: &str = "ncu";

/// Upgrades a package manifest in place and reports what it changed.
#[async_trait]
pub trait UpdateProposer: Send + Sync {
    /// Rewrites `package.json` inside `dir`, returning `(name, new version)`
    /// pairs for every dependency it upgraded.
    async fn propose(&self, dir: &Path) -> Result<Vec<(String, String)>>;
}

/// `npm-check-updates` driven through the command line.
pub struct NcuProposer {
    runner: Arc<dyn CommandRunner>,
    command: String,
}

impl NcuProposer {
    /// `command` may carry a launcher prefix, e.g. `npx npm-check-updates`.
    pub fn new(runner: Arc<dyn CommandRunner>, command: impl Into<String>) -> Self {
        Self {
            runner,
            command: command.into(),
        }
    }
}

#[async_trait]
impl UpdateProposer for NcuProposer {
    async fn propose(&self, dir: &Path) -> Result<Vec<(String, String)>> {
        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| DeppyError::Config("Empty npm-check-updates command".to_string()))?;
        let mut args: Vec<&str> = parts.collect();
        args.extend(["--upgrade", "--jsonUpgraded", "--packageFile", "package.json"]);

        let output = self
            .runner
            .run(program, &args, dir)
            .await?
            .ensure_success(&self.command)?;
        parse_upgraded(&output.stdout)
    }
}

/// Parses the `--jsonUpgraded` report: an object of package name to new range.
/// Anything printed before the object is ignored.
pub fn parse_upgraded(stdout: &str) -> Result<Vec<(String, String)>> {
    let Some(start) = stdout.find('{') else {
        return Ok(Vec::new());
    };
    let report: Map<String, Value> = serde_json::from_str(stdout[start..].trim_end())?;
    Ok(report
        .into_iter()
        .filter_map(|(name, version)| version.as_str().map(|v| (name, v.to_string())))
        .collect())
}
