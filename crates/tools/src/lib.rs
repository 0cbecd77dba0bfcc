//! The codevox tool catalog.
//!
//! Five operations, enumerated in [`ToolName`]: create a file, read a file,
//! overwrite a file, analyze code, run a command. Dispatch is a `match` on
//! the closed enum; adding a tool means adding a variant, a module with its
//! schema, and an arm here.
//!
//! Every tool validates its arguments before touching anything, and every
//! path argument is resolved under the policy's projects root. A schema
//! violation or an escaping path fails fast with no filesystem side effect.

pub mod analyze_code;
pub mod create_file;
pub mod read_file;
pub mod run_command;
pub mod write_file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use codevox_core::error::ToolError;
use codevox_core::tool::{ToolCall, ToolDefinition, ToolName, ToolOutcome};
use codevox_security::{CommandAllowlist, PathValidationError, resolve_under_root};
use tracing::debug;

/// Execution policy shared by all tools in a catalog.
///
/// Constructed explicitly from configuration and passed in; two catalogs
/// with different roots (e.g. in tests) never interfere.
#[derive(Debug, Clone)]
pub struct ToolPolicy {
    /// Root directory all file paths resolve under
    pub root: PathBuf,

    /// Whether `create_file` may replace an existing file
    pub allow_overwrite: bool,

    /// Bound on `run_command` executions
    pub command_timeout: Duration,

    /// Allowed command heads for `run_command`
    pub allowlist: CommandAllowlist,
}

impl ToolPolicy {
    /// A policy with the default posture: overwrite allowed, 30s command
    /// timeout, all commands permitted. Production callers install the
    /// configured allowlist via [`ToolPolicy::with_allowlist`].
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            allow_overwrite: true,
            command_timeout: Duration::from_secs(30),
            allowlist: CommandAllowlist::permissive(),
        }
    }

    pub fn with_overwrite(mut self, allow: bool) -> Self {
        self.allow_overwrite = allow;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_allowlist(mut self, allowlist: CommandAllowlist) -> Self {
        self.allowlist = allowlist;
        self
    }
}

/// The catalog: the closed tool set bound to one policy.
pub struct ToolCatalog {
    policy: ToolPolicy,
}

impl ToolCatalog {
    /// Build a catalog. Creates the projects root if it does not exist yet
    /// so path resolution has a real directory to canonicalize against.
    pub fn new(policy: ToolPolicy) -> std::io::Result<Self> {
        std::fs::create_dir_all(&policy.root)?;
        Ok(Self { policy })
    }

    /// The projects root all paths resolve under.
    pub fn root(&self) -> &Path {
        &self.policy.root
    }

    /// All tool definitions, in catalog order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        ToolName::ALL.iter().map(|n| definition_for(*n)).collect()
    }

    /// Execute a tool call.
    ///
    /// `UnknownTool` and every validation/execution failure come back as
    /// `Err`; the agent loop converts them into observations.
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolOutcome, ToolError> {
        let name =
            ToolName::parse(&call.name).ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;

        debug!(tool = %name, "Executing tool");

        match name {
            ToolName::CreateFile => create_file::execute(&self.policy, &call.arguments).await,
            ToolName::ReadFile => read_file::execute(&self.policy, &call.arguments).await,
            ToolName::WriteFile => write_file::execute(&self.policy, &call.arguments).await,
            ToolName::AnalyzeCode => analyze_code::execute(&self.policy, &call.arguments).await,
            ToolName::RunCommand => run_command::execute(&self.policy, &call.arguments).await,
        }
    }
}

fn definition_for(name: ToolName) -> ToolDefinition {
    match name {
        ToolName::CreateFile => create_file::definition(),
        ToolName::ReadFile => read_file::definition(),
        ToolName::WriteFile => write_file::definition(),
        ToolName::AnalyzeCode => analyze_code::definition(),
        ToolName::RunCommand => run_command::definition(),
    }
}

/// Extract a required string argument.
pub(crate) fn require_str<'a>(
    arguments: &'a serde_json::Value,
    key: &str,
) -> Result<&'a str, ToolError> {
    arguments
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

/// Resolve a model-supplied path under the policy root.
pub(crate) fn resolve(policy: &ToolPolicy, raw: &str) -> Result<PathBuf, ToolError> {
    resolve_under_root(&policy.root, raw).map_err(|e| match e {
        PathValidationError::Escape { path } => ToolError::PathEscape { path },
        PathValidationError::RootUnavailable { root, reason } => ToolError::ExecutionFailed {
            tool_name: "path resolution".into(),
            reason: format!("projects root '{root}': {reason}"),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> (tempfile::TempDir, ToolCatalog) {
        let dir = tempfile::tempdir().unwrap();
        let catalog = ToolCatalog::new(ToolPolicy::new(dir.path().join("ai_projects"))).unwrap();
        (dir, catalog)
    }

    #[test]
    fn catalog_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("ai_projects");
        assert!(!root.exists());
        ToolCatalog::new(ToolPolicy::new(&root)).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn definitions_cover_every_tool() {
        let (_guard, catalog) = catalog();
        let defs = catalog.definitions();
        assert_eq!(defs.len(), ToolName::ALL.len());
        for name in ToolName::ALL {
            assert!(
                defs.iter().any(|d| d.name == name.as_str()),
                "Missing definition for {name}"
            );
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let (_guard, catalog) = catalog();
        let call = ToolCall {
            name: "summon_demon".into(),
            arguments: serde_json::json!({}),
        };
        let err = catalog.execute(&call).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn dispatch_reaches_create_file() {
        let (_guard, catalog) = catalog();
        let call = ToolCall {
            name: "create_file".into(),
            arguments: serde_json::json!({
                "file_path": "demo/hello.txt",
                "content": "hi"
            }),
        };
        let outcome = catalog.execute(&call).await.unwrap();
        assert!(outcome.success);
        assert!(catalog.root().join("demo/hello.txt").exists());
    }

    #[tokio::test]
    async fn escaping_path_produces_no_side_effect() {
        let (guard, catalog) = catalog();
        let call = ToolCall {
            name: "create_file".into(),
            arguments: serde_json::json!({
                "file_path": "../../etc/passwd",
                "content": "oops"
            }),
        };
        let err = catalog.execute(&call).await.unwrap_err();
        assert!(matches!(err, ToolError::PathEscape { .. }));
        assert!(!guard.path().join("etc").exists());
    }
}
