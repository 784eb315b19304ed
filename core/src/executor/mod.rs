//! Side effects requested by the code agent
//!
//! Two operations only: run a file, or overwrite a file. Every path is
//! resolved against the workspace root and must stay inside it.

use crate::config::settings::ExecutorSettings;
use crate::error::{Result, RouterError};
use crate::util::truncate_output;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

/// Result of running a file
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Program and arguments, space-joined
    pub command: String,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
}

impl ExecutionResult {
    /// stdout followed by stderr, when there is any
    pub fn combined_output(&self) -> String {
        let mut output = self.stdout.clone();
        if !self.stderr.is_empty() {
            output.push_str("\n--- stderr ---\n");
            output.push_str(&self.stderr);
        }
        output
    }
}

#[derive(Debug, Clone)]
pub struct CodeExecutor {
    workspace: PathBuf,
    timeout: Duration,
    max_output_bytes: usize,
}

impl CodeExecutor {
    /// A relative workspace is taken relative to the current directory.
    /// The workspace must exist; it is canonicalized once here.
    pub fn new(settings: &ExecutorSettings) -> Result<Self> {
        let workspace = if settings.workspace.is_absolute() {
            settings.workspace.clone()
        } else {
            std::env::current_dir()?.join(&settings.workspace)
        };
        let workspace = std::fs::canonicalize(&workspace).map_err(|e| {
            RouterError::invalid_config(
                "executor.workspace",
                format!("cannot open workspace {}: {}", workspace.display(), e),
            )
        })?;
        Ok(Self {
            workspace,
            timeout: Duration::from_secs(settings.timeout_secs),
            max_output_bytes: settings.max_output_bytes,
        })
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Map a requested path into the workspace, rejecting escapes.
    ///
    /// Symlinks are followed: the check runs on the real location of the
    /// nearest existing ancestor, so a link inside the workspace cannot
    /// point the write or the run somewhere else.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf> {
        let requested = Path::new(requested.trim());
        if requested.as_os_str().is_empty() {
            return Err(RouterError::execution("empty path"));
        }
        if requested.components().any(|c| c == Component::ParentDir) {
            return Err(RouterError::execution(format!(
                "path '{}' contains '..'",
                requested.display()
            )));
        }

        let joined = if requested.is_absolute() {
            normalize(requested)
        } else {
            normalize(&self.workspace.join(requested))
        };
        let resolved = real_location(&joined)?;

        if !resolved.starts_with(&self.workspace) {
            tracing::warn!(requested = %requested.display(), resolved = %resolved.display(), "path escapes workspace");
            return Err(RouterError::execution(format!(
                "path '{}' is outside the workspace {}",
                requested.display(),
                self.workspace.display()
            )));
        }
        Ok(resolved)
    }

    /// Run a file with the interpreter its extension calls for.
    ///
    /// The child runs on its own task and is killed on timeout or cancellation.
    pub async fn run_file(&self, path: &str, cancel: &CancellationToken) -> Result<ExecutionResult> {
        let file = self.resolve(path)?;
        if !file.is_file() {
            return Err(RouterError::execution(format!("file not found: {}", path)));
        }

        let (program, args) = interpreter_for(&file);
        let command_line = std::iter::once(program.as_str())
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .current_dir(&self.workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::info!(command = %command_line, "running file");
        let mut task = tokio::spawn(async move { cmd.output().await });

        let output = tokio::select! {
            joined = &mut task => joined
                .map_err(|e| RouterError::execution(format!("execution task failed: {}", e)))?
                .map_err(|e| RouterError::execution(format!("failed to start {}: {}", program, e)))?,
            _ = sleep(self.timeout) => {
                task.abort();
                tracing::warn!(command = %command_line, "execution timed out");
                return Err(RouterError::execution(format!(
                    "command timed out after {} seconds",
                    self.timeout.as_secs()
                )));
            }
            _ = cancel.cancelled() => {
                task.abort();
                return Err(RouterError::execution("execution cancelled"));
            }
        };

        let result = ExecutionResult {
            command: command_line,
            success: output.status.success(),
            stdout: truncate_output(&String::from_utf8_lossy(&output.stdout), self.max_output_bytes),
            stderr: truncate_output(&String::from_utf8_lossy(&output.stderr), self.max_output_bytes),
            exit_code: output.status.code(),
        };
        tracing::debug!(exit_code = ?result.exit_code, "execution finished");
        Ok(result)
    }

    /// Overwrite a file, creating parent directories as needed. Returns bytes written.
    pub async fn write_file(&self, path: &str, content: &str) -> Result<usize> {
        let file = self.resolve(path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RouterError::execution(format!("failed to create {}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(&file, content)
            .await
            .map_err(|e| RouterError::execution(format!("failed to write {}: {}", file.display(), e)))?;
        tracing::info!(path = %file.display(), bytes = content.len(), "file written");
        Ok(content.len())
    }
}

/// Program plus arguments for a file, keyed by extension.
fn interpreter_for(file: &Path) -> (String, Vec<String>) {
    let path = file.display().to_string();
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("py") => ("python3".to_string(), vec![path]),
        Some("sh") => ("sh".to_string(), vec![path]),
        Some("js") => ("node".to_string(), vec![path]),
        _ => (path, Vec::new()),
    }
}

/// Canonical form of the longest existing prefix, with the missing tail appended.
///
/// A dangling symlink is refused: writing through it would create its target.
fn real_location(path: &Path) -> Result<PathBuf> {
    let mut existing = path;
    let mut missing = Vec::new();

    loop {
        match std::fs::canonicalize(existing) {
            Ok(base) => {
                return Ok(missing.iter().rev().fold(base, |acc: PathBuf, name| acc.join(name)));
            }
            Err(_) if std::fs::symlink_metadata(existing).is_ok_and(|m| m.file_type().is_symlink()) => {
                return Err(RouterError::execution(format!(
                    "'{}' is a broken symlink",
                    existing.display()
                )));
            }
            Err(_) => {
                let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                    return Err(RouterError::execution(format!("cannot resolve {}", path.display())));
                };
                missing.push(name);
                existing = parent;
            }
        }
    }
}

/// Lexical normalization: drops `.` components. `..` never reaches here.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| *c != Component::CurDir)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor(dir: &Path) -> CodeExecutor {
        CodeExecutor::new(&ExecutorSettings {
            workspace: dir.to_path_buf(),
            timeout_secs: 5,
            max_output_bytes: 1_000,
        })
        .unwrap()
    }

    #[test]
    fn relative_paths_resolve_inside_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path());
        let resolved = exec.resolve("./src/app.py").unwrap();
        assert_eq!(resolved, exec.workspace().join("src/app.py"));
    }

    #[test]
    fn escapes_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path());
        assert_eq!(exec.resolve("../etc/passwd").unwrap_err().kind(), "execution");
        assert!(exec.resolve("src/../../x").is_err());
        assert!(exec.resolve("/etc/passwd").is_err());
        assert!(exec.resolve("   ").is_err());
    }

    #[test]
    fn absolute_path_inside_workspace_is_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path());
        std::fs::write(dir.path().join("a.sh"), "true\n").unwrap();
        let inside = dir.path().join("a.sh");
        assert_eq!(
            exec.resolve(&inside.display().to_string()).unwrap(),
            exec.workspace().join("a.sh")
        );
    }

    #[test]
    fn missing_workspace_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CodeExecutor::new(&ExecutorSettings {
            workspace: dir.path().join("absent"),
            ..ExecutorSettings::default()
        })
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_directory_cannot_leave_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        let exec = executor(dir.path());

        let err = exec.write_file("link/escaped.py", "pwned").await.unwrap_err();
        assert_eq!(err.kind(), "execution");
        assert!(!outside.path().join("escaped.py").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_file_cannot_be_run_or_written() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let target = outside.path().join("tool.sh");
        std::fs::write(&target, "echo outside\n").unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("tool.sh")).unwrap();
        let exec = executor(dir.path());

        assert!(exec.run_file("tool.sh", &CancellationToken::new()).await.is_err());
        assert!(exec.write_file("tool.sh", "echo changed\n").await.is_err());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "echo outside\n");
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path().join("new.py"), dir.path().join("new.py")).unwrap();
        let exec = executor(dir.path());
        assert!(exec.resolve("new.py").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_within_workspace_is_allowed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();
        let exec = executor(dir.path());
        let resolved = exec.resolve("alias/app.py").unwrap();
        assert_eq!(resolved, exec.workspace().join("real/app.py"));
    }

    #[test]
    fn interpreter_by_extension() {
        assert_eq!(interpreter_for(Path::new("/w/a.py")).0, "python3");
        assert_eq!(interpreter_for(Path::new("/w/a.SH")).0, "sh");
        assert_eq!(interpreter_for(Path::new("/w/a.js")).0, "node");
        let (program, args) = interpreter_for(Path::new("/w/tool"));
        assert_eq!(program, "/w/tool");
        assert!(args.is_empty());
    }

    #[tokio::test]
    async fn write_creates_parents_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path());
        exec.write_file("pkg/mod.py", "old").await.unwrap();
        let written = exec.write_file("pkg/mod.py", "print('new')\n").await.unwrap();
        assert_eq!(written, 13);
        let content = std::fs::read_to_string(dir.path().join("pkg/mod.py")).unwrap();
        assert_eq!(content, "print('new')\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_shell_script_and_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path());
        exec.write_file("hello.sh", "echo hello\necho oops >&2\nexit 3\n").await.unwrap();

        let result = exec.run_file("hello.sh", &CancellationToken::new()).await.unwrap();
        assert_eq!(result.stdout.trim(), "hello");
        assert_eq!(result.stderr.trim(), "oops");
        assert_eq!(result.exit_code, Some(3));
        assert!(!result.success);
        assert!(result.combined_output().contains("--- stderr ---"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn long_running_script_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let exec = CodeExecutor::new(&ExecutorSettings {
            workspace: dir.path().to_path_buf(),
            timeout_secs: 1,
            max_output_bytes: 1_000,
        })
        .unwrap();
        exec.write_file("slow.sh", "sleep 10\n").await.unwrap();

        let err = exec.run_file("slow.sh", &CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn cancelled_run_stops() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path());
        exec.write_file("slow.sh", "sleep 10\n").await.unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let err = exec.run_file("slow.sh", &token).await.unwrap_err();
        assert_eq!(err.kind(), "execution");
    }

    #[tokio::test]
    async fn missing_file_is_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = executor(dir.path())
            .run_file("nope.py", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("file not found"));
    }
}
