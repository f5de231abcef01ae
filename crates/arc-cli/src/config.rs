use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};
use arc_core::SessionToken;

pub const DEFAULT_STORE_DIR: &str = ".arc";
pub const DEFAULT_LOG_LEVEL: &str = "warn";
pub const LOG_ENV: &str = "ARC_LOG";

/// Everything a command needs from its environment, resolved once.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub dir: PathBuf,
    pub actor: String,
    pub session: SessionToken,
}

impl RuntimeConfig {
    pub fn resolve(
        dir: PathBuf,
        user: Option<String>,
        session: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            dir,
            actor: resolve_actor(user),
            session: resolve_session(session)?,
        })
    }
}

/// Explicit user, else `git config user.name`, else `$USER`. Input typed
/// at a terminal is tagged with `-tty`.
#[must_use]
pub fn resolve_actor(explicit: Option<String>) -> String {
    let base = explicit
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(git_user_name)
        .or_else(|| {
            std::env::var("USER")
                .ok()
                .filter(|value| !value.trim().is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string());
    if std::io::stdin().is_terminal() {
        format!("{base}-tty")
    } else {
        base
    }
}

fn git_user_name() -> Option<String> {
    let output = Command::new("git")
        .args(["config", "user.name"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!name.is_empty()).then_some(name)
}

/// Explicit token, else the canonical working directory, so each worktree
/// tracks its own checklist.
pub fn resolve_session(explicit: Option<String>) -> Result<SessionToken> {
    if let Some(value) = explicit.filter(|value| !value.trim().is_empty()) {
        return Ok(SessionToken::new(value)?);
    }
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let canonical = cwd
        .canonicalize()
        .with_context(|| format!("failed to canonicalize {}", cwd.display()))?;
    Ok(SessionToken::new(canonical.to_string_lossy().into_owned())?)
}

/// Installs the stderr subscriber. `ARC_LOG` wins over the flag value.
pub fn init_tracing(flag_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(flag_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_LEVEL));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_ansi(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_user_is_trimmed() {
        let actor = resolve_actor(Some("  dana ".to_string()));
        assert!(actor == "dana" || actor == "dana-tty");
    }

    #[test]
    fn blank_user_falls_back() {
        let actor = resolve_actor(Some("   ".to_string()));
        assert!(!actor.trim().is_empty());
        assert!(!actor.starts_with(' '));
    }

    #[test]
    fn explicit_session_is_used_verbatim() {
        let session = match resolve_session(Some("worktree-a".to_string())) {
            Ok(session) => session,
            Err(err) => panic!("test failure: {err}"),
        };
        assert_eq!(session.as_str(), "worktree-a");
    }

    #[test]
    fn default_session_is_an_absolute_path() {
        let session = match resolve_session(None) {
            Ok(session) => session,
            Err(err) => panic!("test failure: {err}"),
        };
        assert!(std::path::Path::new(session.as_str()).is_absolute());
    }
}
