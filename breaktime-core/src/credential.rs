//! Bearer credentials and the identity providers that mint them.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tracing::debug;

/// An opaque bearer token.
///
/// Cloning is cheap and shares the same immutable value, which is how a
/// batch hands one credential snapshot to all of its tasks. A refreshed
/// token is always a new `Credential`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Arc<str>);

impl Credential {
    /// Wrap a raw token. Surrounding whitespace and a leading `Bearer `
    /// scheme are stripped so the header is never doubled.
    pub fn new(token: impl AsRef<str>) -> Self {
        let token = token.as_ref().trim();
        let token = token
            .strip_prefix("Bearer ")
            .or_else(|| token.strip_prefix("bearer "))
            .unwrap_or(token)
            .trim();
        Self(Arc::from(token))
    }

    /// The raw token.
    pub fn secret(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&"<redacted>").finish()
    }
}

/// Source of fresh identity tokens.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn fetch_token(&self) -> Result<Credential>;
}

/// Hands out the same operator-supplied token on every request.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    token: Credential,
}

impl StaticIdentity {
    pub fn new(token: Credential) -> Self {
        Self { token }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn fetch_token(&self) -> Result<Credential> {
        Ok(self.token.clone())
    }
}

/// Runs an external command and reads a token from its stdout, e.g.
/// `gcloud auth print-identity-token`.
#[derive(Debug, Clone)]
pub struct CommandIdentity {
    program: String,
    args: Vec<String>,
}

impl CommandIdentity {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a whitespace-separated command line into program and arguments.
    pub fn from_command_line(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let Some(program) = parts.next() else {
            bail!("identity token command is empty");
        };
        Ok(Self::new(program, parts.collect()))
    }
}

#[async_trait]
impl IdentityProvider for CommandIdentity {
    async fn fetch_token(&self) -> Result<Credential> {
        debug!(program = %self.program, "Fetching identity token");
        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.program))?;

        if !output.status.success() {
            bail!(
                "{} exited with status {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let stdout = String::from_utf8(output.stdout)
            .context("identity token is not valid UTF-8")?;
        let token = Credential::new(stdout);
        if token.is_empty() {
            bail!("{} printed an empty identity token", self.program);
        }
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scheme_and_whitespace() {
        assert_eq!(Credential::new("  abc\n").secret(), "abc");
        assert_eq!(Credential::new("Bearer abc").secret(), "abc");
        assert_eq!(Credential::new("Bearer abc").bearer(), "Bearer abc");
    }

    #[test]
    fn debug_never_shows_the_token() {
        let rendered = format!("{:?}", Credential::new("super-secret"));
        assert!(!rendered.contains("super-secret"));
    }

    #[tokio::test]
    async fn static_identity_repeats_its_token() {
        let provider = StaticIdentity::new(Credential::new("t"));
        assert_eq!(provider.fetch_token().await.unwrap().secret(), "t");
        assert_eq!(provider.fetch_token().await.unwrap().secret(), "t");
    }

    #[test]
    fn command_line_splits_program_and_args() {
        let identity = CommandIdentity::from_command_line(
            "gcloud auth print-identity-token",
        )
        .unwrap();
        assert_eq!(identity.program, "gcloud");
        assert_eq!(identity.args, vec!["auth", "print-identity-token"]);
        assert!(CommandIdentity::from_command_line("   ").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_identity_reads_stdout() {
        let identity = CommandIdentity::new(
            "sh",
            vec!["-c".into(), "echo fresh-token".into()],
        );
        let token = identity.fetch_token().await.unwrap();
        assert_eq!(token.secret(), "fresh-token");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_identity_rejects_failures_and_blank_output() {
        let failing =
            CommandIdentity::new("sh", vec!["-c".into(), "exit 3".into()]);
        assert!(failing.fetch_token().await.is_err());

        let blank =
            CommandIdentity::new("sh", vec!["-c".into(), "echo".into()]);
        assert!(blank.fetch_token().await.is_err());
    }
}
