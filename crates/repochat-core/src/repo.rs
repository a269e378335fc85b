//! GitHub URL parsing and local snapshot acquisition via `git clone`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;

use regex::Regex;
use tokio::process::Command;

use crate::error::ChatError;

// Owner and repo: one path segment each. Trailing `.git`, path segments,
// query or fragment are tolerated and dropped.
static GITHUB_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://github\.com/([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+?)(?:\.git)?(?:[/?#].*)?$")
        .expect("github url regex is valid")
});

/// `(owner, repo)` pair identifying a repository snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    /// # Errors
    ///
    /// Returns `ChatError::InvalidUrl` when `url` is not a GitHub repository URL.
    pub fn parse(url: &str) -> Result<Self, ChatError> {
        let invalid = || ChatError::InvalidUrl(url.to_owned());
        let caps = GITHUB_URL_REGEX.captures(url.trim()).ok_or_else(invalid)?;
        let owner = &caps[1];
        let name = &caps[2];
        // A leading dot would name a hidden directory the loader never walks.
        if [owner, name].iter().any(|s| s.starts_with('.')) {
            return Err(invalid());
        }
        Ok(Self {
            owner: owner.to_owned(),
            name: name.to_owned(),
        })
    }

    /// Snapshot location relative to the repos directory.
    #[must_use]
    pub fn relative_dir(&self) -> PathBuf {
        Path::new(&self.owner).join(&self.name)
    }

    /// Canonical clone URL with any trailing path, query or `.git` stripped.
    #[must_use]
    pub fn clone_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.name)
    }
}

impl std::fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Fetches a remote repository into a local directory.
pub trait GitCloner: Send + Sync {
    /// Clone `url` into `target`. `target` must not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Clone` if the clone fails.
    fn clone_repo(
        &self,
        url: &str,
        target: &Path,
    ) -> impl Future<Output = Result<(), ChatError>> + Send;
}

/// Runs the `git` binary as a subprocess.
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCli {
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl GitCloner for GitCli {
    async fn clone_repo(&self, url: &str, target: &Path) -> Result<(), ChatError> {
        let output = Command::new(&self.binary)
            .arg("clone")
            .arg(url)
            .arg(target)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                ChatError::Clone(format!("failed to run {}: {e}", self.binary.display()))
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        tracing::error!(url, status = %output.status, "git clone failed");
        if stderr.is_empty() {
            Err(ChatError::Clone(format!("git exited with {}", output.status)))
        } else {
            Err(ChatError::Clone(stderr))
        }
    }
}

/// Maps GitHub URLs to snapshots under `repos_dir`, cloning on first use.
pub struct RepositoryAcquirer<G> {
    cloner: G,
    repos_dir: PathBuf,
}

impl<G: GitCloner> RepositoryAcquirer<G> {
    #[must_use]
    pub fn new(cloner: G, repos_dir: impl Into<PathBuf>) -> Self {
        Self {
            cloner,
            repos_dir: repos_dir.into(),
        }
    }

    /// Resolve `url` to a local snapshot, cloning only when it does not exist yet.
    ///
    /// # Errors
    ///
    /// `InvalidUrl` before any filesystem access, `Io` if the parent directory
    /// cannot be created, `Clone` on git failure, `AcquisitionInconsistency` when
    /// git succeeded without producing the target.
    pub async fn acquire(&self, url: &str) -> Result<(RepoSlug, PathBuf), ChatError> {
        let slug = RepoSlug::parse(url)?;
        let target = self.repos_dir.join(slug.relative_dir());

        if tokio::fs::try_exists(&target).await? {
            tracing::info!(owner = %slug.owner, repo = %slug.name, path = %target.display(), "using existing snapshot");
            return Ok((slug, target));
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let clone_url = slug.clone_url();
        tracing::info!(owner = %slug.owner, repo = %slug.name, url = %clone_url, "cloning repository");
        let start = std::time::Instant::now();
        self.cloner.clone_repo(&clone_url, &target).await?;

        if !tokio::fs::try_exists(&target).await? {
            return Err(ChatError::AcquisitionInconsistency(target));
        }

        tracing::info!(
            owner = %slug.owner,
            repo = %slug.name,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "clone complete"
        );
        Ok((slug, target))
    }
}
