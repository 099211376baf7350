//! Git working tree as a document source
//!
//! The repository is cloned (or an existing clone is fetched) with the
//! `git` executable, the requested branch or tag is checked out, and the
//! working tree is handed to [`crate::source`] like any local directory.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use crate::config::GitConfig;
use crate::error::LoaderError;

/// Prefix of temporary clone directories.
const TEMP_PREFIX: &str = "docloader-git-";

/// A checked-out repository.
#[derive(Debug)]
pub struct GitSource {
    repo_path: PathBuf,
    doc_paths: Vec<String>,
    /// Set when the clone lives in a temporary directory removed on cleanup.
    temp_dir: Option<TempDir>,
}

impl GitSource {
    /// Clone or refresh the repository and check out the configured ref.
    ///
    /// # Errors
    ///
    /// Returns `LoaderError::Git` if `git` is not installed or a clone,
    /// fetch or checkout fails, and `LoaderError::Io` if the clone
    /// directory cannot be created.
    pub fn open(config: &GitConfig) -> Result<Self, LoaderError> {
        if !git_available() {
            return Err(LoaderError::Git(
                "git command not found: install git to use git sources".to_owned(),
            ));
        }

        let (clone_dir, temp_dir) = match &config.clone_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|e| LoaderError::io(dir, e))?;
                (dir.clone(), None)
            }
            None => {
                let temp = tempfile::Builder::new()
                    .prefix(TEMP_PREFIX)
                    .tempdir()
                    .map_err(|e| LoaderError::io(std::env::temp_dir(), e))?;
                if config.keep_clone {
                    (temp.keep(), None)
                } else {
                    (temp.path().to_path_buf(), Some(temp))
                }
            }
        };

        let repo_path = clone_dir.join(repo_name(&config.url));
        if repo_path.join(".git").exists() {
            if config.skip_fetch {
                tracing::info!(path = %repo_path.display(), "using existing clone");
            } else {
                tracing::info!(path = %repo_path.display(), "repository exists, fetching updates");
                run_git(&repo_path, &["fetch", "--all", "--prune", "--tags"])?;
            }
        } else {
            clone(config, &repo_path)?;
        }

        checkout(config, &repo_path)?;

        Ok(Self {
            repo_path,
            doc_paths: config.doc_paths.clone(),
            temp_dir,
        })
    }

    /// Root of the working tree.
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Paths to enumerate: each configured doc path, or the whole tree.
    pub fn source_paths(&self) -> Vec<PathBuf> {
        if self.doc_paths.is_empty() {
            return vec![self.repo_path.clone()];
        }
        self.doc_paths
            .iter()
            .map(|doc_path| self.repo_path.join(doc_path))
            .collect()
    }

    /// Remove a temporary clone; kept clones are left in place.
    ///
    /// # Errors
    ///
    /// Returns `LoaderError::Io` if the directory cannot be removed.
    pub fn cleanup(self) -> Result<(), LoaderError> {
        if let Some(temp) = self.temp_dir {
            tracing::info!(path = %temp.path().display(), "cleaning up cloned repository");
            let path = temp.path().to_path_buf();
            temp.close().map_err(|e| LoaderError::io(path, e))?;
        }
        Ok(())
    }
}

fn clone(config: &GitConfig, repo_path: &Path) -> Result<(), LoaderError> {
    tracing::info!(url = %config.url, "cloning repository");

    let mut args = vec!["clone", "--depth", "1"];
    if let Some(reference) = config.branch.as_deref().or(config.tag.as_deref()) {
        args.extend(["--branch", reference]);
    }
    let target = repo_path.to_string_lossy();
    args.extend([config.url.as_str(), &*target]);

    let output = Command::new("git")
        .args(&args)
        .output()
        .map_err(|e| LoaderError::Git(format!("failed to run git clone: {e}")))?;
    check_status("clone", &output)
}

fn checkout(config: &GitConfig, repo_path: &Path) -> Result<(), LoaderError> {
    let Some(reference) = config.branch.as_deref().or(config.tag.as_deref()) else {
        return Ok(());
    };

    tracing::info!(reference, "checking out");
    run_git(repo_path, &["checkout", reference])?;

    // Tags are fixed; only a branch can move.
    if config.branch.is_some()
        && !config.skip_fetch
        && let Err(err) = run_git(repo_path, &["pull", "--ff-only"])
    {
        tracing::warn!(error = %err, "git pull skipped");
    }
    Ok(())
}

/// Run `git -C <repo> <args>`.
fn run_git(repo_path: &Path, args: &[&str]) -> Result<(), LoaderError> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo_path)
        .args(args)
        .output()
        .map_err(|e| LoaderError::Git(format!("failed to run git {}: {e}", args[0])))?;
    check_status(args[0], &output)
}

fn check_status(subcommand: &str, output: &std::process::Output) -> Result<(), LoaderError> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(LoaderError::Git(format!(
        "git {subcommand} failed: {}",
        stderr.trim()
    )))
}

/// Check if the `git` executable is on `PATH`.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Directory name for a clone of `url`.
///
/// The `.git` suffix is dropped and SSH `host:org/repo` URLs are handled.
pub fn repo_name(url: &str) -> String {
    let url = url.trim_end_matches('/');
    let url = url.strip_suffix(".git").unwrap_or(url);

    let path = if !url.contains("://") {
        url.rsplit(':').next().unwrap_or(url)
    } else {
        url
    };

    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => "repo".to_owned(),
    }
}

/// Returns true if the string looks like a git remote URL.
pub fn is_git_url(value: &str) -> bool {
    let value = value.to_lowercase();
    value.starts_with("git@")
        || value.starts_with("git://")
        || value.starts_with("ssh://")
        || ((value.starts_with("https://") || value.starts_with("http://"))
            && value.contains(".git"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_name() {
        assert_eq!(repo_name("https://github.com/pgEdge/docs.git"), "docs");
        assert_eq!(repo_name("https://github.com/pgEdge/docs"), "docs");
        assert_eq!(repo_name("https://github.com/pgEdge/docs/"), "docs");
        assert_eq!(repo_name("git@github.com:pgEdge/docs.git"), "docs");
        assert_eq!(repo_name("ssh://git@host:2222/team/manual.git"), "manual");
        assert_eq!(repo_name("/srv/git/local-repo"), "local-repo");
        assert_eq!(repo_name(""), "repo");
    }

    #[test]
    fn test_is_git_url() {
        assert!(is_git_url("git@github.com:org/repo.git"));
        assert!(is_git_url("GIT://example.com/repo"));
        assert!(is_git_url("ssh://git@example.com/repo"));
        assert!(is_git_url("https://github.com/org/repo.git"));
        assert!(is_git_url("http://example.com/org/repo.git"));
        assert!(!is_git_url("https://example.com/docs"));
        assert!(!is_git_url("./docs/**/*.md"));
    }

    #[test]
    fn test_source_paths() {
        let source = GitSource {
            repo_path: PathBuf::from("/clones/docs"),
            doc_paths: Vec::new(),
            temp_dir: None,
        };
        assert_eq!(source.source_paths(), vec![PathBuf::from("/clones/docs")]);

        let source = GitSource {
            doc_paths: vec!["doc/src".to_owned(), "README.md".to_owned()],
            ..source
        };
        assert_eq!(
            source.source_paths(),
            vec![
                PathBuf::from("/clones/docs/doc/src"),
                PathBuf::from("/clones/docs/README.md"),
            ]
        );
    }
}
