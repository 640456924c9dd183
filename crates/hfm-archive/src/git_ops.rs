use std::path::Path;
use std::process::Command;

use hfm_auth::redact_url;
use hfm_core::error::HfmError;

/// Result of a git command execution.
#[derive(Debug)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

/// Stderr fragments that mean retrying cannot help.
const PERMANENT_MARKERS: &[&str] = &[
    "not found",
    "does not exist",
    "authentication failed",
    "could not read username",
    "not a git repository",
    "is not a git command",
    "refusing to create empty bundle",
    "already exists and is not an empty directory",
    "need a repository",
    "does not appear to be a git repository",
];

/// Whether a failed command's stderr looks worth retrying.
pub fn is_transient_failure(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    !PERMANENT_MARKERS.iter().any(|m| lower.contains(m))
}

/// Printable command line with credentials masked.
fn describe(args: &[&str]) -> String {
    let shown: Vec<String> = args.iter().map(|a| redact_url(a)).collect();
    format!("git {}", shown.join(" "))
}

/// Run a git command, optionally inside `dir`, with extra environment.
fn git_env(dir: Option<&Path>, args: &[&str], env: &[(&str, &str)]) -> Result<GitOutput, HfmError> {
    let mut cmd = Command::new("git");
    cmd.args(args);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    for (key, value) in env {
        cmd.env(key, value);
    }

    tracing::debug!("running {}", describe(args));
    let output = cmd.output().map_err(|e| HfmError::Command {
        command: describe(args),
        stderr: format!("failed to run: {e}"),
        transient: false,
    })?;

    Ok(GitOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        success: output.status.success(),
    })
}

fn git(dir: &Path, args: &[&str]) -> Result<GitOutput, HfmError> {
    git_env(Some(dir), args, &[])
}

/// Turn an unsuccessful output into a classified error.
fn ensure_success(args: &[&str], out: GitOutput) -> Result<String, HfmError> {
    if !out.success {
        let stderr = redact_url(out.stderr.trim());
        return Err(HfmError::Command {
            command: describe(args),
            transient: is_transient_failure(&stderr),
            stderr,
        });
    }
    Ok(out.stdout)
}

/// Run a git command in the given directory, returning an error if it fails.
fn git_ok(dir: &Path, args: &[&str]) -> Result<String, HfmError> {
    ensure_success(args, git(dir, args)?)
}

/// `git --version`, trimmed. Fails when git is not installed.
pub fn version() -> Result<String, HfmError> {
    let args = ["--version"];
    let out = ensure_success(&args, git_env(None, &args, &[])?)?;
    Ok(out.trim().to_string())
}

/// Whether the git-lfs extension is installed.
pub fn lfs_available() -> bool {
    git_env(None, &["lfs", "version"], &[])
        .map(|o| o.success)
        .unwrap_or(false)
}

/// Bare clone without downloading LFS content.
pub fn clone_bare(url: &str, dest: &Path) -> Result<(), HfmError> {
    let dest_str = dest.to_string_lossy();
    let args = ["clone", "--bare", "--quiet", url, &dest_str];
    let out = git_env(None, &args, &[("GIT_LFS_SKIP_SMUDGE", "1")])?;
    ensure_success(&args, out)?;
    Ok(())
}

/// Clone a working tree from a bundle file.
pub fn clone_from_bundle(bundle: &Path, dest: &Path) -> Result<(), HfmError> {
    let bundle_str = bundle.to_string_lossy();
    let dest_str = dest.to_string_lossy();
    let args = ["clone", "--quiet", &bundle_str, &dest_str];
    let out = git_env(None, &args, &[("GIT_LFS_SKIP_SMUDGE", "1")])?;
    ensure_success(&args, out)?;
    Ok(())
}

/// Create an empty bare repository.
pub fn init_bare(dir: &Path) -> Result<(), HfmError> {
    let dir_str = dir.to_string_lossy();
    let args = ["init", "--bare", "--quiet", &dir_str];
    ensure_success(&args, git_env(None, &args, &[])?)?;
    Ok(())
}

/// The branch HEAD points at, if HEAD is symbolic.
pub fn default_branch(dir: &Path) -> Result<Option<String>, HfmError> {
    let out = git(dir, &["symbolic-ref", "--short", "HEAD"])?;
    if out.success {
        Ok(Some(out.stdout.trim().to_string()))
    } else {
        Ok(None)
    }
}

/// Contents of a blob such as `HEAD:.gitattributes`, or `None` if absent.
pub fn show_blob(dir: &Path, spec: &str) -> Result<Option<String>, HfmError> {
    let out = git(dir, &["show", spec])?;
    if out.success {
        Ok(Some(out.stdout))
    } else {
        Ok(None)
    }
}

/// `git bundle create <bundle> --all`
pub fn bundle_create(dir: &Path, bundle: &Path) -> Result<(), HfmError> {
    let bundle = std::path::absolute(bundle)?;
    let bundle_str = bundle.to_string_lossy();
    git_ok(dir, &["bundle", "create", &bundle_str, "--all"])?;
    Ok(())
}

/// `git bundle verify <bundle>`, run inside `repo` (git refuses to verify outside a repository).
pub fn bundle_verify(repo: &Path, bundle: &Path) -> Result<GitOutput, HfmError> {
    let bundle = std::path::absolute(bundle)?;
    let bundle_str = bundle.to_string_lossy();
    git(repo, &["bundle", "verify", &bundle_str])
}

pub fn lfs_install_local(dir: &Path) -> Result<(), HfmError> {
    git_ok(dir, &["lfs", "install", "--local"])?;
    Ok(())
}

/// Download every LFS object reachable from any ref of `remote`.
pub fn lfs_fetch_all(dir: &Path, remote: &str) -> Result<(), HfmError> {
    git_ok(dir, &["lfs", "fetch", "--all", remote])?;
    Ok(())
}

pub fn lfs_push_all(dir: &Path, remote: &str) -> Result<(), HfmError> {
    git_ok(dir, &["lfs", "push", "--all", remote])?;
    Ok(())
}

/// Replace LFS pointer files in the working tree with their content.
pub fn lfs_checkout(dir: &Path) -> Result<(), HfmError> {
    git_ok(dir, &["lfs", "checkout"])?;
    Ok(())
}

/// Add a remote.
pub fn remote_add(dir: &Path, name: &str, url: &str) -> Result<(), HfmError> {
    let args = ["remote", "add", name, url];
    let out = git(dir, &args)?;
    if !out.success {
        // Remote might already exist
        if out.stderr.contains("already exists") {
            return Ok(());
        }
        return ensure_success(&args, out).map(|_| ());
    }
    Ok(())
}

/// Push every ref to `remote`, deleting refs the remote has but we do not.
pub fn push_mirror(dir: &Path, remote: &str) -> Result<(), HfmError> {
    git_ok(dir, &["push", "--mirror", remote])?;
    Ok(())
}

/// `(refname, sha)` for refs under `prefix`, e.g. `refs/heads/`.
pub fn list_refs(dir: &Path, prefix: &str) -> Result<Vec<(String, String)>, HfmError> {
    let stdout = git_ok(
        dir,
        &["for-each-ref", "--format=%(refname) %(objectname)", prefix],
    )?;
    Ok(stdout
        .lines()
        .filter_map(|l| l.split_once(' '))
        .map(|(name, sha)| (name.to_string(), sha.trim().to_string()))
        .collect())
}
