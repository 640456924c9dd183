use std::collections::HashMap;
use std::fs::File;
use std::path::{Component, Path};

use hfm_core::layout::{lfs_bundle_for, metadata_for, StorageLayout};
use hfm_core::models::archive::ArchiveMetadata;
use hfm_core::models::repo::RepoId;
use hfm_core::models::verification::{VerificationResult, VerificationStatus};

use crate::bundle::{sha256_file, sha256_reader};
use crate::catalog;
use crate::git_ops;

const UNKNOWN_ERROR: &str = "Unknown error";

/// Diagnostic from `git bundle verify` output: the text after `error: ` on
/// the first line that carries it.
pub fn parse_bundle_error(output: &str) -> String {
    output
        .lines()
        .find(|line| line.contains("error: "))
        .and_then(|line| line.rsplit("error: ").next())
        .map(|msg| msg.trim().to_string())
        .filter(|msg| !msg.is_empty())
        .unwrap_or_else(|| UNKNOWN_ERROR.to_string())
}

/// Structural check of a bundle file with `git bundle verify`.
pub fn verify_bundle(path: &Path) -> Result<(), String> {
    // git only verifies bundles from inside a repository
    let scratch = tempfile::tempdir().map_err(|e| e.to_string())?;
    git_ops::init_bare(scratch.path()).map_err(|e| e.to_string())?;

    let out = git_ops::bundle_verify(scratch.path(), path).map_err(|e| e.to_string())?;
    if out.success {
        Ok(())
    } else {
        Err(parse_bundle_error(&format!("{}\n{}", out.stderr, out.stdout)))
    }
}

fn is_oid(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Check the layout of an LFS companion file and return its object count.
///
/// Every file must sit at `lfs/objects/aa/bb/<oid>` where `aa` and `bb` are
/// the first two byte pairs of the 64-hex oid. With `deep`, each object's
/// SHA-256 is recomputed and compared with its oid.
pub fn verify_lfs_bundle(path: &Path, deep: bool) -> Result<usize, String> {
    let file = File::open(path).map_err(|e| format!("cannot open {}: {e}", path.display()))?;
    let mut archive = tar::Archive::new(file);
    let entries = archive
        .entries()
        .map_err(|e| format!("unreadable LFS bundle: {e}"))?;

    let mut count = 0;
    for entry in entries {
        let entry = entry.map_err(|e| format!("unreadable LFS bundle: {e}"))?;
        if entry.header().entry_type().is_dir() {
            continue;
        }
        let entry_path = entry
            .path()
            .map_err(|e| format!("bad entry name: {e}"))?
            .into_owned();
        let parts: Vec<String> = entry_path
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().to_string()),
                _ => None,
            })
            .collect();

        let oid = match parts.as_slice() {
            [lfs, objects, aa, bb, oid]
                if lfs == "lfs"
                    && objects == "objects"
                    && is_oid(oid)
                    && aa.as_str() == &oid[0..2]
                    && bb.as_str() == &oid[2..4] =>
            {
                oid.clone()
            }
            _ => return Err(format!("unexpected entry {}", entry_path.display())),
        };

        if deep {
            let actual = sha256_reader(entry).map_err(|e| e.to_string())?;
            if actual != oid {
                return Err(format!("LFS object {oid} is corrupt (content hashes to {actual})"));
            }
        }
        count += 1;
    }
    Ok(count)
}

/// Verify one archive and its sidecars.
///
/// `deep` also recomputes the bundle checksum and every LFS object hash.
pub fn verify_archive(archive: &Path, label: &str, deep: bool) -> VerificationResult {
    let mut result = VerificationResult::new(label);

    if !archive.is_file() {
        result.fail(VerificationStatus::Missing, "Bundle file missing");
        return result;
    }

    if let Err(msg) = verify_bundle(archive) {
        result.fail(VerificationStatus::Invalid, msg);
        return result;
    }

    let meta_path = metadata_for(archive);
    let meta = if meta_path.exists() {
        check_metadata(&meta_path, &mut result)
    } else {
        result.warnings.push("metadata file missing".to_string());
        None
    };
    let Some(meta) = meta else {
        return result;
    };

    if deep {
        match (&meta.bundle_checksum, sha256_file(archive)) {
            (Some(expected), Ok(actual)) if *expected != actual => result
                .warnings
                .push(format!("checksum mismatch: recorded {expected}, actual {actual}")),
            (_, Err(e)) => result.warnings.push(format!("could not hash bundle: {e}")),
            _ => {}
        }
    }

    if meta.lfs_info.has_lfs {
        result.lfs_patterns = meta.lfs_info.lfs_patterns.clone();
        let lfs_bundle = lfs_bundle_for(archive);
        if !lfs_bundle.is_file() {
            let name = archive
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            result.fail(
                VerificationStatus::IncompleteLfs,
                format!("Missing LFS bundle for {name}"),
            );
            return result;
        }
        match verify_lfs_bundle(&lfs_bundle, deep) {
            Ok(n) => result.lfs_objects = n,
            Err(msg) => result.fail(VerificationStatus::IncompleteLfs, msg),
        }
    }

    result
}

/// Parse the metadata file, recording warnings for missing fields.
fn check_metadata(path: &Path, result: &mut VerificationResult) -> Option<ArchiveMetadata> {
    let raw: serde_json::Value = match std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|s| serde_json::from_str(&s).map_err(|e| e.to_string()))
    {
        Ok(v) => v,
        Err(e) => {
            result.warnings.push(format!("metadata unreadable: {e}"));
            return None;
        }
    };

    let missing = ArchiveMetadata::missing_fields(&raw);
    if !missing.is_empty() {
        result
            .warnings
            .push(format!("metadata incomplete, missing: {}", missing.join(", ")));
        return None;
    }

    match serde_json::from_value(raw) {
        Ok(meta) => Some(meta),
        Err(e) => {
            result.warnings.push(format!("metadata invalid: {e}"));
            None
        }
    }
}

/// Verify the archive of a known repository.
pub fn verify_repository(layout: &StorageLayout, id: &RepoId, deep: bool) -> VerificationResult {
    verify_archive(&layout.archive_path(id), id.as_str(), deep)
}

/// Results of verifying a whole storage directory.
#[derive(Debug, Default)]
pub struct VerificationReport {
    pub results: Vec<VerificationResult>,
}

impl VerificationReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn with_status(&self, status: VerificationStatus) -> Vec<&VerificationResult> {
        self.results.iter().filter(|r| r.status == status).collect()
    }

    pub fn count(&self, status: VerificationStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// Results that are not valid.
    pub fn problems(&self) -> Vec<&VerificationResult> {
        self.results.iter().filter(|r| !r.is_valid()).collect()
    }

    pub fn warning_count(&self) -> usize {
        self.results.iter().filter(|r| !r.warnings.is_empty()).count()
    }

    pub fn lfs_repos(&self) -> usize {
        self.results.iter().filter(|r| !r.lfs_patterns.is_empty()).count()
    }

    /// The `n` LFS patterns used by the most repositories, ties by name.
    pub fn top_lfs_patterns(&self, n: usize) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for result in &self.results {
            for pattern in &result.lfs_patterns {
                *counts.entry(pattern.as_str()).or_default() += 1;
            }
        }
        let mut ranked: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(p, c)| (p.to_string(), c))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }
}

/// Verify every archive in the storage directory.
pub fn verify_all(layout: &StorageLayout, deep: bool) -> VerificationReport {
    let results = catalog::downloaded_repos(layout)
        .iter()
        .map(|entry| verify_archive(&entry.archive_path, &entry.display_name(), deep))
        .collect();
    VerificationReport { results }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(label: &str, patterns: &[&str]) -> VerificationResult {
        let mut r = VerificationResult::new(label);
        r.lfs_patterns = patterns.iter().map(|p| p.to_string()).collect();
        r
    }

    #[test]
    fn test_parse_bundle_error() {
        let out = "warning: something\nerror: 'x.bundle' does not look like a v2 or v3 bundle file\n";
        assert_eq!(
            parse_bundle_error(out),
            "'x.bundle' does not look like a v2 or v3 bundle file"
        );
        assert_eq!(parse_bundle_error("fatal: boom"), "Unknown error");
    }

    #[test]
    fn test_missing_is_not_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());
        let r = verify_repository(&layout, &"org/none".parse().unwrap(), false);
        assert_eq!(r.status, VerificationStatus::Missing);
        assert_eq!(r.errors, vec!["Bundle file missing"]);
    }

    #[test]
    fn test_garbage_bundle_is_invalid() {
        if git_ops::version().is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("org_a.bundle");
        std::fs::write(&path, b"this is not a bundle").unwrap();
        let r = verify_archive(&path, "org/a", false);
        assert_eq!(r.status, VerificationStatus::Invalid);
        assert_eq!(r.errors.len(), 1);
        assert_ne!(r.errors[0], "");
    }

    #[test]
    fn test_lfs_bundle_checks() {
        let dir = tempfile::tempdir().unwrap();
        let bare = dir.path().join("bare");
        let oid = sha256_reader(&b"tensor"[..]).unwrap();
        let obj = bare.join("lfs/objects").join(&oid[0..2]).join(&oid[2..4]);
        std::fs::create_dir_all(&obj).unwrap();
        std::fs::write(obj.join(&oid), b"tensor").unwrap();
        let good = dir.path().join("good.lfs");
        crate::bundle::build_lfs_bundle(&bare, &good).unwrap();
        assert_eq!(verify_lfs_bundle(&good, true).unwrap(), 1);

        std::fs::write(obj.join(&oid), b"tampered").unwrap();
        let bad = dir.path().join("bad.lfs");
        crate::bundle::build_lfs_bundle(&bare, &bad).unwrap();
        assert_eq!(verify_lfs_bundle(&bad, false).unwrap(), 1);
        assert!(verify_lfs_bundle(&bad, true).unwrap_err().contains("corrupt"));

        std::fs::write(obj.join("stray"), b"x").unwrap();
        let odd = dir.path().join("odd.lfs");
        crate::bundle::build_lfs_bundle(&bare, &odd).unwrap();
        assert!(verify_lfs_bundle(&odd, false).unwrap_err().contains("unexpected entry"));
    }

    #[test]
    fn test_top_lfs_patterns() {
        let report = VerificationReport {
            results: vec![
                result("a", &["*.bin", "*.safetensors"]),
                result("b", &["*.safetensors"]),
                result("c", &["*.safetensors", "*.gguf"]),
                result("d", &[]),
            ],
        };
        let top = report.top_lfs_patterns(2);
        assert_eq!(top, vec![("*.safetensors".to_string(), 3), ("*.bin".to_string(), 1)]);
        assert_eq!(report.lfs_repos(), 3);
    }
}
