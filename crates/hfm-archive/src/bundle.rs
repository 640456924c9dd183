use std::fs::File;
use std::io::{BufWriter, Read};
use std::path::Path;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use hfm_core::error::HfmError;

use crate::git_ops;

/// Directory inside a bare clone that holds fetched LFS objects.
pub const LFS_OBJECTS_DIR: &str = "lfs/objects";

/// Patterns from `.gitattributes` lines that route files through LFS.
pub fn parse_lfs_patterns(gitattributes: &str) -> Vec<String> {
    gitattributes
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#') && line.contains("filter=lfs"))
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// LFS patterns declared at HEAD of a bare clone.
pub fn detect_lfs_patterns(bare_dir: &Path) -> Result<Vec<String>, HfmError> {
    Ok(git_ops::show_blob(bare_dir, "HEAD:.gitattributes")?
        .map(|content| parse_lfs_patterns(&content))
        .unwrap_or_default())
}

/// Write every ref of `bare_dir` into a single bundle file and return its size.
pub fn build_bundle(bare_dir: &Path, bundle_path: &Path) -> Result<u64, HfmError> {
    git_ops::bundle_create(bare_dir, bundle_path)?;
    Ok(std::fs::metadata(bundle_path)?.len())
}

/// Pack the bare clone's LFS object store into a tar companion file.
///
/// Entries keep git-lfs's own layout (`lfs/objects/aa/bb/<oid>`) so the
/// archive can be unpacked straight into a `.git` directory. Returns the
/// number of objects written.
pub fn build_lfs_bundle(bare_dir: &Path, lfs_path: &Path) -> Result<usize, HfmError> {
    let objects = bare_dir.join(LFS_OBJECTS_DIR);
    let file = BufWriter::new(File::create(lfs_path)?);
    let mut builder = tar::Builder::new(file);
    builder.follow_symlinks(false);

    let mut count = 0;
    if objects.is_dir() {
        builder.append_dir_all(LFS_OBJECTS_DIR, &objects)?;
        count = WalkDir::new(&objects)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .count();
    }
    builder.into_inner()?.into_inner().map_err(|e| e.into_error())?;

    tracing::debug!("packed {count} LFS objects into {}", lfs_path.display());
    Ok(count)
}

/// Hex SHA-256 of a reader's content.
pub fn sha256_reader(mut reader: impl Read) -> Result<String, HfmError> {
    let mut hasher = Sha256::new();
    std::io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Hex SHA-256 of a file, streamed.
pub fn sha256_file(path: &Path) -> Result<String, HfmError> {
    sha256_reader(File::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lfs_patterns() {
        let attrs = "\
*.safetensors filter=lfs diff=lfs merge=lfs -text
# *.old filter=lfs diff=lfs merge=lfs -text
*.txt text
*.bin   filter=lfs diff=lfs merge=lfs -text
";
        assert_eq!(parse_lfs_patterns(attrs), vec!["*.safetensors", "*.bin"]);
        assert!(parse_lfs_patterns("").is_empty());
    }

    #[test]
    fn test_sha256_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_lfs_bundle_layout() {
        let dir = tempfile::tempdir().unwrap();
        let bare = dir.path().join("repo.git");
        let oid = sha256_reader(&b"weights"[..]).unwrap();
        let obj_dir = bare.join(LFS_OBJECTS_DIR).join(&oid[0..2]).join(&oid[2..4]);
        std::fs::create_dir_all(&obj_dir).unwrap();
        std::fs::write(obj_dir.join(&oid), b"weights").unwrap();

        let out = dir.path().join("repo.bundle.lfs");
        assert_eq!(build_lfs_bundle(&bare, &out).unwrap(), 1);

        let mut archive = tar::Archive::new(File::open(&out).unwrap());
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
            .collect();
        let expected = format!("lfs/objects/{}/{}/{}", &oid[0..2], &oid[2..4], oid);
        assert!(names.contains(&expected), "{names:?}");
    }

    #[test]
    fn test_lfs_bundle_without_objects_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("empty.bundle.lfs");
        assert_eq!(build_lfs_bundle(dir.path(), &out).unwrap(), 0);
        assert!(out.exists());
    }
}
