use serde::{Deserialize, Serialize};

/// Outcome of verifying one archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Valid,
    /// The bundle exists but fails structural verification.
    Invalid,
    /// No bundle at the expected path.
    Missing,
    /// The bundle is fine but its LFS companion is absent or broken.
    IncompleteLfs,
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationStatus::Valid => write!(f, "valid"),
            VerificationStatus::Invalid => write!(f, "invalid"),
            VerificationStatus::Missing => write!(f, "missing"),
            VerificationStatus::IncompleteLfs => write!(f, "incomplete_lfs"),
        }
    }
}

/// Per-archive verification record. Recomputed on every run, never persisted.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub label: String,
    pub status: VerificationStatus,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub lfs_patterns: Vec<String>,
    pub lfs_objects: usize,
}

impl VerificationResult {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            status: VerificationStatus::Valid,
            errors: Vec::new(),
            warnings: Vec::new(),
            lfs_patterns: Vec::new(),
            lfs_objects: 0,
        }
    }

    pub fn fail(&mut self, status: VerificationStatus, error: impl Into<String>) {
        self.status = status;
        self.errors.push(error.into());
    }

    pub fn is_valid(&self) -> bool {
        self.status == VerificationStatus::Valid
    }
}
