use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HfmError;

/// A Hub repository identifier of the form `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId(String);

impl RepoId {
    pub fn new(owner: &str, name: &str) -> Result<Self, HfmError> {
        format!("{owner}/{name}").parse()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn owner(&self) -> &str {
        self.0.split_once('/').map(|(o, _)| o).unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.0.split_once('/').map(|(_, n)| n).unwrap_or(&self.0)
    }

    /// Filesystem-safe form: `/` replaced with `_`.
    ///
    /// Not reversible when the name itself contains `_`; never parse a slug
    /// back into an id.
    pub fn slug(&self) -> String {
        self.0.replace('/', "_")
    }

    /// The same repository name under a different owner.
    pub fn with_owner(&self, owner: &str) -> Result<Self, HfmError> {
        Self::new(owner, self.name())
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RepoId {
    type Err = HfmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| HfmError::InvalidRepoId {
            value: s.to_string(),
            reason: reason.to_string(),
        };
        let (owner, name) = s.split_once('/').ok_or_else(|| invalid("expected owner/name"))?;
        if owner.is_empty() || name.is_empty() {
            return Err(invalid("owner and name must be non-empty"));
        }
        if name.contains('/') {
            return Err(invalid("more than one '/'"));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(invalid("contains whitespace"));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for RepoId {
    type Error = HfmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepoId> for String {
    fn from(id: RepoId) -> Self {
        id.0
    }
}

/// The kind of Hub repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoKind {
    Model,
    Dataset,
    Space,
}

impl RepoKind {
    pub const ALL: [RepoKind; 3] = [RepoKind::Model, RepoKind::Dataset, RepoKind::Space];

    /// Path prefix used in git URLs on the Hub.
    pub fn url_prefix(&self) -> &'static str {
        match self {
            RepoKind::Model => "",
            RepoKind::Dataset => "datasets/",
            RepoKind::Space => "spaces/",
        }
    }

    /// Collection segment used by the REST API (`/api/models`, ...).
    pub fn api_segment(&self) -> &'static str {
        match self {
            RepoKind::Model => "models",
            RepoKind::Dataset => "datasets",
            RepoKind::Space => "spaces",
        }
    }
}

impl std::fmt::Display for RepoKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepoKind::Model => write!(f, "model"),
            RepoKind::Dataset => write!(f, "dataset"),
            RepoKind::Space => write!(f, "space"),
        }
    }
}

impl std::str::FromStr for RepoKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "model" | "models" => Ok(RepoKind::Model),
            "dataset" | "datasets" => Ok(RepoKind::Dataset),
            "space" | "spaces" => Ok(RepoKind::Space),
            _ => Err(format!("unknown repo kind: {s}")),
        }
    }
}

/// A repository as returned by the Hub API.
#[derive(Debug, Clone)]
pub struct RemoteRepo {
    pub id: RepoId,
    pub kind: RepoKind,
    /// Total file size in bytes, when known.
    pub size: Option<u64>,
    pub private: bool,
    pub last_modified: Option<DateTime<Utc>>,
}

impl RemoteRepo {
    pub fn new(id: RepoId, kind: RepoKind) -> Self {
        Self {
            id,
            kind,
            size: None,
            private: false,
            last_modified: None,
        }
    }
}

/// Processing order for a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Smallest repositories first.
    Asc,
    /// Largest repositories first.
    Desc,
    /// Keep API order.
    #[default]
    None,
}

impl SortOrder {
    /// Sort by size; unknown sizes count as zero. Stable, so equal sizes keep API order.
    pub fn sort_by_size(&self, repos: &mut [RemoteRepo]) {
        match self {
            SortOrder::Asc => repos.sort_by_key(|r| r.size.unwrap_or(0)),
            SortOrder::Desc => repos.sort_by_key(|r| std::cmp::Reverse(r.size.unwrap_or(0))),
            SortOrder::None => {}
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "asc"),
            SortOrder::Desc => write!(f, "desc"),
            SortOrder::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            "none" => Ok(SortOrder::None),
            _ => Err(format!("unknown sort order: {s}")),
        }
    }
}

/// Human-readable byte count (`1.50 MB`).
pub fn human_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} PB")
}
