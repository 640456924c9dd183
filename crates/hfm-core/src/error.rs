use std::path::PathBuf;

/// Central error type for hfmirror.
#[derive(Debug, thiserror::Error)]
pub enum HfmError {
    #[error("invalid repository id '{value}': {reason}")]
    InvalidRepoId { value: String, reason: String },

    #[error("repo not found: {name}")]
    RepoNotFound { name: String },

    #[error("authentication failed: {message}")]
    AuthFailed { message: String },

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("rate limited by the hub, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("{command} failed: {stderr}")]
    Command {
        command: String,
        stderr: String,
        transient: bool,
    },

    #[error("gave up after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: Box<HfmError> },

    #[error("archive missing: {path}")]
    MissingArchive { path: PathBuf },

    #[error("missing LFS bundle: {path}")]
    MissingLfsBundle { path: PathBuf },

    #[error("invalid metadata at {path}: {message}")]
    InvalidMetadata { path: PathBuf, message: String },

    #[error("path not found: {path}")]
    PathNotFound { path: PathBuf },

    #[error("source and target are the same account: {owner}")]
    SameAccount { owner: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("credential error: {message}")]
    CredentialError { message: String },

    #[error("{0}")]
    Other(String),
}

impl HfmError {
    /// Whether retrying the failed operation could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            HfmError::Command { transient, .. } => *transient,
            HfmError::RateLimited { .. } => true,
            HfmError::ApiError { status, .. } => *status == 0 || *status >= 500,
            HfmError::Io(_) => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for HfmError {
    fn from(e: serde_json::Error) -> Self {
        HfmError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let transient = HfmError::Command {
            command: "git clone".into(),
            stderr: "early EOF".into(),
            transient: true,
        };
        assert!(transient.is_transient());

        let permanent = HfmError::Command {
            command: "git clone".into(),
            stderr: "repository not found".into(),
            transient: false,
        };
        assert!(!permanent.is_transient());

        assert!(HfmError::ApiError { status: 503, message: String::new() }.is_transient());
        assert!(!HfmError::ApiError { status: 404, message: String::new() }.is_transient());
        assert!(!HfmError::AuthFailed { message: "bad token".into() }.is_transient());
    }
}
