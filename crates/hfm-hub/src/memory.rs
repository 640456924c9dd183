use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use url::Url;

use hfm_core::error::HfmError;
use hfm_core::models::repo::{RemoteRepo, RepoId, RepoKind};

use crate::HubProvider;

/// In-memory hub for testing. Records every create and delete call.
pub struct MemoryHub {
    endpoint: Url,
    repos: Mutex<Vec<RemoteRepo>>,
    undeletable: Mutex<HashSet<RepoId>>,
    deleted: Mutex<Vec<(RepoId, RepoKind)>>,
    created: Mutex<Vec<(RepoId, RepoKind)>>,
    delete_calls: Mutex<usize>,
}

impl MemoryHub {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            repos: Mutex::new(Vec::new()),
            undeletable: Mutex::new(HashSet::new()),
            deleted: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            delete_calls: Mutex::new(0),
        }
    }

    pub fn with_repos(endpoint: Url, repos: Vec<RemoteRepo>) -> Self {
        let hub = Self::new(endpoint);
        *hub.repos.lock().unwrap() = repos;
        hub
    }

    pub fn add_repo(&self, repo: RemoteRepo) {
        self.repos.lock().unwrap().push(repo);
    }

    /// Make every delete of `id` fail.
    pub fn refuse_delete(&self, id: RepoId) {
        self.undeletable.lock().unwrap().insert(id);
    }

    pub fn deleted(&self) -> Vec<(RepoId, RepoKind)> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<(RepoId, RepoKind)> {
        self.created.lock().unwrap().clone()
    }

    /// Number of delete attempts, successful or not.
    pub fn delete_calls(&self) -> usize {
        *self.delete_calls.lock().unwrap()
    }
}

#[async_trait]
impl HubProvider for MemoryHub {
    async fn whoami(&self) -> Result<Option<String>, HfmError> {
        Ok(None)
    }

    async fn list_repos(&self, owner: &str, kind: RepoKind) -> Result<Vec<RemoteRepo>, HfmError> {
        Ok(self
            .repos
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.kind == kind && r.id.owner() == owner)
            .cloned()
            .collect())
    }

    async fn repo_size(&self, id: &RepoId, kind: RepoKind) -> Result<Option<u64>, HfmError> {
        self.repos
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.kind == kind && &r.id == id)
            .map(|r| r.size)
            .ok_or_else(|| HfmError::RepoNotFound {
                name: id.to_string(),
            })
    }

    async fn repo_exists(&self, id: &RepoId, kind: RepoKind) -> Result<bool, HfmError> {
        Ok(self
            .repos
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.kind == kind && &r.id == id))
    }

    async fn create_repo(&self, id: &RepoId, kind: RepoKind, _private: bool) -> Result<(), HfmError> {
        let mut repos = self.repos.lock().unwrap();
        if repos.iter().any(|r| r.kind == kind && &r.id == id) {
            return Err(HfmError::ApiError {
                status: 409,
                message: format!("{id} already exists"),
            });
        }
        repos.push(RemoteRepo::new(id.clone(), kind));
        self.created.lock().unwrap().push((id.clone(), kind));
        Ok(())
    }

    async fn delete_repo(&self, id: &RepoId, kind: RepoKind) -> Result<(), HfmError> {
        *self.delete_calls.lock().unwrap() += 1;
        if self.undeletable.lock().unwrap().contains(id) {
            return Err(HfmError::ApiError {
                status: 500,
                message: format!("cannot delete {id}"),
            });
        }
        let mut repos = self.repos.lock().unwrap();
        let before = repos.len();
        repos.retain(|r| !(r.kind == kind && &r.id == id));
        if repos.len() == before {
            return Err(HfmError::RepoNotFound {
                name: id.to_string(),
            });
        }
        self.deleted.lock().unwrap().push((id.clone(), kind));
        Ok(())
    }

    fn clone_url(&self, id: &RepoId, kind: RepoKind) -> String {
        crate::clone_url(&self.endpoint, id, kind, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hub() -> MemoryHub {
        MemoryHub::with_repos(
            Url::parse("file:///hub").unwrap(),
            vec![
                RemoteRepo::new("org/a".parse().unwrap(), RepoKind::Model),
                RemoteRepo::new("org/b".parse().unwrap(), RepoKind::Dataset),
                RemoteRepo::new("other/c".parse().unwrap(), RepoKind::Model),
            ],
        )
    }

    #[tokio::test]
    async fn test_list_filters_owner_and_kind() {
        let hub = hub();
        let models = hub.list_repos("org", RepoKind::Model).await.unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].id.as_str(), "org/a");
        assert_eq!(crate::list_kinds(&hub, "org", &RepoKind::ALL).await.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_and_refusal() {
        let hub = hub();
        let a: RepoId = "org/a".parse().unwrap();
        let b: RepoId = "org/b".parse().unwrap();
        hub.refuse_delete(b.clone());

        hub.delete_repo(&a, RepoKind::Model).await.unwrap();
        assert!(hub.delete_repo(&b, RepoKind::Dataset).await.is_err());
        assert_eq!(hub.delete_calls(), 2);
        assert_eq!(hub.deleted(), vec![(a, RepoKind::Model)]);
    }
}
