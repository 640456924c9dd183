use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use hfm_core::error::HfmError;
use hfm_core::models::repo::{RemoteRepo, RepoId, RepoKind};

use crate::{HubProvider, SIZE_EXCLUDED_FILES};

/// Page size requested from listing endpoints.
const PAGE_LIMIT: u32 = 1000;

pub struct HuggingFaceProvider {
    client: reqwest::Client,
    endpoint: Url,
    token: Option<String>,
    git_user: String,
}

impl HuggingFaceProvider {
    pub fn new(endpoint: Url, token: Option<String>, git_user: String) -> Result<Self, HfmError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(ref token) = token {
            if let Ok(val) = HeaderValue::from_str(&format!("Bearer {token}")) {
                headers.insert(header::AUTHORIZATION, val);
            }
        }
        headers.insert(header::USER_AGENT, HeaderValue::from_static("hfm/0.1.0"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| HfmError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            token,
            git_user,
        })
    }

    fn url(&self, path: &str) -> String {
        let base = self.endpoint.as_str().trim_end_matches('/');
        format!("{base}{path}")
    }

    async fn get(&self, url: &str) -> Result<Response, HfmError> {
        self.client.get(url).send().await.map_err(request_error)
    }

    /// Follow `Link: <...>; rel="next"` headers until exhausted.
    async fn paginated_get<T: for<'de> Deserialize<'de>>(
        &self,
        first_url: String,
    ) -> Result<Vec<T>, HfmError> {
        let mut all = Vec::new();
        let mut next = Some(first_url);

        while let Some(url) = next.take() {
            let resp = check(self.get(&url).await?).await?;
            next = next_link(resp.headers());

            let items: Vec<T> = resp.json().await.map_err(|e| HfmError::ApiError {
                status: 0,
                message: format!("JSON parse error: {e}"),
            })?;
            all.extend(items);
        }

        Ok(all)
    }

    fn repo_payload(id: &RepoId, kind: RepoKind) -> serde_json::Value {
        let mut body = json!({
            "name": id.name(),
            "organization": id.owner(),
        });
        if kind != RepoKind::Model {
            body["type"] = json!(kind.to_string());
        }
        body
    }
}

fn request_error(e: reqwest::Error) -> HfmError {
    HfmError::ApiError {
        status: 0,
        message: e.to_string(),
    }
}

/// Map a non-success response to the matching error.
async fn check(resp: Response) -> Result<Response, HfmError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            let body = resp.text().await.unwrap_or_default();
            Err(HfmError::AuthFailed { message: body })
        }
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after_secs = resp
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);
            Err(HfmError::RateLimited { retry_after_secs })
        }
        _ => {
            let body = resp.text().await.unwrap_or_default();
            Err(HfmError::ApiError {
                status: status.as_u16(),
                message: body,
            })
        }
    }
}

/// Extract the `rel="next"` target from a `Link` header.
fn next_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(header::LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        if !params.contains("rel=\"next\"") {
            return None;
        }
        let target = target.trim();
        Some(target.strip_prefix('<')?.strip_suffix('>')?.to_string())
    })
}

#[derive(Deserialize)]
struct HfRepo {
    id: String,
    #[serde(default)]
    private: bool,
    #[serde(rename = "lastModified", default)]
    last_modified: Option<String>,
}

#[derive(Deserialize)]
struct HfRepoInfo {
    #[serde(default)]
    siblings: Vec<HfSibling>,
}

#[derive(Deserialize)]
struct HfSibling {
    rfilename: String,
    size: Option<u64>,
}

#[derive(Deserialize)]
struct HfWhoami {
    name: String,
}

impl HfRepo {
    fn into_remote(self, kind: RepoKind) -> Option<RemoteRepo> {
        let id = match self.id.parse::<RepoId>() {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("skipping unrecognised repo id from hub: {e}");
                return None;
            }
        };
        let mut repo = RemoteRepo::new(id, kind);
        repo.private = self.private;
        repo.last_modified = self
            .last_modified
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Some(repo)
    }
}

impl HfRepoInfo {
    fn total_size(&self) -> Option<u64> {
        let sizes: Vec<u64> = self
            .siblings
            .iter()
            .filter(|s| !SIZE_EXCLUDED_FILES.contains(&s.rfilename.as_str()))
            .filter_map(|s| s.size)
            .collect();
        if sizes.is_empty() {
            None
        } else {
            Some(sizes.iter().sum())
        }
    }
}

#[async_trait]
impl HubProvider for HuggingFaceProvider {
    async fn whoami(&self) -> Result<Option<String>, HfmError> {
        if self.token.is_none() {
            return Ok(None);
        }
        let resp = check(self.get(&self.url("/api/whoami-v2")).await?).await?;
        let who: HfWhoami = resp.json().await.map_err(|e| HfmError::ApiError {
            status: 0,
            message: format!("JSON parse error: {e}"),
        })?;
        Ok(Some(who.name))
    }

    async fn list_repos(&self, owner: &str, kind: RepoKind) -> Result<Vec<RemoteRepo>, HfmError> {
        let base = self.url(&format!("/api/{}", kind.api_segment()));
        let limit = PAGE_LIMIT.to_string();
        let first = Url::parse_with_params(&base, &[("author", owner), ("limit", limit.as_str())])
            .map_err(|e| HfmError::Other(format!("invalid listing URL: {e}")))?;

        let repos: Vec<HfRepo> = self.paginated_get(first.to_string()).await?;
        tracing::debug!("listed {} {kind}s for {owner}", repos.len());
        Ok(repos
            .into_iter()
            .filter_map(|r| r.into_remote(kind))
            .collect())
    }

    async fn repo_size(&self, id: &RepoId, kind: RepoKind) -> Result<Option<u64>, HfmError> {
        let url = self.url(&format!("/api/{}/{id}?blobs=true", kind.api_segment()));
        let resp = self.get(&url).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(HfmError::RepoNotFound {
                name: id.to_string(),
            });
        }
        let info: HfRepoInfo = check(resp).await?.json().await.map_err(|e| HfmError::ApiError {
            status: 0,
            message: format!("JSON parse error: {e}"),
        })?;
        Ok(info.total_size())
    }

    async fn repo_exists(&self, id: &RepoId, kind: RepoKind) -> Result<bool, HfmError> {
        let url = self.url(&format!("/api/{}/{id}", kind.api_segment()));
        let resp = self.get(&url).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(resp).await?;
        Ok(true)
    }

    async fn create_repo(&self, id: &RepoId, kind: RepoKind, private: bool) -> Result<(), HfmError> {
        let mut body = Self::repo_payload(id, kind);
        body["private"] = json!(private);
        if kind == RepoKind::Space {
            body["sdk"] = json!("static");
        }
        let resp = self
            .client
            .post(self.url("/api/repos/create"))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;
        check(resp).await?;
        tracing::info!("created {kind} {id}");
        Ok(())
    }

    async fn delete_repo(&self, id: &RepoId, kind: RepoKind) -> Result<(), HfmError> {
        let resp = self
            .client
            .delete(self.url("/api/repos/delete"))
            .json(&Self::repo_payload(id, kind))
            .send()
            .await
            .map_err(request_error)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(HfmError::RepoNotFound {
                name: id.to_string(),
            });
        }
        check(resp).await?;
        tracing::info!("deleted {kind} {id}");
        Ok(())
    }

    fn clone_url(&self, id: &RepoId, kind: RepoKind) -> String {
        let credentials = self.token.as_deref().map(|t| (self.git_user.as_str(), t));
        crate::clone_url(&self.endpoint, id, kind, credentials)
    }
}
