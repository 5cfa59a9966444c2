//! HTTP client for the remote compiler/validator service

use crate::error::{StoreError, StoreResult};
use crate::outcome::{classify_submission, SubmissionOutcome};
use crate::store::ArtifactStore;
use async_trait::async_trait;
use flowsmith_resilience::{classify_status, RetryPolicy};
use flowsmith_types::{ArtifactVersion, FlowsmithError, FlowsmithResult};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Artifact store backed by the remote validator's REST API.
pub struct HttpArtifactStore {
    client: Client,
    base_url: String,
    root: Url,
    api_token: Option<String>,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateArtifactRequest<'a> {
    artifact_id: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateVersionRequest<'a> {
    version: &'a str,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    document: &'a str,
}

#[derive(Debug, Serialize)]
struct DeployRequest<'a> {
    environment: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VersionListing {
    Bare(Vec<VersionEntry>),
    Wrapped { versions: Vec<VersionEntry> },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VersionEntry {
    Tag(String),
    Detailed {
        #[serde(alias = "version", alias = "versionId", alias = "version_id")]
        tag: String,
        #[serde(default, alias = "isLocked", alias = "is_locked")]
        locked: bool,
    },
}

#[derive(Debug, Default, Deserialize)]
struct DeployResponse {
    #[serde(
        default,
        alias = "previewUrl",
        alias = "preview_url",
        alias = "previewLocator",
        alias = "url"
    )]
    preview_locator: Option<String>,
}

impl HttpArtifactStore {
    /// Create a new store client
    pub fn new(
        base_url: &str,
        api_token: Option<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> StoreResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let root = Url::parse(base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| FlowsmithError::Config(format!("invalid validator base url: {}", base_url)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            root,
            api_token,
            retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL plus `segments`, each percent-encoded as one path segment.
    fn url(&self, segments: &[&str]) -> FlowsmithResult<Url> {
        let mut url = self.root.clone();
        url.path_segments_mut()
            .map_err(|_| FlowsmithError::Config(format!("invalid validator base url: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> FlowsmithResult<Response> {
        self.authorize(request).send().await.map_err(|err| {
            if err.is_timeout() {
                FlowsmithError::Network(format!("request timed out: {}", err))
            } else {
                FlowsmithError::Network(err.to_string())
            }
        })
    }

    /// One listing attempt; `None` when the artifact does not exist.
    async fn fetch_versions(&self, artifact_id: &str) -> FlowsmithResult<Option<Vec<ArtifactVersion>>> {
        let response = self
            .send(self.client.get(self.url(&["artifacts", artifact_id, "versions"])?))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(failure(response).await);
        }

        let listing: VersionListing = response
            .json()
            .await
            .map_err(|err| FlowsmithError::remote(None, format!("unreadable version listing: {}", err)))?;
        let entries = match listing {
            VersionListing::Bare(entries) | VersionListing::Wrapped { versions: entries } => entries,
        };

        Ok(Some(
            entries
                .into_iter()
                .map(|entry| match entry {
                    VersionEntry::Tag(tag) => ArtifactVersion::new(artifact_id, tag),
                    VersionEntry::Detailed { tag, locked } => ArtifactVersion {
                        locked,
                        ..ArtifactVersion::new(artifact_id, tag)
                    },
                })
                .collect(),
        ))
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn list_versions(&self, artifact_id: &str) -> StoreResult<Vec<ArtifactVersion>> {
        let listed = self
            .retry
            .run("list_versions", || self.fetch_versions(artifact_id))
            .await?;
        let versions = listed.ok_or_else(|| StoreError::ArtifactMissing(artifact_id.to_string()))?;
        debug!(artifact_id, count = versions.len(), "Listed versions");
        Ok(versions)
    }

    async fn create_artifact(&self, artifact_id: &str) -> StoreResult<()> {
        let response = self
            .send(
                self.client
                    .post(self.url(&["artifacts"])?)
                    .json(&CreateArtifactRequest { artifact_id }),
            )
            .await?;

        match response.status() {
            status if status.is_success() => {
                info!(artifact_id, "Created artifact");
                Ok(())
            }
            StatusCode::CONFLICT => {
                debug!(artifact_id, "Artifact already exists");
                Ok(())
            }
            _ => Err(failure(response).await.into()),
        }
    }

    async fn create_version(&self, artifact_id: &str, tag: &str) -> StoreResult<ArtifactVersion> {
        let response = self
            .send(
                self.client
                    .post(self.url(&["artifacts", artifact_id, "versions"])?)
                    .json(&CreateVersionRequest { version: tag }),
            )
            .await?;

        match response.status() {
            status if status.is_success() => {
                info!(artifact_id, version = tag, "Created version");
                Ok(ArtifactVersion::new(artifact_id, tag))
            }
            StatusCode::CONFLICT => {
                debug!(artifact_id, version = tag, "Version already exists");
                Ok(ArtifactVersion::new(artifact_id, tag))
            }
            StatusCode::NOT_FOUND => Err(StoreError::ArtifactMissing(artifact_id.to_string())),
            _ => Err(failure(response).await.into()),
        }
    }

    async fn submit(
        &self,
        artifact_id: &str,
        tag: &str,
        document: &str,
    ) -> StoreResult<SubmissionOutcome> {
        let response = self
            .send(
                self.client
                    .post(self.url(&["artifacts", artifact_id, "versions", tag, "submissions"])?)
                    .json(&SubmitRequest { document }),
            )
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::VersionMissing {
                artifact_id: artifact_id.to_string(),
                version: tag.to_string(),
            });
        }

        let retry_after = retry_after_header(&response);
        let body = response.text().await?;
        debug!(artifact_id, version = tag, status = status.as_u16(), "Submission answered");
        Ok(classify_submission(status.as_u16(), &body, retry_after.as_deref())?)
    }

    async fn deploy(
        &self,
        artifact_id: &str,
        tag: &str,
        environment: &str,
    ) -> StoreResult<Option<String>> {
        let response = self
            .send(
                self.client
                    .post(self.url(&["artifacts", artifact_id, "versions", tag, "deployments"])?)
                    .json(&DeployRequest { environment }),
            )
            .await?;

        if !response.status().is_success() {
            return Err(failure(response).await.into());
        }

        let body = response.text().await?;
        let deployed: DeployResponse = serde_json::from_str(&body).unwrap_or_default();
        info!(artifact_id, version = tag, environment, "Deployed version");
        Ok(deployed.preview_locator)
    }
}

fn retry_after_header(response: &Response) -> Option<String> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn failure(response: Response) -> FlowsmithError {
    let status = response.status().as_u16();
    let retry_after = retry_after_header(&response);
    let message = response.text().await.unwrap_or_default();
    classify_status(status, retry_after.as_deref()).into_error(status, message)
}
