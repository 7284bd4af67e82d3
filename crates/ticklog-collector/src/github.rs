//! GitHub contents API 기반 원격 저장소.
//!
//! - `GET /repos/{repo}/contents/{path}?ref={branch}` → `200 {sha, content}` 또는 `404`
//! - `PUT /repos/{repo}/contents/{path}` → `200|201` 성공, `409` 버전 충돌
//!
//! 버전 토큰은 파일 blob의 `sha`입니다.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::RemoteConfig;
use crate::error::{CollectorError, StoreError};
use crate::remote_sync::{ContentStore, RemoteSnapshot};

const USER_AGENT: &str = concat!("ticklog-collector/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 커밋 작성자.
#[derive(Debug, Clone, Serialize)]
struct Committer {
    name: String,
    email: String,
}

impl Committer {
    /// GitHub noreply 주소를 사용하는 작성자.
    fn noreply(username: &str) -> Self {
        Self {
            name: username.to_string(),
            email: format!("{}@users.noreply.github.com", username),
        }
    }
}

#[derive(Debug, Serialize)]
struct PutContentRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    committer: Option<&'a Committer>,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    sha: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PutContentResponse {
    content: PutContentInfo,
}

#[derive(Debug, Deserialize)]
struct PutContentInfo {
    sha: String,
}

/// GitHub 저장소의 파일 하나를 가리키는 ContentStore.
pub struct GitHubContentStore {
    client: Client,
    api_url: String,
    repo: String,
    path: String,
    branch: String,
    token: SecretString,
    committer: Option<Committer>,
    message: String,
    label: String,
}

impl GitHubContentStore {
    pub fn new(config: &RemoteConfig) -> Result<Self, CollectorError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CollectorError::Config(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            repo: config.repo.clone(),
            path: config.path.trim_start_matches('/').to_string(),
            branch: config.branch.clone(),
            token: SecretString::from(config.token.expose_secret().to_string()),
            committer: config.username.as_deref().map(Committer::noreply),
            message: config.commit_message.clone(),
            label: config.describe(),
        })
    }

    fn contents_url(&self) -> String {
        format!("{}/repos/{}/contents/{}", self.api_url, self.repo, self.path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(self.token.expose_secret())
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    fn status_error(status: StatusCode, body: String) -> StoreError {
        match status {
            StatusCode::CONFLICT => StoreError::Conflict(body),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized {
                status: status.as_u16(),
                message: body,
            },
            _ => StoreError::Transport(format!("HTTP {}: {}", status.as_u16(), body)),
        }
    }

    fn decode_content(response: &ContentResponse) -> Result<Vec<u8>, StoreError> {
        match (response.encoding.as_deref(), response.content.as_deref()) {
            (Some("base64"), Some(encoded)) => {
                // GitHub은 60자마다 줄바꿈을 넣음
                let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
                STANDARD
                    .decode(compact)
                    .map_err(|e| StoreError::Malformed(format!("base64 디코딩 실패: {}", e)))
            }
            // 1MB 초과 파일은 내용 없이 sha만 내려옴
            _ => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl ContentStore for GitHubContentStore {
    async fn read(&self) -> Result<Option<RemoteSnapshot>, StoreError> {
        let response = self
            .authorized(self.client.get(self.contents_url()))
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(target_object = %self.describe(), "원격 객체 없음");
            return Ok(None);
        }

        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(match Self::status_error(status, body) {
                // 읽기 단계의 409는 버전 충돌이 아님
                StoreError::Conflict(message) => {
                    StoreError::Transport(format!("HTTP 409: {}", message))
                }
                other => other,
            });
        }

        let parsed: ContentResponse = serde_json::from_str(&body)
            .map_err(|e| StoreError::Malformed(format!("contents 응답 파싱 실패: {}", e)))?;
        let content = Self::decode_content(&parsed)?;

        Ok(Some(RemoteSnapshot {
            version: parsed.sha,
            content,
        }))
    }

    async fn write(&self, content: &[u8], version: Option<&str>) -> Result<String, StoreError> {
        let payload = PutContentRequest {
            message: &self.message,
            content: STANDARD.encode(content),
            branch: &self.branch,
            sha: version,
            committer: self.committer.as_ref(),
        };

        let response = self
            .authorized(self.client.put(self.contents_url()))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(Self::status_error(status, body));
        }

        let parsed: PutContentResponse = serde_json::from_str(&body)
            .map_err(|e| StoreError::Malformed(format!("PUT 응답 파싱 실패: {}", e)))?;
        Ok(parsed.content.sha)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
