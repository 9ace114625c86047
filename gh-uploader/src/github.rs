#![doc = "GitHub contents API client: the networked implementation of the core's RemoteRepository trait."]
//
//! # GitHub Integration (CLI <-> Core)
//!
//! This module wires the [`RemoteRepository`] contract from `gh-uploader-core`
//! to the hosted GitHub REST API:
//!
//! - `GET  {api_base}/repos/{owner}/{repo}/contents/{path}?ref={branch}`
//! - `PUT  {api_base}/repos/{owner}/{repo}/contents/{path}`
//!
//! The bearer credential travels with each [`UploadTarget`], so one client can
//! serve any number of targets. A 404 on lookup means "absent", every other
//! non-success status becomes [`UploadError::Transport`] (reads) or
//! [`UploadError::Rejected`] (writes).

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;

use gh_uploader_core::contract::{
    RemoteFileRef, RemoteRepository, UploadError, WriteReceipt, WriteRequest,
};
use gh_uploader_core::UploadTarget;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const GITHUB_JSON: &str = "application/vnd.github+json";
const GITHUB_RAW: &str = "application/vnd.github.raw+json";
const API_VERSION: &str = "2022-11-28";

/// Characters escaped inside a single path segment. `/` separators are kept.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Deserialize)]
struct ContentsBody {
    sha: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WriteBody {
    content: Option<WrittenContent>,
}

#[derive(Debug, Deserialize)]
struct WrittenContent {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: String,
}

pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
}

impl GitHubClient {
    pub fn new() -> Result<Self, UploadError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_JSON));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("gh-uploader/", env!("CARGO_PKG_VERSION"))),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(transport_error)?;

        tracing::info!(api_base = DEFAULT_API_BASE, "Initialized GitHubClient");
        Ok(Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }

    /// Point the client at another API root (GitHub Enterprise, test servers).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        tracing::info!(api_base = %self.api_base, "GitHubClient API base overridden");
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn contents_url(&self, target: &UploadTarget, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base,
            target.owner,
            target.repo,
            encode_path(path)
        )
    }

    fn get_contents(&self, target: &UploadTarget, path: &str) -> RequestBuilder {
        self.http
            .get(self.contents_url(target, path))
            .bearer_auth(&target.credential)
            .query(&[("ref", target.branch.as_str())])
    }

    /// Raw bytes of a file too large for the inline base64 payload.
    async fn fetch_raw(&self, target: &UploadTarget, path: &str) -> Result<Vec<u8>, UploadError> {
        tracing::info!(path, "Fetching raw file content");
        let resp = self
            .get_contents(target, path)
            .header(ACCEPT, GITHUB_RAW)
            .send()
            .await
            .map_err(transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            tracing::error!(path, status = %status, "Raw content request failed");
            return Err(status_error(status));
        }
        Ok(resp.bytes().await.map_err(transport_error)?.to_vec())
    }
}

#[async_trait]
impl RemoteRepository for GitHubClient {
    async fn lookup(
        &self,
        target: &UploadTarget,
        path: &str,
    ) -> Result<Option<RemoteFileRef>, UploadError> {
        tracing::info!(
            owner = %target.owner,
            repo = %target.repo,
            branch = %target.branch,
            path,
            "Looking up remote file"
        );
        let resp = self
            .get_contents(target, path)
            .send()
            .await
            .map_err(transport_error)?;
        let status = resp.status();

        if status == StatusCode::NOT_FOUND {
            tracing::info!(path, "Remote file not found");
            return Ok(None);
        }
        if !status.is_success() {
            tracing::error!(path, status = %status, "Failed to fetch file SHA");
            return Err(status_error(status));
        }

        let body: ContentsBody = resp.json().await.map_err(|e| UploadError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        // Small files come back inline; keep their bytes so no second request is needed.
        let decoded_content = match (body.encoding.as_deref(), body.content.as_deref()) {
            (Some("base64"), Some(encoded)) => Some(decode_base64(path, encoded)?),
            _ => None,
        };
        tracing::info!(path, sha = %body.sha, inline = decoded_content.is_some(), "Remote file exists");
        Ok(Some(RemoteFileRef {
            path: path.to_string(),
            sha: body.sha,
            decoded_content,
        }))
    }

    async fn fetch_content(
        &self,
        target: &UploadTarget,
        path: &str,
    ) -> Result<Vec<u8>, UploadError> {
        tracing::info!(path, "Fetching remote file content");
        let resp = self
            .get_contents(target, path)
            .send()
            .await
            .map_err(transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            tracing::error!(path, status = %status, "Failed to fetch remote content");
            return Err(status_error(status));
        }

        let body: ContentsBody = resp.json().await.map_err(|e| UploadError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        match (body.encoding.as_deref(), body.content.as_deref()) {
            (Some("base64"), Some(encoded)) => decode_base64(path, encoded),
            (encoding, _) => {
                tracing::info!(path, ?encoding, "Content not inline, falling back to raw download");
                self.fetch_raw(target, path).await
            }
        }
    }

    async fn put_contents(
        &self,
        target: &UploadTarget,
        request: &WriteRequest,
    ) -> Result<WriteReceipt, UploadError> {
        tracing::info!(
            owner = %target.owner,
            repo = %target.repo,
            branch = %request.branch,
            path = %request.path,
            overwrite = request.sha.is_some(),
            "Uploading file contents"
        );
        let resp = self
            .http
            .put(self.contents_url(target, &request.path))
            .bearer_auth(&target.credential)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;
        let status = resp.status();

        if status.is_success() {
            let sha = resp
                .json::<WriteBody>()
                .await
                .ok()
                .and_then(|b| b.content)
                .map(|c| c.sha);
            tracing::info!(path = %request.path, status = %status, ?sha, "Successfully uploaded file");
            return Ok(WriteReceipt {
                status: status.as_u16(),
                sha,
            });
        }

        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiMessage>(&text)
            .map(|m| m.message)
            .unwrap_or_else(|_| reason(status));
        tracing::error!(path = %request.path, status = %status, message = %message, "API error uploading file");
        Err(UploadError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// The API wraps base64 payloads at 60 columns.
fn decode_base64(path: &str, encoded: &str) -> Result<Vec<u8>, UploadError> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD.decode(compact).map_err(|e| UploadError::Decode {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

fn reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Unknown status")
        .to_string()
}

fn status_error(status: StatusCode) -> UploadError {
    UploadError::Transport {
        status: Some(status.as_u16()),
        status_text: reason(status),
    }
}

fn transport_error(e: reqwest::Error) -> UploadError {
    UploadError::Transport {
        status: e.status().map(|s| s.as_u16()),
        status_text: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn target() -> UploadTarget {
        UploadTarget::new("octocat", "notes", "main", "ghp_test")
    }

    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let length = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Serves the canned `(status, body)` responses to consecutive connections
    /// and hands back the raw requests it saw.
    async fn mock_server(
        responses: Vec<(u16, &str)>,
    ) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}");
        let responses: Vec<(u16, String)> = responses
            .into_iter()
            .map(|(status, body)| (status, body.to_string()))
            .collect();

        let handle = tokio::spawn(async move {
            let mut seen = Vec::new();
            for (status, body) in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                seen.push(read_request(&mut stream).await);
                let resp = format!(
                    "HTTP/1.1 {status} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
            seen
        });

        (url, handle)
    }

    fn client(url: String) -> GitHubClient {
        GitHubClient::new().unwrap().with_api_base(url)
    }

    fn body_json(request: &str) -> serde_json::Value {
        let body = request.split("\r\n\r\n").nth(1).unwrap_or_default();
        serde_json::from_str(body).unwrap()
    }

    #[tokio::test]
    async fn lookup_returns_none_on_404() {
        let (url, handle) = mock_server(vec![(404, r#"{"message":"Not Found"}"#)]).await;

        let found = client(url).lookup(&target(), "notes.txt").await.unwrap();
        assert!(found.is_none());

        let requests = handle.await.unwrap();
        assert!(
            requests[0].starts_with("GET /repos/octocat/notes/contents/notes.txt?ref=main "),
            "unexpected request line: {}",
            requests[0]
        );
        assert!(requests[0]
            .to_lowercase()
            .contains("authorization: bearer ghp_test"));
    }

    #[tokio::test]
    async fn lookup_reads_sha_and_inline_content() {
        let json = r#"{"sha":"ce013625030ba8dba906f756967f9e9ca394464a","encoding":"base64","content":"aGVs\nbG8K\n"}"#;
        let (url, handle) = mock_server(vec![(200, json)]).await;

        let found = client(url)
            .lookup(&target(), "notes.txt")
            .await
            .unwrap()
            .expect("file exists");
        assert_eq!(found.sha, "ce013625030ba8dba906f756967f9e9ca394464a");
        assert_eq!(found.decoded_content.as_deref(), Some(&b"hello\n"[..]));
        handle.abort();
    }

    #[tokio::test]
    async fn lookup_maps_other_statuses_to_transport_errors() {
        let (url, handle) = mock_server(vec![(500, r#"{"message":"boom"}"#)]).await;

        let err = client(url).lookup(&target(), "notes.txt").await.unwrap_err();
        assert_eq!(
            err,
            UploadError::Transport {
                status: Some(500),
                status_text: "Internal Server Error".into()
            }
        );
        handle.abort();
    }

    #[tokio::test]
    async fn fetch_content_falls_back_to_raw_for_large_files() {
        let (url, handle) = mock_server(vec![
            (200, r#"{"sha":"abc","encoding":"none","content":""}"#),
            (200, "raw file body\n"),
        ])
        .await;

        let content = client(url)
            .fetch_content(&target(), "big.log.part1")
            .await
            .unwrap();
        assert_eq!(content, b"raw file body\n");

        let requests = handle.await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[1]
            .to_lowercase()
            .contains("accept: application/vnd.github.raw+json"));
    }

    #[tokio::test]
    async fn put_sends_message_content_branch_and_no_sha_for_new_files() {
        let (url, handle) = mock_server(vec![(201, r#"{"content":{"sha":"newsha"}}"#)]).await;

        let request = WriteRequest {
            path: "notes.txt".into(),
            message: "Upload/Overwrite notes.txt".into(),
            content: "aGVsbG8Kd29ybGQ=".into(),
            branch: "main".into(),
            sha: None,
        };
        let receipt = client(url).put_contents(&target(), &request).await.unwrap();
        assert_eq!(receipt.status, 201);
        assert_eq!(receipt.sha.as_deref(), Some("newsha"));

        let requests = handle.await.unwrap();
        assert!(requests[0].starts_with("PUT /repos/octocat/notes/contents/notes.txt "));
        let body = body_json(&requests[0]);
        assert_eq!(body["message"], "Upload/Overwrite notes.txt");
        assert_eq!(body["content"], "aGVsbG8Kd29ybGQ=");
        assert_eq!(body["branch"], "main");
        assert!(body.get("sha").is_none());
    }

    #[tokio::test]
    async fn put_reports_remote_message_on_conflict() {
        let (url, handle) = mock_server(vec![(409, r#"{"message":"Conflict"}"#)]).await;

        let request = WriteRequest {
            path: "notes.txt".into(),
            message: "Upload/Overwrite notes.txt".into(),
            content: "eA==".into(),
            branch: "main".into(),
            sha: Some("stale".into()),
        };
        let err = client(url)
            .put_contents(&target(), &request)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            UploadError::Rejected {
                status: 409,
                message: "Conflict".into()
            }
        );

        let requests = handle.await.unwrap();
        assert_eq!(body_json(&requests[0])["sha"], "stale");
    }

    #[test]
    fn path_segments_are_percent_encoded() {
        assert_eq!(encode_path("notes.txt"), "notes.txt");
        assert_eq!(encode_path("dir/my notes#1.txt"), "dir/my%20notes%231.txt");
    }

    #[test]
    fn wrapped_base64_is_decoded() {
        assert_eq!(
            decode_base64("x", "aGVsbG8K\nd29ybGQ=\n").unwrap(),
            b"hello\nworld"
        );
        assert!(matches!(
            decode_base64("x", "***"),
            Err(UploadError::Decode { .. })
        ));
    }
}
