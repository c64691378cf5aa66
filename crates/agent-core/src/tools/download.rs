//! File downloads into the configured downloads directory.
//!
//! Two paths produce the bytes: a direct GET through `reqwest`, or an in-page `fetch`
//! that carries the tab's cookies and returns the body base64-encoded. Both end in
//! [`Downloader::save`].

use std::path::{Path, PathBuf};

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;
use url::Url;

pub const DEFAULT_FILENAME: &str = "download";
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";
const MAX_FILENAME_LEN: usize = 100;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid download url: {0}")]
    InvalidUrl(String),

    #[error("download request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("page fetch failed: {0}")]
    Page(String),

    #[error("failed to decode page payload: {0}")]
    Decode(String),

    #[error("failed to write download: {0}")]
    Io(#[from] std::io::Error),
}

/// A file written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadInfo {
    pub filename: String,
    pub file_path: PathBuf,
    pub size: u64,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub struct Downloader {
    http: reqwest::Client,
    dir: PathBuf,
}

impl Downloader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_client(reqwest::Client::new(), dir)
    }

    pub fn with_client(http: reqwest::Client, dir: impl Into<PathBuf>) -> Self {
        Self {
            http,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// GET `url` without any browser context.
    pub async fn fetch_direct(
        &self,
        url: &str,
        filename: Option<&str>,
    ) -> Result<DownloadInfo, DownloadError> {
        let parsed = Url::parse(url).map_err(|err| DownloadError::InvalidUrl(format!("{url}: {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownloadError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        let response = self.http.get(parsed).send().await?.error_for_status()?;
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
        let bytes = response.bytes().await?;

        self.save(url, filename, &bytes, &mime_type).await
    }

    /// Writes `bytes` under a sanitized name, replacing any existing file.
    pub async fn save(
        &self,
        url: &str,
        filename: Option<&str>,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<DownloadInfo, DownloadError> {
        let filename = resolve_filename(url, filename);
        tokio::fs::create_dir_all(&self.dir).await?;
        let file_path = self.dir.join(&filename);
        tokio::fs::write(&file_path, bytes).await?;

        info!(
            target: "agent-tools",
            %url,
            path = %file_path.display(),
            size = bytes.len(),
            "file downloaded"
        );

        Ok(DownloadInfo {
            filename,
            file_path,
            size: bytes.len() as u64,
            mime_type: mime_type.to_string(),
        })
    }
}

/// Script run in the active tab; resolves to `{data, mimeType}`.
pub fn page_fetch_script(url: &str) -> String {
    let url = Value::String(url.to_string());
    format!(
        r#"(async () => {{
  const response = await fetch({url}, {{ credentials: 'include' }});
  if (!response.ok) {{
    throw new Error('HTTP ' + response.status + ' ' + response.statusText);
  }}
  const blob = await response.blob();
  const bytes = new Uint8Array(await blob.arrayBuffer());
  let binary = '';
  for (let i = 0; i < bytes.length; i += 0x8000) {{
    binary += String.fromCharCode.apply(null, bytes.subarray(i, i + 0x8000));
  }}
  return {{ data: btoa(binary), mimeType: blob.type || '{DEFAULT_MIME_TYPE}' }};
}})()"#
    )
}

/// Decodes the object returned by [`page_fetch_script`].
pub fn decode_page_payload(payload: &Value) -> Result<(Vec<u8>, String), DownloadError> {
    let data = payload
        .get("data")
        .and_then(Value::as_str)
        .ok_or_else(|| DownloadError::Page("page fetch returned no data".to_string()))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|err| DownloadError::Decode(err.to_string()))?;
    let mime_type = payload
        .get("mimeType")
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_MIME_TYPE)
        .to_string();
    Ok((bytes, mime_type))
}

/// Explicit name, else the last URL path segment, else `download`; always sanitized.
pub fn resolve_filename(url: &str, explicit: Option<&str>) -> String {
    explicit
        .filter(|name| !name.trim().is_empty())
        .map(str::to_string)
        .or_else(|| url_basename(url))
        .map(|name| sanitize_filename(&name))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

fn url_basename(url: &str) -> Option<String> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    path.rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Keeps ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `_`.
/// Leading dots are dropped so the result can never name a parent or hidden file.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let mut cleaned = cleaned.trim_start_matches('.').to_string();
    cleaned.truncate(MAX_FILENAME_LEN);
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_once(status: &'static str, content_type: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.expect("head");
            socket.write_all(body).await.expect("body");
        });
        format!("http://{addr}")
    }

    fn downloader(dir: &Path) -> Downloader {
        let http = reqwest::Client::builder()
            .no_proxy()
            .build()
            .expect("client");
        Downloader::with_client(http, dir)
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("report 2024.pdf"), "report_2024.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename("..."), "");
        assert_eq!(sanitize_filename(&"a".repeat(300)).len(), MAX_FILENAME_LEN);
    }

    #[test]
    fn filename_resolution_order() {
        assert_eq!(
            resolve_filename("https://x.test/files/data.csv?sig=1", Some("mine.csv")),
            "mine.csv"
        );
        assert_eq!(
            resolve_filename("https://x.test/files/data.csv?sig=1", None),
            "data.csv"
        );
        assert_eq!(resolve_filename("https://x.test/", Some("  ")), DEFAULT_FILENAME);
        assert_eq!(resolve_filename("/export/report.xlsx#top", None), "report.xlsx");
    }

    #[test]
    fn page_payload_decoding() {
        let (bytes, mime) =
            decode_page_payload(&json!({ "data": "aGVsbG8=", "mimeType": "text/plain" }))
                .expect("payload");
        assert_eq!(bytes, b"hello");
        assert_eq!(mime, "text/plain");

        let (_, mime) = decode_page_payload(&json!({ "data": "" })).expect("empty body");
        assert_eq!(mime, DEFAULT_MIME_TYPE);

        assert!(matches!(
            decode_page_payload(&json!({ "data": "not base64!" })),
            Err(DownloadError::Decode(_))
        ));
        assert!(matches!(decode_page_payload(&Value::Null), Err(DownloadError::Page(_))));
    }

    #[test]
    fn page_script_embeds_url_as_literal() {
        let script = page_fetch_script("https://x.test/a'b\"c");
        assert!(script.contains(r#"fetch("https://x.test/a'b\"c""#));
        assert!(script.contains("credentials: 'include'"));
    }

    #[tokio::test]
    async fn direct_download_writes_file() {
        let base = serve_once("200 OK", "text/csv; charset=utf-8", b"a,b\n1,2\n").await;
        let dir = tempfile::tempdir().expect("tempdir");
        let downloader = downloader(&dir.path().join("downloads"));

        let info = downloader
            .fetch_direct(&format!("{base}/exports/table.csv"), None)
            .await
            .expect("download");

        assert_eq!(info.filename, "table.csv");
        assert_eq!(info.size, 8);
        assert_eq!(info.mime_type, "text/csv");
        let written = tokio::fs::read(&info.file_path).await.expect("file");
        assert_eq!(written, b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn direct_download_reports_http_errors() {
        let base = serve_once("404 Not Found", "text/plain", b"missing").await;
        let dir = tempfile::tempdir().expect("tempdir");
        let err = downloader(dir.path())
            .fetch_direct(&format!("{base}/gone.pdf"), None)
            .await
            .expect_err("404");
        assert!(matches!(err, DownloadError::Http(_)));
    }

    #[tokio::test]
    async fn rejects_non_http_urls() {
        let dir = tempfile::tempdir().expect("tempdir");
        let downloader = downloader(dir.path());
        assert!(matches!(
            downloader.fetch_direct("file:///etc/passwd", None).await,
            Err(DownloadError::InvalidUrl(_))
        ));
        assert!(matches!(
            downloader.fetch_direct("not a url", None).await,
            Err(DownloadError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn save_overwrites_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let downloader = downloader(dir.path());
        downloader
            .save("https://x.test/a.txt", None, b"first", "text/plain")
            .await
            .expect("first");
        let info = downloader
            .save("https://x.test/a.txt", None, b"second", "text/plain")
            .await
            .expect("second");
        assert_eq!(tokio::fs::read(&info.file_path).await.expect("file"), b"second");
    }
}
