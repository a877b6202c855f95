use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::PipelineError;

/// Whole-request budget: connect, headers and body.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

static SPREADSHEET_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/spreadsheets/d/([a-zA-Z0-9_-]+)").unwrap());

/// Provider of the raw tabular text. Returns the whole body or fails; never
/// hands back a partial payload.
#[async_trait]
pub trait SheetSource: Send + Sync {
    fn describe(&self) -> String;

    async fn fetch(&self, cancel: &CancellationToken) -> Result<String, PipelineError>;
}

/// CSV export of one tab of a Google Sheet. The sheet must be public or
/// published for reading.
pub struct GoogleSheet {
    client: reqwest::Client,
    spreadsheet_id: String,
    gid: String,
}

impl GoogleSheet {
    pub fn from_url(sheet_url: &str, gid: &str) -> Result<Self, PipelineError> {
        let spreadsheet_id = extract_spreadsheet_id(sheet_url).ok_or_else(|| {
            PipelineError::RetrievalFailure(format!("no spreadsheet id in URL {}", sheet_url))
        })?;
        Ok(Self {
            client: build_client(FETCH_TIMEOUT)?,
            spreadsheet_id,
            gid: gid.trim().to_string(),
        })
    }

    /// Replace the request budget. A stalled server then ends the cycle with
    /// `RetrievalFailure` once `timeout` elapses.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, PipelineError> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    pub fn export_url(&self) -> String {
        format!(
            "https://docs.google.com/spreadsheets/d/{}/export?format=csv&gid={}",
            self.spreadsheet_id, self.gid
        )
    }
}

#[async_trait]
impl SheetSource for GoogleSheet {
    fn describe(&self) -> String {
        format!("sheet {} (gid {})", self.spreadsheet_id, self.gid)
    }

    async fn fetch(&self, cancel: &CancellationToken) -> Result<String, PipelineError> {
        let url = self.export_url();
        info!("Fetching sheet export: {}", url);
        self.download(&url, cancel).await
    }
}

impl GoogleSheet {
    async fn download(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, PipelineError> {
        let request = self.client.get(url).header(CACHE_CONTROL, "no-store").send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            r = request => r?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::RetrievalFailure(format!(
                "HTTP {} downloading CSV; make sure the sheet is published or shared for reading",
                status.as_u16()
            )));
        }
        let html_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("text/html"));

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            b = response.text() => b?,
        };
        debug!(bytes = body.len(), "sheet export received");

        if html_type || looks_like_html(&body) {
            return Err(PipelineError::RetrievalFailure(
                "provider returned an HTML page instead of CSV (sheet not public?)".into(),
            ));
        }
        Ok(body)
    }
}

/// Local CSV file, mostly for offline runs.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SheetSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self, cancel: &CancellationToken) -> Result<String, PipelineError> {
        let read = tokio::fs::read_to_string(&self.path);
        let text = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            r = read => r.map_err(|e| {
                PipelineError::RetrievalFailure(format!("{}: {}", self.path.display(), e))
            })?,
        };
        if looks_like_html(&text) {
            return Err(PipelineError::RetrievalFailure(format!(
                "{} is an HTML document, not CSV",
                self.path.display()
            )));
        }
        Ok(text)
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, PipelineError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

pub fn extract_spreadsheet_id(url: &str) -> Option<String> {
    SPREADSHEET_ID_RE
        .captures(url)
        .map(|c| c[1].to_string())
}

fn looks_like_html(body: &str) -> bool {
    let head: String = body.trim_start().chars().take(15).collect::<String>().to_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str =
        "https://docs.google.com/spreadsheets/d/120WSaF1Zu6h4-Edid_Yc7/edit?gid=0#gid=0";

    #[test]
    fn spreadsheet_id_from_edit_url() {
        assert_eq!(extract_spreadsheet_id(URL).as_deref(), Some("120WSaF1Zu6h4-Edid_Yc7"));
        assert_eq!(extract_spreadsheet_id("https://example.com/sheet"), None);
    }

    #[test]
    fn export_url_carries_gid() {
        let sheet = GoogleSheet::from_url(URL, " 1234 ").unwrap();
        let url = sheet.export_url();
        assert!(url.starts_with("https://docs.google.com/spreadsheets/d/120WSaF1Zu6h4-Edid_Yc7/"));
        assert!(url.ends_with("/export?format=csv&gid=1234"));
    }

    #[tokio::test]
    async fn stalled_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and never answer.
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let sheet = GoogleSheet::from_url(URL, "0")
            .unwrap()
            .with_timeout(Duration::from_millis(200))
            .unwrap();
        let url = format!("http://{}/export?format=csv&gid=0", addr);
        let started = std::time::Instant::now();
        let err = sheet.download(&url, &CancellationToken::new()).await.unwrap_err();

        assert!(err.is_retrieval(), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(10));
        server.abort();
    }

    #[test]
    fn bad_url_is_retrieval_failure() {
        let err = GoogleSheet::from_url("not a url", "0").err().unwrap();
        assert!(err.is_retrieval());
    }

    #[test]
    fn html_detection() {
        assert!(looks_like_html("  <!DOCTYPE html><html>"));
        assert!(looks_like_html("<HTML lang=es>"));
        assert!(!looks_like_html("Métrica,01/02\n<b>,1"));
    }

    #[tokio::test]
    async fn file_source_reads_whole_text() {
        let src = FileSource::new("tests/fixtures/turnos.csv");
        let text = src.fetch(&CancellationToken::new()).await.unwrap();
        assert!(text.starts_with("Métrica,"));
    }

    #[tokio::test]
    async fn missing_file_is_retrieval_failure() {
        let src = FileSource::new("tests/fixtures/nope.csv");
        let err = src.fetch(&CancellationToken::new()).await.unwrap_err();
        assert!(err.is_retrieval());
    }

    #[tokio::test]
    async fn html_file_rejected() {
        let src = FileSource::new("tests/fixtures/login_page.html");
        let err = src.fetch(&CancellationToken::new()).await.unwrap_err();
        assert!(err.is_retrieval());
    }

    #[tokio::test]
    async fn cancelled_before_read() {
        let token = CancellationToken::new();
        token.cancel();
        let src = FileSource::new("tests/fixtures/turnos.csv");
        assert_eq!(src.fetch(&token).await, Err(PipelineError::Cancelled));
    }
}
