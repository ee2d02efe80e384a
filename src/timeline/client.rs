use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{multipart, Client};
use thiserror::Error;

use super::model::{AnalysisResponse, Timeline};

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("analyzer request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("analyzer returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("analyzer rejected the file: {0}")]
    Rejected(String),

    #[error("invalid analyzer response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to read audio file: {0}")]
    Io(#[from] std::io::Error),
}

/// Blocking client for the offline analysis service
pub struct AnalyzerClient {
    base_url: String,
    http: Client,
}

impl AnalyzerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AnalyzerError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/analyze", self.base_url)
    }

    /// Upload `path` as the `audio` form field and return the sorted timeline.
    pub fn analyze(&self, path: &Path) -> Result<Timeline, AnalyzerError> {
        let form = multipart::Form::new().file("audio", path)?;

        log::info!("Uploading {} to {}...", path.display(), self.endpoint());
        let response = self.http.post(self.endpoint()).multipart(form).send()?;

        let status = response.status();
        let body = response.text()?;
        parse_response(status.as_u16(), &body)
    }
}

/// The service answers 400 with `{"error": ...}` for bad uploads, so a JSON
/// error body wins over the bare status.
fn parse_response(status: u16, body: &str) -> Result<Timeline, AnalyzerError> {
    if !(200..300).contains(&status) {
        if let Ok(parsed) = serde_json::from_str::<AnalysisResponse>(body) {
            if let Some(error) = parsed.error {
                return Err(AnalyzerError::Rejected(error));
            }
        }
        return Err(AnalyzerError::Status {
            status,
            body: body.chars().take(200).collect(),
        });
    }

    let parsed: AnalysisResponse = serde_json::from_str(body)?;
    if !parsed.success {
        return Err(AnalyzerError::Rejected(
            parsed.error.unwrap_or_else(|| "unknown error".to_string()),
        ));
    }

    let sections = parsed.sections.len();
    let timeline = Timeline::from(parsed);
    log::info!(
        "Timeline loaded: {} segments from {} sections, tempo {:.1} BPM",
        timeline.len(),
        sections,
        timeline.tempo
    );
    Ok(timeline)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_body_becomes_timeline() {
        let body = r#"{"success": true, "tempo": 100.0, "sections": [],
            "visualization_timeline": [{"time": 0.0, "section_type": "intro"}]}"#;
        let timeline = parse_response(200, body).unwrap();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.tempo, 100.0);
    }

    #[test]
    fn unsuccessful_body_is_rejected() {
        let body = r#"{"success": false, "error": "decode failed"}"#;
        match parse_response(200, body) {
            Err(AnalyzerError::Rejected(msg)) => assert_eq!(msg, "decode failed"),
            other => panic!("unexpected {:?}", other.map(|t| t.len())),
        }
    }

    #[test]
    fn bad_request_error_body_is_rejected() {
        let body = r#"{"error": "Format non supporté"}"#;
        assert!(matches!(parse_response(400, body), Err(AnalyzerError::Rejected(_))));
    }

    #[test]
    fn server_error_keeps_status() {
        match parse_response(502, "<html>Bad Gateway</html>") {
            Err(AnalyzerError::Status { status, body }) => {
                assert_eq!(status, 502);
                assert!(body.contains("Bad Gateway"));
            }
            other => panic!("unexpected {:?}", other.map(|t| t.len())),
        }
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(parse_response(200, "not json"), Err(AnalyzerError::Decode(_))));
    }

    #[test]
    fn endpoint_joins_cleanly() {
        let client = AnalyzerClient::new("http://localhost:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:5000/api/analyze");
    }

    #[test]
    fn missing_upload_is_io_error() {
        let client = AnalyzerClient::new("http://localhost:5000", Duration::from_secs(1)).unwrap();
        let err = client.analyze(Path::new("/nonexistent/song.mp3")).err().unwrap();
        assert!(matches!(err, AnalyzerError::Io(_)));
    }
}
