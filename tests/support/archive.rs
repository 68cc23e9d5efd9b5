//! A fake archive: CDX listing plus raw capture content on one mock server.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use tracing::Level;
use waybackdl_core::{ArchiveEndpoints, Platform, ProgressReporter, RunConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a CDX JSON listing with a header row.
#[must_use]
pub fn listing(rows: &[(&str, &str)]) -> String {
    let mut body = String::from(r#"[["timestamp","original","mimetype","statuscode"]"#);
    for (timestamp, url) in rows {
        body.push_str(&format!(r#",["{timestamp}","{url}","text/html","200"]"#));
    }
    body.push(']');
    body
}

/// Request path under which the mock serves one capture.
#[must_use]
pub fn capture_path(timestamp: &str, url: &str) -> String {
    format!("/web/{timestamp}id_/{url}")
}

pub async fn mount_listing(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/cdx/search/cdx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

pub async fn mount_capture(server: &MockServer, timestamp: &str, url: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(capture_path(timestamp, url)))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

/// Run configuration pointed at the mock archive, with no courtesy delay.
#[must_use]
pub fn run_config(server: &MockServer, output: &Path) -> RunConfig {
    let mut config = RunConfig::new("example.com", output).expect("valid domain");
    config.delay = Duration::ZERO;
    config.timeout = Duration::from_secs(5);
    config.platform = Platform::Unix;
    config.endpoints = ArchiveEndpoints {
        cdx_url: format!("{}/cdx/search/cdx", server.uri()),
        content_base_url: format!("{}/web", server.uri()),
    };
    config
}

/// Collects progress lines for assertions.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    lines: Mutex<Vec<(Level, String)>>,
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, level: Level, line: &str) {
        self.lines
            .lock()
            .expect("reporter lock")
            .push((level, line.to_string()));
    }
}

impl RecordingReporter {
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .expect("reporter lock")
            .iter()
            .map(|(_, line)| line.clone())
            .collect()
    }

    #[must_use]
    pub fn lines_at(&self, level: Level) -> Vec<String> {
        self.lines
            .lock()
            .expect("reporter lock")
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, line)| line.clone())
            .collect()
    }
}
