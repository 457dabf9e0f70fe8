use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::source::{ContentSource, FetchError};

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub content_root: String,
    pub retries: u32,
    pub retry_delay: Duration,
    pub fetch_delay: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            content_root: "en-US".into(),
            retries: 1,
            retry_delay: Duration::from_millis(100),
            fetch_delay: Duration::from_millis(25),
        }
    }
}

/// Fetch-and-parse primitive that turns every failure into `None`.
#[derive(Clone)]
pub struct Loader {
    source: Arc<dyn ContentSource>,
    cfg: LoaderConfig,
}

impl Loader {
    pub fn new(source: Arc<dyn ContentSource>, cfg: LoaderConfig) -> Self {
        Self { source, cfg }
    }

    pub fn source(&self) -> &Arc<dyn ContentSource> {
        &self.source
    }

    pub fn load_json<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        let value = self.load_value(path)?;
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                warn!(path, "loader: unexpected shape: {err}");
                None
            }
        }
    }

    pub fn load_value(&self, path: &str) -> Option<Value> {
        let full = self.content_path(path);
        let body = self.fetch_with_retry(&full)?;
        parse_body(&full, &body)
    }

    /// Loads a resource addressed from the site root instead of the content root.
    pub fn load_raw<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        let body = self.fetch_with_retry(path)?;
        let value = parse_body(path, &body)?;
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                warn!(path, "loader: unexpected shape: {err}");
                None
            }
        }
    }

    /// Politeness gap between sequential fetches.
    pub fn pause(&self) {
        if !self.cfg.fetch_delay.is_zero() {
            thread::sleep(self.cfg.fetch_delay);
        }
    }

    fn content_path(&self, path: &str) -> String {
        let root = self.cfg.content_root.trim_matches('/');
        let path = path.trim_start_matches('/');
        if root.is_empty() {
            path.to_string()
        } else {
            format!("{root}/{path}")
        }
    }

    fn fetch_with_retry(&self, path: &str) -> Option<Vec<u8>> {
        let mut attempt = 0;
        loop {
            match self.source.fetch(path) {
                Ok(body) => return Some(body),
                Err(FetchError::NotFound) => {
                    debug!(path, "loader: not found");
                    return None;
                }
                Err(err) if err.is_transient() && attempt < self.cfg.retries => {
                    attempt += 1;
                    debug!(path, attempt, "loader: retrying after {err}");
                    thread::sleep(self.cfg.retry_delay);
                }
                Err(err) => {
                    warn!(path, attempts = attempt + 1, "loader: {err}");
                    return None;
                }
            }
        }
    }
}

fn parse_body(path: &str, body: &[u8]) -> Option<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        warn!(path, "loader: empty body");
        return None;
    }
    match serde_json::from_slice(body) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(path, "loader: malformed json: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Post;
    use crate::source::tests::MockSource;

    fn build(source: MockSource, retries: u32) -> (Arc<MockSource>, Loader) {
        let source = Arc::new(source);
        let loader = Loader::new(
            source.clone(),
            LoaderConfig {
                retries,
                retry_delay: Duration::ZERO,
                fetch_delay: Duration::ZERO,
                ..LoaderConfig::default()
            },
        );
        (source, loader)
    }

    #[test]
    fn loads_from_content_root() {
        let (source, loader) = build(
            MockSource::default().with_file("en-US/Posts/A.json", r#"{"Name":"A"}"#),
            0,
        );
        let post: Post = loader.load_json("Posts/A.json").unwrap();
        assert_eq!(post.name, "A");
        assert_eq!(source.request_count("en-US/Posts/A.json"), 1);
    }

    #[test]
    fn missing_file_is_absent_without_retry() {
        let (source, loader) = build(MockSource::default(), 3);
        assert!(loader.load_value("Posts/Missing.json").is_none());
        assert_eq!(source.request_count("en-US/Posts/Missing.json"), 1);
    }

    #[test]
    fn malformed_and_empty_bodies_are_absent() {
        let (_, loader) = build(
            MockSource::default()
                .with_file("en-US/bad.json", "{\"Name\": ")
                .with_file("en-US/empty.json", "  \n"),
            1,
        );
        assert!(loader.load_value("bad.json").is_none());
        assert!(loader.load_value("empty.json").is_none());
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn logged<F: FnOnce()>(f: F) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = captured.0.lock().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn absence_logs_below_warn_and_bad_json_warns() {
        let (_, loader) = build(
            MockSource::default().with_file("en-US/bad.json", "{\"Name\": "),
            0,
        );

        let missing = logged(|| assert!(loader.load_value("Posts/Missing.json").is_none()));
        assert!(missing.contains("loader: not found"));
        assert!(!missing.contains("WARN"));
        assert!(!missing.contains("ERROR"));

        let malformed = logged(|| assert!(loader.load_value("bad.json").is_none()));
        assert_eq!(malformed.matches("WARN").count(), 1);
        assert!(malformed.contains("malformed json"));
    }

    #[test]
    fn server_errors_are_not_retried() {
        let (source, loader) = build(MockSource::default().with_status("en-US/x.json", 500), 2);
        assert!(loader.load_value("x.json").is_none());
        assert_eq!(source.request_count("en-US/x.json"), 1);
    }

    #[test]
    fn transport_failures_retry_until_budget() {
        let (source, loader) = build(
            MockSource::default()
                .with_file("en-US/flaky.json", "{}")
                .with_transport_failures("en-US/flaky.json", 1),
            1,
        );
        assert!(loader.load_value("flaky.json").is_some());
        assert_eq!(source.request_count("en-US/flaky.json"), 2);

        let (source, loader) = build(
            MockSource::default()
                .with_file("en-US/down.json", "{}")
                .with_transport_failures("en-US/down.json", 5),
            1,
        );
        assert!(loader.load_value("down.json").is_none());
        assert_eq!(source.request_count("en-US/down.json"), 2);
    }

    #[test]
    fn raw_paths_skip_content_root() {
        let (_, loader) = build(
            MockSource::default().with_file("file-manifest.json", r#"{"a": 1}"#),
            0,
        );
        let value: Value = loader.load_raw("file-manifest.json").unwrap();
        assert_eq!(value["a"], 1);
    }
}
