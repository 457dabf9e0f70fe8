use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::USER_AGENT;
use reqwest::StatusCode;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("not found")]
    NotFound,
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("transport: {0}")]
    Transport(String),
}

impl FetchError {
    /// A missing resource is a normal outcome when probing for optional content.
    pub fn is_expected_absence(&self) -> bool {
        matches!(self, FetchError::NotFound)
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }
}

/// Fetches one resource relative to the site root.
pub trait ContentSource: Send + Sync {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError>;

    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct HttpConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

pub struct HttpSource {
    http: HttpClient,
    user_agent: String,
    base: Url,
}

impl HttpSource {
    pub fn new(config: HttpConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("source: user agent required");
        }

        let mut base = Url::parse(config.base_url.trim())
            .with_context(|| format!("source: parse base url {:?}", config.base_url))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()
                .context("source: build http client")?,
        };

        Ok(Self {
            http,
            user_agent: config.user_agent,
            base,
        })
    }
}

impl ContentSource for HttpSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|err| FetchError::Transport(format!("join {path}: {err}")))?;

        let response = self
            .http
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .bytes()
            .map(|body| body.to_vec())
            .map_err(|err| FetchError::Transport(err.to_string()))
    }

    fn describe(&self) -> String {
        self.base.to_string()
    }
}

/// Serves the fixture tree straight from disk.
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl ContentSource for DirSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let full = self.resolve(path).ok_or(FetchError::NotFound)?;
        match fs::read(&full) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(FetchError::NotFound),
            Err(err) if full.is_dir() => {
                tracing::debug!(path = %full.display(), "source: path is a directory: {err}");
                Err(FetchError::NotFound)
            }
            Err(err) => Err(FetchError::Transport(format!("{}: {err}", full.display()))),
        }
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Builds an HTTP source for `http(s)://` bases and a directory source otherwise.
pub fn from_base(base: &str, user_agent: &str, timeout: Duration) -> Result<Box<dyn ContentSource>> {
    let trimmed = base.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        let source = HttpSource::new(HttpConfig {
            base_url: trimmed.to_string(),
            user_agent: user_agent.to_string(),
            timeout: Some(timeout),
            http_client: None,
        })?;
        Ok(Box::new(source))
    } else {
        Ok(Box::new(DirSource::new(trimmed)))
    }
}
