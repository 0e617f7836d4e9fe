use std::path::{Path, PathBuf};

/// Origin every API request is sent to.
pub const DEFAULT_API_URL: &str = "https://todoapp-ashy-tau.vercel.app";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub data_dir: PathBuf,
}

impl ClientConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            data_dir: data_dir.into(),
        }
    }

    pub fn with_api_base_url(mut self, url: &str) -> Self {
        self.api_base_url = url.trim().trim_end_matches('/').to_string();
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Joins an API path (starting with `/`) onto the configured origin.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), path)
    }
}
