use crate::error::{Error, Result};
use url::Url;

#[derive(Clone, Debug)]
pub struct Config {
    pub token: Option<String>,
    pub api_url: String,
}

impl Config {
    /// Creates a new Config instance with the provided parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `api_url` is not an absolute `http`/`https` URL
    /// - `token` is present but empty
    pub fn new(token: Option<String>, api_url: String) -> Result<Self> {
        if matches!(&token, Some(t) if t.trim().is_empty()) {
            return Err(Error::ConfigError("API token cannot be empty".to_string()));
        }

        let parsed = Url::parse(&api_url)
            .map_err(|e| Error::ConfigError(format!("Invalid API URL '{api_url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::ConfigError(format!(
                "API URL must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        Ok(Self {
            token,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolves an upload endpoint against the API base URL.
    ///
    /// Absolute `http(s)://` endpoints are returned unchanged, anything else is
    /// appended to the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting URL does not parse.
    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
        let full = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else if endpoint.starts_with('/') {
            format!("{}{endpoint}", self.api_url)
        } else {
            format!("{}/{endpoint}", self.api_url)
        };

        Url::parse(&full).map_err(|e| Error::ConfigError(format!("Invalid endpoint '{full}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_token() {
        let result = Config::new(Some("  ".to_string()), "http://localhost:8000".to_string());
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_rejects_non_http_url() {
        let result = Config::new(None, "ftp://example.com".to_string());
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_endpoint_url_joins_relative_paths() {
        let config = Config::new(None, "http://localhost:8000/".to_string()).unwrap();

        assert_eq!(
            config
                .endpoint_url("/api/v1/books/chunked-upload/")
                .unwrap()
                .as_str(),
            "http://localhost:8000/api/v1/books/chunked-upload/"
        );
        assert_eq!(
            config.endpoint_url("api/v1/upload/").unwrap().as_str(),
            "http://localhost:8000/api/v1/upload/"
        );
    }

    #[test]
    fn test_endpoint_url_keeps_absolute_urls() {
        let config = Config::new(None, "http://localhost:8000".to_string()).unwrap();

        assert_eq!(
            config
                .endpoint_url("https://uploads.example.com/chunks/")
                .unwrap()
                .as_str(),
            "https://uploads.example.com/chunks/"
        );
    }
}
