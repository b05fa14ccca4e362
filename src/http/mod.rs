//! Blocking HTTP layer over reqwest.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// Default user agent sent with every request.
pub const USER_AGENT: &str = concat!("fisgeo/", env!("CARGO_PKG_VERSION"));

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Thin blocking HTTP client for the data service.
///
/// All I/O in the crate is synchronous and sequential; every call suspends
/// the calling thread until the response is in.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::blocking::Client,
}

impl HttpClient {
    /// Create a client with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self { client })
    }

    /// GET a URL and decode the body as JSON.
    ///
    /// Any non-success status becomes [`Error::Request`] carrying the failing
    /// URL and the raw response body.
    pub fn get_json(&self, url: &Url) -> Result<Value> {
        debug!(%url, "GET");
        let response = self.client.get(url.clone()).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Request {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json()?)
    }
}

/// Append path components to a base URL.
///
/// The base's own path is kept; components land after it, so a base of
/// `https://host/dataservice/1.3` and components `["421", "bridge"]` give
/// `https://host/dataservice/1.3/421/bridge`.
pub fn join_url(base: &Url, components: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
        segments.pop_if_empty();
        segments.extend(components);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url_keeps_base_path() {
        let base = Url::parse("https://www.vaarweginformatie.nl/wfswms/dataservice/1.3").unwrap();
        let url = join_url(&base, &["421", "bridge"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.vaarweginformatie.nl/wfswms/dataservice/1.3/421/bridge"
        );
    }

    #[test]
    fn test_join_url_trailing_slash_base() {
        let base = Url::parse("http://localhost:8080/api/").unwrap();
        let url = join_url(&base, &["geotype"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/geotype");
    }
}
