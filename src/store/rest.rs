use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;

use super::{Callback, QuiltStore, Subscription, split_path, spawn_poller};
use crate::error::{QuiltError, Result};

/// Firebase Realtime Database over its REST interface.
///
/// `GET {url}/{path}.json` reads, `PUT` with a JSON body overwrites.  The
/// database answers `null` for missing paths.  Subscriptions poll.
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
    poll_interval: Duration,
}

impl RestStore {
    pub fn new(base_url: &str, auth_token: Option<String>) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(QuiltError::invalid(format!(
                "database URL must start with http:// or https:// (got '{}')",
                base_url
            )));
        }
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self {
            client,
            base_url,
            auth_token: auth_token.filter(|t| !t.trim().is_empty()),
            poll_interval: Duration::from_secs(1),
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Full REST URL for a store path (without the auth query).
    pub fn endpoint(&self, path: &str) -> String {
        let segments = split_path(path);
        if segments.is_empty() {
            format!("{}/.json", self.base_url)
        } else {
            format!("{}/{}.json", self.base_url, segments.join("/"))
        }
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.query(&[("auth", token.as_str())]),
            None => request,
        }
    }

    fn fetch(client: &Client, url: &str, auth: Option<&str>) -> Result<Option<Value>> {
        let mut request = client.get(url);
        if let Some(token) = auth {
            request = request.query(&[("auth", token)]);
        }
        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(QuiltError::store(format!(
                "GET {} returned {}: {}",
                url,
                status,
                body.trim()
            )));
        }
        let value: Value = serde_json::from_str(&body)?;
        Ok((!value.is_null()).then_some(value))
    }
}

impl QuiltStore for RestStore {
    fn get(&self, path: &str) -> Result<Option<Value>> {
        Self::fetch(&self.client, &self.endpoint(path), self.auth_token.as_deref())
    }

    fn set(&self, path: &str, value: Value) -> Result<()> {
        let url = self.endpoint(path);
        let request = if value.is_null() {
            self.client.delete(&url)
        } else {
            self.client.put(&url).json(&value)
        };
        let response = self.authed(request).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(QuiltError::store(format!(
                "write to {} returned {}: {}",
                url,
                status,
                body.trim()
            )));
        }
        Ok(())
    }

    fn subscribe(&self, path: &str, callback: Callback) -> Result<Subscription> {
        let client = self.client.clone();
        let url = self.endpoint(path);
        let auth = self.auth_token.clone();
        spawn_poller(
            path.to_string(),
            self.poll_interval,
            move || Self::fetch(&client, &url, auth.as_deref()),
            callback,
        )
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_json_suffix() {
        let store = RestStore::new("https://quilt-demo.firebaseio.com/", None).unwrap();
        assert_eq!(
            store.endpoint("squares"),
            "https://quilt-demo.firebaseio.com/squares.json"
        );
        assert_eq!(
            store.endpoint("/snapshots/manual/17/"),
            "https://quilt-demo.firebaseio.com/snapshots/manual/17.json"
        );
        assert_eq!(store.endpoint(""), "https://quilt-demo.firebaseio.com/.json");
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(matches!(
            RestStore::new("quilt-demo.firebaseio.com", None),
            Err(QuiltError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn blank_token_is_ignored() {
        let store = RestStore::new("https://x.example", Some("  ".into())).unwrap();
        assert!(store.auth_token.is_none());
    }

    #[test]
    fn unreachable_host_is_an_http_error() {
        let store = RestStore::new("http://127.0.0.1:9", None).unwrap();
        assert!(matches!(store.get("squares"), Err(QuiltError::Http(_))));
    }
}
