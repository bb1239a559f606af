//! Support to fetch JSON resources over HTTP.

use std::fmt;
use std::marker::PhantomData;

use futures::future::BoxFuture;
use reqwest::{Client, Url, header};
use serde::de::DeserializeOwned;

use crate::caching::{FetchError, ResourceKey};

use super::Fetcher;

/// The user agent sent with every request.
pub const USER_AGENT: &str = concat!("suspense-resource/", env!("CARGO_PKG_VERSION"));

/// Fetches a resource by issuing a `GET` request to its key, and decoding the JSON body into `T`.
///
/// The key is either an absolute URL, or relative to the configured base URL. Relative keys are
/// resolved with [`Url::join`], so a base URL should end in a `/` to have keys appended to it.
pub struct HttpFetcher<T> {
    client: Client,
    base_url: Option<Url>,
    _value: PhantomData<fn() -> T>,
}

impl<T> HttpFetcher<T> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: None,
            _value: PhantomData,
        }
    }

    /// Resolves relative keys against `base_url`.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Resolves the URL for the given `key`.
    pub fn url(&self, key: &ResourceKey) -> Result<Url, FetchError> {
        match Url::parse(key.as_str()) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base_url {
                Some(base_url) => base_url
                    .join(key.as_str())
                    .map_err(|e| FetchError::Invalid(e.to_string())),
                None => Err(FetchError::Invalid(format!(
                    "relative key `{key}` without base url"
                ))),
            },
            Err(e) => Err(FetchError::Invalid(e.to_string())),
        }
    }
}

impl<T> Clone for HttpFetcher<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            _value: PhantomData,
        }
    }
}

impl<T> fmt::Debug for HttpFetcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl<T> Fetcher for HttpFetcher<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    type Value = T;

    fn fetch(&self, key: &ResourceKey) -> BoxFuture<'static, Result<T, FetchError>> {
        let client = self.client.clone();
        let url = self.url(key);

        Box::pin(async move {
            let url = url?;
            tracing::debug!("Fetching resource from `{}`", url);

            let response = client
                .get(url.clone())
                .header(header::USER_AGENT, USER_AGENT)
                .header(header::ACCEPT, "application/json")
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                tracing::debug!("Unexpected status code from `{url}`: {status}");
                return Err(FetchError::from_status(status.as_u16()));
            }

            let body = response.bytes().await?;
            Ok(serde_json::from_slice(&body)?)
        })
    }
}
