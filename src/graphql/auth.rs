use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use crate::error::Result;

/// Produces the request headers that authenticate a GraphQL call. One
/// concrete strategy ships here; OAuth app tokens or installation tokens
/// plug in behind the same trait.
pub trait Authenticator: Send + Sync {
    fn headers(&self) -> Result<HeaderMap>;
}

/// Bearer authentication with a GitHub personal access token.
pub struct PersonalAccessTokenAuthenticator {
    token: String,
}

impl PersonalAccessTokenAuthenticator {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Authenticator for PersonalAccessTokenAuthenticator {
    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("token {}", self.token))?,
        );
        Ok(headers)
    }
}
