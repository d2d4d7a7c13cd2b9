//! Locating a raw bearer credential in a request.

use axum::http::{HeaderMap, header};

use super::cookie::get_cookie;
use crate::jwt::TokenError;

/// Where a raw credential was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Header,
    Cookie,
    /// Request body, only accepted by the refresh endpoint.
    Body,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::Header => "header",
            CredentialSource::Cookie => "cookie",
            CredentialSource::Body => "body",
        }
    }
}

/// An unvalidated token string and its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawCredential<'a> {
    pub token: &'a str,
    pub source: CredentialSource,
}

/// Finds the raw token a request is presenting, if any.
///
/// `Ok(None)` means the request carries no credential at all, which callers
/// treat as anonymous rather than as a failure.
pub trait CredentialExtractor: Send + Sync {
    fn extract<'a>(&self, headers: &'a HeaderMap)
    -> Result<Option<RawCredential<'a>>, TokenError>;
}

/// Authorization header first; the named cookie only when the header is absent.
#[derive(Debug, Clone)]
pub struct HeaderThenCookie {
    /// Accepted `Authorization` schemes, e.g. `Bearer`.
    pub schemes: Vec<String>,
    pub cookie_name: String,
}

impl HeaderThenCookie {
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            schemes: vec!["Bearer".to_string()],
            cookie_name: cookie_name.into(),
        }
    }

    /// Pull the token out of an `Authorization` value.
    ///
    /// An unrecognised scheme yields no credential. A recognised scheme with
    /// anything other than exactly one token after it is malformed.
    fn parse_header<'a>(&self, value: &'a str) -> Result<Option<&'a str>, TokenError> {
        let mut parts = value.split_whitespace();
        let Some(scheme) = parts.next() else {
            return Ok(None);
        };
        if !self.schemes.iter().any(|s| s == scheme) {
            return Ok(None);
        }
        match (parts.next(), parts.next()) {
            (Some(token), None) => Ok(Some(token)),
            _ => Err(TokenError::Malformed),
        }
    }
}

impl CredentialExtractor for HeaderThenCookie {
    fn extract<'a>(
        &self,
        headers: &'a HeaderMap,
    ) -> Result<Option<RawCredential<'a>>, TokenError> {
        if let Some(value) = headers.get(header::AUTHORIZATION) {
            let value = value.to_str().map_err(|_| TokenError::Malformed)?;
            // A present header decides the outcome; the cookie is never consulted.
            return Ok(self.parse_header(value)?.map(|token| RawCredential {
                token,
                source: CredentialSource::Header,
            }));
        }

        // A cleared cookie replays as `access=`, which is no credential at all.
        Ok(get_cookie(headers, &self.cookie_name)
            .filter(|token| !token.is_empty())
            .map(|token| RawCredential {
                token,
                source: CredentialSource::Cookie,
            }))
    }
}
