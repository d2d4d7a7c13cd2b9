//! JWT token generation and validation.
//!
//! Both token kinds are stateless: validity is a function of signature,
//! expiry and kind only. There is no token registry, so a token stays
//! valid until it expires even after the client's cookies are cleared.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived token used to authenticate individual requests
    Access,
    /// Long-lived token used only to obtain a new token pair
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT claims shared by both token kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// JWT ID, unique per issued token
    pub jti: String,
    /// Subject (user UUID)
    pub sub: String,
    /// Token type
    #[serde(rename = "typ")]
    pub kind: TokenKind,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Default access token lifetime: 5 minutes
pub const DEFAULT_ACCESS_LIFETIME_SECS: u64 = 5 * 60;

/// Default refresh token lifetime: 1 day
pub const DEFAULT_REFRESH_LIFETIME_SECS: u64 = 24 * 60 * 60;

/// Longest accepted token lifetime: 10 years
pub const MAX_LIFETIME_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Lifetime of each token kind, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access_secs: u64,
    pub refresh_secs: u64,
}

impl TokenLifetimes {
    pub fn for_kind(&self, kind: TokenKind) -> u64 {
        match kind {
            TokenKind::Access => self.access_secs,
            TokenKind::Refresh => self.refresh_secs,
        }
    }
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access_secs: DEFAULT_ACCESS_LIFETIME_SECS,
            refresh_secs: DEFAULT_REFRESH_LIFETIME_SECS,
        }
    }
}

/// Configuration for JWT operations.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetimes: TokenLifetimes,
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT token string
    pub token: String,
    pub kind: TokenKind,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token lifetime in seconds, used as the cookie Max-Age
    pub max_age: u64,
}

/// Access and refresh token issued together for one principal.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

fn now_secs() -> Result<u64, JwtError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| JwtError::TimeError)
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret and lifetimes.
    pub fn new(secret: &[u8], lifetimes: TokenLifetimes) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            lifetimes,
        }
    }

    pub fn lifetimes(&self) -> TokenLifetimes {
        self.lifetimes
    }

    /// Issue an access/refresh pair for a user.
    pub fn issue_pair(&self, user_uuid: &str) -> Result<TokenPair, JwtError> {
        self.issue_pair_at(user_uuid, now_secs()?)
    }

    /// Issue an access/refresh pair as if the current time were `now`.
    pub fn issue_pair_at(&self, user_uuid: &str, now: u64) -> Result<TokenPair, JwtError> {
        Ok(TokenPair {
            access: self.issue_at(user_uuid, TokenKind::Access, now)?,
            refresh: self.issue_at(user_uuid, TokenKind::Refresh, now)?,
        })
    }

    /// Issue a single access token for a user.
    pub fn issue_access(&self, user_uuid: &str) -> Result<IssuedToken, JwtError> {
        self.issue_at(user_uuid, TokenKind::Access, now_secs()?)
    }

    /// Issue a token of the given kind as if the current time were `now`.
    pub fn issue_at(
        &self,
        user_uuid: &str,
        kind: TokenKind,
        now: u64,
    ) -> Result<IssuedToken, JwtError> {
        let max_age = self.lifetimes.for_kind(kind);
        let claims = Claims {
            jti: uuid::Uuid::new_v4().to_string(),
            sub: user_uuid.to_string(),
            kind,
            iat: now,
            exp: now.checked_add(max_age).ok_or(JwtError::LifetimeOverflow)?,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)?;

        Ok(IssuedToken {
            token,
            kind,
            issued_at: now,
            expires_at: claims.exp,
            max_age,
        })
    }

    /// Validate a token of the expected kind against the current time.
    pub fn validate(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let now = now_secs().map_err(|_| TokenError::Expired)?;
        self.validate_at(token, expected, now)
    }

    /// Validate a token of the expected kind as if the current time were `now`.
    ///
    /// A token is expired once `now` reaches its `exp` claim.
    pub fn validate_at(
        &self,
        token: &str,
        expected: TokenKind,
        now: u64,
    ) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        // Expiry is checked below against the supplied clock.
        validation.validate_exp = false;

        let token_data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(TokenError::from)?;
        let claims = token_data.claims;

        if claims.exp <= now {
            return Err(TokenError::Expired);
        }

        if claims.kind != expected {
            return Err(TokenError::WrongKind {
                expected,
                found: claims.kind,
            });
        }

        Ok(claims)
    }
}

/// Errors that can occur while issuing tokens.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
    /// Issue time plus lifetime does not fit in a timestamp
    LifetimeOverflow,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::TimeError => write!(f, "System time error"),
            JwtError::LifetimeOverflow => write!(f, "Token lifetime overflows the expiry time"),
        }
    }
}

impl std::error::Error for JwtError {}

/// Reasons a presented token is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Not a decodable JWT
    Malformed,
    /// Signed with a different secret or algorithm
    SignatureInvalid,
    /// `exp` has passed
    Expired,
    /// Access token where a refresh token is required, or vice versa
    WrongKind {
        expected: TokenKind,
        found: TokenKind,
    },
}

impl TokenError {
    /// Short machine-readable reason, safe to log.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::SignatureInvalid => "signature_invalid",
            TokenError::Expired => "expired",
            TokenError::WrongKind { .. } => "wrong_kind",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                TokenError::SignatureInvalid
            }
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    }
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "Token is malformed"),
            TokenError::SignatureInvalid => write!(f, "Token signature is invalid"),
            TokenError::Expired => write!(f, "Token is expired"),
            TokenError::WrongKind { expected, found } => {
                write!(f, "Expected {} token, got {} token", expected, found)
            }
        }
    }
}

impl std::error::Error for TokenError {}
