//! Cookie parsing and the auth cookie set.
//!
//! Three cookies make up a browser session: `access` and `refresh` carry the
//! tokens, `logged_in` is a readable marker so front-end code can tell a
//! session exists without touching the tokens.

use axum::http::{HeaderMap, HeaderValue, header};

use crate::jwt::IssuedToken;

/// Cookie name for the access token.
pub const ACCESS_COOKIE_NAME: &str = "access";

/// Cookie name for the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refresh";

/// Cookie name for the non-secret session marker.
pub const LOGGED_IN_COOKIE_NAME: &str = "logged_in";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    for cookie_header in headers.get_all(header::COOKIE) {
        let Ok(cookie_header) = cookie_header.to_str() else {
            continue;
        };
        for part in cookie_header.split(';') {
            let part = part.trim();
            if let Some((key, value)) = part.split_once('=') {
                if key.trim() == name {
                    return Some(value.trim());
                }
            }
        }
    }
    None
}

/// Cookie `SameSite` policy.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes shared by every auth cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSettings {
    /// Name of the access token cookie; the refresh and marker names are fixed.
    pub access_name: String,
    pub path: String,
    pub secure: bool,
    /// Applies to the token cookies; `logged_in` is never HttpOnly.
    pub http_only: bool,
    pub same_site: SameSite,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            access_name: ACCESS_COOKIE_NAME.to_string(),
            path: "/".to_string(),
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
        }
    }
}

impl CookieSettings {
    /// Render a `Set-Cookie` value.
    fn render(&self, name: &str, value: &str, max_age: u64, http_only: bool) -> String {
        let mut cookie = format!(
            "{}={}; Path={}; Max-Age={}; SameSite={}",
            name,
            value,
            self.path,
            max_age,
            self.same_site.as_str()
        );
        if http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Render a deletion for `name`: empty value, zero Max-Age and an epoch expiry.
    fn render_deletion(&self, name: &str, http_only: bool) -> String {
        let mut cookie = self.render(name, "", 0, http_only);
        cookie.push_str("; Expires=Thu, 01 Jan 1970 00:00:00 GMT");
        cookie
    }
}

fn append(headers: &mut HeaderMap, cookie: String) {
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            headers.append(header::SET_COOKIE, value);
        }
        // Token strings are base64url and attribute values come from validated config,
        // so this only fires on a misconfigured cookie path.
        Err(e) => tracing::error!(error = %e, "Refusing to emit invalid Set-Cookie header"),
    }
}

/// Append `Set-Cookie` headers for a session.
///
/// The refresh cookie is only written when a refresh token is supplied. The
/// `logged_in` marker always shares the access token's Max-Age.
pub fn write_auth_cookies(
    headers: &mut HeaderMap,
    settings: &CookieSettings,
    access: &IssuedToken,
    refresh: Option<&IssuedToken>,
) {
    append(
        headers,
        settings.render(
            &settings.access_name,
            &access.token,
            access.max_age,
            settings.http_only,
        ),
    );

    if let Some(refresh) = refresh {
        append(
            headers,
            settings.render(
                REFRESH_COOKIE_NAME,
                &refresh.token,
                refresh.max_age,
                settings.http_only,
            ),
        );
    }

    append(
        headers,
        settings.render(LOGGED_IN_COOKIE_NAME, "true", access.max_age, false),
    );
}

/// Append deletions for all three auth cookies.
pub fn clear_auth_cookies(headers: &mut HeaderMap, settings: &CookieSettings) {
    append(
        headers,
        settings.render_deletion(&settings.access_name, settings.http_only),
    );
    append(
        headers,
        settings.render_deletion(REFRESH_COOKIE_NAME, settings.http_only),
    );
    append(headers, settings.render_deletion(LOGGED_IN_COOKIE_NAME, false));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::TokenKind;

    fn set_cookies(headers: &HeaderMap) -> Vec<String> {
        headers
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    fn issued(token: &str, kind: TokenKind, max_age: u64) -> IssuedToken {
        IssuedToken {
            token: token.to_string(),
            kind,
            issued_at: 0,
            expires_at: max_age,
            max_age,
        }
    }

    #[test]
    fn test_get_cookie_simple() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("access=abc123"));

        assert_eq!(get_cookie(&headers, "access"), Some("abc123"));
    }

    #[test]
    fn test_get_cookie_multiple() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("foo=bar; access=abc123; refresh=xyz789"),
        );

        assert_eq!(get_cookie(&headers, "access"), Some("abc123"));
        assert_eq!(get_cookie(&headers, "refresh"), Some("xyz789"));
        assert_eq!(get_cookie(&headers, "foo"), Some("bar"));
    }

    #[test]
    fn test_get_cookie_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("foo=bar"));
        headers.append(header::COOKIE, HeaderValue::from_static("refresh=xyz789"));

        assert_eq!(get_cookie(&headers, "refresh"), Some("xyz789"));
    }

    #[test]
    fn test_get_cookie_not_found() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("foo=bar"));

        assert_eq!(get_cookie(&headers, "access"), None);
    }

    #[test]
    fn test_get_cookie_no_header() {
        let headers = HeaderMap::new();
        assert_eq!(get_cookie(&headers, "access"), None);
    }

    #[test]
    fn test_get_cookie_with_spaces() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("  access = abc123  ; foo=bar"),
        );

        assert_eq!(get_cookie(&headers, "access"), Some("abc123"));
    }

    #[test]
    fn test_write_auth_cookies_full_set() {
        let settings = CookieSettings::default();
        let mut headers = HeaderMap::new();
        write_auth_cookies(
            &mut headers,
            &settings,
            &issued("aaa", TokenKind::Access, 300),
            Some(&issued("rrr", TokenKind::Refresh, 86400)),
        );

        let cookies = set_cookies(&headers);
        assert_eq!(
            cookies,
            vec![
                "access=aaa; Path=/; Max-Age=300; SameSite=Lax; HttpOnly; Secure",
                "refresh=rrr; Path=/; Max-Age=86400; SameSite=Lax; HttpOnly; Secure",
                "logged_in=true; Path=/; Max-Age=300; SameSite=Lax; Secure",
            ]
        );
    }

    #[test]
    fn test_write_auth_cookies_without_refresh() {
        let settings = CookieSettings {
            access_name: "session".to_string(),
            path: "/api".to_string(),
            secure: false,
            http_only: true,
            same_site: SameSite::Strict,
        };
        let mut headers = HeaderMap::new();
        write_auth_cookies(
            &mut headers,
            &settings,
            &issued("aaa", TokenKind::Access, 60),
            None,
        );

        let cookies = set_cookies(&headers);
        assert_eq!(cookies.len(), 2);
        assert_eq!(
            cookies[0],
            "session=aaa; Path=/api; Max-Age=60; SameSite=Strict; HttpOnly"
        );
        assert_eq!(
            cookies[1],
            "logged_in=true; Path=/api; Max-Age=60; SameSite=Strict"
        );
    }

    #[test]
    fn test_logged_in_never_http_only() {
        let settings = CookieSettings::default();
        let mut headers = HeaderMap::new();
        write_auth_cookies(
            &mut headers,
            &settings,
            &issued("aaa", TokenKind::Access, 60),
            None,
        );
        let cookies = set_cookies(&headers);
        let marker = cookies
            .iter()
            .find(|c| c.starts_with("logged_in="))
            .unwrap();
        assert!(!marker.contains("HttpOnly"));
    }

    #[test]
    fn test_clear_auth_cookies() {
        let settings = CookieSettings::default();
        let mut headers = HeaderMap::new();
        clear_auth_cookies(&mut headers, &settings);

        let cookies = set_cookies(&headers);
        assert_eq!(cookies.len(), 3);
        for (cookie, name) in cookies.iter().zip(["access=;", "refresh=;", "logged_in=;"]) {
            assert!(cookie.starts_with(name), "{}", cookie);
            assert!(cookie.contains("Max-Age=0"));
            assert!(cookie.contains("Path=/"));
            assert!(cookie.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
        }
    }
}
