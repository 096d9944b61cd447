//! Session cookie encoding.
//!
//! Nothing else in the crate knows how a token travels between browser and
//! server. Handlers ask the binder to attach, extract or clear it.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use quill_config::{CookieConfig, SameSitePolicy};

use crate::util::bearer_token;

#[derive(Debug, Clone)]
pub struct CookieBinder {
    name: String,
    secure: bool,
    path: String,
    domain: Option<String>,
    same_site: SameSite,
    max_age: time::Duration,
}

impl CookieBinder {
    /// `session_ttl` becomes the cookie's max-age so the browser drops it with the session.
    pub fn new(config: &CookieConfig, session_ttl: chrono::Duration) -> Self {
        let same_site = match config.same_site {
            SameSitePolicy::Lax => SameSite::Lax,
            SameSitePolicy::Strict => SameSite::Strict,
            SameSitePolicy::None => SameSite::None,
        };

        Self {
            name: config.name.clone(),
            // Browsers refuse SameSite=None without Secure.
            secure: config.secure || same_site == SameSite::None,
            path: config.path.clone(),
            domain: config.domain.clone(),
            same_site,
            max_age: time::Duration::seconds(session_ttl.num_seconds()),
        }
    }

    pub fn attach(&self, jar: CookieJar, token: &str) -> CookieJar {
        let mut cookie = self.cookie(token.to_string());
        cookie.set_max_age(self.max_age);
        jar.add(cookie)
    }

    /// The request's token: the session cookie first, then a bearer header.
    /// `None` means an anonymous request.
    pub fn extract(&self, jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
        jar.get(&self.name)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
            .or_else(|| bearer_token(headers))
    }

    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        jar.remove(self.cookie(String::new()))
    }

    fn cookie(&self, value: String) -> Cookie<'static> {
        let mut cookie = Cookie::new(self.name.clone(), value);
        cookie.set_path(self.path.clone());
        cookie.set_http_only(true);
        cookie.set_secure(self.secure);
        cookie.set_same_site(self.same_site);
        if let Some(domain) = &self.domain {
            cookie.set_domain(domain.clone());
        }
        cookie
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{AUTHORIZATION, COOKIE};
    use axum::http::HeaderValue;

    fn binder() -> CookieBinder {
        CookieBinder::new(&CookieConfig::default(), chrono::Duration::hours(2))
    }

    #[test]
    fn attached_cookie_mirrors_session_ttl() {
        let jar = binder().attach(CookieJar::new(), "token-value");
        let cookie = jar.get("quill_session").expect("cookie attached");

        assert_eq!(cookie.value(), "token-value");
        assert_eq!(cookie.max_age(), Some(time::Duration::hours(2)));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn cookie_takes_precedence_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("quill_session=from-cookie"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        let jar = CookieJar::from_headers(&headers);

        assert_eq!(
            binder().extract(&jar, &headers).as_deref(),
            Some("from-cookie")
        );
    }

    #[test]
    fn bearer_is_used_without_cookie_and_absence_is_anonymous() {
        let mut headers = HeaderMap::new();
        assert!(binder()
            .extract(&CookieJar::from_headers(&headers), &headers)
            .is_none());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(
            binder()
                .extract(&CookieJar::from_headers(&headers), &headers)
                .as_deref(),
            Some("from-header")
        );
    }

    #[test]
    fn same_site_none_forces_secure() {
        let config = CookieConfig {
            secure: false,
            same_site: SameSitePolicy::None,
            ..CookieConfig::default()
        };
        let jar = CookieBinder::new(&config, chrono::Duration::hours(1))
            .attach(CookieJar::new(), "t");

        assert_eq!(jar.get("quill_session").and_then(|c| c.secure()), Some(true));
    }
}
