//! services/portal/src/web/cookies.rs
//!
//! `SessionStore` adapters over the request's cookies.
//!
//! Two capabilities exist. `ResponseCookieStore` queues writes and later turns
//! them into `Set-Cookie` headers; it is used by the edge interceptor and by
//! mutation handlers. `ReadOnlyCookieStore` is used while rendering pages and
//! refuses every write, leaving the cookie stale until the next intercepted
//! request.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue},
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use parking_lot::Mutex;
use stadion_core::ports::{CookieOptions, CookieWrite, SameSitePolicy, SessionStore};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, warn};

/// Cookies rotated by the edge interceptor during the current request.
///
/// Handed to handlers through request extensions; the incoming `Cookie`
/// header itself is left untouched.
#[derive(Debug, Clone, Default)]
pub struct RefreshedCookies(pub Vec<CookieWrite>);

fn overlay(cookies: &mut BTreeMap<String, String>, writes: &[CookieWrite]) {
    for write in writes {
        if write.options.max_age == Some(0) {
            cookies.remove(&write.name);
        } else {
            cookies.insert(write.name.clone(), write.value.clone());
        }
    }
}

fn to_same_site(policy: SameSitePolicy) -> SameSite {
    match policy {
        SameSitePolicy::Lax => SameSite::Lax,
        SameSitePolicy::Strict => SameSite::Strict,
        SameSitePolicy::None => SameSite::None,
    }
}

/// Builds the outgoing cookie for a queued write.
pub fn to_cookie(write: &CookieWrite) -> Cookie<'static> {
    let options = &write.options;
    let mut builder = Cookie::build((write.name.clone(), write.value.clone()))
        .http_only(options.http_only)
        .secure(options.secure);
    if let Some(path) = &options.path {
        builder = builder.path(path.clone());
    }
    if let Some(domain) = &options.domain {
        builder = builder.domain(domain.clone());
    }
    if let Some(seconds) = options.max_age {
        builder = builder.max_age(time::Duration::seconds(seconds));
    }
    if let Some(policy) = options.same_site {
        builder = builder.same_site(to_same_site(policy));
    }
    builder.build()
}

/// Names of the cookies a response already sets.
fn names_already_set(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|raw| Cookie::parse(raw.to_string()).ok())
        .map(|cookie| cookie.name().to_string())
        .collect()
}

//=========================================================================================
// Extractor
//=========================================================================================

/// The request's cookies, with any cookies rotated earlier in this request
/// laid over them.
#[derive(Debug, Clone, Default)]
pub struct SessionCookies(BTreeMap<String, String>);

impl SessionCookies {
    pub fn from_headers(headers: &HeaderMap, refreshed: Option<&RefreshedCookies>) -> Self {
        let jar = CookieJar::from_headers(headers);
        let mut cookies: BTreeMap<String, String> = jar
            .iter()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();
        if let Some(RefreshedCookies(writes)) = refreshed {
            overlay(&mut cookies, writes);
        }
        Self(cookies)
    }

    /// A store for rendering; writes are refused.
    pub fn read_only(&self) -> Arc<ReadOnlyCookieStore> {
        Arc::new(ReadOnlyCookieStore {
            cookies: self.0.clone(),
        })
    }

    /// A store whose writes end up on the response.
    pub fn writable(&self) -> Arc<ResponseCookieStore> {
        Arc::new(ResponseCookieStore::new(self.0.clone()))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for SessionCookies {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(
            &parts.headers,
            parts.extensions.get::<RefreshedCookies>(),
        ))
    }
}

//=========================================================================================
// Writable Store
//=========================================================================================

pub struct ResponseCookieStore {
    incoming: BTreeMap<String, String>,
    pending: Mutex<Vec<CookieWrite>>,
}

impl ResponseCookieStore {
    pub fn new(incoming: BTreeMap<String, String>) -> Self {
        Self {
            incoming,
            pending: Mutex::new(Vec::new()),
        }
    }

    fn view(&self) -> BTreeMap<String, String> {
        let mut cookies = self.incoming.clone();
        overlay(&mut cookies, &self.pending.lock());
        cookies
    }

    /// Queued writes, keeping only the last write per cookie name.
    pub fn pending(&self) -> Vec<CookieWrite> {
        let pending = self.pending.lock();
        let mut latest: Vec<CookieWrite> = Vec::with_capacity(pending.len());
        for write in pending.iter() {
            latest.retain(|w| w.name != write.name);
            latest.push(write.clone());
        }
        latest
    }

    /// Appends the queued writes to `response` as `Set-Cookie` headers.
    ///
    /// Cookies the response already sets are left alone, so a handler's own
    /// writes win over the interceptor's.
    pub fn apply_to(&self, response: &mut Response) {
        let already_set = names_already_set(response);
        for write in self.pending() {
            if already_set.contains(&write.name) {
                continue;
            }
            match HeaderValue::from_str(&to_cookie(&write).to_string()) {
                Ok(value) => {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
                Err(e) => warn!(cookie = %write.name, error = %e, "skipping unencodable cookie"),
            }
        }
    }
}

impl SessionStore for ResponseCookieStore {
    fn get(&self, name: &str) -> Option<String> {
        self.view().remove(name)
    }

    fn get_all(&self) -> Vec<(String, String)> {
        self.view().into_iter().collect()
    }

    fn try_set(&self, name: &str, value: &str, options: &CookieOptions) -> bool {
        self.pending.lock().push(CookieWrite {
            name: name.to_string(),
            value: value.to_string(),
            options: options.clone(),
        });
        true
    }

    fn try_remove(&self, name: &str, options: &CookieOptions) -> bool {
        self.pending.lock().push(CookieWrite {
            name: name.to_string(),
            value: String::new(),
            options: options.expired(),
        });
        true
    }
}

//=========================================================================================
// Read-only Store
//=========================================================================================

pub struct ReadOnlyCookieStore {
    cookies: BTreeMap<String, String>,
}

impl SessionStore for ReadOnlyCookieStore {
    fn get(&self, name: &str) -> Option<String> {
        self.cookies.get(name).cloned()
    }

    fn get_all(&self) -> Vec<(String, String)> {
        self.cookies
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn try_set(&self, name: &str, _value: &str, _options: &CookieOptions) -> bool {
        debug!(cookie = name, "cookie write ignored while rendering");
        false
    }

    fn try_remove(&self, name: &str, _options: &CookieOptions) -> bool {
        debug!(cookie = name, "cookie removal ignored while rendering");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn refreshed_cookies_overlay_the_incoming_jar() {
        let refreshed = RefreshedCookies(vec![
            CookieWrite {
                name: "auth".into(),
                value: "fresh".into(),
                options: CookieOptions::default(),
            },
            CookieWrite {
                name: "auth.0".into(),
                value: String::new(),
                options: CookieOptions::default().expired(),
            },
        ]);
        let cookies = SessionCookies::from_headers(&headers("auth=stale; auth.0=x; theme=dark"), Some(&refreshed));
        let store = cookies.read_only();
        assert_eq!(store.get("auth").as_deref(), Some("fresh"));
        assert_eq!(store.get("auth.0"), None);
        assert_eq!(store.get("theme").as_deref(), Some("dark"));
    }

    #[test]
    fn read_only_store_refuses_writes() {
        let store = SessionCookies::from_headers(&headers("auth=v"), None).read_only();
        assert!(!store.try_set("auth", "new", &CookieOptions::default()));
        assert!(!store.try_remove("auth", &CookieOptions::default()));
        assert_eq!(store.get("auth").as_deref(), Some("v"));
    }

    #[test]
    fn response_store_reads_its_own_writes() {
        let store = SessionCookies::from_headers(&headers("auth=v"), None).writable();
        store.try_set("auth", "w", &CookieOptions::default());
        assert_eq!(store.get("auth").as_deref(), Some("w"));
        store.try_remove("auth", &CookieOptions::default());
        assert_eq!(store.get("auth"), None);
        assert_eq!(store.pending().len(), 1);
    }

    #[test]
    fn apply_skips_cookies_the_response_already_sets() {
        let store = ResponseCookieStore::new(BTreeMap::new());
        store.try_set("auth", "from-interceptor", &CookieOptions::default());
        store.try_set("other", "x", &CookieOptions::default());

        let mut response = Response::new(Body::empty());
        response
            .headers_mut()
            .append(header::SET_COOKIE, HeaderValue::from_static("auth=from-handler; Path=/"));
        store.apply_to(&mut response);

        let set: Vec<&str> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(set.len(), 2);
        assert!(set[0].starts_with("auth=from-handler"));
        assert!(set[1].starts_with("other=x"));
    }

    #[test]
    fn removal_cookie_expires_immediately() {
        let write = CookieWrite {
            name: "auth".into(),
            value: String::new(),
            options: CookieOptions::default().expired(),
        };
        let rendered = to_cookie(&write).to_string();
        assert!(rendered.contains("Max-Age=0"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("SameSite=Lax"));
    }
}
