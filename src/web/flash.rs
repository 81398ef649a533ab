//! One-shot user-facing messages carried in a cookie across a redirect.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

pub const FLASH_COOKIE: &str = "naturelog_flash";

/// Queue `messages` for the next rendered page.
pub fn push(jar: CookieJar, messages: &[String]) -> CookieJar {
    let json = serde_json::to_vec(messages).unwrap_or_default();
    let cookie = Cookie::build((FLASH_COOKIE, URL_SAFE_NO_PAD.encode(json)))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    jar.add(cookie)
}

/// Read the queued messages and drop the cookie. Unreadable cookies yield
/// no messages.
pub fn take(jar: CookieJar) -> (CookieJar, Vec<String>) {
    let messages = jar
        .get(FLASH_COOKIE)
        .and_then(|cookie| URL_SAFE_NO_PAD.decode(cookie.value()).ok())
        .and_then(|json| serde_json::from_slice::<Vec<String>>(&json).ok())
        .unwrap_or_default();
    (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), messages)
}

#[cfg(test)]
mod tests {
    use axum::http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue,
    };
    use axum::response::IntoResponse;

    use super::*;

    fn request_with(cookie: &str) -> CookieJar {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        CookieJar::from_headers(&headers)
    }

    #[test]
    fn test_pushed_messages_are_taken_back() {
        let jar = push(CookieJar::new(), &["Saved <b>".to_string()]);
        let value = jar.get(FLASH_COOKIE).unwrap().value().to_string();

        let (_, messages) = take(request_with(&format!("{FLASH_COOKIE}={value}")));
        assert_eq!(messages, vec!["Saved <b>".to_string()]);
    }

    #[test]
    fn test_garbage_cookie_yields_nothing() {
        let (_, messages) = take(request_with(&format!("{FLASH_COOKIE}=%%%")));
        assert!(messages.is_empty());

        let (_, messages) = take(CookieJar::new());
        assert!(messages.is_empty());
    }

    #[test]
    fn test_take_expires_the_cookie() {
        let (jar, _) = take(request_with(&format!("other=1; {FLASH_COOKIE}=W10")));
        let response = (jar, ()).into_response();
        let set: Vec<_> = response.headers().get_all(SET_COOKIE).iter().collect();
        assert_eq!(set.len(), 1);
        let set = set[0].to_str().unwrap();
        assert!(set.starts_with(&format!("{FLASH_COOKIE}=;")));
        assert!(set.contains("Max-Age=0"));
    }
}
