//! One-shot messages carried across a redirect.
//!
//! A flashed message lives in the signed `flash` cookie until the next page
//! render takes it, at which point the cookie is removed.

use axum_extra::extract::cookie::{Cookie, SignedCookieJar};

pub const FLASH_COOKIE: &str = "flash";

/// Store `message` for the next render, replacing any pending one
pub fn push(jar: SignedCookieJar, message: &str) -> SignedCookieJar {
    jar.add(
        Cookie::build((FLASH_COOKIE, message.to_string()))
            .path("/")
            .http_only(true),
    )
}

/// Take the pending message, if any, and schedule its removal
pub fn take(jar: SignedCookieJar) -> (SignedCookieJar, Option<String>) {
    match jar.get(FLASH_COOKIE) {
        Some(cookie) => {
            let message = cookie.value().to_string();
            (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), Some(message))
        }
        None => (jar, None),
    }
}
