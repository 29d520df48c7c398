//! Cookie lookup for the CSRF token

use reqwest::cookie::CookieStore;
use reqwest::Url;

/// Find a cookie value in a `Cookie` header string (`a=1; b=2`).
///
/// Empty values count as absent.
pub fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim_start().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

/// Read a cookie the store would send to `url`
pub fn read_cookie<S: CookieStore + ?Sized>(store: &S, url: &Url, name: &str) -> Option<String> {
    let header = store.cookies(url)?;
    let header = header.to_str().ok()?;
    cookie_value(header, name)
}
