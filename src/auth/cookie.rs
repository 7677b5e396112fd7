/// Refresh-token cookie transport.
///
/// The cookie is HttpOnly, SameSite=Strict, Secure in production and
/// scoped to the refresh route so it is not sent with any other request.

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::HttpRequest;

pub const REFRESH_COOKIE_NAME: &str = "refreshToken";
pub const REFRESH_COOKIE_PATH: &str = "/auth/refresh";

/// Cookie carrying a raw refresh token for `max_age_seconds`.
pub fn refresh_cookie(token: &str, max_age_seconds: i64, secure: bool) -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE_NAME, token.to_string())
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(CookieDuration::seconds(max_age_seconds.max(0)))
        .finish()
}

/// Expired cookie that makes the browser drop the refresh token.
pub fn removal_cookie(secure: bool) -> Cookie<'static> {
    let mut cookie = refresh_cookie("", 0, secure);
    cookie.make_removal();
    cookie
}

/// Raw refresh token presented by the client, if any.
pub fn read_refresh_cookie(req: &HttpRequest) -> Option<String> {
    req.cookie(REFRESH_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_cookie_attributes() {
        let cookie = refresh_cookie("abc", 3600, true);

        assert_eq!(cookie.name(), REFRESH_COOKIE_NAME);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.path(), Some(REFRESH_COOKIE_PATH));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.max_age(), Some(CookieDuration::seconds(3600)));
    }

    #[test]
    fn test_removal_cookie_is_empty_and_expired() {
        let cookie = removal_cookie(false);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
        assert_eq!(cookie.path(), Some(REFRESH_COOKIE_PATH));
    }
}
