use axum::{
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::warn;

use crate::error::ApiError;

pub const ALLOWED_HOSTS: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0"];

pub fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://localhost:8080"),
        ]))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

/// Rejects requests addressed to a host outside `ALLOWED_HOSTS`.
pub async fn trusted_host(req: Request, next: Next) -> Result<Response, ApiError> {
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().host())
        .map(|h| strip_port(h).to_string());

    if host.as_deref().is_some_and(|h| ALLOWED_HOSTS.contains(&h)) {
        return Ok(next.run(req).await);
    }
    warn!(host = ?host, "rejected untrusted host");
    Err(ApiError::BadRequest("Invalid host header".into()))
}

fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    host.split(':').next().unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::strip_port;

    #[test]
    fn port_is_ignored() {
        assert_eq!(strip_port("localhost:8080"), "localhost");
        assert_eq!(strip_port("127.0.0.1"), "127.0.0.1");
        assert_eq!(strip_port("[::1]:80"), "::1");
    }
}
