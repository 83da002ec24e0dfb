use axum::http::header::{HeaderName, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;

const ALLOWED_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

pub fn build_cors_layer(config: &AppConfig) -> CorsLayer {
    let mut headers = vec![ACCEPT, AUTHORIZATION, CONTENT_TYPE];
    if config.auth_dev_overrides_enabled() {
        headers.push(HeaderName::from_static("x-user-id"));
    }

    let layer = CorsLayer::new()
        .allow_methods(ALLOWED_METHODS)
        .allow_headers(headers);

    // A wildcard origin cannot be combined with credentials.
    if allows_any_origin(&config.cors_origins) {
        layer.allow_origin(Any).allow_credentials(false)
    } else {
        let origins = config
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect::<Vec<_>>();
        layer.allow_origin(origins).allow_credentials(true)
    }
}

fn allows_any_origin(origins: &[String]) -> bool {
    origins.iter().any(|origin| origin.trim() == "*")
}

#[cfg(test)]
mod tests {
    use super::allows_any_origin;

    #[test]
    fn wildcard_origin_is_detected_anywhere_in_the_list() {
        assert!(allows_any_origin(&["*".to_string()]));
        assert!(allows_any_origin(&["https://a.example".to_string(), " * ".to_string()]));
        assert!(!allows_any_origin(&["https://a.example".to_string()]));
        assert!(!allows_any_origin(&[]));
    }
}
