use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::warn;

use crate::config::CorsConfig;
use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let prefix = state
        .settings
        .server
        .api_prefix
        .trim_end_matches('/')
        .to_string();
    let api = |path: &str| format!("{}{}", prefix, path);

    let mut router = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(&api("/"), get(handlers::health::root));

    if !prefix.is_empty() {
        router = router.route(&prefix, get(handlers::health::root));
    }

    let cors = cors_layer(&state.settings.cors);

    router
        .route(&api("/chat"), post(handlers::chat::chat_handler))
        .route(
            &api("/chat/sessions/{session_id}"),
            get(handlers::chat::session_history_handler),
        )
        .route(&api("/contact"), post(handlers::contact::contact_handler))
        .route(
            &api("/status"),
            get(handlers::status::list_status_checks).post(handlers::status::create_status_check),
        )
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    if config.allowed_origins.iter().any(|origin| origin.trim() == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.trim().parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
