use axum::{
    Router,
    routing::{get, post},
};
use tower_cookies::CookieManagerLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::handlers::counter;
use crate::state::AppState;

/// Builds the demo application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/count", get(counter::count))
        .route("/forget", post(counter::forget))
        .route("/flash", get(counter::take_flashes).post(counter::push_flash))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
}
