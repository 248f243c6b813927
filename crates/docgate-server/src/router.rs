use axum::routing::{get, post, MethodRouter};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all gateway endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(handler::ping).fallback(handler::method_not_allowed))
        .route("/bulk", post(handler::bulk).fallback(handler::method_not_allowed))
        .route("/", document_routes())
        .route("/*path", document_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn document_routes() -> MethodRouter<AppState> {
    get(handler::get_document)
        .post(handler::post_document)
        .fallback(handler::method_not_allowed)
}
