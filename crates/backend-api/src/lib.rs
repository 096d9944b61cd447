mod cookie;
mod docs;
mod error;
mod state;
mod util;

pub mod routes;

pub use cookie::CookieBinder;
pub use docs::ApiDoc;
pub use error::{ApiError, ErrorResponse};
pub use state::AppState;

use axum::{
    http::header::{AUTHORIZATION, CONTENT_TYPE},
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/users/sign-up", post(routes::auth::sign_up))
        .route("/api/users/sign-in", post(routes::auth::sign_in))
        .route("/api/users/sign-out", post(routes::auth::sign_out))
        .route("/api/users/password", post(routes::auth::change_password))
        .route("/api/users/me", get(routes::users::get_current_user))
        .route("/api/users/sessions", get(routes::users::list_sessions))
        .route(
            "/api/users/sessions/:session_id",
            delete(routes::users::revoke_session),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

fn cors_layer() -> CorsLayer {
    // Credentialed requests need a concrete origin, so the request's origin is echoed.
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}
