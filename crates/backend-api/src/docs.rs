use utoipa::openapi::security::{ApiKey, ApiKeyValue, Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health_check,
        crate::routes::auth::sign_up,
        crate::routes::auth::sign_in,
        crate::routes::auth::sign_out,
        crate::routes::auth::change_password,
        crate::routes::users::get_current_user,
        crate::routes::users::list_sessions,
        crate::routes::users::revoke_session
    ),
    components(
        schemas(
            crate::error::ErrorResponse,
            crate::routes::health::HealthResponse,
            crate::routes::auth::SignUpRequest,
            crate::routes::auth::SignInRequest,
            crate::routes::auth::ChangePasswordRequest,
            crate::routes::auth::SessionResponse,
            crate::routes::users::UserResponse,
            crate::routes::users::SettingsResponse,
            crate::routes::users::SessionView,
            crate::routes::users::SessionsResponse
        )
    ),
    tags(
        (name = "Health", description = "Service health endpoints"),
        (name = "Auth", description = "Sign-up, sign-in and credential management"),
        (name = "Users", description = "Current user and device sessions")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        let schemes = &mut components.security_schemes;

        let mut scheme = SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer));
        if let SecurityScheme::Http(http) = &mut scheme {
            http.bearer_format = Some("Bearer".to_string());
        }
        schemes.insert("bearerAuth".to_string(), scheme);

        schemes.insert(
            "cookieAuth".to_string(),
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("quill_session"))),
        );
    }
}
