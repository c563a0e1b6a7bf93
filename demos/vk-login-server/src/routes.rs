use axum::{
    Json, Router,
    extract::{Query, RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;
use vk_identity_oauth2::{
    CallbackRequest, OAuth2Error, OAuth2ErrorKind, ProviderDescriptor, UserProfile, VkProvider,
};

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<VkProvider>,
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    device_id: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/providers", get(providers))
        .route("/auth/vk/login", get(start_login))
        .route("/auth/vk/callback", get(handle_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn providers(State(state): State<AppState>) -> Json<Vec<ProviderDescriptor>> {
    Json(vec![state.provider.descriptor()])
}

async fn start_login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> Result<Redirect, AuthFailure> {
    let redirect = state.provider.start_flow(query.device_id).await?;
    Ok(Redirect::to(&redirect.url))
}

// The raw query is kept so a device_id dropped by canonical parsing can still be recovered.
async fn handle_callback(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<UserProfile>, AuthFailure> {
    let callback = CallbackRequest::from_raw_query(query.unwrap_or_default());
    let login = state.provider.complete_flow(callback).await?;
    Ok(Json(login.profile))
}

/// Failed sign-in as seen by the browser: a generic page, details stay in the logs.
pub struct AuthFailure(OAuth2Error);

impl From<OAuth2Error> for AuthFailure {
    fn from(err: OAuth2Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        warn!("Sign-in failed ({:?})", kind);

        let status = match kind {
            OAuth2ErrorKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        };

        let page = format!(
            "<!doctype html><html><body><h1>Sign-in failed</h1><p>{}</p>\
             <p><a href=\"/auth/vk/login\">Try again</a></p></body></html>",
            self.0.public_message()
        );
        (status, Html(page)).into_response()
    }
}
