use std::future::Future;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tracing::{error, info};
use uvocbot_db::{
    AdminSettings, AdminSettingsRepository, DbError, PlanetsideSettings,
    PlanetsideSettingsRepository, RoleMenu, RoleMenuRepository, TwitterSettings,
    TwitterSettingsRepository, WelcomeMessage, WelcomeMessageRepository,
};

use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub gateway: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Facility capture loop status
#[derive(Debug, Serialize)]
pub struct FacilityCaptureStatus {
    pub running: bool,
    pub queued: usize,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0} must be a non-zero Discord id")]
    InvalidId(&'static str),

    #[error("Role menu {0} not found")]
    RoleMenuNotFound(i64),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::InvalidId(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::RoleMenuNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Db(DbError::RoleMenuNotFound(id)) => {
                (StatusCode::NOT_FOUND, format!("Role menu {} not found", id))
            }
            ApiError::Db(e) => {
                error!("Database error in API handler: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Discord never issues a zero snowflake.
fn check_ids<'a>(
    field: &'static str,
    ids: impl IntoIterator<Item = &'a u64>,
) -> Result<(), ApiError> {
    if ids.into_iter().any(|id| *id == 0) {
        return Err(ApiError::InvalidId(field));
    }
    Ok(())
}

/// Run the HTTP server until `shutdown` resolves
pub async fn run(
    state: Arc<AppState>,
    bind_addr: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Create the router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/facility-capture", get(facility_capture_handler))
        .route(
            "/api/guilds/{guild_id}/planetside",
            get(get_planetside).put(put_planetside).delete(delete_planetside),
        )
        .route(
            "/api/guilds/{guild_id}/twitter",
            get(get_twitter).put(put_twitter).delete(delete_twitter),
        )
        .route(
            "/api/guilds/{guild_id}/welcome-message",
            get(get_welcome_message)
                .put(put_welcome_message)
                .delete(delete_welcome_message),
        )
        .route(
            "/api/guilds/{guild_id}/admin",
            get(get_admin).put(put_admin).delete(delete_admin),
        )
        .route("/api/guilds/{guild_id}/role-menus", get(list_role_menus))
        .route(
            "/api/role-menus/{id}",
            get(get_role_menu).delete(delete_role_menu),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Health check handler
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        gateway: "running".to_string(),
    })
}

async fn facility_capture_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(FacilityCaptureStatus {
        running: state.facility_capture.is_running(),
        queued: state.facility_capture.queued(),
    })
}

async fn get_planetside(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<u64>,
) -> ApiResult<PlanetsideSettings> {
    Ok(Json(
        PlanetsideSettingsRepository::get(state.pool(), guild_id).await?,
    ))
}

async fn put_planetside(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<u64>,
    Json(mut settings): Json<PlanetsideSettings>,
) -> ApiResult<PlanetsideSettings> {
    check_ids("guild_id", [&guild_id])?;
    check_ids("base_capture_channel_id", &settings.base_capture_channel_id)?;
    check_ids("tracked_outfit_ids", &settings.tracked_outfit_ids)?;
    settings.guild_id = guild_id;
    Ok(Json(
        PlanetsideSettingsRepository::upsert(state.pool(), &settings).await?,
    ))
}

async fn delete_planetside(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<u64>,
) -> ApiResult<DeleteResponse> {
    let deleted = PlanetsideSettingsRepository::delete(state.pool(), guild_id).await?;
    Ok(Json(DeleteResponse { deleted }))
}

async fn get_twitter(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<u64>,
) -> ApiResult<TwitterSettings> {
    Ok(Json(
        TwitterSettingsRepository::get(state.pool(), guild_id).await?,
    ))
}

async fn put_twitter(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<u64>,
    Json(mut settings): Json<TwitterSettings>,
) -> ApiResult<TwitterSettings> {
    check_ids("guild_id", [&guild_id])?;
    check_ids("relay_channel_id", &settings.relay_channel_id)?;
    settings.guild_id = guild_id;
    Ok(Json(
        TwitterSettingsRepository::upsert(state.pool(), &settings).await?,
    ))
}

async fn delete_twitter(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<u64>,
) -> ApiResult<DeleteResponse> {
    let deleted = TwitterSettingsRepository::delete(state.pool(), guild_id).await?;
    Ok(Json(DeleteResponse { deleted }))
}

async fn get_welcome_message(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<u64>,
) -> ApiResult<WelcomeMessage> {
    Ok(Json(
        WelcomeMessageRepository::get(state.pool(), guild_id).await?,
    ))
}

async fn put_welcome_message(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<u64>,
    Json(mut welcome): Json<WelcomeMessage>,
) -> ApiResult<WelcomeMessage> {
    check_ids("guild_id", [&guild_id])?;
    check_ids("channel_id", &welcome.channel_id)?;
    check_ids("default_role_ids", &welcome.default_role_ids)?;
    check_ids("alternate_role_ids", &welcome.alternate_role_ids)?;
    welcome.guild_id = guild_id;
    Ok(Json(
        WelcomeMessageRepository::upsert(state.pool(), &welcome).await?,
    ))
}

async fn delete_welcome_message(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<u64>,
) -> ApiResult<DeleteResponse> {
    let deleted = WelcomeMessageRepository::delete(state.pool(), guild_id).await?;
    Ok(Json(DeleteResponse { deleted }))
}

async fn get_admin(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<u64>,
) -> ApiResult<AdminSettings> {
    Ok(Json(
        AdminSettingsRepository::get(state.pool(), guild_id).await?,
    ))
}

async fn put_admin(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<u64>,
    Json(mut settings): Json<AdminSettings>,
) -> ApiResult<AdminSettings> {
    check_ids("guild_id", [&guild_id])?;
    check_ids("logging_channel_id", &settings.logging_channel_id)?;
    settings.guild_id = guild_id;
    Ok(Json(
        AdminSettingsRepository::upsert(state.pool(), &settings).await?,
    ))
}

async fn delete_admin(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<u64>,
) -> ApiResult<DeleteResponse> {
    let deleted = AdminSettingsRepository::delete(state.pool(), guild_id).await?;
    Ok(Json(DeleteResponse { deleted }))
}

async fn list_role_menus(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<u64>,
) -> ApiResult<Vec<RoleMenu>> {
    Ok(Json(
        RoleMenuRepository::list_for_guild(state.pool(), guild_id).await?,
    ))
}

async fn get_role_menu(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<RoleMenu> {
    RoleMenuRepository::get(state.pool(), id)
        .await?
        .map(Json)
        .ok_or(ApiError::RoleMenuNotFound(id))
}

async fn delete_role_menu(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if RoleMenuRepository::delete(state.pool(), id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::RoleMenuNotFound(id))
    }
}
