#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use subsidy_adapter::config::AdminConfig;
use subsidy_adapter::journal::ProfileJournal;
use subsidy_adapter::{
    init_tracing, AdminRuntime, ApiError, BatchProfilesRequest, CreateProfileRequest,
    HealthResponse,
};
use subsidy_kernel_contracts::profile::{ProfilePatchBody, ProfileRecord};
use subsidy_storage::profile_store::ProfileStore;
use tracing::{error, info};

type SharedRuntime = Arc<Mutex<AdminRuntime>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let config = AdminConfig::from_env()?;
    let journal = ProfileJournal::open(&config.profile_store_path)?;
    let runtime = AdminRuntime::new_with_persistence(
        Arc::new(Mutex::new(ProfileStore::new_in_memory())),
        journal,
    )?;
    let state: SharedRuntime = Arc::new(Mutex::new(runtime));

    let app = Router::new()
        .route("/health", get(health))
        .route(
            "/api/beneficiaries",
            get(list_profiles).post(create_profile),
        )
        .route("/api/beneficiaries/batch", post(batch_profiles))
        .route(
            "/api/beneficiaries/:address",
            get(get_profile).put(update_profile).delete(delete_profile),
        )
        .with_state(state);

    info!(
        bind = %config.http_bind,
        store = %config.profile_store_path.display(),
        "subsidy_adapter_http listening"
    );
    let listener = tokio::net::TcpListener::bind(config.http_bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown requested");
}

fn with_runtime<T>(
    state: &SharedRuntime,
    failure: &'static str,
    call: impl FnOnce(&AdminRuntime) -> Result<T, ApiError>,
) -> Result<T, ApiError> {
    let runtime = state.lock().map_err(|_| {
        error!("adapter runtime lock poisoned");
        ApiError::Internal(failure)
    })?;
    call(&runtime)
}

async fn health(State(state): State<SharedRuntime>) -> Result<Json<HealthResponse>, ApiError> {
    with_runtime(&state, "unhealthy", |rt| Ok(Json(rt.health())))
}

async fn list_profiles(
    State(state): State<SharedRuntime>,
) -> Result<Json<Vec<ProfileRecord>>, ApiError> {
    with_runtime(&state, "Failed to fetch beneficiaries", |rt| {
        rt.list_profiles().map(Json)
    })
}

async fn get_profile(
    State(state): State<SharedRuntime>,
    Path(address): Path<String>,
) -> Result<Json<ProfileRecord>, ApiError> {
    with_runtime(&state, "Failed to fetch beneficiary", |rt| {
        rt.get_profile(&address).map(Json)
    })
}

async fn create_profile(
    State(state): State<SharedRuntime>,
    Json(request): Json<CreateProfileRequest>,
) -> Result<(StatusCode, Json<ProfileRecord>), ApiError> {
    with_runtime(&state, "Failed to create beneficiary", |rt| {
        rt.create_profile(request)
            .map(|record| (StatusCode::CREATED, Json(record)))
    })
}

async fn update_profile(
    State(state): State<SharedRuntime>,
    Path(address): Path<String>,
    Json(body): Json<ProfilePatchBody>,
) -> Result<Json<ProfileRecord>, ApiError> {
    with_runtime(&state, "Failed to update beneficiary", |rt| {
        rt.update_profile(&address, body).map(Json)
    })
}

async fn delete_profile(
    State(state): State<SharedRuntime>,
    Path(address): Path<String>,
) -> Result<StatusCode, ApiError> {
    with_runtime(&state, "Failed to delete beneficiary", |rt| {
        rt.delete_profile(&address).map(|()| StatusCode::NO_CONTENT)
    })
}

async fn batch_profiles(
    State(state): State<SharedRuntime>,
    Json(request): Json<BatchProfilesRequest>,
) -> Result<Json<Vec<ProfileRecord>>, ApiError> {
    with_runtime(&state, "Failed to fetch beneficiaries", |rt| {
        rt.batch_profiles(request).map(Json)
    })
}
