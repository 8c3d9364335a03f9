//! HTTP routes for the coderun server.

use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Path, Query, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode},
    response::Json,
    routing::{get, post},
};
use coderun_core::{Engine, ErrorKind, FileStore};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};

use crate::ServerConfig;
use crate::error::ServerResult;
use crate::protocol::{
    FileBody, FileEntry, Health, LanguageInfo, PathQuery, RunRequest, RunResponse, SaveFile,
    WriteFile, WriteReply,
};

/// Application state shared across handlers.
pub struct AppState<S> {
    /// Execution engine; also owns the file store.
    pub engine: Engine<S>,
}

impl<S: FileStore> AppState<S> {
    pub fn new(engine: Engine<S>) -> Self {
        Self { engine }
    }
}

/// Create the router with all routes.
pub fn create_router<S: FileStore>(state: Arc<AppState<S>>, config: &ServerConfig) -> Router {
    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/api/run", post(run_handler::<S>))
        .route("/api/languages", get(languages_handler::<S>))
        .route("/api/files", get(list_files_handler::<S>))
        .route(
            "/api/files/{name}",
            get(read_file_handler::<S>)
                .put(write_file_handler::<S>)
                .delete(remove_file_handler::<S>),
        )
        // Query-string form used by the bundled editor client.
        .route(
            "/api/file",
            get(read_text_handler::<S>)
                .put(save_file_handler::<S>)
                .post(save_file_handler::<S>)
                .delete(remove_query_handler::<S>),
        );

    // Built editor client, with index.html for unknown paths.
    let router = match &config.static_dir {
        Some(dir) => router.fallback_service(
            ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))),
        ),
        None => router,
    };

    router
        .layer(DefaultBodyLimit::max(config.body_limit))
        .layer(cors_layer(&config.allowed_origins))
        .with_state(state)
}

/// Permissive when no origins are configured.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Health check handler.
async fn health_handler() -> Json<Health> {
    Json(Health {
        ok: true,
        time: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Execute a submission.
///
/// Rejected input is a 400; every other outcome, including compile errors
/// and timeouts, is a normal 200 reply. A body that does not decode keeps
/// the rejection's status but still gets a run reply.
async fn run_handler<S: FileStore>(
    State(state): State<Arc<AppState<S>>>,
    request: Result<Json<RunRequest>, JsonRejection>,
) -> (StatusCode, Json<RunResponse>) {
    let request = match request {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!("Rejected run body: {}", rejection.body_text());
            let reply = RunResponse::rejected(rejection.body_text());
            return (rejection.status(), Json(reply));
        }
    };
    let result = state.engine.execute(request.into()).await;

    let status = if result.error_kind.is_some_and(ErrorKind::is_input) {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    (status, Json(result.into()))
}

/// List registered languages and whether each toolchain is installed.
async fn languages_handler<S: FileStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<Vec<LanguageInfo>> {
    let engine = &state.engine;
    let languages = engine
        .registry()
        .profiles()
        .iter()
        .map(|profile| LanguageInfo::new(profile, engine.prober().is_available(profile)))
        .collect();
    Json(languages)
}

async fn list_files_handler<S: FileStore>(
    State(state): State<Arc<AppState<S>>>,
) -> ServerResult<Json<Vec<FileEntry>>> {
    let names = state.engine.store().list().await?;
    Ok(Json(names.into_iter().map(FileEntry::new).collect()))
}

async fn read_file_handler<S: FileStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
) -> ServerResult<Json<FileBody>> {
    let content = state.engine.store().read(&name).await?;
    Ok(Json(FileBody { name, content }))
}

async fn write_file_handler<S: FileStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
    Json(body): Json<WriteFile>,
) -> ServerResult<Json<WriteReply>> {
    state.engine.store().write(&name, &body.content).await?;
    tracing::debug!("Saved {} ({} bytes)", name, body.content.len());
    Ok(Json(WriteReply {
        size: body.content.len(),
        name,
    }))
}

async fn remove_file_handler<S: FileStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
) -> ServerResult<StatusCode> {
    state.engine.store().remove(&name).await?;
    tracing::debug!("Removed {}", name);
    Ok(StatusCode::NO_CONTENT)
}

/// Raw file content as `text/plain`.
async fn read_text_handler<S: FileStore>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<PathQuery>,
) -> ServerResult<String> {
    Ok(state.engine.store().read(&query.path).await?)
}

async fn save_file_handler<S: FileStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(body): Json<SaveFile>,
) -> ServerResult<Json<WriteReply>> {
    state.engine.store().write(&body.path, &body.content).await?;
    tracing::debug!("Saved {} ({} bytes)", body.path, body.content.len());
    Ok(Json(WriteReply {
        size: body.content.len(),
        name: body.path,
    }))
}

async fn remove_query_handler<S: FileStore>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<PathQuery>,
) -> ServerResult<StatusCode> {
    state.engine.store().remove(&query.path).await?;
    tracing::debug!("Removed {}", query.path);
    Ok(StatusCode::NO_CONTENT)
}
