//! HTTP API for the portal pages and the admin panels.
//!
//! Everything lives under `/api`. Homepage routes sit at the root of that
//! prefix and every region repeats them under `/<region>`. Reads and the
//! chatbot are public; mutations need a bearer session whose role may edit
//! the partition. Sessions lapse after [`SESSION_TTL`].
//!
//! Store calls and password checks run on the blocking pool.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, PoisonError, RwLock},
    time::{Duration, Instant},
};

use axum::{
    Extension, Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    article::{Article, ArticleDraft, ArticlePatch},
    auth::{self, Role},
    error::{Error, Result},
    news_db::{NewsDb, UserSummary, UserUpdate},
    partition::{Partition, Region},
    search::{self, ChatReply},
    store::PartitionStore,
};

/// A logged-in admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: String,
    pub role: Role,
}

/// How long a login stays valid.
pub const SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);

#[derive(Debug, Clone)]
struct SessionEntry {
    session: Session,
    issued_at: Instant,
}

pub struct AppState {
    db: NewsDb,
    sessions: RwLock<HashMap<String, SessionEntry>>,
    session_ttl: Duration,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(db: NewsDb) -> SharedState {
        Self::with_session_ttl(db, SESSION_TTL)
    }

    pub fn with_session_ttl(db: NewsDb, session_ttl: Duration) -> SharedState {
        Arc::new(Self {
            db,
            sessions: RwLock::new(HashMap::new()),
            session_ttl,
        })
    }

    pub fn db(&self) -> &NewsDb {
        &self.db
    }

    fn is_expired(&self, entry: &SessionEntry) -> bool {
        entry.issued_at.elapsed() >= self.session_ttl
    }

    fn prune_expired(&self, sessions: &mut HashMap<String, SessionEntry>) {
        let before = sessions.len();
        sessions.retain(|_, entry| !self.is_expired(entry));
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::debug!(pruned, "expired sessions dropped");
        }
    }

    fn open_session(&self, session: Session) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        let mut sessions =
            self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        self.prune_expired(&mut sessions);
        sessions.insert(
            token.clone(),
            SessionEntry {
                session,
                issued_at: Instant::now(),
            },
        );
        token
    }

    fn close_session(&self, token: &str) -> Option<Session> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token)
            .filter(|entry| !self.is_expired(entry))
            .map(|entry| entry.session)
    }

    fn session(&self, headers: &HeaderMap) -> Option<Session> {
        let token = bearer_token(headers)?;
        {
            let sessions =
                self.sessions.read().unwrap_or_else(PoisonError::into_inner);
            match sessions.get(token) {
                None => return None,
                Some(entry) if !self.is_expired(entry) => {
                    return Some(entry.session.clone());
                }
                Some(_) => {}
            }
        }

        let mut sessions =
            self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        self.prune_expired(&mut sessions);
        None
    }

    #[cfg(test)]
    fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn require_session(
        &self,
        headers: &HeaderMap,
    ) -> std::result::Result<Session, ApiError> {
        self.session(headers).ok_or(ApiError::Unauthorized)
    }

    /// The caller's session, if it may mutate `partition`.
    fn authorize(
        &self,
        headers: &HeaderMap,
        partition: Partition,
    ) -> std::result::Result<Session, ApiError> {
        let session = self.require_session(headers)?;
        if !auth::can_mutate(session.role, partition) {
            tracing::warn!(
                user = %session.id,
                role = %session.role,
                %partition,
                "mutation refused"
            );
            return Err(ApiError::Forbidden("Forbidden".to_string()));
        }
        Ok(session)
    }

    fn require_editor(
        &self,
        headers: &HeaderMap,
    ) -> std::result::Result<Session, ApiError> {
        let session = self.require_session(headers)?;
        if session.role != Role::Editor {
            return Err(ApiError::Forbidden("Forbidden".to_string()));
        }
        Ok(session)
    }

    /// Keep open sessions in line with an edited account.
    fn retarget_sessions(&self, original_id: &str, user: &UserSummary) {
        let mut sessions =
            self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        for entry in sessions.values_mut() {
            if entry.session.id == original_id {
                entry.session.id = user.id.clone();
                entry.session.role = user.role;
            }
        }
    }

    fn drop_sessions_of(&self, user_id: &str) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, entry| entry.session.id != user_id);
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("db", &self.db)
            .finish_non_exhaustive()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// -- Errors --

/// Failure of an API request, rendered as `{"message": ...}`.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    InvalidCredentials,
    Forbidden(String),
    BadRequest(String),
    Internal(String),
    Store(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Store(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            ApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Store(err) => match err {
                Error::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
                Error::Conflict { .. } => (StatusCode::CONFLICT, err.to_string()),
                Error::InvalidCategory(_) => {
                    (StatusCode::BAD_REQUEST, "Invalid category".to_string())
                }
                Error::CategoryInUse(_) => {
                    (StatusCode::BAD_REQUEST, "Category is in use".to_string())
                }
                Error::InvalidRole(_) | Error::InvalidPartition(_) => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                other => {
                    tracing::error!(error = %other, "request failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Run a store call on the blocking pool.
async fn blocking<T, F>(state: &SharedState, f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> Result<T> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| ApiError::Internal(format!("task join failed: {e}")))?
        .map_err(ApiError::from)
}

// -- Router --

/// Build the full application router.
pub fn router(state: SharedState) -> Router {
    let mut api = Router::new()
        .route("/health", get(health))
        .route("/login/admin", post(login))
        .route("/logout", post(logout))
        .route("/check-session", get(check_session))
        .route("/chatbot", post(chatbot))
        .route("/users", get(list_users).post(add_user))
        .route("/users/{id}", put(update_user).delete(remove_user))
        .merge(partition_routes(Partition::Homepage));

    for region in Region::ALL {
        api = api.nest(
            &format!("/{}", region.key()),
            partition_routes(Partition::Region(region)),
        );
    }

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn partition_routes(partition: Partition) -> Router<SharedState> {
    Router::new()
        .route("/news", get(list_news).post(create_news))
        .route("/news/{id}", put(update_news).delete(delete_news))
        .route("/news-categories", get(list_categories).post(add_category))
        .route("/news-categories/{category}", delete(remove_category))
        .layer(Extension(partition))
}

/// Serve the API until Ctrl+C or SIGTERM.
pub async fn run(state: SharedState, bind: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(wait_for_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

// -- Session handlers --

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: String,
    redirect_to: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RedirectResponse {
    redirect_to: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionStatus {
    logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<Session>,
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn login(
    State(state): State<SharedState>,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let Json(req) = body?;
    let username = req.username.clone();
    let verified = blocking(&state, move |s| {
        s.db.verify_user(&req.username, &req.password)
    })
    .await?;
    let Some(role) = verified else {
        tracing::warn!(user = %username, "login failed");
        return Err(ApiError::InvalidCredentials);
    };

    tracing::info!(user = %username, %role, "logged in");
    let token = state.open_session(Session { id: username, role });

    Ok(Json(LoginResponse {
        token,
        redirect_to: role.admin_page(),
    }))
}

async fn logout(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Json<RedirectResponse> {
    let closed = bearer_token(&headers).and_then(|t| state.close_session(t));
    let redirect_to = match closed {
        Some(session) => {
            tracing::info!(user = %session.id, "logged out");
            session.role.home_page()
        }
        None => "/".to_string(),
    };
    Json(RedirectResponse { redirect_to })
}

async fn check_session(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Json<SessionStatus> {
    let user = state.session(&headers);
    Json(SessionStatus {
        logged_in: user.is_some(),
        user,
    })
}

// -- Chatbot --

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
    #[serde(default)]
    continent: Option<String>,
}

async fn chatbot(
    State(state): State<SharedState>,
    body: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Json<ChatReply>> {
    let Json(req) = body?;
    let reply = blocking(&state, move |s| {
        search::execute_search(&s.db, &req.message, req.continent.as_deref())
    })
    .await?;
    Ok(Json(reply))
}

// -- Partition handlers --

#[derive(Debug, Deserialize)]
struct CategoryRequest {
    #[serde(default)]
    category: String,
}

async fn list_news(
    State(state): State<SharedState>,
    Extension(partition): Extension<Partition>,
) -> ApiResult<Json<Vec<Article>>> {
    let articles =
        blocking(&state, move |s| s.db.list_articles(partition)).await?;
    Ok(Json(articles))
}

async fn create_news(
    State(state): State<SharedState>,
    Extension(partition): Extension<Partition>,
    headers: HeaderMap,
    body: std::result::Result<Json<ArticleDraft>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Article>)> {
    state.authorize(&headers, partition)?;
    let Json(draft) = body?;
    let article =
        blocking(&state, move |s| s.db.create_article(partition, draft))
            .await?;
    Ok((StatusCode::CREATED, Json(article)))
}

async fn update_news(
    State(state): State<SharedState>,
    Extension(partition): Extension<Partition>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: std::result::Result<Json<ArticlePatch>, JsonRejection>,
) -> ApiResult<Json<Article>> {
    state.authorize(&headers, partition)?;
    let Json(patch) = body?;
    let article =
        blocking(&state, move |s| s.db.update_article(partition, &id, patch))
            .await?;
    Ok(Json(article))
}

async fn delete_news(
    State(state): State<SharedState>,
    Extension(partition): Extension<Partition>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.authorize(&headers, partition)?;
    blocking(&state, move |s| s.db.delete_article(partition, &id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_categories(
    State(state): State<SharedState>,
    Extension(partition): Extension<Partition>,
) -> ApiResult<Json<Vec<String>>> {
    let categories =
        blocking(&state, move |s| s.db.list_categories(partition)).await?;
    Ok(Json(categories))
}

async fn add_category(
    State(state): State<SharedState>,
    Extension(partition): Extension<Partition>,
    headers: HeaderMap,
    body: std::result::Result<Json<CategoryRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Vec<String>>)> {
    state.authorize(&headers, partition)?;
    let Json(req) = body?;
    let categories = blocking(&state, move |s| {
        s.db.add_category(partition, &req.category)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(categories)))
}

async fn remove_category(
    State(state): State<SharedState>,
    Extension(partition): Extension<Partition>,
    headers: HeaderMap,
    Path(category): Path<String>,
) -> ApiResult<StatusCode> {
    state.authorize(&headers, partition)?;
    blocking(&state, move |s| s.db.remove_category(partition, &category))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// -- User handlers --

#[derive(Debug, Deserialize)]
struct NewUser {
    #[serde(default)]
    id: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    role: String,
}

async fn list_users(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<UserSummary>>> {
    state.require_editor(&headers)?;
    Ok(Json(blocking(&state, |s| s.db.list_users()).await?))
}

async fn add_user(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: std::result::Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserSummary>)> {
    state.require_editor(&headers)?;
    let Json(req) = body?;
    if req.id.is_empty() || req.password.is_empty() || req.role.is_empty() {
        return Err(ApiError::BadRequest(
            "Missing required fields".to_string(),
        ));
    }

    let role: Role = req.role.parse()?;
    let NewUser { id, password, .. } = req;
    let id = blocking(&state, move |s| {
        s.db.add_user(&id, &password, role)?;
        Ok(id)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(UserSummary { id, role })))
}

async fn update_user(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: std::result::Result<Json<UserUpdate>, JsonRejection>,
) -> ApiResult<Json<UserSummary>> {
    state.require_editor(&headers)?;
    let Json(update) = body?;
    let original_id = id.clone();
    let user =
        blocking(&state, move |s| s.db.update_user(&original_id, update))
            .await?;
    state.retarget_sessions(&id, &user);
    Ok(Json(user))
}

async fn remove_user(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let session = state.require_editor(&headers)?;
    if session.id == id {
        return Err(ApiError::Forbidden(
            "Cannot delete your own account".to_string(),
        ));
    }

    let target = id.clone();
    if !blocking(&state, move |s| s.db.remove_user(&target)).await? {
        return Err(Error::NotFound {
            kind: "user",
            name: id,
        }
        .into());
    }
    state.drop_sessions_of(&id);
    tracing::info!(user = %id, by = %session.id, "removed user");
    Ok(StatusCode::NO_CONTENT)
}
