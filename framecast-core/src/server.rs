//! The frame-streaming HTTP server.
//!
//! Orchestrates the full pipeline per request:
//!
//! 1. Decode the protocol headers ([`FrameRequest`]).
//! 2. Resolve or register the client's session.
//! 3. Repeat `frame_groups` times: acquire → encode → pace.
//! 4. Answer with the batch and its geometry.
//!
//! Lifecycle is an explicit three-state machine so start/stop races are
//! well defined:
//!
//! ```text
//!  Stopped ──► Starting ──► Running
//!     ▲            │           │
//!     └────────────┴───────────┘
//! ```
//!
//! `Starting` validates the configuration and opens the frame source —
//! a bad video path aborts the transition and the server stays
//! `Stopped`. `stop()` is idempotent and forces in-flight requests to
//! fail cleanly rather than letting a long batch hold the socket open.

use std::any::Any;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{debug, error, info};

use crate::config::StreamConfig;
use crate::encode::FrameEncoder;
use crate::error::CastError;
use crate::frame::Frame;
use crate::pacing::FramePacer;
use crate::protocol::{BatchResponse, ErrorResponse, FrameRequest, StatusResponse};
use crate::session::SessionStore;
use crate::source::{FrameSource, ScreenSource, VideoSource};

/// How long `stop()` waits for in-flight requests before aborting them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

// ── ServerState ──────────────────────────────────────────────────

/// Lifecycle phase of a [`StreamServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerState {
    /// Not serving. Initial and terminal state.
    #[default]
    Stopped,
    /// Validating configuration and opening the frame source.
    Starting,
    /// Accepting requests.
    Running,
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Starting => write!(f, "Starting"),
            Self::Running => write!(f, "Running"),
        }
    }
}

// ── ServerStats ──────────────────────────────────────────────────

/// Operator-facing request counters (displayed by the GUI collaborator).
#[derive(Debug, Default)]
pub struct ServerStats {
    requests: AtomicU64,
    last_request: Mutex<Option<Instant>>,
}

impl ServerStats {
    fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock() = Some(Instant::now());
    }

    /// Total `POST /` requests handled since construction.
    pub fn requests_served(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Time since the most recent frame request, if any.
    pub fn since_last_request(&self) -> Option<Duration> {
        (*self.last_request.lock()).map(|at| at.elapsed())
    }
}

// ── StreamServer ─────────────────────────────────────────────────

struct RunningServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

/// The polled frame-streaming server.
///
/// Sessions survive a stop/start cycle; the frame source does not — it
/// is opened in `Starting` and released in `stop()`.
pub struct StreamServer {
    config: StreamConfig,
    sessions: Arc<SessionStore>,
    stats: Arc<ServerStats>,
    state: Mutex<ServerState>,
    running: Mutex<Option<RunningServer>>,
    /// Injected source (tests, embedders); `None` selects by config.
    source_override: Option<Arc<dyn FrameSource>>,
}

impl StreamServer {
    /// Server whose frame source is chosen by the configuration:
    /// video file when `video_streaming`, live display otherwise.
    pub fn new(config: StreamConfig) -> Self {
        let sessions = Arc::new(SessionStore::new(config.frame_start));
        Self {
            config,
            sessions,
            stats: Arc::new(ServerStats::default()),
            state: Mutex::new(ServerState::Stopped),
            running: Mutex::new(None),
            source_override: None,
        }
    }

    /// Server with an explicitly provided frame source.
    pub fn with_source(config: StreamConfig, source: Arc<dyn FrameSource>) -> Self {
        Self {
            source_override: Some(source),
            ..Self::new(config)
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        *self.state.lock()
    }

    /// Whether the server is accepting requests.
    pub fn is_running(&self) -> bool {
        self.state() == ServerState::Running
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().as_ref().map(|run| run.addr)
    }

    /// The session store (shared with the frame source).
    pub fn sessions(&self) -> Arc<SessionStore> {
        Arc::clone(&self.sessions)
    }

    /// Request counters.
    pub fn stats(&self) -> Arc<ServerStats> {
        Arc::clone(&self.stats)
    }

    /// Start serving. Returns the bound address (useful with port 0).
    ///
    /// Fails with [`CastError::AlreadyRunning`] if the server is not
    /// `Stopped`, and with the specific configuration/source error if
    /// the `Starting` transition cannot complete — in which case the
    /// server remains `Stopped`.
    pub async fn start(&self) -> Result<SocketAddr, CastError> {
        {
            let mut state = self.state.lock();
            if *state != ServerState::Stopped {
                return Err(CastError::AlreadyRunning(self.config.port));
            }
            *state = ServerState::Starting;
        }

        match self.start_inner().await {
            Ok(addr) => {
                *self.state.lock() = ServerState::Running;
                info!(
                    %addr,
                    fps = self.config.fps,
                    resolution = %format!("{}x{}", self.config.x_res, self.config.y_res),
                    video = self.config.video_streaming,
                    "server started"
                );
                Ok(addr)
            }
            Err(e) => {
                *self.state.lock() = ServerState::Stopped;
                error!(error = %e, "server failed to start");
                Err(e)
            }
        }
    }

    async fn start_inner(&self) -> Result<SocketAddr, CastError> {
        self.config.validate()?;

        let source: Arc<dyn FrameSource> = match &self.source_override {
            Some(source) => Arc::clone(source),
            None if self.config.video_streaming => Arc::new(VideoSource::open(
                Path::new(&self.config.video_path),
                self.config.frame_start,
                self.config.speed_multiplier,
            )?),
            None => Arc::new(ScreenSource::start()?),
        };

        let listener = TcpListener::bind(("0.0.0.0", self.config.port)).await?;
        let addr = listener.local_addr()?;

        let app = AppState {
            config: self.config.clone(),
            sessions: Arc::clone(&self.sessions),
            stats: Arc::clone(&self.stats),
            encoder: FrameEncoder::new(
                self.config.x_res,
                self.config.y_res,
                self.config.compressed_colors,
            ),
            pacer: FramePacer::new(self.config.fps),
            source,
        };
        let router = Router::new()
            .route("/", get(status).post(serve_batch))
            .layer(CatchPanicLayer::custom(panic_response))
            .with_state(app);

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "http server terminated abnormally");
            }
        });

        *self.running.lock() = Some(RunningServer {
            addr,
            shutdown,
            task,
        });
        Ok(addr)
    }

    /// Stop serving and release the frame source.
    ///
    /// Idempotent: stopping a stopped server is a no-op. In-flight
    /// requests get [`SHUTDOWN_GRACE`] to finish, then their
    /// connections are torn down.
    pub async fn stop(&self) -> Result<(), CastError> {
        let Some(run) = self.running.lock().take() else {
            return Ok(());
        };

        run.shutdown.cancel();
        let mut task = run.task;
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
            debug!("in-flight requests outlived the grace period; aborting");
            task.abort();
            let _ = task.await;
        }

        *self.state.lock() = ServerState::Stopped;
        info!("server stopped");
        Ok(())
    }
}

// ── Request handling ─────────────────────────────────────────────

#[derive(Clone)]
struct AppState {
    config: StreamConfig,
    sessions: Arc<SessionStore>,
    stats: Arc<ServerStats>,
    encoder: FrameEncoder,
    pacer: FramePacer,
    source: Arc<dyn FrameSource>,
}

impl AppState {
    /// Acquire and encode one frame slot.
    ///
    /// Per-slot failures are recovered by the caller as empty frames;
    /// only a torn-down source escalates to a request-level error.
    async fn produce_frame(&self, request: &FrameRequest) -> Result<Frame, CastError> {
        let bitmap = self
            .source
            .acquire(&self.sessions, &request.client_id, request.advance)
            .await?;
        self.encoder.encode(&bitmap)
    }
}

/// `GET /` — liveness probe, no side effects.
async fn status(State(app): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "running".into(),
        resolution: format!("{}x{}", app.config.x_res, app.config.y_res),
        fps: app.config.fps,
    })
}

/// `POST /` — produce one paced frame batch.
async fn serve_batch(
    State(app): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<BatchResponse>, RequestError> {
    app.stats.record_request();
    let request = FrameRequest::from_headers(&headers);

    let (cursor, created) = app.sessions.get_or_create(&request.client_id);
    if created {
        info!(client = %request.client_id, cursor, "new client connected");
    }
    if request.refresh {
        // Full-refresh marker: the client rebuilds its texture from
        // scratch; the server keeps no per-session frame cache to clear.
        debug!(client = %request.client_id, "full refresh requested");
    }

    let mut frames = Vec::with_capacity(app.config.frame_groups as usize);
    for _ in 0..app.config.frame_groups {
        let frame_started = Instant::now();
        let frame = match app.produce_frame(&request).await {
            Ok(frame) => frame,
            Err(e @ CastError::ChannelClosed) => return Err(RequestError(e)),
            Err(e) => {
                error!(client = %request.client_id, error = %e, "frame slot degraded to empty");
                Frame::new()
            }
        };
        frames.push(frame);
        app.pacer.pace(frame_started).await;
    }

    Ok(Json(BatchResponse {
        frames,
        fps: app.config.fps,
        width: app.config.x_res,
        height: app.config.y_res,
        frame_groups: app.config.frame_groups,
    }))
}

// ── Request-level errors ─────────────────────────────────────────

/// Error spanning the whole request, surfaced as HTTP 500 JSON.
struct RequestError(CastError);

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Handler panics become the same 500 JSON shape as typed failures.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "internal error".to_string()
    };
    error!(error = %detail, "request handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: detail }),
    )
        .into_response()
}

// ── Tests ────────────────────────────────────────────────────────
