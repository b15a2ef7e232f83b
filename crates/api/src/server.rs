// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Server implementation module
//!
//! [`Server`] assembles the router from the loaded components and drives the
//! listening socket. [`Lifecycle`] owns the status state machine: `start` and
//! `shutdown` are idempotent, concurrent callers share the in-flight outcome,
//! and the completion event carries the process exit code.

use std::{
    fmt, io,
    net::SocketAddr,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use axum::{Router, http::HeaderName};
use futures::{
    FutureExt,
    future::{self, BoxFuture, Shared},
};
use hyper::Request;
use shared_types::{ServerStatus, ServerStatusParseError};
use tokio::{net::TcpListener, sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{debug, error, info, info_span, warn};

use crate::{
    config::ServerConfig,
    dependencies::{Catalog, load_components},
    error::{ServerError, ServerResult},
    openapi::ApiDefinition,
    routes::create_routes,
    service::Service,
    state::ServerState,
    validator::RequestValidator,
};

// Server constants
const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Exit code used by [`Lifecycle::fail`]
pub const FAILURE_EXIT_CODE: i32 = 6;

/// Exit code used when startup or the serve loop fails
pub const ERROR_EXIT_CODE: i32 = 1;

/// Why the server is shutting down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownCause {
    /// A process signal was received
    Signal(&'static str),
    /// An error forced the shutdown
    Error(String),
}

impl fmt::Display for ShutdownCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(name) => write!(f, "received {name}"),
            Self::Error(message) => f.write_str(message),
        }
    }
}

/// Exit code emitted for a shutdown: the requested one, else 1 with a cause, else 0
pub fn resolve_exit_code(cause: Option<&ShutdownCause>, exit_code: Option<i32>) -> i32 {
    exit_code.unwrap_or(if cause.is_some() { ERROR_EXIT_CODE } else { 0 })
}

type StartOutcome = Result<SocketAddr, Arc<ServerError>>;
type SharedStart = Shared<BoxFuture<'static, StartOutcome>>;
type SharedShutdown = Shared<BoxFuture<'static, i32>>;

#[derive(Default)]
struct LifecycleState {
    status: ServerStatus,
    starting: Option<SharedStart>,
    shutting_down: Option<SharedShutdown>,
    cancellation_token: CancellationToken,
    serve_task: Option<JoinHandle<ServerResult<()>>>,
    local_addr: Option<SocketAddr>,
}

/// Status state machine of one server
pub struct Lifecycle {
    state: Mutex<LifecycleState>,
    completion: watch::Sender<Option<i32>>,
    listen_attempts: AtomicUsize,
    close_attempts: AtomicUsize,
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("status", &self.status())
            .field("exit_code", &self.exit_code())
            .finish_non_exhaustive()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Create a lifecycle in the `INITIALIZING` state
    pub fn new() -> Self {
        let (completion, _) = watch::channel(None);
        Self {
            state: Mutex::new(LifecycleState {
                status: ServerStatus::Initializing,
                ..LifecycleState::default()
            }),
            completion,
            listen_attempts: AtomicUsize::new(0),
            close_attempts: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, LifecycleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition_locked(state: &mut LifecycleState, status: ServerStatus) {
        if state.status != status {
            debug!(from = %state.status, to = %status, "server status changed");
            state.status = status;
        }
    }

    pub(crate) fn transition(&self, status: ServerStatus) {
        Self::transition_locked(&mut self.state(), status);
    }

    /// Current status
    pub fn status(&self) -> ServerStatus {
        self.state().status
    }

    /// Set the status from its name
    ///
    /// # Errors
    ///
    /// Returns `ServerStatusParseError` for a name that is not a status; the
    /// current status is kept.
    pub fn set_status(&self, status: &str) -> Result<(), ServerStatusParseError> {
        let status = status.parse()?;
        self.transition(status);
        Ok(())
    }

    /// Address the server listens on, once bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state().local_addr
    }

    /// Number of bind attempts so far
    pub fn listen_attempts(&self) -> usize {
        self.listen_attempts.load(Ordering::SeqCst)
    }

    /// Number of times a listening socket was closed
    pub fn close_attempts(&self) -> usize {
        self.close_attempts.load(Ordering::SeqCst)
    }

    /// Exit code, once the completion event fired
    pub fn exit_code(&self) -> Option<i32> {
        *self.completion.borrow()
    }

    /// Wait for the completion event and return its exit code
    pub async fn completion(&self) -> i32 {
        let mut receiver = self.completion.subscribe();
        receiver
            .wait_for(Option::is_some)
            .await
            .map(|code| code.unwrap_or_default())
            .unwrap_or_default()
    }

    /// Join the in-flight start, or begin a new one with `listen`
    fn begin_start(
        &self,
        listen: impl FnOnce(CancellationToken) -> BoxFuture<'static, StartOutcome>,
    ) -> SharedStart {
        let mut state = self.state();
        if state.status.is_starting_or_started()
            && let Some(starting) = &state.starting
        {
            debug!(status = %state.status, "start already in progress");
            return starting.clone();
        }

        Self::transition_locked(&mut state, ServerStatus::Starting);
        state.cancellation_token = CancellationToken::new();
        state.shutting_down = None;
        self.completion.send_replace(None);

        let starting = listen(state.cancellation_token.clone()).shared();
        state.starting = Some(starting.clone());
        starting
    }

    /// Record the serve task of a successful start
    fn connect(&self, local_addr: SocketAddr, serve_task: JoinHandle<ServerResult<()>>) {
        let mut state = self.state();
        state.local_addr = Some(local_addr);
        state.serve_task = Some(serve_task);
        if state.status == ServerStatus::Listening {
            Self::transition_locked(&mut state, ServerStatus::Connected);
        }
    }

    /// Stop accepting connections and wait for the serve task
    ///
    /// Calling this while the server already failed to start, is shutting
    /// down or is shut down returns the existing outcome without closing
    /// again. Returns the emitted exit code.
    pub async fn shutdown(
        self: &Arc<Self>,
        cause: Option<ShutdownCause>,
        exit_code: Option<i32>,
    ) -> i32 {
        let shutting_down = {
            let mut state = self.state();
            if state.status.is_stopping_or_stopped() {
                debug!(status = %state.status, "shutdown already in progress");
                match &state.shutting_down {
                    Some(existing) => existing.clone(),
                    None => {
                        let code = self
                            .exit_code()
                            .unwrap_or_else(|| resolve_exit_code(cause.as_ref(), exit_code));
                        future::ready(code).boxed().shared()
                    }
                }
            } else {
                Self::transition_locked(&mut state, ServerStatus::ShuttingDown);
                let closing = Arc::clone(self).close(cause, exit_code).boxed().shared();
                state.shutting_down = Some(closing.clone());
                closing
            }
        };
        shutting_down.await
    }

    /// Shut down with [`FAILURE_EXIT_CODE`]
    pub async fn fail(self: &Arc<Self>, cause: impl Into<String>) -> i32 {
        self.shutdown(
            Some(ShutdownCause::Error(cause.into())),
            Some(FAILURE_EXIT_CODE),
        )
        .await
    }

    async fn close(self: Arc<Self>, cause: Option<ShutdownCause>, exit_code: Option<i32>) -> i32 {
        match &cause {
            Some(cause) => warn!(%cause, "shutting down server"),
            None => info!("shutting down server"),
        }

        let (token, serve_task) = {
            let mut state = self.state();
            (state.cancellation_token.clone(), state.serve_task.take())
        };
        token.cancel();

        let status = match serve_task {
            Some(task) => {
                self.close_attempts.fetch_add(1, Ordering::SeqCst);
                match task.await {
                    Ok(Ok(())) => ServerStatus::Shutdown,
                    Ok(Err(e)) => {
                        error!(error = %e, "serve loop ended with an error");
                        ServerStatus::ShutdownFailed
                    }
                    Err(e) => {
                        error!(error = %e, "serve task failed while closing");
                        ServerStatus::ShutdownFailed
                    }
                }
            }
            None => {
                debug!("no listening socket to close");
                ServerStatus::Shutdown
            }
        };
        self.transition(status);

        let code = resolve_exit_code(cause.as_ref(), exit_code);
        self.completion.send_replace(Some(code));
        info!(exit_code = code, %status, "server shutdown complete");
        code
    }
}

/// Run a detached task; a panic in it shuts the server down with
/// [`ERROR_EXIT_CODE`]
fn spawn_supervised(lifecycle: Arc<Lifecycle>, task: BoxFuture<'static, ()>) {
    let handle = tokio::spawn(task);
    tokio::spawn(async move {
        if let Err(e) = handle.await
            && e.is_panic()
        {
            let error = ServerError::from(e);
            error!(error = %error, "detached task panicked");
            lifecycle
                .shutdown(
                    Some(ShutdownCause::Error(error.to_string())),
                    Some(ERROR_EXIT_CODE),
                )
                .await;
        }
    });
}

/// Main server struct
#[derive(Debug, Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

#[derive(Debug)]
struct ServerInner {
    /// Server configuration
    config: Arc<ServerConfig>,
    /// Application router
    router: Router,
    /// Server state
    state: ServerState,
    /// Status state machine
    lifecycle: Arc<Lifecycle>,
    /// Services whose listening hooks run once bound
    services: Vec<Arc<dyn Service>>,
}

impl Server {
    /// Load the catalog's components and assemble the router
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Load` if a component cannot be loaded and
    /// `ServerError::Definition` if the API definition is inconsistent.
    pub async fn new(config: ServerConfig, catalog: &Catalog) -> ServerResult<Self> {
        let lifecycle = Arc::new(Lifecycle::new());
        let config = Arc::new(config);

        let loaded = load_components(catalog, &config, &lifecycle).await?;
        let definition = ApiDefinition::synthesize(&loaded.services, &loaded.middlewares)?;
        let validator = RequestValidator::new(definition.document_json())?;

        info!(
            services = loaded.services.len(),
            routes = definition.routes().len(),
            "API definition bound"
        );

        let state = ServerState::new(
            Arc::clone(&config),
            Arc::new(definition),
            Arc::new(validator),
        );
        let router = Self::create_router(state.clone())?;
        let services = loaded.services.iter().map(|(_, s)| Arc::clone(s)).collect();

        Ok(Self {
            inner: Arc::new(ServerInner {
                config,
                router,
                state,
                lifecycle,
                services,
            }),
        })
    }

    /// Create application router with middleware
    fn create_router(state: ServerState) -> ServerResult<Router> {
        let cors = state.config().cors;

        let middleware = ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http().make_span_with(|req: &Request<_>| {
                    if let Some(request_id) = req.headers().get(REQUEST_ID_HEADER) {
                        info_span!("http_request", ?request_id, method = %req.method(), uri = %req.uri())
                    } else {
                        error!("failed to extract id from request");
                        info_span!("http_request", request_id = "unknown")
                    }
                }),
            )
            .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER));

        let mut router = create_routes(&state)?.layer(middleware);
        if cors {
            router = router.layer(CorsLayer::permissive());
        }
        Ok(router.with_state(state))
    }

    /// Bind the listening socket and start serving
    ///
    /// Calling this while starting or started returns the in-flight outcome
    /// without binding again.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Start` wrapping the shared startup failure; the
    /// server has then been shut down with exit code 1.
    pub async fn start(&self) -> ServerResult<SocketAddr> {
        let server = self.clone();
        let starting = self
            .inner
            .lifecycle
            .begin_start(move |token| server.listen(token).boxed());
        starting.await.map_err(ServerError::Start)
    }

    async fn listen(self, cancellation_token: CancellationToken) -> StartOutcome {
        let lifecycle = &self.inner.lifecycle;
        lifecycle.listen_attempts.fetch_add(1, Ordering::SeqCst);

        let address = self.inner.config.socket_addr();
        let listener = match TcpListener::bind(address).await {
            Ok(listener) => listener,
            Err(source) => return Err(self.fail_start(ServerError::Bind { address, source }).await),
        };
        let local_addr = match listener.local_addr() {
            Ok(local_addr) => local_addr,
            Err(source) => return Err(self.fail_start(ServerError::Startup { source }).await),
        };

        lifecycle.transition(ServerStatus::Listening);
        info!(
            address = %local_addr,
            environment = %self.inner.config.environment,
            "server listening",
        );
        self.run_listening_hooks();

        let router = self.inner.router.clone();
        let serve = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    cancellation_token.cancelled().await;
                    info!("server stopped accepting connections");
                })
                .await
        });

        let serve_lifecycle = Arc::clone(lifecycle);
        let serve_task = tokio::spawn(async move {
            let result = match serve.await {
                Ok(result) => result.map_err(|source| ServerError::Serve { source }),
                Err(e) => Err(ServerError::from(e)),
            };

            if let Err(e) = &result {
                error!(error = %e, "server error");
                serve_lifecycle.transition(ServerStatus::Error);
                let cause = ShutdownCause::Error(e.to_string());
                // The shutdown awaits this task, so it cannot run inline
                tokio::spawn(async move {
                    serve_lifecycle
                        .shutdown(Some(cause), Some(ERROR_EXIT_CODE))
                        .await;
                });
            }
            result
        });

        lifecycle.connect(local_addr, serve_task);
        Ok(local_addr)
    }

    async fn fail_start(&self, error: ServerError) -> Arc<ServerError> {
        if let ServerError::Bind { address, source } = &error {
            match source.kind() {
                io::ErrorKind::PermissionDenied => {
                    error!(%address, "{address} requires elevated privileges");
                }
                io::ErrorKind::AddrInUse => {
                    error!(%address, "{address} port is already in use");
                }
                _ => error!(%address, error = %source, "failed to bind"),
            }
        } else {
            error!(error = %error, "server startup failed");
        }

        let lifecycle = &self.inner.lifecycle;
        lifecycle.transition(ServerStatus::Error);
        let error = Arc::new(error);
        lifecycle
            .shutdown(
                Some(ShutdownCause::Error(error.to_string())),
                Some(ERROR_EXIT_CODE),
            )
            .await;
        lifecycle.transition(ServerStatus::StartFailed);
        error
    }

    fn run_listening_hooks(&self) {
        for service in &self.inner.services {
            if let Some(hook) = service.on_listening() {
                debug!(service = service.name(), "running listening hook");
                spawn_supervised(Arc::clone(&self.inner.lifecycle), hook);
            }
        }
    }

    /// Start the server, shut it down on SIGHUP, SIGINT or SIGTERM and wait
    /// for completion
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Start` if the server fails to start.
    pub async fn run(self) -> ServerResult<i32> {
        self.start().await?;

        let lifecycle = Arc::clone(&self.inner.lifecycle);
        tokio::spawn(async move {
            info!("spawning the shutdown signal task");
            Self::shutdown_signal_handler(lifecycle).await;
        });

        Ok(self.inner.lifecycle.completion().await)
    }

    /// Handle shutdown signals
    ///
    /// SIGHUP, SIGINT and SIGTERM shut the server down with the signal number
    /// as exit code. The task ends on its own once the server completes.
    async fn shutdown_signal_handler(lifecycle: Arc<Lifecycle>) {
        let signal_received = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{SignalKind, signal};

                let (Ok(mut sighup), Ok(mut sigint), Ok(mut sigterm)) = (
                    signal(SignalKind::hangup()),
                    signal(SignalKind::interrupt()),
                    signal(SignalKind::terminate()),
                ) else {
                    error!("failed to register signal handlers");
                    return None;
                };

                tokio::select! {
                    _ = sighup.recv() => Some(("SIGHUP", 1)),
                    _ = sigint.recv() => Some(("SIGINT", 2)),
                    _ = sigterm.recv() => Some(("SIGTERM", 15)),
                }
            }

            #[cfg(not(unix))]
            {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => Some(("SIGINT", 2)),
                    Err(e) => {
                        error!(error = %e, "failed to register CTRL+C handler");
                        None
                    }
                }
            }
        };

        tokio::select! {
            received = signal_received => {
                if let Some((name, code)) = received {
                    warn!(signal = name, "shutdown signal received");
                    lifecycle.shutdown(Some(ShutdownCause::Signal(name)), Some(code)).await;
                }
            },
            code = lifecycle.completion() => {
                debug!(exit_code = code, "server completed, signal handler exiting");
            }
        }
    }

    /// Start the server for testing, returns the bound address
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Start` if the server fails to start.
    pub async fn run_for_testing(self) -> ServerResult<(SocketAddr, Arc<Lifecycle>)> {
        let address = self.start().await?;
        Ok((address, Arc::clone(&self.inner.lifecycle)))
    }

    /// Get server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get server state for testing
    pub fn state(&self) -> &ServerState {
        &self.inner.state
    }

    /// Status state machine
    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.inner.lifecycle
    }

    /// Assembled router
    pub fn router(&self) -> Router {
        self.inner.router.clone()
    }
}
