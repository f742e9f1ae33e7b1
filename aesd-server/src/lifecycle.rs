//! Startup and teardown around the accept loop.
//!
//! Startup order: socket, data file, address reuse, bind, optional fork,
//! listen, signal listeners, pid file. Binding happens before the fork so the
//! invoking process still sees bind failures. Teardown always runs once the
//! loop has been entered and never fails: problems are logged and skipped.

use std::fs;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use nix::unistd::Pid;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::daemon::{self, Detached};
use crate::data_log::{open_append, DataLog};
use crate::error::{io_err, setup_err, AesdError};
use crate::server::{self, ShutdownTx};

/// How a server invocation ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit {
    /// Shutdown was requested; `sessions` clients were served.
    Shutdown { sessions: u64 },
    /// This is the invoking process of a daemonized start.
    Detached { child: Pid },
}

/// Resources acquired before the fork: the bound socket and the data file.
#[derive(Debug)]
pub struct Prepared {
    socket: Socket,
    log_file: fs::File,
}

impl Prepared {
    pub fn local_addr(&self) -> Result<SocketAddr, AesdError> {
        let addr = self
            .socket
            .local_addr()
            .map_err(setup_err("read the bound address"))?;
        addr.as_socket().ok_or(AesdError::Setup {
            step: "read the bound address",
            source: std::io::Error::new(ErrorKind::InvalidData, "not an inet address"),
        })
    }
}

/// Start the server and block the current thread until it exits.
pub fn start_blocking(config: ServerConfig, daemonize: bool) -> Result<Exit, AesdError> {
    init_tracing(daemonize.then_some(config.daemon_log.as_path()));

    let prepared = prepare(&config).inspect_err(|err| {
        tracing::error!(error = %err, "startup failed");
    })?;

    let pid_file = if daemonize {
        match daemon::daemonize(&config.pid_file) {
            Ok(Detached::Parent { child }) => {
                tracing::info!(pid = %child, "server detached into background");
                return Ok(Exit::Detached { child });
            }
            Ok(Detached::Child { pid_file }) => Some(pid_file),
            Err(err) => return Err(abort_startup(prepared, &config, err)),
        }
    } else {
        None
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            let err = setup_err("build the async runtime")(err);
            return Err(abort_startup(prepared, &config, err));
        }
    };

    runtime
        .block_on(run(prepared, &config, pid_file))
        .map(|sessions| Exit::Shutdown { sessions })
}

/// Create, configure, and bind the server socket and open the data file.
///
/// On a failure after the data file was opened, the file is removed again.
pub fn prepare(config: &ServerConfig) -> Result<Prepared, AesdError> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
        .map_err(setup_err("create the server socket"))?;
    socket
        .set_nonblocking(true)
        .map_err(setup_err("make the server socket non-blocking"))?;

    let log_file = open_append(&config.data_file).map_err(|e| io_err(&config.data_file, e))?;

    let bound = socket
        .set_reuse_address(true)
        .map_err(setup_err("set SO_REUSEADDR"))
        .and_then(|()| {
            socket
                .bind(&config.bind_addr().into())
                .map_err(setup_err("bind"))
        });
    if let Err(err) = bound {
        drop(log_file);
        discard_data_file(&config.data_file);
        return Err(err);
    }

    Ok(Prepared { socket, log_file })
}

/// Run the accept loop with SIGINT/SIGTERM wired to shutdown, then tear down.
pub async fn run(
    prepared: Prepared,
    config: &ServerConfig,
    pid_file: Option<PathBuf>,
) -> Result<u64, AesdError> {
    let (shutdown_tx, _) = server::shutdown_channel();
    run_with_shutdown(prepared, config, pid_file, shutdown_tx).await
}

/// Like [`run`], with a caller-provided shutdown channel that signals also feed.
pub async fn run_with_shutdown(
    prepared: Prepared,
    config: &ServerConfig,
    pid_file: Option<PathBuf>,
    shutdown_tx: ShutdownTx,
) -> Result<u64, AesdError> {
    let Prepared { socket, log_file } = prepared;
    let mut resources = Resources {
        log: DataLog::from_std(config.data_file.clone(), log_file),
        listener: None,
        signals: None,
        pid_file,
    };

    let outcome = serve(socket, &mut resources, config, shutdown_tx).await;
    if let Err(err) = &outcome {
        tracing::error!(error = %err, "server stopped on error");
    }
    resources.release().await;
    outcome
}

async fn serve(
    socket: Socket,
    resources: &mut Resources,
    config: &ServerConfig,
    shutdown_tx: ShutdownTx,
) -> Result<u64, AesdError> {
    let mut shutdown_rx = shutdown_tx.subscribe();

    socket
        .listen(config.backlog)
        .map_err(setup_err("listen"))?;
    let listener = TcpListener::from_std(socket.into())
        .map_err(setup_err("register the listener"))?;
    let listener = resources.listener.insert(listener);

    resources.signals = Some(spawn_signal_listener(shutdown_tx)?);
    if let Some(pid_file) = &resources.pid_file {
        daemon::write_pid_file(pid_file, nix::unistd::getpid())?;
    }

    match listener.local_addr() {
        Ok(addr) => tracing::info!(%addr, boundary = %config.boundary, "listening"),
        Err(err) => tracing::warn!(error = %err, "listening on unknown address"),
    }

    server::serve(listener, &mut resources.log, config.boundary, &mut shutdown_rx).await
}

/// Forward the first SIGINT or SIGTERM into the shutdown channel; later
/// signals are absorbed.
fn spawn_signal_listener(shutdown_tx: ShutdownTx) -> Result<JoinHandle<()>, AesdError> {
    let mut interrupt =
        signal(SignalKind::interrupt()).map_err(setup_err("install the SIGINT handler"))?;
    let mut terminate =
        signal(SignalKind::terminate()).map_err(setup_err("install the SIGTERM handler"))?;

    Ok(tokio::spawn(async move {
        let mut requested = false;
        loop {
            let name = tokio::select! {
                Some(()) = interrupt.recv() => "SIGINT",
                Some(()) = terminate.recv() => "SIGTERM",
                else => break,
            };
            if requested {
                tracing::debug!(signal = name, "shutdown already in progress");
                continue;
            }
            requested = true;
            tracing::info!(signal = name, "Caught signal, exiting");
            let _ = shutdown_tx.send(());
        }
    }))
}

struct Resources {
    log: DataLog,
    listener: Option<TcpListener>,
    signals: Option<JoinHandle<()>>,
    pid_file: Option<PathBuf>,
}

impl Resources {
    /// Release in reverse order of acquisition. A client connection left by a
    /// failed session was already dropped by the session itself.
    async fn release(self) {
        let Self {
            log,
            listener,
            signals,
            pid_file,
        } = self;

        let data_file = log.path().to_path_buf();
        match log.remove().await {
            Ok(()) => tracing::debug!(path = %data_file.display(), "data file removed"),
            Err(err) => tracing::warn!(error = %err, "failed to remove data file"),
        }

        drop(listener);

        if let Some(signals) = signals {
            signals.abort();
        }

        if let Some(pid_file) = pid_file {
            remove_if_present(&pid_file);
        }

        tracing::info!("shutdown complete");
    }
}

fn abort_startup(prepared: Prepared, config: &ServerConfig, err: AesdError) -> AesdError {
    tracing::error!(error = %err, "startup failed");
    drop(prepared);
    discard_data_file(&config.data_file);
    err
}

fn discard_data_file(path: &Path) {
    remove_if_present(path);
}

fn remove_if_present(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => tracing::warn!(path = %path.display(), error = %err, "cleanup failed"),
    }
}

/// Install the global `tracing` subscriber. With `log_file`, output goes to
/// that file as JSON lines (the daemon's stdio is `/dev/null`).
pub fn init_tracing(log_file: Option<&Path>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(path) = log_file {
        match open_append(path) {
            Ok(file) => {
                let _ = fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file))
                    .try_init();
                return;
            }
            Err(err) => eprintln!(
                "aesdsocket: cannot open log file {}: {err}; logging to stderr",
                path.display()
            ),
        }
    }

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
