// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use id::Id;
use nix::sys::socket::UnixAddr;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::socket::{self, BUFFER_SIZE, Socket};
use crate::{ProxyError, SocketKind};

/// Metric key for the bytes relayed from the target to the source
pub const RX_BYTES: &str = "rx_bytes";
/// Metric key for the bytes relayed from the source to the target
pub const TX_BYTES: &str = "tx_bytes";

pub type ProxyId = Id<Proxy>;

/// Gets told when the worker of a proxy exits, whatever the reason. The call happens on its own
/// blocking task, so a listener may wait on whoever is stopping the proxy.
pub trait StopListener: Send + Sync {
    fn on_stopped(&self, proxy: ProxyId);
}

/// A [`StopListener`] calling a closure
pub struct StopListenerFn<F>(pub F);

impl<F: Fn(ProxyId) + Send + Sync> StopListener for StopListenerFn<F> {
    fn on_stopped(&self, proxy: ProxyId) {
        (self.0)(proxy);
    }
}

#[derive(Default)]
struct Counters {
    rx: AtomicU64,
    tx: AtomicU64,
}

struct Running {
    stop: oneshot::Sender<()>,
    worker: JoinHandle<Result<(), ProxyError>>,
    listener: Arc<Socket>,
}

/// Relay between a socket we listen on (the source) and a socket we connect to (the target).
pub struct Proxy {
    id: ProxyId,
    source: PathBuf,
    target: PathBuf,
    source_addr: Arc<UnixAddr>,
    target_addr: Arc<UnixAddr>,
    kind: SocketKind,
    on_stop: Option<Arc<dyn StopListener>>,
    counters: Arc<Counters>,
    running: Option<Running>,
}

fn resolve(path: &Path) -> Result<Arc<UnixAddr>, ProxyError> {
    UnixAddr::new(path)
        .map(Arc::new)
        .map_err(|source| ProxyError::InvalidAddress {
            path: path.display().to_string(),
            source,
        })
}

impl Proxy {
    /// Create a proxy from `source` to `target`. Nothing is bound until [`Proxy::start`], but a
    /// file left over at `source` is removed now.
    pub fn new(
        source: impl AsRef<Path>,
        target: impl AsRef<Path>,
        kind: SocketKind,
        on_stop: Option<Arc<dyn StopListener>>,
    ) -> Result<Self, ProxyError> {
        let source = source.as_ref().to_path_buf();
        let target = target.as_ref().to_path_buf();
        let source_addr = resolve(&source)?;
        let target_addr = resolve(&target)?;
        match std::fs::remove_file(&source) {
            Ok(()) => debug!("Removed stale socket file {}", source.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ProxyError::RemoveStale {
                    path: source.display().to_string(),
                    source: e,
                });
            }
        }
        Ok(Self {
            id: ProxyId::new(),
            source,
            target,
            source_addr,
            target_addr,
            kind,
            on_stop,
            counters: Arc::default(),
            running: None,
        })
    }

    #[must_use]
    pub fn id(&self) -> ProxyId {
        self.id
    }

    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    #[must_use]
    pub fn kind(&self) -> SocketKind {
        self.kind
    }

    /// Tell if the proxy was started and not stopped since. The worker may have exited already.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.running.is_some()
    }

    /// Bind and listen on the source path and spawn the worker on the current tokio runtime.
    pub fn start(&mut self) -> Result<(), ProxyError> {
        if self.running.is_some() {
            return Err(ProxyError::AlreadyStarted);
        }
        let listener = socket::listen_on(&self.source_addr, self.kind)
            .map(Arc::new)
            .map_err(|source| ProxyError::Listen {
                path: self.source.display().to_string(),
                source,
            })?;
        let (stop, stopped) = oneshot::channel();
        let worker = Worker {
            id: self.id,
            listener: listener.clone(),
            source: self.source.display().to_string(),
            target: self.target_addr.clone(),
            target_path: self.target.display().to_string(),
            kind: self.kind,
            counters: self.counters.clone(),
        };
        let on_stop = self.on_stop.clone();
        let id = self.id;
        let worker = tokio::spawn(async move {
            let res = worker.run(stopped).await;
            debug!("Proxy {id}: worker exited");
            // not awaited: stop() must not depend on the listener returning
            if let Some(on_stop) = on_stop {
                tokio::task::spawn_blocking(move || on_stop.on_stopped(id));
            }
            res
        });
        self.running = Some(Running {
            stop,
            worker,
            listener,
        });
        info!(
            "Proxy {id}: listening on {} ({}), target {}",
            self.source.display(),
            self.kind,
            self.target.display()
        );
        Ok(())
    }

    /// Stop the worker, wait for it, close the listening socket and remove the socket file.
    /// A proxy that is not started fails right away with [`ProxyError::NotStarted`].
    pub async fn stop(&mut self) -> Result<(), ProxyError> {
        let Some(Running {
            stop,
            worker,
            listener,
        }) = self.running.take()
        else {
            return Err(ProxyError::NotStarted);
        };
        // the worker may be gone already
        let _ = stop.send(());
        match worker.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Proxy {}: {e}", self.id),
            Err(e) => error!("Proxy {}: worker failed: {e}", self.id),
        }
        drop(listener);
        match std::fs::remove_file(&self.source) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Proxy {}: could not remove {}: {e}",
                self.id,
                self.source.display()
            ),
        }
        info!("Proxy {} stopped", self.id);
        Ok(())
    }

    /// Bytes relayed so far in each direction, as strings keyed by [`RX_BYTES`] and [`TX_BYTES`]
    #[must_use]
    pub fn metrics(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                RX_BYTES.to_owned(),
                self.counters.rx.load(Ordering::Relaxed).to_string(),
            ),
            (
                TX_BYTES.to_owned(),
                self.counters.tx.load(Ordering::Relaxed).to_string(),
            ),
        ])
    }
}

struct Worker {
    id: ProxyId,
    listener: Arc<Socket>,
    source: String,
    target: Arc<UnixAddr>,
    target_path: String,
    kind: SocketKind,
    counters: Arc<Counters>,
}

impl Worker {
    async fn run(self, mut stopped: oneshot::Receiver<()>) -> Result<(), ProxyError> {
        let id = self.id;
        let source = tokio::select! {
            conn = socket::accept(&self.listener) => conn.map_err(|e| ProxyError::Accept {
                path: self.source.clone(),
                source: e,
            })?,
            _ = &mut stopped => {
                debug!("Proxy {id}: stopped while accepting");
                return Ok(());
            }
        };
        debug!("Proxy {id}: accepted a connection on {}", self.source);

        let target = tokio::select! {
            conn = socket::connect_to(&self.target, self.kind) => conn.map_err(|e| {
                ProxyError::Connect {
                    path: self.target_path.clone(),
                    source: e,
                }
            })?,
            _ = &mut stopped => {
                debug!("Proxy {id}: stopped while connecting");
                return Ok(());
            }
        };
        info!(
            "Proxy {id}: relaying between {} and {}",
            self.source, self.target_path
        );

        tokio::select! {
            res = relay(&source, &target, &self.counters.tx) => {
                debug!("Proxy {id}: source side done");
                res.map_err(|e| ProxyError::Relay { direction: "source to target", source: e })
            }
            res = relay(&target, &source, &self.counters.rx) => {
                debug!("Proxy {id}: target side done");
                res.map_err(|e| ProxyError::Relay { direction: "target to source", source: e })
            }
            _ = &mut stopped => {
                debug!("Proxy {id}: stopped while relaying");
                Ok(())
            }
        }
    }
}

/// Move messages from `from` to `to` until `from` reaches end of stream
async fn relay(from: &Socket, to: &Socket, bytes: &AtomicU64) -> io::Result<()> {
    let mut data = [0u8; BUFFER_SIZE];
    loop {
        let received = socket::receive(from, &mut data).await?;
        if received.is_eof() {
            return Ok(());
        }
        socket::send(to, &data[..received.len], &received.fds).await?;
        bytes.fetch_add(received.len as u64, Ordering::Relaxed);
        // our copies of the descriptors get closed here
    }
}
