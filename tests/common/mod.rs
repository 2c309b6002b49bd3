//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pulse_api::config::AppConfig;
use pulse_api::database::{ConnectionMonitor, Database, DatabaseError};
use pulse_api::lifecycle::{LifecycleController, LifecycleError, Phase, Shutdown};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// In-memory stand-in for the document database.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    fail_connect: AtomicBool,
    fail_close: AtomicBool,
    hang_connect: AtomicBool,
    connect_delay_ms: AtomicU64,
    closed: AtomicBool,
    monitor: Mutex<Option<ConnectionMonitor>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_connect() -> Self {
        let db = Self::new();
        db.inner.fail_connect.store(true, Ordering::SeqCst);
        db
    }

    pub fn failing_close() -> Self {
        let db = Self::new();
        db.inner.fail_close.store(true, Ordering::SeqCst);
        db
    }

    pub fn hanging_connect() -> Self {
        let db = Self::new();
        db.inner.hang_connect.store(true, Ordering::SeqCst);
        db
    }

    /// Fails like `failing_connect`, but only after `delay`.
    pub fn slow_failing_connect(delay: Duration) -> Self {
        let db = Self::failing_connect();
        db.inner
            .connect_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
        db
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// The monitor handed over by the controller, for simulating driver events.
    pub fn monitor(&self) -> ConnectionMonitor {
        self.inner
            .monitor
            .lock()
            .unwrap()
            .clone()
            .expect("connect was never called")
    }
}

impl Database for MemoryDatabase {
    async fn connect(&self, monitor: ConnectionMonitor) -> Result<(), DatabaseError> {
        monitor.connecting();
        *self.inner.monitor.lock().unwrap() = Some(monitor.clone());

        if self.inner.hang_connect.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let delay = self.inner.connect_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.inner.fail_connect.load(Ordering::SeqCst) {
            let err = DatabaseError::Connect("connection refused".into());
            monitor.errored(&err);
            return Err(err);
        }
        monitor.connected();
        Ok(())
    }

    async fn close(&self) -> Result<(), DatabaseError> {
        self.inner.closed.store(true, Ordering::SeqCst);
        if self.inner.fail_close.load(Ordering::SeqCst) {
            return Err(DatabaseError::Close("socket hang up".into()));
        }
        Ok(())
    }

    fn name(&self) -> Option<String> {
        Some("memory".into())
    }
}

/// Config bound to an ephemeral localhost port.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = 0;
    config.database.server_selection_timeout_ms = 200;
    config.database.connect_timeout_ms = 200;
    config
}

/// A controller running on a background task.
pub struct Running {
    pub shutdown: Shutdown,
    pub phases: watch::Receiver<Phase>,
    pub handle: JoinHandle<Result<(), LifecycleError>>,
}

impl Running {
    /// Wait for `Ready` and return the bound address, or `None` if the
    /// controller stopped first.
    pub async fn ready(&mut self) -> Option<(SocketAddr, bool)> {
        let phase = tokio::time::timeout(
            Duration::from_secs(5),
            self.phases
                .wait_for(|p| matches!(p, Phase::Ready { .. } | Phase::Stopped)),
        )
        .await
        .expect("controller did not settle")
        .ok()
        .map(|p| *p)?;

        match phase {
            Phase::Ready { addr, degraded } => Some((addr, degraded)),
            _ => None,
        }
    }

    pub async fn stop(self) -> Result<(), LifecycleError> {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("controller did not stop")
            .unwrap()
    }
}

pub fn spawn(config: AppConfig, database: MemoryDatabase) -> Running {
    let shutdown = Shutdown::new();
    let controller = LifecycleController::new(config, database, shutdown.clone());
    let phases = controller.phases();
    let handle = tokio::spawn(controller.run());
    Running {
        shutdown,
        phases,
        handle,
    }
}

/// Start a server and wait until it is accepting connections.
pub async fn start(config: AppConfig, database: MemoryDatabase) -> (Running, String) {
    let mut running = spawn(config, database);
    let (addr, _) = running.ready().await.expect("server failed to start");
    (running, format!("http://{addr}"))
}
