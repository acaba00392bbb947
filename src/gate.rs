//! Admission control and the per-run store connection.
//!
//! Two independent gates bound outstanding work: the fetch gate caps
//! concurrent provider calls and the persistence gate caps concurrent store
//! operations. A slow store therefore never throttles provider throughput,
//! and the other way round.

use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tracing::{error, info, warn};

use crate::db::Connector;
use crate::error::{Error, Result};

/// Counting admission control. No fairness or ordering guarantee.
#[derive(Debug, Clone)]
pub struct Gate {
    name: &'static str,
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl Gate {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            name,
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `fut` while holding one permit.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::Other(format!("{} gate closed", self.name)))?;
        fut.await
    }
}

#[derive(Debug, Clone)]
pub struct Gates {
    pub fetch: Gate,
    pub persist: Gate,
}

impl Gates {
    pub fn new(fetch_limit: usize, persist_limit: usize) -> Self {
        Self {
            fetch: Gate::new("fetch", fetch_limit),
            persist: Gate::new("persist", persist_limit),
        }
    }
}

struct ConnectionState<S> {
    store: Option<Arc<S>>,
    holders: usize,
    connects: usize,
}

struct Shared<C: Connector> {
    connector: C,
    state: Mutex<ConnectionState<C::Store>>,
}

impl<C: Connector> Shared<C> {
    async fn release_one(&self) -> Result<()> {
        let to_close = {
            let mut state = self.state.lock().await;
            state.holders = state.holders.saturating_sub(1);
            if state.holders == 0 {
                state.store.take()
            } else {
                None
            }
        };

        if let Some(store) = to_close {
            self.connector.disconnect(store).await?;
            info!("Store connection released");
        }
        Ok(())
    }
}

/// Store connection for one ingest run.
///
/// The first `acquire` connects; the mutex is held across the connect so
/// concurrent callers never open a second connection. The connection is
/// closed when the last guard is released.
pub struct SessionConnection<C: Connector> {
    shared: Arc<Shared<C>>,
}

impl<C: Connector> Clone for SessionConnection<C> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<C: Connector> SessionConnection<C> {
    pub fn new(connector: C) -> Self {
        Self {
            shared: Arc::new(Shared {
                connector,
                state: Mutex::new(ConnectionState {
                    store: None,
                    holders: 0,
                    connects: 0,
                }),
            }),
        }
    }

    pub async fn acquire(&self) -> Result<ConnectionGuard<C>> {
        let mut state = self.shared.state.lock().await;

        let store = match state.store.clone() {
            Some(store) => store,
            None => {
                let store = Arc::new(self.shared.connector.connect().await?);
                state.connects += 1;
                state.store = Some(store.clone());
                info!("Store connection established");
                store
            }
        };
        state.holders += 1;

        Ok(ConnectionGuard {
            shared: self.shared.clone(),
            store,
            released: false,
        })
    }

    pub async fn is_connected(&self) -> bool {
        self.shared.state.lock().await.store.is_some()
    }

    /// Number of times a connection has been opened.
    pub async fn connect_count(&self) -> usize {
        self.shared.state.lock().await.connects
    }

    pub fn connector(&self) -> &C {
        &self.shared.connector
    }
}

/// Scoped hold on the session connection.
///
/// Call [`ConnectionGuard::release`] when the owning operation ends. A guard
/// dropped without release (early return, panic unwinding, cancelled future)
/// schedules the release on the current runtime.
pub struct ConnectionGuard<C: Connector> {
    shared: Arc<Shared<C>>,
    store: Arc<C::Store>,
    released: bool,
}

impl<C: Connector> ConnectionGuard<C> {
    pub fn store(&self) -> &Arc<C::Store> {
        &self.store
    }

    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        self.shared.release_one().await
    }
}

impl<C: Connector> Deref for ConnectionGuard<C> {
    type Target = C::Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl<C: Connector> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let shared = self.shared.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = shared.release_one().await {
                        error!("Failed to release store connection: {}", e);
                    }
                });
            }
            Err(_) => warn!("Store connection guard dropped outside a runtime; connection left open"),
        }
    }
}
