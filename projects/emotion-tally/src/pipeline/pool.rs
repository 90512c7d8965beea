// Worker pool: bounded checkout of expensive, stateful inference workers
//
// Available workers sit in a bounded channel sized to the pool capacity, so a
// receive is an acquire and a send is a release. Workers are moved out of the
// channel into a `PooledWorker` guard, which hands them back on drop.

use crate::pipeline::error::PoolError;
use crossbeam::channel::{self, Receiver, Sender, TryRecvError, TrySendError};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Shared<W> {
    available_tx: Sender<W>,
    available_rx: Receiver<W>,
    capacity: usize,
    in_flight: AtomicUsize,
    closed: AtomicBool,
    /// Dropped on shutdown so that blocked acquirers wake up.
    close_tx: Mutex<Option<Sender<()>>>,
    close_rx: Receiver<()>,
    /// Dropped once the draining shutdown has torn every worker down.
    drained_tx: Mutex<Option<Sender<()>>>,
    drained_rx: Receiver<()>,
}

/// Fixed-size pool of workers. Cloning gives another handle to the same pool.
pub struct WorkerPool<W> {
    shared: Arc<Shared<W>>,
}

impl<W> Clone for WorkerPool<W> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<W: Send> WorkerPool<W> {
    /// Builds `size` workers up front by calling `factory` with each index.
    ///
    /// Construction is all-or-nothing: if any worker fails to build, the ones
    /// already built are dropped and the error is returned.
    pub fn new<F, E>(size: usize, mut factory: F) -> Result<Self, PoolError>
    where
        F: FnMut(usize) -> Result<W, E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        if size == 0 {
            return Err(PoolError::InvalidSize);
        }

        let mut built = Vec::with_capacity(size);
        for index in 0..size {
            match factory(index) {
                Ok(worker) => {
                    tracing::debug!("Built worker {}/{}", index + 1, size);
                    built.push(worker);
                }
                Err(e) => {
                    let source = e.into();
                    tracing::error!(
                        "Failed to build worker {}: {}. Tearing down {} built workers",
                        index,
                        source,
                        built.len()
                    );
                    drop(built);
                    return Err(PoolError::Construction { index, source });
                }
            }
        }

        let (available_tx, available_rx) = channel::bounded(size);
        for worker in built {
            if available_tx.try_send(worker).is_err() {
                return Err(PoolError::Closed);
            }
        }
        let (close_tx, close_rx) = channel::bounded(0);
        let (drained_tx, drained_rx) = channel::bounded(0);

        tracing::info!("Worker pool ready with {} workers", size);

        Ok(Self {
            shared: Arc::new(Shared {
                available_tx,
                available_rx,
                capacity: size,
                in_flight: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
                close_tx: Mutex::new(Some(close_tx)),
                close_rx,
                drained_tx: Mutex::new(Some(drained_tx)),
                drained_rx,
            }),
        })
    }

    /// Blocks until a worker is free and checks it out.
    ///
    /// Fails with [`PoolError::Closed`] once the pool has been shut down,
    /// including for callers that were already waiting.
    pub fn acquire(&self) -> Result<PooledWorker<W>, PoolError> {
        self.ensure_open()?;
        crossbeam::select! {
            recv(self.shared.available_rx) -> worker => match worker {
                Ok(worker) => self.check_out(worker),
                Err(_) => Err(PoolError::Closed),
            },
            recv(self.shared.close_rx) -> _ => Err(PoolError::Closed),
        }
    }

    /// Checks out a worker only if one is free right now.
    pub fn try_acquire(&self) -> Result<Option<PooledWorker<W>>, PoolError> {
        self.ensure_open()?;
        match self.shared.available_rx.try_recv() {
            Ok(worker) => self.check_out(worker).map(Some),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(PoolError::Closed),
        }
    }

    /// Like [`acquire`](Self::acquire) but gives up after `timeout`.
    pub fn acquire_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Option<PooledWorker<W>>, PoolError> {
        self.ensure_open()?;
        crossbeam::select! {
            recv(self.shared.available_rx) -> worker => match worker {
                Ok(worker) => self.check_out(worker).map(Some),
                Err(_) => Err(PoolError::Closed),
            },
            recv(self.shared.close_rx) -> _ => Err(PoolError::Closed),
            default(timeout) => Ok(None),
        }
    }

    /// Closes the pool, waits for every checked-out worker to come back, then
    /// drops all workers.
    ///
    /// Only the first call drains the pool. Later calls, from any handle,
    /// block until that drain has finished and then return
    /// [`PoolError::Closed`].
    ///
    /// Must not be called from a thread that still holds a [`PooledWorker`]
    /// of this pool, or it waits forever.
    pub fn shutdown(&self) -> Result<(), PoolError> {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            // Disconnects once the draining call returns.
            let _ = self.shared.drained_rx.recv();
            return Err(PoolError::Closed);
        }
        let _drained = self
            .shared
            .drained_tx
            .lock()
            .ok()
            .and_then(|mut drained_tx| drained_tx.take());

        if let Ok(mut close_tx) = self.shared.close_tx.lock() {
            close_tx.take();
        }

        let outstanding = self.in_flight();
        if outstanding > 0 {
            tracing::info!(
                "Shutting down worker pool, waiting for {} in-flight workers",
                outstanding
            );
        }

        let mut returned = Vec::with_capacity(self.shared.capacity);
        while returned.len() < self.shared.capacity {
            let worker = self
                .shared
                .available_rx
                .recv()
                .map_err(|_| PoolError::Closed)?;
            returned.push(worker);
        }

        for (n, worker) in returned.into_iter().enumerate() {
            tracing::debug!("Tearing down worker {}/{}", n + 1, self.shared.capacity);
            drop(worker);
        }

        tracing::info!("Worker pool shut down");
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Workers currently waiting in the pool.
    pub fn available(&self) -> usize {
        self.shared.available_rx.len()
    }

    /// Workers currently checked out.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), PoolError> {
        if self.is_closed() {
            Err(PoolError::Closed)
        } else {
            Ok(())
        }
    }

    fn check_out(&self, worker: W) -> Result<PooledWorker<W>, PoolError> {
        if self.is_closed() {
            // Shutdown is draining; leave the worker for it.
            self.put_back(worker);
            return Err(PoolError::Closed);
        }
        self.shared.in_flight.fetch_add(1, Ordering::SeqCst);
        Ok(PooledWorker {
            worker: Some(worker),
            pool: self.clone(),
        })
    }

    fn release(&self, worker: W) {
        let decremented =
            self.shared
                .in_flight
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if decremented.is_err() {
            tracing::error!("Worker released while none were checked out");
            debug_assert!(false, "worker released while none were checked out");
        }
        self.put_back(worker);
    }

    fn put_back(&self, worker: W) {
        match self.shared.available_tx.try_send(worker) {
            Ok(()) => {}
            Err(TrySendError::Full(worker)) => {
                tracing::error!(
                    "Worker released into a full pool (capacity {}), dropping it",
                    self.shared.capacity
                );
                debug_assert!(false, "worker released into a full pool");
                drop(worker);
            }
            Err(TrySendError::Disconnected(worker)) => drop(worker),
        }
    }
}

/// Exclusive checkout of one worker. Dropping the guard returns the worker to
/// its pool, on success, error and panic paths alike.
pub struct PooledWorker<W: Send> {
    worker: Option<W>,
    pool: WorkerPool<W>,
}

impl<W: Send> PooledWorker<W> {
    /// Returns the worker to the pool now.
    pub fn release(self) {
        drop(self);
    }
}

impl<W: Send> Deref for PooledWorker<W> {
    type Target = W;

    fn deref(&self) -> &W {
        self.worker.as_ref().expect("worker is present until the guard drops")
    }
}

impl<W: Send> DerefMut for PooledWorker<W> {
    fn deref_mut(&mut self) -> &mut W {
        self.worker.as_mut().expect("worker is present until the guard drops")
    }
}

impl<W: Send> Drop for PooledWorker<W> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.pool.release(worker);
        }
    }
}
