// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded worker pool: every inbound UDP message, inbound TCP connection, and
//! outbound data petition runs as a pool task rather than inline in the supervisor.
//!
//! A fixed number of worker loops pull jobs off one shared bounded queue. `submit`
//! suspends the caller when the queue is full, the asynchronous equivalent of the
//! legacy thread pool blocking on a full circular buffer. Shutdown closes the queue
//! and joins every worker via a [`tokio_util::task::TaskTracker`] instead of handing
//! each worker an explicit poison-pill task.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::task::TaskTracker;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

pub struct WorkerPool {
    tx: mpsc::Sender<Job>,
    tracker: TaskTracker,
}

impl WorkerPool {
    /// Spawns `workers` worker loops sharing one queue of capacity `queue_capacity`.
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(queue_capacity);
        let rx = Arc::new(AsyncMutex::new(rx));
        let tracker = TaskTracker::new();

        for id in 0..workers {
            let rx = rx.clone();
            tracker.spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    match job {
                        Some(job) => job.await,
                        None => {
                            tracing::debug!(worker = id, "worker pool queue closed, exiting");
                            break;
                        }
                    }
                }
            });
        }

        Self { tx, tracker }
    }

    /// Enqueues `fut` to run on whichever worker is free next. Suspends the
    /// caller if the queue is currently full.
    pub async fn submit<F>(&self, fut: F) -> Result<(), PoolClosed>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tx.send(Box::pin(fut)).await.map_err(|_| PoolClosed)
    }

    /// Closes the queue and awaits every worker draining the remaining jobs.
    pub async fn shutdown(self) {
        self.tracker.close();
        drop(self.tx);
        self.tracker.wait().await;
    }
}

#[derive(Debug)]
pub struct PoolClosed;

impl fmt::Display for PoolClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker pool is shut down")
    }
}

impl std::error::Error for PoolClosed {}
