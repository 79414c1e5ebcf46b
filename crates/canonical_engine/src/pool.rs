use std::io;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use canonical_core::Resolution;
use engine_logging::{engine_debug, engine_info};

use crate::BlockingResolver;

pub type RequestId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub request_id: RequestId,
    pub resolution: Resolution,
}

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub workers: usize,
    /// Submissions beyond this many waiting requests block the submitter.
    pub queue_depth: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        let workers = thread::available_parallelism()
            .map(|n| n.get() * 2)
            .unwrap_or(2);
        Self {
            workers,
            queue_depth: workers * 4,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("worker pool is closed")]
    Closed,
    #[error("cannot start worker thread: {0}")]
    Spawn(#[from] io::Error),
}

struct Request {
    request_id: RequestId,
    url: Vec<u8>,
}

/// Fixed set of threads, each running one blocking resolution at a time.
///
/// Replies arrive in completion order and carry the submitter's id.
pub struct WorkerPool {
    request_tx: Option<mpsc::SyncSender<Request>>,
    reply_rx: mpsc::Receiver<Reply>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(settings: &PoolSettings, resolver: Arc<BlockingResolver>) -> Result<Self, PoolError> {
        let (request_tx, request_rx) = mpsc::sync_channel(settings.queue_depth);
        let (reply_tx, reply_rx) = mpsc::channel();
        let request_rx = Arc::new(Mutex::new(request_rx));

        let count = settings.workers.max(1);
        let mut workers = Vec::with_capacity(count);
        for index in 0..count {
            let request_rx = request_rx.clone();
            let reply_tx = reply_tx.clone();
            let resolver = resolver.clone();
            let handle = thread::Builder::new()
                .name(format!("resolver-{index}"))
                .spawn(move || worker_loop(index, &request_rx, &reply_tx, &resolver))?;
            workers.push(handle);
        }
        engine_info!("Worker pool started with {} workers", count);

        Ok(Self {
            request_tx: Some(request_tx),
            reply_rx,
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Queue one URL. Blocks while the queue is full.
    pub fn submit(&self, request_id: RequestId, url: impl Into<Vec<u8>>) -> Result<(), PoolError> {
        let request_tx = self.request_tx.as_ref().ok_or(PoolError::Closed)?;
        request_tx
            .send(Request {
                request_id,
                url: url.into(),
            })
            .map_err(|_| PoolError::Closed)
    }

    /// Next reply; `None` once the pool is closed and every worker has drained.
    pub fn recv(&self) -> Option<Reply> {
        self.reply_rx.recv().ok()
    }

    pub fn try_recv(&self) -> Option<Reply> {
        self.reply_rx.try_recv().ok()
    }

    /// Stop accepting work. Queued requests still complete.
    pub fn close(&mut self) {
        self.request_tx = None;
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.close();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(
    index: usize,
    request_rx: &Mutex<mpsc::Receiver<Request>>,
    reply_tx: &mpsc::Sender<Reply>,
    resolver: &BlockingResolver,
) {
    loop {
        let next = {
            let queue = match request_rx.lock() {
                Ok(queue) => queue,
                Err(poisoned) => poisoned.into_inner(),
            };
            queue.recv()
        };
        let Ok(Request { request_id, url }) = next else {
            break;
        };
        let resolution = resolver.resolve(&url);
        if reply_tx
            .send(Reply {
                request_id,
                resolution,
            })
            .is_err()
        {
            break;
        }
    }
    engine_debug!("resolver-{} exiting", index);
}
