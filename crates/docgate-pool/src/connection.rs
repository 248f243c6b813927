//! One pipelined backend connection.
//!
//! A writer task batches queued commands into single socket writes and a
//! reader task matches replies to callers in send order. Either task dying
//! marks the connection dead; the pool stops routing to it and the pinger
//! replaces it.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use docgate_protocol::{Command, Reply, RespCodec};
use docgate_store::{StoreError, StoreResult};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tokio_util::codec::FramedRead;
use tracing::{debug, trace, warn};

pub(crate) type ReplySender = oneshot::Sender<StoreResult<Reply>>;

/// A command waiting to be written, with the slot its reply goes to.
pub(crate) struct Pending {
    pub command: Command,
    pub reply: ReplySender,
}

/// When the writer flushes a batch.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FlushWindow {
    pub interval: Duration,
    pub size: usize,
}

/// Replies owed by the backend and when it last made progress on them.
#[derive(Debug)]
pub(crate) struct Progress {
    epoch: Instant,
    inflight: AtomicUsize,
    /// Milliseconds since `epoch` of the last reply, or of the send that
    /// found nothing in flight.
    last_ms: AtomicU64,
}

impl Progress {
    pub(crate) fn new() -> Self {
        Self {
            epoch: Instant::now(),
            inflight: AtomicUsize::new(0),
            last_ms: AtomicU64::new(0),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    pub(crate) fn sent(&self) {
        if self.inflight.fetch_add(1, Ordering::AcqRel) == 0 {
            self.last_ms.store(self.now_ms(), Ordering::Release);
        }
    }

    pub(crate) fn answered(&self) {
        self.last_ms.store(self.now_ms(), Ordering::Release);
        self.inflight.fetch_sub(1, Ordering::AcqRel);
    }

    /// Whether replies are owed and none has arrived for longer than `limit`.
    pub(crate) fn overdue(&self, limit: Duration) -> bool {
        if self.inflight.load(Ordering::Acquire) == 0 {
            return false;
        }
        let waited = self.now_ms().saturating_sub(self.last_ms.load(Ordering::Acquire));
        u128::from(waited) > limit.as_millis()
    }
}

pub(crate) struct Connection {
    id: u64,
    queue: mpsc::UnboundedSender<Pending>,
    alive: Arc<AtomicBool>,
    progress: Arc<Progress>,
    used: AtomicBool,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl Connection {
    pub(crate) async fn open(addr: &str, id: u64, window: FlushWindow) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (inflight_tx, inflight_rx) = mpsc::unbounded_channel();
        let alive = Arc::new(AtomicBool::new(true));
        let shutdown = Arc::new(Notify::new());
        let progress = Arc::new(Progress::new());

        let writer = tokio::spawn(write_loop(
            id,
            write_half,
            queue_rx,
            inflight_tx,
            window,
            alive.clone(),
            progress.clone(),
            shutdown.clone(),
        ));
        let reader = tokio::spawn(read_loop(
            id,
            read_half,
            inflight_rx,
            alive.clone(),
            progress.clone(),
            shutdown,
        ));

        debug!(connection = id, addr, "backend connection opened");
        Ok(Self {
            id,
            queue: queue_tx,
            alive,
            progress,
            used: AtomicBool::new(false),
            writer,
            reader,
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Alive, and not sitting on replies older than `reply_timeout`.
    pub(crate) fn is_responsive(&self, reply_timeout: Duration) -> bool {
        self.is_alive() && !self.progress.overdue(reply_timeout)
    }

    /// Queue `pending` for the writer. Hands it back if the writer is gone.
    pub(crate) fn send(&self, pending: Pending) -> Result<(), Pending> {
        self.queue.send(pending).map_err(|e| e.0)
    }

    /// Record caller traffic, which makes the next health check skip the ping.
    pub(crate) fn touch(&self) {
        self.used.store(true, Ordering::Relaxed);
    }

    /// Whether there was caller traffic since the last call.
    pub(crate) fn take_used(&self) -> bool {
        self.used.swap(false, Ordering::Relaxed)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.writer.abort();
        self.reader.abort();
    }
}

async fn write_loop(
    id: u64,
    mut sink: OwnedWriteHalf,
    mut queue: mpsc::UnboundedReceiver<Pending>,
    inflight: mpsc::UnboundedSender<ReplySender>,
    window: FlushWindow,
    alive: Arc<AtomicBool>,
    progress: Arc<Progress>,
    shutdown: Arc<Notify>,
) {
    let mut buf = BytesMut::with_capacity(4096);
    let mut batch = Vec::with_capacity(window.size);

    'run: while let Some(first) = queue.recv().await {
        batch.push(first);
        let deadline = Instant::now() + window.interval;
        while batch.len() < window.size {
            match timeout_at(deadline, queue.recv()).await {
                Ok(Some(pending)) => batch.push(pending),
                Ok(None) | Err(_) => break,
            }
        }

        let count = batch.len();
        for Pending { command, reply } in batch.drain(..) {
            RespCodec::encode_command(&command, &mut buf);
            // Counted and slotted before the bytes go out so the reader
            // always finds both for every reply.
            progress.sent();
            if let Err(rejected) = inflight.send(reply) {
                let _ = rejected.0.send(Err(StoreError::ConnectionClosed));
                alive.store(false, Ordering::Release);
                break 'run;
            }
        }

        trace!(connection = id, commands = count, bytes = buf.len(), "flushing batch");
        if let Err(e) = sink.write_all(&buf).await {
            warn!(connection = id, error = %e, "backend write failed");
            break;
        }
        buf.clear();
    }

    alive.store(false, Ordering::Release);
    shutdown.notify_one();
    queue.close();
    while let Ok(pending) = queue.try_recv() {
        let _ = pending.reply.send(Err(StoreError::ConnectionClosed));
    }
}

async fn read_loop(
    id: u64,
    source: OwnedReadHalf,
    mut inflight: mpsc::UnboundedReceiver<ReplySender>,
    alive: Arc<AtomicBool>,
    progress: Arc<Progress>,
    shutdown: Arc<Notify>,
) {
    let mut frames = FramedRead::new(source, RespCodec);

    loop {
        let frame = tokio::select! {
            _ = shutdown.notified() => break,
            frame = frames.next() => frame,
        };
        match frame {
            Some(Ok(reply)) => match inflight.try_recv() {
                Ok(caller) => {
                    progress.answered();
                    let _ = caller.send(Ok(reply));
                }
                Err(_) => {
                    warn!(connection = id, reply = reply.type_name(), "unsolicited reply from backend");
                    break;
                }
            },
            Some(Err(e)) => {
                warn!(connection = id, error = %e, "undecodable reply from backend");
                break;
            }
            None => {
                debug!(connection = id, "backend closed connection");
                break;
            }
        }
    }

    alive.store(false, Ordering::Release);
    inflight.close();
    while let Ok(caller) = inflight.try_recv() {
        let _ = caller.send(Err(StoreError::ConnectionClosed));
    }
}
