//! Repository byte streams
//!
//! Both stream types wrap a plain byte stream and invoke a
//! [`RepositoryStreamCallback`] at fixed points of the stream lifecycle:
//!
//! - input: `on_before_read` once, before the first byte is handed out
//! - output: `on_before_write` once, before the first byte is accepted, and
//!   `on_after_close` once, when the stream is shut down or dropped
//!
//! A callback failure fails the I/O call that triggered it; the stream then
//! refuses further bytes.

use async_trait::async_trait;
use depot_core::{Error, RepositoryPath, Result};
use depot_layout::ArtifactCoordinates;
use futures::future::BoxFuture;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Raw byte source
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Raw byte sink
pub type ByteSink = Box<dyn AsyncWrite + Send + Unpin>;

type HookFuture = BoxFuture<'static, Result<()>>;

/// Ties one stream to its repository path for the duration of a read or write.
#[derive(Debug)]
pub struct RepositoryStreamContext {
    path: RepositoryPath,
    coordinates: Option<Arc<dyn ArtifactCoordinates>>,
    bytes_written: AtomicU64,
}

impl RepositoryStreamContext {
    pub fn new(path: RepositoryPath, coordinates: Option<Arc<dyn ArtifactCoordinates>>) -> Self {
        Self {
            path,
            coordinates,
            bytes_written: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &RepositoryPath {
        &self.path
    }

    /// Coordinates decoded when the stream was opened, if the path names an artifact
    pub fn coordinates(&self) -> Option<&Arc<dyn ArtifactCoordinates>> {
        self.coordinates.as_ref()
    }

    /// Bytes accepted by the underlying sink so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Acquire)
    }

    fn record_written(&self, n: usize) {
        self.bytes_written.fetch_add(n as u64, Ordering::AcqRel);
    }
}

/// Stream lifecycle hooks
#[async_trait]
pub trait RepositoryStreamCallback: Send + Sync {
    async fn on_before_write(&self, ctx: &RepositoryStreamContext) -> Result<()>;

    async fn on_after_close(&self, ctx: &RepositoryStreamContext) -> Result<()>;

    async fn on_before_read(&self, ctx: &RepositoryStreamContext) -> Result<()>;
}

#[derive(Clone, Copy)]
enum Hook {
    BeforeWrite,
    AfterClose,
    BeforeRead,
}

fn run_hook(
    hook: Hook,
    callback: &Arc<dyn RepositoryStreamCallback>,
    ctx: &Arc<RepositoryStreamContext>,
) -> HookFuture {
    let callback = callback.clone();
    let ctx = ctx.clone();
    Box::pin(async move {
        match hook {
            Hook::BeforeWrite => callback.on_before_write(&ctx).await,
            Hook::AfterClose => callback.on_after_close(&ctx).await,
            Hook::BeforeRead => callback.on_before_read(&ctx).await,
        }
    })
}

fn aborted() -> io::Error {
    io::Error::other("stream aborted after a metadata failure")
}

enum ReadState {
    Unread,
    Notifying(HookFuture),
    Reading,
    Failed,
}

/// Input stream that records a read on the artifact entry.
pub struct RepositoryInputStream {
    inner: ByteStream,
    ctx: Arc<RepositoryStreamContext>,
    callback: Arc<dyn RepositoryStreamCallback>,
    state: ReadState,
}

impl RepositoryInputStream {
    pub fn new(
        path: RepositoryPath,
        inner: ByteStream,
        callback: Arc<dyn RepositoryStreamCallback>,
    ) -> Self {
        Self {
            inner,
            ctx: Arc::new(RepositoryStreamContext::new(path, None)),
            callback,
            state: ReadState::Unread,
        }
    }

    pub fn context(&self) -> &RepositoryStreamContext {
        &self.ctx
    }

    pub fn path(&self) -> &RepositoryPath {
        self.ctx.path()
    }
}

impl AsyncRead for RepositoryInputStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                ReadState::Unread => {
                    this.state = ReadState::Notifying(run_hook(
                        Hook::BeforeRead,
                        &this.callback,
                        &this.ctx,
                    ));
                }
                ReadState::Notifying(hook) => match ready!(hook.as_mut().poll(cx)) {
                    Ok(()) => this.state = ReadState::Reading,
                    Err(e) => {
                        this.state = ReadState::Failed;
                        return Poll::Ready(Err(e.into_io()));
                    }
                },
                ReadState::Reading => return Pin::new(&mut this.inner).poll_read(cx, buf),
                ReadState::Failed => return Poll::Ready(Err(aborted())),
            }
        }
    }
}

enum WriteState {
    Unopened,
    Opening(HookFuture),
    Open,
    Closing(HookFuture),
    Closed,
    Failed,
}

/// Output stream that keeps the artifact entry in step with the bytes written.
pub struct RepositoryOutputStream {
    inner: ByteSink,
    ctx: Arc<RepositoryStreamContext>,
    callback: Arc<dyn RepositoryStreamCallback>,
    state: WriteState,
    close_error: Option<io::Error>,
}

impl RepositoryOutputStream {
    pub fn new(
        path: RepositoryPath,
        coordinates: Option<Arc<dyn ArtifactCoordinates>>,
        inner: ByteSink,
        callback: Arc<dyn RepositoryStreamCallback>,
    ) -> Self {
        Self {
            inner,
            ctx: Arc::new(RepositoryStreamContext::new(path, coordinates)),
            callback,
            state: WriteState::Unopened,
            close_error: None,
        }
    }

    pub fn context(&self) -> &RepositoryStreamContext {
        &self.ctx
    }

    pub fn path(&self) -> &RepositoryPath {
        self.ctx.path()
    }

    pub fn bytes_written(&self) -> u64 {
        self.ctx.bytes_written()
    }

    pub fn coordinates(&self) -> Option<&Arc<dyn ArtifactCoordinates>> {
        self.ctx.coordinates()
    }

    /// Drive `on_before_write` to completion; `Ready(Ok)` once the stream is open.
    fn poll_open(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        loop {
            match &mut self.state {
                WriteState::Unopened => {
                    self.state = WriteState::Opening(run_hook(
                        Hook::BeforeWrite,
                        &self.callback,
                        &self.ctx,
                    ));
                }
                WriteState::Opening(hook) => match ready!(hook.as_mut().poll(cx)) {
                    Ok(()) => self.state = WriteState::Open,
                    Err(e) => {
                        self.state = WriteState::Failed;
                        return Poll::Ready(Err(e.into_io()));
                    }
                },
                WriteState::Open => return Poll::Ready(Ok(())),
                WriteState::Closing(_) | WriteState::Closed => {
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "stream already closed",
                    )));
                }
                WriteState::Failed => return Poll::Ready(Err(aborted())),
            }
        }
    }
}

impl AsyncWrite for RepositoryOutputStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(this.poll_open(cx))?;

        let n = ready!(Pin::new(&mut this.inner).poll_write(cx, buf))?;
        this.ctx.record_written(n);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match this.state {
            WriteState::Open => Pin::new(&mut this.inner).poll_flush(cx),
            WriteState::Failed => Poll::Ready(Err(aborted())),
            _ => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                // empty artifacts are still recorded
                WriteState::Unopened | WriteState::Opening(_) => {
                    ready!(this.poll_open(cx))?;
                }
                WriteState::Open => {
                    if let Err(e) = ready!(Pin::new(&mut this.inner).poll_shutdown(cx)) {
                        this.close_error = Some(e);
                    }
                    this.state = WriteState::Closing(run_hook(
                        Hook::AfterClose,
                        &this.callback,
                        &this.ctx,
                    ));
                }
                WriteState::Closing(hook) => {
                    let result = ready!(hook.as_mut().poll(cx));
                    this.state = WriteState::Closed;
                    if let Some(e) = this.close_error.take() {
                        return Poll::Ready(Err(e));
                    }
                    return Poll::Ready(result.map_err(Error::into_io));
                }
                WriteState::Closed => return Poll::Ready(Ok(())),
                WriteState::Failed => return Pin::new(&mut this.inner).poll_shutdown(cx),
            }
        }
    }
}

impl Drop for RepositoryOutputStream {
    fn drop(&mut self) {
        let pending: Vec<Hook> = match self.state {
            WriteState::Opening(_) => vec![Hook::BeforeWrite, Hook::AfterClose],
            WriteState::Open | WriteState::Closing(_) => vec![Hook::AfterClose],
            _ => return,
        };

        let path = self.ctx.path().to_string();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(path = %path, "Output stream dropped outside a runtime; entry not finalized");
            return;
        };

        tracing::debug!(path = %path, "Output stream dropped without shutdown; finalizing entry");
        let callback = self.callback.clone();
        let ctx = self.ctx.clone();
        handle.spawn(async move {
            for hook in pending {
                if let Err(e) = run_hook(hook, &callback, &ctx).await {
                    tracing::error!(path = %path, error = %e, "Failed to finalize artifact entry");
                    return;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::Repository;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Records every hook invocation
    #[derive(Default)]
    struct RecordingCallback {
        calls: Mutex<Vec<(String, u64)>>,
        fail_reads: bool,
    }

    impl RecordingCallback {
        fn calls(&self) -> Vec<(String, u64)> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, name: &str, ctx: &RepositoryStreamContext) {
            self.calls
                .lock()
                .unwrap()
                .push((name.to_string(), ctx.bytes_written()));
        }
    }

    #[async_trait]
    impl RepositoryStreamCallback for RecordingCallback {
        async fn on_before_write(&self, ctx: &RepositoryStreamContext) -> Result<()> {
            self.record("before_write", ctx);
            Ok(())
        }

        async fn on_after_close(&self, ctx: &RepositoryStreamContext) -> Result<()> {
            self.record("after_close", ctx);
            Ok(())
        }

        async fn on_before_read(&self, ctx: &RepositoryStreamContext) -> Result<()> {
            self.record("before_read", ctx);
            if self.fail_reads {
                return Err(Error::Metadata("store unavailable".to_string()));
            }
            Ok(())
        }
    }

    fn path() -> RepositoryPath {
        let repo = Arc::new(Repository::hosted("storage0", "releases", "raw", "/tmp/releases"));
        RepositoryPath::new(repo, "org/acme/tool.zip")
    }

    #[tokio::test]
    async fn test_write_hooks_fire_once_with_counted_bytes() {
        let callback = Arc::new(RecordingCallback::default());
        let mut os = RepositoryOutputStream::new(
            path(),
            None,
            Box::new(Vec::<u8>::new()),
            callback.clone(),
        );

        os.write_all(b"hello ").await.unwrap();
        os.write_all(b"world").await.unwrap();
        os.shutdown().await.unwrap();
        os.shutdown().await.unwrap();

        assert_eq!(os.bytes_written(), 11);
        assert_eq!(
            callback.calls(),
            vec![("before_write".to_string(), 0), ("after_close".to_string(), 11)]
        );
    }

    #[tokio::test]
    async fn test_empty_write_still_opens_before_close() {
        let callback = Arc::new(RecordingCallback::default());
        let mut os = RepositoryOutputStream::new(
            path(),
            None,
            Box::new(Vec::<u8>::new()),
            callback.clone(),
        );

        os.shutdown().await.unwrap();

        assert_eq!(
            callback.calls(),
            vec![("before_write".to_string(), 0), ("after_close".to_string(), 0)]
        );
    }

    #[tokio::test]
    async fn test_write_after_close_is_rejected() {
        let callback = Arc::new(RecordingCallback::default());
        let mut os = RepositoryOutputStream::new(
            path(),
            None,
            Box::new(Vec::<u8>::new()),
            callback,
        );

        os.shutdown().await.unwrap();
        let err = os.write_all(b"late").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_dropped_stream_is_finalized() {
        let callback = Arc::new(RecordingCallback::default());
        let mut os = RepositoryOutputStream::new(
            path(),
            None,
            Box::new(Vec::<u8>::new()),
            callback.clone(),
        );

        os.write_all(b"abc").await.unwrap();
        drop(os);

        for _ in 0..50 {
            if callback.calls().len() == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(callback.calls()[1], ("after_close".to_string(), 3));
    }

    #[tokio::test]
    async fn test_read_hook_fires_once_before_first_byte() {
        let callback = Arc::new(RecordingCallback::default());
        let mut is = RepositoryInputStream::new(
            path(),
            Box::new(&b"payload"[..]),
            callback.clone(),
        );

        let mut first = [0u8; 3];
        is.read_exact(&mut first).await.unwrap();
        let mut rest = Vec::new();
        is.read_to_end(&mut rest).await.unwrap();

        assert_eq!(&first, b"pay");
        assert_eq!(rest, b"load");
        assert_eq!(callback.calls(), vec![("before_read".to_string(), 0)]);
    }

    #[tokio::test]
    async fn test_unread_stream_fires_nothing() {
        let callback = Arc::new(RecordingCallback::default());
        let is = RepositoryInputStream::new(path(), Box::new(&b"payload"[..]), callback.clone());
        drop(is);
        assert!(callback.calls().is_empty());
    }

    #[tokio::test]
    async fn test_read_hook_failure_aborts_stream() {
        let callback = Arc::new(RecordingCallback {
            fail_reads: true,
            ..Default::default()
        });
        let mut is = RepositoryInputStream::new(path(), Box::new(&b"payload"[..]), callback);

        let mut buf = Vec::new();
        let err = is.read_to_end(&mut buf).await.unwrap_err();
        assert!(matches!(Error::from_io(err), Error::Metadata(_)));
        assert!(buf.is_empty());
    }
}

impl std::fmt::Debug for RepositoryInputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryInputStream").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for RepositoryOutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryOutputStream").finish_non_exhaustive()
    }
}
