//! Host adapter: drives the dispatch engine from framed stdio messages.
//!
//! The browser side is a thin shim that forwards download, storage, runtime
//! and UI events as [`InboundFrame`]s and executes the [`OutboundFrame`]
//! commands it receives. Long-running work (downloads, control requests) runs
//! in its own task so a slow daemon never blocks event intake.

mod framing;
mod host;

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, instrument, warn};

pub use framing::{FrameError, MAX_FRAME_LEN, is_fatal, read_frame, write_frame};
pub use host::{ChannelHost, InboundFrame, OutboundFrame, is_settings_area};

use crate::dispatch::{DispatchEngine, EngineConfig, MSG_UNEXPECTED, Notification};
use crate::messages::handle_message;
use crate::rpc::Daemon;
use crate::store::SettingsStore;

/// A dispatch engine wired to an outbound frame channel.
#[derive(Debug)]
pub struct Bridge {
    engine: DispatchEngine,
    host: ChannelHost,
    outbound: mpsc::UnboundedReceiver<OutboundFrame>,
}

impl Bridge {
    #[must_use]
    pub fn new(store: Arc<SettingsStore>, daemon: Arc<dyn Daemon>, config: EngineConfig) -> Self {
        let (tx, outbound) = mpsc::unbounded_channel();
        let host = ChannelHost::new(tx);
        let engine = DispatchEngine::with_config(store, daemon, Arc::new(host.clone()), config);
        Self {
            engine,
            host,
            outbound,
        }
    }

    #[must_use]
    pub fn engine(&self) -> &DispatchEngine {
        &self.engine
    }

    /// Serves frames from `reader` until end of stream, then waits for
    /// in-flight work and flushes queued frames to `writer`.
    ///
    /// # Errors
    ///
    /// Returns a fatal read error. Undecodable frames are logged and skipped.
    #[instrument(skip_all)]
    pub async fn run<R, W>(self, mut reader: R, writer: W) -> Result<(), FrameError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let Self {
            engine,
            host,
            outbound,
        } = self;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let writer_task = tokio::spawn(write_loop(writer, outbound, shutdown_rx));

        let mut tasks = JoinSet::new();
        let result = loop {
            let raw = match read_frame::<_, Value>(&mut reader).await {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    info!("input closed");
                    break Ok(());
                }
                Err(e) if is_fatal(&e) => break Err(e),
                Err(e) => {
                    warn!(error = %e, "skipping undecodable frame");
                    continue;
                }
            };

            match serde_json::from_value::<InboundFrame>(raw) {
                Ok(frame) => dispatch_frame(&engine, &host, &mut tasks, frame).await,
                Err(e) => warn!(error = %e, "skipping unknown frame"),
            }

            while let Some(joined) = tasks.try_join_next() {
                report_task(&engine, joined);
            }
        };

        while let Some(joined) = tasks.join_next().await {
            report_task(&engine, joined);
        }
        let _ = shutdown_tx.send(());
        if let Err(e) = writer_task.await {
            error!(error = %e, "writer task failed");
        }
        result
    }
}

async fn dispatch_frame(
    engine: &DispatchEngine,
    host: &ChannelHost,
    tasks: &mut JoinSet<()>,
    frame: InboundFrame,
) {
    debug!(kind = frame.kind(), "inbound frame");
    match frame {
        InboundFrame::DownloadCreated { item } => {
            let engine = engine.clone();
            tasks.spawn(async move {
                engine.on_download_created(item).await;
            });
        }
        InboundFrame::DownloadChanged { delta } => engine.on_download_changed(&delta),
        InboundFrame::StorageChanged { changes, area } => {
            if is_settings_area(area.as_deref()) {
                engine.on_storage_changed(&changes);
            }
        }
        InboundFrame::Message {
            request_id,
            request,
        } => {
            let engine = engine.clone();
            let host = host.clone();
            tasks.spawn(async move {
                let response = handle_message(&engine, &request).await;
                if let Err(e) = host.send(OutboundFrame::Response {
                    request_id,
                    response,
                }) {
                    warn!(error = %e, "failed to queue response");
                }
            });
        }
        InboundFrame::Installed { reason } => engine.on_installed(reason),
        InboundFrame::Startup => engine.on_startup().await,
    }
}

fn report_task(engine: &DispatchEngine, joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "event handler failed");
        engine.notify(Notification::error(MSG_UNEXPECTED));
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    mut shutdown: oneshot::Receiver<()>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            frame = outbound.recv() => frame,
            _ = &mut shutdown => {
                while let Ok(frame) = outbound.try_recv() {
                    if !write_or_log(&mut writer, &frame).await {
                        return;
                    }
                }
                return;
            }
        };
        let Some(frame) = frame else {
            return;
        };
        if !write_or_log(&mut writer, &frame).await {
            return;
        }
    }
}

async fn write_or_log<W>(writer: &mut W, frame: &OutboundFrame) -> bool
where
    W: AsyncWrite + Unpin,
{
    match write_frame(writer, frame).await {
        Ok(()) => true,
        Err(e) if is_fatal(&e) => {
            error!(error = %e, "output closed");
            false
        }
        Err(e) => {
            warn!(error = %e, "dropping unwritable frame");
            true
        }
    }
}
