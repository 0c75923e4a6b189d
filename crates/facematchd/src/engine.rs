use std::panic::{self, AssertUnwindSafe};

use facematch_core::{ImageSource, Verification, Verifier, VerifyError};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Verify(#[from] VerifyError),
    #[error("verifier panicked: {0}")]
    Panicked(String),
    #[error("verification engine is not running")]
    ChannelClosed,
}

/// A pair of images waiting for the engine thread.
struct VerifyRequest {
    first: ImageSource,
    second: ImageSource,
    reply: oneshot::Sender<Result<Verification, EngineError>>,
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<VerifyRequest>,
}

impl EngineHandle {
    /// Verify two images on the engine thread.
    ///
    /// Both sources are dropped, and any temp files removed, before this returns.
    pub async fn verify(&self, first: ImageSource, second: ImageSource) -> Result<Verification, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(VerifyRequest { first, second, reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn `verifier` on a dedicated OS thread.
///
/// Requests queue in a bounded channel of `queue_depth` and are served one
/// at a time. A panicking verifier fails only the request that triggered it.
pub fn spawn_engine<V>(mut verifier: V, queue_depth: usize) -> std::io::Result<EngineHandle>
where
    V: Verifier + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<VerifyRequest>(queue_depth.max(1));

    std::thread::Builder::new()
        .name("facematch-engine".into())
        .spawn(move || {
            tracing::info!(
                model = verifier.model(),
                detector = verifier.detector().unwrap_or("skip"),
                metric = %verifier.metric(),
                "engine thread started"
            );
            while let Some(VerifyRequest { first, second, reply }) = rx.blocking_recv() {
                let result = panic::catch_unwind(AssertUnwindSafe(|| verifier.verify(&first, &second)))
                    .map_err(|payload| EngineError::Panicked(panic_message(payload.as_ref())))
                    .and_then(|result| result.map_err(EngineError::from));
                drop((first, second));

                if let Err(EngineError::Panicked(message)) = &result {
                    tracing::error!(%message, "verifier panicked, engine continues");
                }

                if reply.send(result).is_err() {
                    tracing::debug!("requester went away before verification finished");
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
