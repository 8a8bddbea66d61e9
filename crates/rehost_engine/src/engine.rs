use std::sync::{mpsc, Arc};
use std::thread;

use rehost_core::RehostConfig;

use crate::fetch::{FetchSettings, Fetcher, ReqwestFetcher};
use crate::run::Rehoster;
use crate::store::{MessageStore, Notifier};
use crate::types::{MessageId, RehostError, RehostEvent};

enum RehostCommand {
    Trigger { message_id: MessageId },
}

/// Trigger-queue front of the pipeline: accepts message identifiers from the
/// embedder's event mechanism and processes runs on a dedicated worker.
pub struct RehostHandle {
    cmd_tx: mpsc::Sender<RehostCommand>,
    event_rx: mpsc::Receiver<RehostEvent>,
}

impl RehostHandle {
    pub fn new(
        config: RehostConfig,
        store: Arc<dyn MessageStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let settings = FetchSettings {
            request_timeout: config.download_timeout,
            max_bytes: config.max_bytes,
            ..FetchSettings::default()
        };
        Self::with_fetcher(config, Arc::new(ReqwestFetcher::new(settings)), store, notifier)
    }

    pub fn with_fetcher(
        config: RehostConfig,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn MessageStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let rehoster = Arc::new(Rehoster::new(config, fetcher, store, notifier));

        thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
            while let Ok(command) = cmd_rx.recv() {
                let rehoster = rehoster.clone();
                let event_tx = event_tx.clone();
                runtime.spawn(async move {
                    match command {
                        RehostCommand::Trigger { message_id } => {
                            let result = rehoster.run(message_id).await;
                            let _ = event_tx.send(RehostEvent::RunCompleted { message_id, result });
                        }
                    }
                });
            }
        });

        Self { cmd_tx, event_rx }
    }

    pub fn trigger(&self, message_id: MessageId) {
        let _ = self.cmd_tx.send(RehostCommand::Trigger { message_id });
    }

    /// Trigger from an opaque event payload carrying the message identifier.
    /// A blank or garbled payload is fatal to this invocation; no partial
    /// work happens.
    pub fn trigger_raw(&self, payload: &str) -> Result<(), RehostError> {
        let trimmed = payload.trim();
        if trimmed.is_empty() {
            return Err(RehostError::InvalidParameter("missing message id".into()));
        }
        let message_id: MessageId = trimmed
            .parse()
            .map_err(|_| RehostError::InvalidParameter(format!("not a message id: {trimmed}")))?;
        self.trigger(message_id);
        Ok(())
    }

    pub fn try_recv(&self) -> Option<RehostEvent> {
        self.event_rx.try_recv().ok()
    }
}
