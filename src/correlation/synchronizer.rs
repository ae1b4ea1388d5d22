//! # Synchronizer
//!
//! Turns a one-way publish/receive channel into a synchronous call.
//!
//! ## Request flow
//!
//! 1. A fresh correlation id is generated and a [`super::Session`] is registered for it.
//! 2. The id (and the bridge header, when configured) is stamped on the request, which is
//!    forwarded to the sink on a separate task.
//! 3. The request waits for the first of: a forward failure, the correlated response,
//!    the response wait timeout, or shutdown.
//! 4. The session is closed and dropped, so a late response is reported to its sender
//!    instead of being acknowledged and lost.
//!
//! ## Response flow
//!
//! A response carrying the correlation attribute is handed to the waiting session under
//! the table lock. Unknown or already answered ids are errors reported to the responder.
use std::{sync::Arc, time::Duration};

use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, instrument};

use crate::{
    config::SynchronizerConfig,
    event::envelope::{EventEnvelope, ExtensionValue},
    reply::options::STATEFUL_WORKFLOW_HEADER,
};

use super::{
    key::{CorrelationKey, CorrelationKeyResult},
    sender::EventSender,
    session::SessionTable,
    stats::{StatsSnapshot, SyncStats},
    SyncError, SyncResult,
};

/// Request/response bridge over an asynchronous channel.
///
/// Requests are forwarded to the configured sink and the calling task waits for the
/// correlated response. Responses are handed to the waiting request and acknowledged.
pub struct Synchronizer {
    key: CorrelationKey,
    sessions: SessionTable,
    sender: Arc<dyn EventSender>,
    sink: String,
    bridge_identifier: String,
    response_wait_timeout: Duration,
    shutdown: watch::Sender<bool>,
    stats: SyncStats,
}

impl Synchronizer {
    pub fn new(
        config: &SynchronizerConfig,
        sender: Arc<dyn EventSender>,
    ) -> CorrelationKeyResult<Self> {
        let key = CorrelationKey::new(&config.correlation_key, config.correlation_key_length)?;
        Ok(Self::with_correlation_key(config, key, sender))
    }

    /// Uses `key` instead of the attribute and length found in `config`.
    pub fn with_correlation_key(
        config: &SynchronizerConfig,
        key: CorrelationKey,
        sender: Arc<dyn EventSender>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            key,
            sessions: SessionTable::with_capacity_limit(config.max_pending_sessions),
            sender,
            sink: config.sink.clone(),
            bridge_identifier: config.bridge_identifier.clone(),
            response_wait_timeout: config.response_wait_timeout,
            shutdown,
            stats: SyncStats::default(),
        }
    }

    pub fn correlation_key(&self) -> &CorrelationKey {
        &self.key
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// Routes the envelope by the presence of the correlation attribute.
    ///
    /// Requests resolve to the correlated response, responses to `None` once handed
    /// over to the waiting request.
    pub async fn dispatch(&self, event: EventEnvelope) -> SyncResult<Option<EventEnvelope>> {
        match self.key.get(&event) {
            Some(id) => self.serve_response(&id, event).map(|()| None),
            None => self.serve_request(event).await.map(Some),
        }
    }

    /// Forwards `request` to the sink and waits for the correlated response.
    ///
    /// # Errors
    ///
    /// - `ShuttingDown` when shutdown was requested before or while waiting
    /// - `DuplicateSession` / `Overloaded` when the session cannot be registered
    /// - `ForwardFailed` when the sink rejected the request
    /// - `Timeout` when no response arrived within the response wait timeout
    ///
    /// The session is always unregistered before returning, including when the returned
    /// future is dropped.
    #[instrument(skip(self, request), fields(event_id = %request.id))]
    pub async fn serve_request(&self, mut request: EventEnvelope) -> SyncResult<EventEnvelope> {
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow() {
            self.stats.record_rejected();
            return Err(SyncError::ShuttingDown);
        }

        let id = self.key.generate();
        let mut session = self.sessions.add(&id).map_err(|e| {
            self.stats.record_rejected();
            error!(error = %e, "Cannot open client session");
            e
        })?;
        self.stats.record_request();

        self.key.insert(&mut request, &id);
        self.apply_bridge(&mut request);
        debug!(session = %id, "Forwarding request {}", request.summary());

        let (failure_tx, mut failure_rx) = oneshot::channel();
        let sender = self.sender.clone();
        let sink = self.sink.clone();
        tokio::spawn(async move {
            if let Err(e) = sender.send(&sink, request).await {
                let _ = failure_tx.send(e);
            }
        });

        let sleep = tokio::time::sleep(self.response_wait_timeout);
        tokio::pin!(sleep);

        let result = tokio::select! {
            Ok(e) = &mut failure_rx => {
                self.stats.record_forward_failure();
                Err(SyncError::ForwardFailed(e))
            }
            response = session.recv() => match response {
                Some(mut response) => {
                    self.apply_bridge(&mut response);
                    Ok(response)
                }
                None => Err(SyncError::ConnectionClosed(id.clone())),
            },
            _ = &mut sleep => {
                self.stats.record_timeout();
                Err(SyncError::Timeout(id.clone()))
            }
            _ = shutdown.changed() => Err(SyncError::ShuttingDown),
        };
        // No response can be handed over past this point.
        let result = match result {
            Err(e) => match session.close() {
                Some(mut response) => {
                    debug!(session = %id, error = %e, "Response arrived while closing session");
                    self.apply_bridge(&mut response);
                    Ok(response)
                }
                None => Err(e),
            },
            ok => ok,
        };
        drop(session);

        match &result {
            Ok(response) => debug!(session = %id, "Received response {}", response.summary()),
            Err(e) => error!(session = %id, error = %e, "Request failed"),
        }
        result
    }

    /// Hands `response` to the request waiting on correlation id `id`.
    ///
    /// Never blocks. Fails with `UnknownSession` when no request is waiting on `id` and
    /// with `ConnectionClosed` when the request already completed or was answered.
    #[instrument(skip(self, response), fields(event_id = %response.id))]
    pub fn serve_response(&self, id: &str, response: EventEnvelope) -> SyncResult<()> {
        self.stats.record_response();
        match self.sessions.resolve(id, response) {
            Ok(()) => {
                self.stats.record_delivered();
                debug!(session = %id, "Response handed to client session");
                Ok(())
            }
            Err(e) => {
                error!(session = %id, error = %e, "Dropping response");
                Err(e)
            }
        }
    }

    /// Fails every pending request and rejects new ones.
    pub fn shutdown(&self) {
        if !self.shutdown.send_replace(true) {
            info!(pending = self.sessions.len(), "Synchronizer shutting down");
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.sessions.len())
    }

    fn apply_bridge(&self, event: &mut EventEnvelope) {
        if self.bridge_identifier.is_empty() {
            return;
        }
        let present = event
            .extension(STATEFUL_WORKFLOW_HEADER)
            .is_some_and(|value| !value.to_string().is_empty());
        if !present {
            event.extensions.insert(
                STATEFUL_WORKFLOW_HEADER.to_string(),
                ExtensionValue::from(self.bridge_identifier.as_str()),
            );
        }
    }
}
