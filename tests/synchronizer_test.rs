use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use ceflow::{
    config::{self, SynchronizerConfig},
    correlation::{DeliveryError, EventSender, SyncError, Synchronizer},
    EventEnvelope,
};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[ctor::ctor]
fn init_tests() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Publishes forwarded requests on a channel, standing in for a broker.
struct ChannelSender {
    tx: mpsc::UnboundedSender<(String, EventEnvelope)>,
}

#[async_trait]
impl EventSender for ChannelSender {
    async fn send(&self, destination: &str, event: EventEnvelope) -> Result<(), DeliveryError> {
        self.tx
            .send((destination.to_string(), event))
            .map_err(|e| DeliveryError::Transport(e.to_string()))
    }
}

fn synchronizer(
    config: SynchronizerConfig,
) -> (
    Arc<Synchronizer>,
    mpsc::UnboundedReceiver<(String, EventEnvelope)>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sync = Synchronizer::new(&config, Arc::new(ChannelSender { tx })).unwrap();
    (Arc::new(sync), rx)
}

fn request(n: usize) -> EventEnvelope {
    EventEnvelope::builder()
        .event_type("io.ceflow.test.request")
        .source("client")
        .subject(&format!("request-{}", n))
        .build()
        .unwrap()
}

/// Answers every forwarded request through the synchronizer, echoing the subject.
fn spawn_backend(
    sync: Arc<Synchronizer>,
    mut rx: mpsc::UnboundedReceiver<(String, EventEnvelope)>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some((_, forwarded)) = rx.recv().await {
            let key = sync.correlation_key();
            let id = key.get(&forwarded).unwrap();
            let mut response = EventEnvelope::builder()
                .event_type("io.ceflow.test.response")
                .source("backend")
                .subject(forwarded.subject.as_deref().unwrap_or_default())
                .build()
                .unwrap();
            key.insert(&mut response, &id);
            let sync = sync.clone();
            tokio::spawn(async move {
                assert_eq!(sync.dispatch(response).await, Ok(None));
            });
        }
    })
}

#[tokio::test]
async fn concurrent_requests_get_their_own_responses() {
    let config: SynchronizerConfig = config::from_str(
        r#"{"sink": "http://broker.test", "correlation_key": "reqid", "response_wait_timeout": 5000}"#,
    )
    .unwrap();
    let (sync, rx) = synchronizer(config);
    let backend = spawn_backend(sync.clone(), rx);

    let mut requests = Vec::new();
    for n in 0..20 {
        let sync = sync.clone();
        requests.push(tokio::spawn(async move {
            (n, sync.dispatch(request(n)).await)
        }));
    }

    for handle in requests {
        let (n, result) = handle.await.unwrap();
        let reply = result.unwrap().unwrap();
        assert_eq!(reply.subject, Some(format!("request-{}", n)));
        assert!(reply.extension("reqid").is_some());
    }

    let stats = sync.stats();
    assert_eq!(stats.requests, 20);
    assert_eq!(stats.delivered, 20);
    assert_eq!(stats.pending, 0);
    assert!(sync.sessions().is_empty());
    backend.abort();
}

#[tokio::test]
async fn requests_are_forwarded_to_the_sink() {
    let (sync, mut rx) = synchronizer(SynchronizerConfig {
        sink: "http://broker.test/default".to_string(),
        response_wait_timeout: Duration::from_millis(50),
        ..Default::default()
    });

    let err = sync.dispatch(request(1)).await.unwrap_err();
    assert!(matches!(err, SyncError::Timeout(_)));

    let (destination, forwarded) = rx.recv().await.unwrap();
    assert_eq!(destination, "http://broker.test/default");
    assert!(sync.correlation_key().get(&forwarded).is_some());
    assert!(sync.sessions().is_empty());
}

#[tokio::test]
async fn late_response_is_rejected() {
    let (sync, mut rx) = synchronizer(SynchronizerConfig {
        response_wait_timeout: Duration::from_millis(50),
        ..Default::default()
    });

    let err = sync.dispatch(request(1)).await.unwrap_err();
    assert_eq!(err.status_code(), 504);

    let (_, forwarded) = rx.recv().await.unwrap();
    let id = sync.correlation_key().get(&forwarded).unwrap();
    let mut late = EventEnvelope::builder()
        .event_type("io.ceflow.test.response")
        .source("backend")
        .build()
        .unwrap();
    sync.correlation_key().insert(&mut late, &id);

    let err = sync.dispatch(late).await.unwrap_err();
    assert_eq!(err, SyncError::UnknownSession(id));
    assert_eq!(err.status_code(), 502);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn accepted_response_is_never_lost_at_timeout() {
    let timeout = Duration::from_millis(2);
    let (sync, mut rx) = synchronizer(SynchronizerConfig {
        response_wait_timeout: timeout,
        ..Default::default()
    });

    // Answers each request right around its deadline and reports whether the
    // response was accepted.
    let (accepted_tx, mut accepted_rx) = mpsc::unbounded_channel();
    let backend = {
        let sync = sync.clone();
        tokio::spawn(async move {
            while let Some((_, forwarded)) = rx.recv().await {
                let id = sync.correlation_key().get(&forwarded).unwrap();
                tokio::time::sleep(timeout).await;
                let response = EventEnvelope::builder()
                    .event_type("io.ceflow.test.response")
                    .source("backend")
                    .build()
                    .unwrap();
                let _ = accepted_tx.send(sync.serve_response(&id, response).is_ok());
            }
        })
    };

    for n in 0..200 {
        let result = sync.serve_request(request(n)).await;
        let accepted = accepted_rx.recv().await.unwrap();
        assert_eq!(
            accepted,
            result.is_ok(),
            "request {}: accepted={} result={:?}",
            n,
            accepted,
            result
        );
    }
    assert!(sync.sessions().is_empty());
    backend.abort();
}
