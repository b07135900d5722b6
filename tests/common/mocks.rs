//! Recording doubles for the application channel, the dead-letter publisher,
//! the ingress metrics sink and the timer executor.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use sidecar_core::actors::{TimerExecutor, TimerRecord};
use sidecar_core::pubsub::message::BulkSubscribeEnvelope;
use sidecar_core::pubsub::{
    AppChannel, ChannelError, DeadLetterPublisher, DeadLetterRequest, IngressMetrics,
    IngressStatus, InvokeRequest, InvokeResponse, PublishError,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

type Responder = dyn Fn(usize, &BulkSubscribeEnvelope) -> Result<InvokeResponse, ChannelError>
    + Send
    + Sync;

/// Application double answering each call from a closure.
///
/// The closure receives the zero-based call number and the decoded envelope.
pub struct MockAppChannel {
    responder: Box<Responder>,
    calls: AtomicUsize,
    requests: Mutex<Vec<InvokeRequest>>,
}

impl fmt::Debug for MockAppChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockAppChannel")
            .field("calls", &self.calls.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl MockAppChannel {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(usize, &BulkSubscribeEnvelope) -> Result<InvokeResponse, ChannelError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Acknowledges every entry it receives
    pub fn all_success() -> Self {
        Self::new(|_, envelope| Ok(statuses_response(envelope, |_| "SUCCESS")))
    }

    /// Answers every entry by id; ids absent from `statuses` are left out of
    /// the response
    pub fn with_statuses(statuses: &[(&str, &str)]) -> Self {
        let statuses: HashMap<String, String> = statuses
            .iter()
            .map(|(id, status)| ((*id).to_string(), (*status).to_string()))
            .collect();
        Self::new(move |_, envelope| {
            let entries: Vec<serde_json::Value> = envelope
                .entries
                .iter()
                .filter_map(|entry| {
                    statuses
                        .get(&entry.entry_id)
                        .map(|status| json!({"entryId": entry.entry_id, "status": status}))
                })
                .collect();
            Ok(InvokeResponse::new(200, json!({ "statuses": entries }).to_string()))
        })
    }

    /// Returns a fixed status code and body for every call
    pub fn with_response(status_code: u16, body: &'static str) -> Self {
        Self::new(move |_, _| Ok(InvokeResponse::new(status_code, body)))
    }

    pub fn failing(error: ChannelError) -> Self {
        Self::new(move |_, _| Err(error.clone()))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<InvokeRequest> {
        self.requests.lock().clone()
    }

    /// Envelopes received so far, in call order
    pub fn envelopes(&self) -> Vec<BulkSubscribeEnvelope> {
        self.requests
            .lock()
            .iter()
            .map(|request| serde_json::from_slice(&request.data).expect("envelope is valid JSON"))
            .collect()
    }

    /// Envelope sent to `path`; panics when the path was never invoked
    pub fn envelope_for(&self, path: &str) -> BulkSubscribeEnvelope {
        let requests = self.requests.lock();
        let request = requests
            .iter()
            .find(|request| request.method == path)
            .unwrap_or_else(|| panic!("no request sent to {path}"));
        serde_json::from_slice(&request.data).expect("envelope is valid JSON")
    }
}

#[async_trait]
impl AppChannel for MockAppChannel {
    async fn invoke_method(&self, request: InvokeRequest) -> Result<InvokeResponse, ChannelError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let envelope: BulkSubscribeEnvelope = serde_json::from_slice(&request.data)
            .map_err(|e| ChannelError::invocation(e.to_string()))?;
        self.requests.lock().push(request);
        (self.responder)(call, &envelope)
    }
}

/// 200 response giving every envelope entry the status chosen by `status_for`
pub fn statuses_response(
    envelope: &BulkSubscribeEnvelope,
    status_for: impl Fn(&str) -> &'static str,
) -> InvokeResponse {
    let statuses: Vec<serde_json::Value> = envelope
        .entries
        .iter()
        .map(|entry| json!({"entryId": entry.entry_id, "status": status_for(&entry.entry_id)}))
        .collect();
    InvokeResponse::new(200, json!({ "statuses": statuses }).to_string())
}

/// Dead-letter publisher keeping every request it receives
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    fail: bool,
    requests: Mutex<Vec<DeadLetterRequest>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publisher whose broker rejects every publish
    pub fn failing() -> Self {
        Self {
            fail: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<DeadLetterRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl DeadLetterPublisher for RecordingPublisher {
    async fn publish(&self, request: DeadLetterRequest) -> Result<(), PublishError> {
        let topic = request.topic.clone();
        self.requests.lock().push(request);
        if self.fail {
            Err(PublishError::publish(topic, "broker unavailable"))
        } else {
            Ok(())
        }
    }
}

/// Ingress metrics sink accumulating flushed counters
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    reports: Mutex<Vec<String>>,
    entries: Mutex<HashMap<IngressStatus, i64>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batch-level reports received
    pub fn report_count(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn count(&self, status: IngressStatus) -> i64 {
        self.entries.lock().get(&status).copied().unwrap_or(0)
    }
}

impl IngressMetrics for RecordingMetrics {
    fn record_bulk_ingress(&self, _component: &str, topic: &str, _elapsed_ms: f64) {
        self.reports.lock().push(topic.to_string());
    }

    fn record_bulk_ingress_entries(
        &self,
        _component: &str,
        _topic: &str,
        status: IngressStatus,
        count: i64,
    ) {
        *self.entries.lock().entry(status).or_insert(0) += count;
    }
}

/// One delivered timer tick
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTick {
    pub timer: String,
    pub callback: String,
    pub at: Duration,
}

/// Timer executor recording ticks relative to its creation instant
#[derive(Debug)]
pub struct RecordingExecutor {
    started: Instant,
    fail: bool,
    ticks: Mutex<Vec<RecordedTick>>,
}

impl RecordingExecutor {
    /// Must be created inside the test runtime so paused time applies
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            fail: false,
            ticks: Mutex::new(Vec::new()),
        }
    }

    /// Executor whose actor rejects every tick
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn ticks(&self) -> Vec<RecordedTick> {
        self.ticks.lock().clone()
    }

    pub fn ticks_for(&self, timer: &str) -> usize {
        self.ticks.lock().iter().filter(|tick| tick.timer == timer).count()
    }

    /// Tick offsets of `timer`, rounded to whole milliseconds
    pub fn offsets_ms(&self, timer: &str) -> Vec<u128> {
        self.ticks
            .lock()
            .iter()
            .filter(|tick| tick.timer == timer)
            .map(|tick| tick.at.as_millis())
            .collect()
    }
}

#[async_trait]
impl TimerExecutor for RecordingExecutor {
    async fn execute_timer(&self, timer: &TimerRecord) -> anyhow::Result<()> {
        self.ticks.lock().push(RecordedTick {
            timer: timer.key.name.clone(),
            callback: timer.callback.clone(),
            at: self.started.elapsed(),
        });
        if self.fail {
            anyhow::bail!("actor rejected timer {}", timer.key);
        }
        Ok(())
    }
}
