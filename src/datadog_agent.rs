// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The default [`Collector`]: batches finished trace segments and ships
//! them to the Datadog Agent over HTTP.
//!
//! Finished segments accumulate in a bounded FIFO (oldest dropped on
//! overflow). A recurring scheduler event drains the queue every flush
//! interval, MessagePack-encodes the traces, POSTs them to the agent's
//! traces endpoint, and feeds the agent's `rate_by_service` response back
//! into the trace sampler. Transport failures are logged once per flush and
//! the affected traces are dropped; nothing is retried, so a slow agent
//! cannot grow this process's memory.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use hyper::{Body, Method, Request};
use serde::{Deserialize, Serialize};

use crate::clock::wall_nanos;
use crate::collector::{Collector, TraceChunk};
use crate::error::{Code, Error};
use crate::http::{self, HttpClient, HyperClient};
use crate::logger::Logger;
use crate::sampling::rate::Rate;
use crate::sampling::trace_sampler::TraceSampler;
use crate::scheduler::{Cancel, EventScheduler, ThreadedEventScheduler};
use crate::span_data::SpanData;

pub(crate) const DEFAULT_AGENT_URL: &str = "http://localhost:8126";
const DEFAULT_FLUSH_INTERVAL_MILLISECONDS: i64 = 2_000;
const DEFAULT_REQUEST_TIMEOUT_MILLISECONDS: u64 = 2_000;
const DEFAULT_SHUTDOWN_TIMEOUT_MILLISECONDS: u64 = 2_000;

/// Upper bound on queued trace segments between flushes.
const MAX_QUEUED_CHUNKS: usize = 1_000;

/// Version of the agent's trace intake API to target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TraceApiVersion {
    V03,
    #[default]
    V04,
}

impl TraceApiVersion {
    pub(crate) fn path(self) -> &'static str {
        match self {
            TraceApiVersion::V03 => "/v0.3/traces",
            TraceApiVersion::V04 => "/v0.4/traces",
        }
    }
}

/// User-facing configuration for the agent collector, finalized together
/// with the rest of [`TracerConfig`](crate::config::TracerConfig).
#[derive(Clone)]
pub struct DatadogAgentConfig {
    /// Overridden by `DD_TRACE_AGENT_URL`, or composed from `DD_AGENT_HOST`
    /// and `DD_TRACE_AGENT_PORT`.
    pub url: String,
    /// How often queued traces are sent. Must be positive.
    pub flush_interval_milliseconds: i64,
    pub request_timeout_milliseconds: u64,
    pub shutdown_timeout_milliseconds: u64,
    pub api_version: TraceApiVersion,
    /// Substitute HTTP implementation; defaults to [`HyperClient`].
    pub http_client: Option<Arc<dyn HttpClient>>,
    /// Substitute flush scheduler; defaults to a dedicated thread.
    pub event_scheduler: Option<Arc<dyn EventScheduler>>,
}

impl Default for DatadogAgentConfig {
    fn default() -> Self {
        DatadogAgentConfig {
            url: DEFAULT_AGENT_URL.to_string(),
            flush_interval_milliseconds: DEFAULT_FLUSH_INTERVAL_MILLISECONDS,
            request_timeout_milliseconds: DEFAULT_REQUEST_TIMEOUT_MILLISECONDS,
            shutdown_timeout_milliseconds: DEFAULT_SHUTDOWN_TIMEOUT_MILLISECONDS,
            api_version: TraceApiVersion::default(),
            http_client: None,
            event_scheduler: None,
        }
    }
}

impl std::fmt::Debug for DatadogAgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatadogAgentConfig")
            .field("url", &self.url)
            .field("flush_interval_milliseconds", &self.flush_interval_milliseconds)
            .field("request_timeout_milliseconds", &self.request_timeout_milliseconds)
            .field("shutdown_timeout_milliseconds", &self.shutdown_timeout_milliseconds)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

/// Validated agent configuration, produced by
/// [`finalize_config`](crate::config::finalize_config).
#[derive(Clone)]
pub struct FinalizedDatadogAgentConfig {
    pub(crate) traces_endpoint: hyper::Uri,
    pub(crate) flush_interval: Duration,
    pub(crate) request_timeout: Duration,
    pub(crate) shutdown_timeout: Duration,
    pub(crate) http_client: Arc<dyn HttpClient>,
    pub(crate) event_scheduler: Arc<dyn EventScheduler>,
}

impl std::fmt::Debug for FinalizedDatadogAgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinalizedDatadogAgentConfig")
            .field("traces_endpoint", &self.traces_endpoint)
            .field("flush_interval", &self.flush_interval)
            .field("request_timeout", &self.request_timeout)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish_non_exhaustive()
    }
}

pub(crate) fn finalize_agent_config(
    config: &DatadogAgentConfig,
) -> Result<FinalizedDatadogAgentConfig, Error> {
    if config.flush_interval_milliseconds <= 0 {
        return Err(Error::new(
            Code::DatadogAgentInvalidFlushInterval,
            format!(
                "DatadogAgent flush interval must be a positive number of milliseconds, but got {}",
                config.flush_interval_milliseconds
            ),
        ));
    }
    let base_url = http::parse_url(&config.url)?;
    let traces_endpoint = http::with_path(&base_url, config.api_version.path())?;

    Ok(FinalizedDatadogAgentConfig {
        traces_endpoint,
        flush_interval: Duration::from_millis(config.flush_interval_milliseconds as u64),
        request_timeout: Duration::from_millis(config.request_timeout_milliseconds),
        shutdown_timeout: Duration::from_millis(config.shutdown_timeout_milliseconds),
        http_client: config
            .http_client
            .clone()
            .unwrap_or_else(|| Arc::new(HyperClient::new())),
        event_scheduler: config
            .event_scheduler
            .clone()
            .unwrap_or_else(|| Arc::new(ThreadedEventScheduler)),
    })
}

/// The v0.4 wire rendering of one span: a map with exactly the keys the
/// agent expects.
#[derive(Serialize)]
struct EncodedSpan<'a> {
    service: &'a str,
    name: &'a str,
    resource: &'a str,
    trace_id: u64,
    span_id: u64,
    parent_id: u64,
    start: i64,
    duration: i64,
    error: i32,
    meta: &'a HashMap<String, String>,
    metrics: &'a HashMap<String, f64>,
    r#type: &'a str,
}

impl<'a> EncodedSpan<'a> {
    fn new(span: &'a SpanData) -> EncodedSpan<'a> {
        EncodedSpan {
            service: &span.service,
            name: &span.name,
            resource: &span.resource,
            trace_id: span.trace_id.low,
            span_id: span.span_id,
            parent_id: span.parent_id,
            start: wall_nanos(span.start.wall),
            duration: span.duration.as_nanos().min(i64::MAX as u128) as i64,
            error: i32::from(span.error),
            meta: &span.tags,
            metrics: &span.numeric_tags,
            r#type: &span.service_type,
        }
    }
}

#[derive(Deserialize)]
struct AgentResponse {
    #[serde(default)]
    rate_by_service: HashMap<String, f64>,
}

struct PendingChunk {
    chunk: TraceChunk,
    response_handler: Arc<TraceSampler>,
}

struct Inner {
    queue: VecDeque<PendingChunk>,
    dropped_chunks: u64,
    cancel_flush: Option<Cancel>,
    stopped: bool,
}

pub struct DatadogAgent {
    traces_endpoint: hyper::Uri,
    request_timeout: Duration,
    shutdown_timeout: Duration,
    client: Arc<dyn HttpClient>,
    logger: Arc<dyn Logger>,
    runtime: tokio::runtime::Runtime,
    inner: Mutex<Inner>,
}

impl DatadogAgent {
    pub fn new(
        config: FinalizedDatadogAgentConfig,
        logger: Arc<dyn Logger>,
    ) -> Result<Arc<DatadogAgent>, Error> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(|io_error| {
                Error::new(
                    Code::HttpClientSetupFailed,
                    format!("could not start HTTP client runtime: {}", io_error),
                )
            })?;

        let agent = Arc::new(DatadogAgent {
            traces_endpoint: config.traces_endpoint,
            request_timeout: config.request_timeout,
            shutdown_timeout: config.shutdown_timeout,
            client: config.http_client,
            logger,
            runtime,
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                dropped_chunks: 0,
                cancel_flush: None,
                stopped: false,
            }),
        });

        // The flush event holds only a weak handle, so an agent abandoned
        // without an explicit shutdown can still be torn down.
        let weak: Weak<DatadogAgent> = Arc::downgrade(&agent);
        let cancel = config.event_scheduler.schedule_recurring_event(
            config.flush_interval,
            Box::new(move || {
                if let Some(agent) = weak.upgrade() {
                    agent.flush();
                }
            }),
        );
        agent.inner.lock().unwrap().cancel_flush = Some(cancel);

        Ok(agent)
    }

    /// Drain the queue and POST its contents to the agent. Invoked by the
    /// scheduler every flush interval, and directly during shutdown.
    pub fn flush(&self) {
        self.flush_with_timeout(self.request_timeout);
    }

    fn flush_with_timeout(&self, timeout: Duration) {
        let (pending, dropped) = {
            let mut inner = self.inner.lock().unwrap();
            let dropped = std::mem::take(&mut inner.dropped_chunks);
            (inner.queue.drain(..).collect::<Vec<_>>(), dropped)
        };
        if dropped > 0 {
            self.logger.log_warning(&format!(
                "dropped {} trace(s) because the send queue overflowed",
                dropped
            ));
        }
        if pending.is_empty() {
            return;
        }

        let traces: Vec<Vec<EncodedSpan<'_>>> = pending
            .iter()
            .map(|entry| entry.chunk.spans.iter().map(EncodedSpan::new).collect())
            .collect();
        let body = match rmp_serde::to_vec_named(&traces) {
            Ok(body) => body,
            Err(encode_error) => {
                self.logger.log_error(&Error::new(
                    Code::MessagePackEncodeFailed,
                    format!("unable to encode trace payload: {}", encode_error),
                ));
                return;
            }
        };

        match self.post_traces(body, pending.len(), timeout) {
            Ok(response_body) => self.handle_agent_response(&response_body, &pending),
            Err(send_error) => {
                // One log line per failed flush; the traces are dropped
                // rather than requeued.
                self.logger.log_error(&send_error);
            }
        }
    }

    fn post_traces(
        &self,
        body: Vec<u8>,
        trace_count: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, Error> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.traces_endpoint.clone())
            .header(hyper::header::USER_AGENT, concat!("dd-trace-rust/", env!("CARGO_PKG_VERSION")))
            .header(hyper::header::CONTENT_TYPE, "application/msgpack")
            .header("Datadog-Meta-Lang", "rust")
            .header("Datadog-Meta-Lang-Version", env!("CARGO_PKG_RUST_VERSION"))
            .header("Datadog-Meta-Tracer-Version", env!("CARGO_PKG_VERSION"))
            .header("X-Datadog-Trace-Count", trace_count.to_string())
            .body(Body::from(body))
            .map_err(|build_error| {
                Error::new(
                    Code::HttpClientFailure,
                    format!("could not build trace request: {}", build_error),
                )
            })?;

        self.runtime.block_on(async {
            let response = tokio::time::timeout(timeout, self.client.request(request))
                .await
                .map_err(|_elapsed| {
                    Error::new(
                        Code::HttpClientFailure,
                        format!(
                            "request to {} timed out after {:?}",
                            self.traces_endpoint, timeout
                        ),
                    )
                })?
                .map_err(|transport_error| {
                    Error::new(
                        Code::HttpClientFailure,
                        format!(
                            "error sending traces to {}: {}",
                            self.traces_endpoint, transport_error
                        ),
                    )
                })?;

            let status = response.status();
            let body = hyper::body::to_bytes(response.into_body())
                .await
                .map_err(|body_error| {
                    Error::new(
                        Code::HttpClientFailure,
                        format!("error reading agent response body: {}", body_error),
                    )
                })?;

            if !status.is_success() {
                return Err(Error::new(
                    Code::DatadogAgentBadResponse,
                    format!(
                        "agent responded with status {}: {}",
                        status,
                        String::from_utf8_lossy(&body)
                    ),
                ));
            }
            Ok(body.to_vec())
        })
    }

    fn handle_agent_response(&self, body: &[u8], pending: &[PendingChunk]) {
        let response: AgentResponse = match serde_json::from_slice(body) {
            Ok(response) => response,
            Err(parse_error) => {
                self.logger.log_warning(&format!(
                    "could not parse agent response body as JSON: {}",
                    parse_error
                ));
                return;
            }
        };

        let mut rates = HashMap::with_capacity(response.rate_by_service.len());
        for (key, value) in response.rate_by_service {
            match Rate::try_new(value) {
                Ok(rate) => {
                    rates.insert(key, rate);
                }
                Err(rate_error) => self.logger.log_warning(&format!(
                    "ignoring agent sample rate for {:?}: {}",
                    key, rate_error.message
                )),
            }
        }

        // Chunks typically share one sampler, but the contract allows each
        // send to name its own response handler.
        let mut notified: Vec<&Arc<TraceSampler>> = Vec::new();
        for entry in pending {
            if notified
                .iter()
                .any(|handler| Arc::ptr_eq(*handler, &entry.response_handler))
            {
                continue;
            }
            entry.response_handler.update_agent_rates(rates.clone());
            notified.push(&entry.response_handler);
        }
    }
}

impl Collector for DatadogAgent {
    fn send(&self, chunk: TraceChunk, response_handler: &Arc<TraceSampler>) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        if inner.stopped {
            // Spans can outlive the tracer; their segments land here after
            // shutdown and are quietly discarded.
            return Ok(());
        }
        if inner.queue.len() >= MAX_QUEUED_CHUNKS {
            inner.queue.pop_front();
            inner.dropped_chunks += 1;
        }
        inner.queue.push_back(PendingChunk {
            chunk,
            response_handler: Arc::clone(response_handler),
        });
        Ok(())
    }

    fn flush_and_stop(&self, timeout: Duration) {
        let cancel = {
            let mut inner = self.inner.lock().unwrap();
            if inner.stopped {
                return;
            }
            inner.stopped = true;
            inner.cancel_flush.take()
        };
        if let Some(cancel) = cancel {
            cancel();
        }
        self.flush_with_timeout(timeout);
    }
}

impl Drop for DatadogAgent {
    fn drop(&mut self) {
        let cancel = self.inner.lock().unwrap().cancel_flush.take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }
}

impl std::fmt::Debug for DatadogAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatadogAgent")
            .field("traces_endpoint", &self.traces_endpoint)
            .field("request_timeout", &self.request_timeout)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{default_clock, TimePoint};
    use crate::id_generator::TraceId;
    use crate::logger::Logger;
    use hyper::{HeaderMap, Response};
    use std::sync::Mutex as StdMutex;

    /// Scheduler that never fires on its own; tests call the callback.
    #[derive(Default)]
    struct ManualScheduler {
        callbacks: StdMutex<Vec<Box<dyn FnMut() + Send>>>,
    }

    impl ManualScheduler {
        fn fire_all(&self) {
            let mut callbacks = self.callbacks.lock().unwrap();
            for callback in callbacks.iter_mut() {
                callback();
            }
        }
    }

    impl EventScheduler for Arc<ManualScheduler> {
        fn schedule_recurring_event(
            &self,
            _interval: Duration,
            callback: Box<dyn FnMut() + Send>,
        ) -> Cancel {
            self.callbacks.lock().unwrap().push(callback);
            Box::new(|| {})
        }
    }

    /// Records request bodies and returns a canned response.
    struct CannedClient {
        status: u16,
        body: &'static str,
        requests: StdMutex<Vec<(HeaderMap, Vec<u8>)>>,
    }

    impl CannedClient {
        fn new(status: u16, body: &'static str) -> Arc<CannedClient> {
            Arc::new(CannedClient {
                status,
                body,
                requests: StdMutex::new(Vec::new()),
            })
        }
    }

    impl HttpClient for CannedClient {
        fn request(&self, request: Request<Body>) -> crate::http::ResponseFuture {
            let status = self.status;
            let body = self.body;
            let (parts, request_body) = request.into_parts();
            let recorded = &self.requests;
            let bytes = futures::executor::block_on(hyper::body::to_bytes(request_body))
                .unwrap_or_default()
                .to_vec();
            recorded.lock().unwrap().push((parts.headers, bytes));
            Box::pin(async move {
                Ok(Response::builder()
                    .status(status)
                    .body(Body::from(body))
                    .unwrap())
            })
        }
    }

    #[derive(Default)]
    struct CapturingLogger {
        errors: StdMutex<Vec<Error>>,
        warnings: StdMutex<Vec<String>>,
    }

    impl Logger for CapturingLogger {
        fn log_error(&self, error: &Error) {
            self.errors.lock().unwrap().push(error.clone());
        }
        fn log_warning(&self, message: &str) {
            self.warnings.lock().unwrap().push(message.to_string());
        }
        fn log_startup(&self, _message: &str) {}
    }

    fn test_span(service: &str) -> SpanData {
        SpanData {
            service: service.to_string(),
            service_type: "web".to_string(),
            name: "op".to_string(),
            resource: "/".to_string(),
            trace_id: TraceId::from_low(99),
            span_id: 99,
            parent_id: 0,
            start: TimePoint::now(),
            duration: Duration::from_millis(5),
            error: false,
            tags: HashMap::from([("hello".to_string(), "world".to_string())]),
            numeric_tags: HashMap::from([("_sampling_priority_v1".to_string(), 1.0)]),
        }
    }

    fn build_agent(
        client: Arc<CannedClient>,
        scheduler: Arc<ManualScheduler>,
        logger: Arc<CapturingLogger>,
    ) -> Arc<DatadogAgent> {
        let config = DatadogAgentConfig {
            http_client: Some(client as Arc<dyn HttpClient>),
            event_scheduler: Some(Arc::new(scheduler) as Arc<dyn EventScheduler>),
            ..Default::default()
        };
        let finalized = finalize_agent_config(&config).unwrap();
        DatadogAgent::new(finalized, logger).unwrap()
    }

    fn sampler() -> Arc<TraceSampler> {
        Arc::new(TraceSampler::new(vec![], 200.0, default_clock()))
    }

    #[test]
    fn finalize_rejects_nonpositive_flush_interval() {
        let config = DatadogAgentConfig {
            flush_interval_milliseconds: 0,
            ..Default::default()
        };
        let error = finalize_agent_config(&config).unwrap_err();
        assert_eq!(error.code, Code::DatadogAgentInvalidFlushInterval);
    }

    #[test]
    fn finalize_builds_traces_endpoint() {
        let config = DatadogAgentConfig::default();
        let finalized = finalize_agent_config(&config).unwrap();
        assert_eq!(
            finalized.traces_endpoint.to_string(),
            "http://localhost:8126/v0.4/traces"
        );

        let config = DatadogAgentConfig {
            api_version: TraceApiVersion::V03,
            ..Default::default()
        };
        let finalized = finalize_agent_config(&config).unwrap();
        assert_eq!(
            finalized.traces_endpoint.to_string(),
            "http://localhost:8126/v0.3/traces"
        );
    }

    #[test]
    fn flush_posts_msgpack_with_expected_headers() {
        let client = CannedClient::new(200, "{}");
        let scheduler = Arc::new(ManualScheduler::default());
        let logger = Arc::new(CapturingLogger::default());
        let agent = build_agent(Arc::clone(&client), Arc::clone(&scheduler), Arc::clone(&logger));

        let chunk = TraceChunk {
            priority: 1,
            spans: vec![test_span("svc")],
        };
        agent.send(chunk, &sampler()).unwrap();
        scheduler.fire_all();

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let (headers, body) = &requests[0];
        assert_eq!(headers.get("content-type").unwrap(), "application/msgpack");
        assert_eq!(headers.get("datadog-meta-lang").unwrap(), "rust");
        assert_eq!(headers.get("x-datadog-trace-count").unwrap(), "1");
        assert!(headers.contains_key("datadog-meta-tracer-version"));

        // The payload is an array of traces, each an array of span maps.
        let decoded: serde_json::Value = rmp_serde::from_slice(body).unwrap();
        let trace = &decoded[0];
        let span = &trace[0];
        assert_eq!(span["service"], "svc");
        assert_eq!(span["name"], "op");
        assert_eq!(span["resource"], "/");
        assert_eq!(span["trace_id"], 99);
        assert_eq!(span["span_id"], 99);
        assert_eq!(span["parent_id"], 0);
        assert_eq!(span["error"], 0);
        assert_eq!(span["type"], "web");
        assert_eq!(span["duration"], 5_000_000);
        assert_eq!(span["meta"]["hello"], "world");
        assert_eq!(span["metrics"]["_sampling_priority_v1"], 1.0);
        assert!(span["start"].as_i64().unwrap() > 0);
        assert!(logger.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn agent_rate_feedback_reaches_the_sampler() {
        let client = CannedClient::new(
            200,
            r#"{"rate_by_service":{"service:svc,env:":0.0,"service:,env:":1.0}}"#,
        );
        let scheduler = Arc::new(ManualScheduler::default());
        let logger = Arc::new(CapturingLogger::default());
        let agent = build_agent(Arc::clone(&client), Arc::clone(&scheduler), logger);

        let handler = sampler();
        agent
            .send(
                TraceChunk {
                    priority: 1,
                    spans: vec![test_span("svc")],
                },
                &handler,
            )
            .unwrap();
        scheduler.fire_all();

        // The sampler now drops traces for "svc" with no env.
        let decision = handler.decide(&test_span("svc"));
        assert_eq!(decision.priority, crate::sampling::priority::AUTO_DROP);
        assert_eq!(
            decision.mechanism,
            Some(crate::sampling::SamplingMechanism::AgentRate)
        );
    }

    #[test]
    fn failed_flush_logs_exactly_one_error() {
        let client = CannedClient::new(500, "oh no");
        let scheduler = Arc::new(ManualScheduler::default());
        let logger = Arc::new(CapturingLogger::default());
        let agent = build_agent(client, Arc::clone(&scheduler), Arc::clone(&logger));

        for _ in 0..3 {
            agent
                .send(
                    TraceChunk {
                        priority: 1,
                        spans: vec![test_span("svc")],
                    },
                    &sampler(),
                )
                .unwrap();
        }
        scheduler.fire_all();

        let errors = logger.errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, Code::DatadogAgentBadResponse);
    }

    #[test]
    fn queue_overflow_drops_oldest() {
        let client = CannedClient::new(200, "{}");
        let scheduler = Arc::new(ManualScheduler::default());
        let logger = Arc::new(CapturingLogger::default());
        let agent = build_agent(Arc::clone(&client), Arc::clone(&scheduler), Arc::clone(&logger));

        let handler = sampler();
        for i in 0..(MAX_QUEUED_CHUNKS + 5) {
            agent
                .send(
                    TraceChunk {
                        priority: 1,
                        spans: vec![test_span(&format!("svc-{}", i))],
                    },
                    &handler,
                )
                .unwrap();
        }
        scheduler.fire_all();

        let requests = client.requests.lock().unwrap();
        let (headers, _) = &requests[0];
        assert_eq!(
            headers.get("x-datadog-trace-count").unwrap(),
            MAX_QUEUED_CHUNKS.to_string().as_str()
        );
        let warnings = logger.warnings.lock().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("5 trace(s)"));
    }

    #[test]
    fn send_after_stop_discards_quietly() {
        let client = CannedClient::new(200, "{}");
        let scheduler = Arc::new(ManualScheduler::default());
        let logger = Arc::new(CapturingLogger::default());
        let agent = build_agent(Arc::clone(&client), scheduler, Arc::clone(&logger));

        agent.flush_and_stop(Duration::from_secs(2));
        agent
            .send(
                TraceChunk {
                    priority: 1,
                    spans: vec![test_span("svc")],
                },
                &sampler(),
            )
            .unwrap();
        agent.flush_and_stop(Duration::from_secs(2));
        // Nothing was ever transmitted: the queue was empty at stop time and
        // later sends are discarded.
        assert!(client.requests.lock().unwrap().is_empty());
        assert!(logger.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn flush_and_stop_transmits_pending_traces() {
        let client = CannedClient::new(200, "{}");
        let scheduler = Arc::new(ManualScheduler::default());
        let logger = Arc::new(CapturingLogger::default());
        let agent = build_agent(Arc::clone(&client), scheduler, logger);

        agent
            .send(
                TraceChunk {
                    priority: 1,
                    spans: vec![test_span("svc")],
                },
                &sampler(),
            )
            .unwrap();
        agent.flush_and_stop(Duration::from_secs(2));
        assert_eq!(client.requests.lock().unwrap().len(), 1);
    }
}
