// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Tracer configuration.
//!
//! A [`TracerConfig`] is plain data filled in by the embedder. Calling
//! [`finalize_config`] validates it, applies environment variable
//! overrides, and produces the [`FinalizedTracerConfig`] from which a
//! [`Tracer`](crate::tracer::Tracer) is built. The environment is consulted
//! only here.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{default_clock, Clock};
use crate::collector::Collector;
use crate::datadog_agent::{
    finalize_agent_config, DatadogAgentConfig, FinalizedDatadogAgentConfig,
};
use crate::environment as env;
use crate::error::{Code, Error};
use crate::id_generator::{IdGenerator, RandomIdGenerator};
use crate::logger::{DefaultLogger, Logger};
use crate::propagation::PropagationStyle;
use crate::sampling::matcher::SpanMatcher;
use crate::sampling::rate::Rate;
use crate::sampling::rules::{self, SpanRule, TraceRule};
use crate::span_data::SpanDefaults;

const DEFAULT_TAGS_HEADER_MAX_SIZE: usize = 512;
const DEFAULT_TRACE_LIMIT_PER_SECOND: f64 = 200.0;

/// A user-configured trace sampling rule.
#[derive(Clone, Debug)]
pub struct TraceRuleConfig {
    pub matcher: SpanMatcher,
    pub sample_rate: f64,
}

impl Default for TraceRuleConfig {
    fn default() -> Self {
        TraceRuleConfig {
            matcher: SpanMatcher::default(),
            sample_rate: 1.0,
        }
    }
}

/// Trace sampling configuration. Overridden by `DD_TRACE_SAMPLING_RULES`,
/// `DD_TRACE_SAMPLE_RATE`, and `DD_TRACE_RATE_LIMIT`.
#[derive(Clone, Debug, Default)]
pub struct TraceSamplerConfig {
    /// When set and no rule is configured, becomes a catch-all rule.
    pub sample_rate: Option<f64>,
    /// Global limit on kept traces per second. Defaults to 200.
    pub max_per_second: Option<f64>,
    pub rules: Vec<TraceRuleConfig>,
}

/// A user-configured span sampling rule.
#[derive(Clone, Debug)]
pub struct SpanRuleConfig {
    pub matcher: SpanMatcher,
    pub sample_rate: f64,
    pub max_per_second: Option<f64>,
}

impl Default for SpanRuleConfig {
    fn default() -> Self {
        SpanRuleConfig {
            matcher: SpanMatcher::default(),
            sample_rate: 1.0,
            max_per_second: None,
        }
    }
}

/// Span sampling configuration. Overridden by `DD_SPAN_SAMPLING_RULES` or
/// `DD_SPAN_SAMPLING_RULES_FILE`.
#[derive(Clone, Debug, Default)]
pub struct SpanSamplerConfig {
    pub rules: Vec<SpanRuleConfig>,
}

/// Configuration for a [`Tracer`](crate::tracer::Tracer). Unset fields take
/// library defaults; many are additionally overridden by `DD_*` environment
/// variables, noted per field.
#[derive(Clone, Default)]
pub struct TracerConfig {
    /// The name of the instrumented service. Required (here or via
    /// `DD_SERVICE`).
    pub service: Option<String>,
    /// The type of service, e.g. "web" or "db".
    pub service_type: Option<String>,
    /// Deployment environment, e.g. "prod". Overridden by `DD_ENV`.
    pub environment: Option<String>,
    /// Service version. Overridden by `DD_VERSION`.
    pub version: Option<String>,
    /// Default operation name for spans.
    pub name: Option<String>,
    /// Tags attached to every span. Overridden by `DD_TAGS`.
    pub tags: Option<HashMap<String, String>>,
    /// Configuration for the default agent collector. Ignored when
    /// `collector` is set or when trace reporting is disabled.
    pub agent: DatadogAgentConfig,
    /// Substitute collector; when set, `agent` is ignored.
    pub collector: Option<Arc<dyn Collector>>,
    /// Whether finished traces are sent anywhere. Overridden by
    /// `DD_TRACE_ENABLED`.
    pub report_traces: Option<bool>,
    /// Overridden by `DD_INSTRUMENTATION_TELEMETRY_ENABLED`.
    pub report_telemetry: Option<bool>,
    pub trace_sampler: TraceSamplerConfig,
    pub span_sampler: SpanSamplerConfig,
    /// Styles used when injecting context. Overridden by
    /// `DD_PROPAGATION_STYLE_INJECT` / `DD_TRACE_PROPAGATION_STYLE`.
    pub injection_styles: Option<Vec<PropagationStyle>>,
    /// Styles tried, in order, when extracting context. Overridden by
    /// `DD_PROPAGATION_STYLE_EXTRACT` / `DD_TRACE_PROPAGATION_STYLE`.
    pub extraction_styles: Option<Vec<PropagationStyle>>,
    /// Whether to resolve and report this host's hostname with traces.
    pub report_hostname: Option<bool>,
    /// Maximum serialized size of the `x-datadog-tags` header, in bytes.
    pub max_tags_header_size: Option<usize>,
    /// Diagnostic sink; defaults to the `log` crate facade.
    pub logger: Option<Arc<dyn Logger>>,
    /// Whether to log a configuration banner at startup. Overridden by
    /// `DD_TRACE_STARTUP_LOGS`.
    pub log_on_startup: Option<bool>,
    /// Generate 128-bit trace IDs. Overridden by
    /// `DD_TRACE_128_BIT_TRACEID_GENERATION_ENABLED`.
    pub trace_id_128_bit: Option<bool>,
    /// Identifier for this run of the host application; defaults to a
    /// random UUID.
    pub runtime_id: Option<String>,
    /// Name of the product embedding this library, e.g. "nginx".
    pub integration_name: Option<String>,
    pub integration_version: Option<String>,
    /// Substitute ID source, for tests needing deterministic traces.
    pub id_generator: Option<Arc<dyn IdGenerator>>,
    /// Substitute time source.
    pub clock: Option<Clock>,
}

pub(crate) enum CollectorChoice {
    Agent(FinalizedDatadogAgentConfig),
    Custom(Arc<dyn Collector>),
}

/// A validated configuration, the only way to construct a
/// [`Tracer`](crate::tracer::Tracer).
pub struct FinalizedTracerConfig {
    pub(crate) defaults: SpanDefaults,
    pub(crate) collector: CollectorChoice,
    pub(crate) trace_rules: Vec<TraceRule>,
    pub(crate) trace_limit_per_second: f64,
    pub(crate) span_rules: Vec<SpanRule>,
    pub(crate) injection_styles: Vec<PropagationStyle>,
    pub(crate) extraction_styles: Vec<PropagationStyle>,
    pub(crate) hostname: Option<String>,
    pub(crate) max_tags_header_size: usize,
    pub(crate) logger: Arc<dyn Logger>,
    pub(crate) log_on_startup: bool,
    pub(crate) trace_id_128_bit: bool,
    pub(crate) report_traces: bool,
    pub(crate) report_telemetry: bool,
    pub(crate) runtime_id: String,
    pub(crate) clock: Clock,
    pub(crate) id_generator: Arc<dyn IdGenerator>,
    pub(crate) integration_name: Option<String>,
    pub(crate) integration_version: Option<String>,
    pub(crate) shutdown_timeout: Duration,
}

impl std::fmt::Debug for FinalizedTracerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinalizedTracerConfig")
            .field("trace_rules", &self.trace_rules)
            .field("trace_limit_per_second", &self.trace_limit_per_second)
            .field("span_rules", &self.span_rules)
            .field("injection_styles", &self.injection_styles)
            .field("extraction_styles", &self.extraction_styles)
            .field("hostname", &self.hostname)
            .field("max_tags_header_size", &self.max_tags_header_size)
            .field("log_on_startup", &self.log_on_startup)
            .field("trace_id_128_bit", &self.trace_id_128_bit)
            .field("report_traces", &self.report_traces)
            .field("report_telemetry", &self.report_telemetry)
            .field("runtime_id", &self.runtime_id)
            .field("integration_name", &self.integration_name)
            .field("integration_version", &self.integration_version)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish_non_exhaustive()
    }
}

impl FinalizedTracerConfig {
    /// The defaults every span starts from.
    pub fn defaults(&self) -> &SpanDefaults {
        &self.defaults
    }

    pub fn trace_rule_count(&self) -> usize {
        self.trace_rules.len()
    }

    pub fn span_rule_count(&self) -> usize {
        self.span_rules.len()
    }

    pub(crate) fn trace_rule_rate(&self, index: usize) -> Option<f64> {
        self.trace_rules.get(index).map(|rule| rule.rate.value())
    }
}

/// Validate `config` against itself and the environment.
pub fn finalize_config(config: TracerConfig) -> Result<FinalizedTracerConfig, Error> {
    let clock = config.clock.clone().unwrap_or_else(default_clock);
    finalize_config_with_clock(config, clock)
}

/// [`finalize_config`] with an explicit time source.
pub fn finalize_config_with_clock(
    config: TracerConfig,
    clock: Clock,
) -> Result<FinalizedTracerConfig, Error> {
    let logger: Arc<dyn Logger> = config
        .logger
        .clone()
        .unwrap_or_else(|| Arc::new(DefaultLogger));

    // Span defaults, with DD_SERVICE / DD_ENV / DD_VERSION / DD_TAGS
    // overrides.
    let mut service = config.service.clone().unwrap_or_default();
    if let Some(value) = env::lookup(env::DD_SERVICE) {
        service = value;
    }
    if service.is_empty() {
        return Err(Error::new(
            Code::ServiceNameRequired,
            "a service name is required: set TracerConfig::service or the DD_SERVICE \
             environment variable",
        ));
    }

    let mut environment = config.environment.clone().unwrap_or_default();
    if let Some(value) = env::lookup(env::DD_ENV) {
        environment = value;
    }
    let mut version = config.version.clone().unwrap_or_default();
    if let Some(value) = env::lookup(env::DD_VERSION) {
        version = value;
    }
    let mut default_tags = config.tags.clone().unwrap_or_default();
    if let Some(value) = env::lookup(env::DD_TAGS) {
        default_tags = env::parse_tags(&value)
            .map_err(|error| error.with_prefix("While parsing DD_TAGS: "))?;
    }

    let defaults = SpanDefaults {
        service,
        service_type: config.service_type.clone().unwrap_or_default(),
        name: config.name.clone().unwrap_or_default(),
        environment,
        version,
        tags: default_tags,
    };

    // Agent address: DD_TRACE_AGENT_URL wins, else DD_AGENT_HOST and
    // DD_TRACE_AGENT_PORT compose an http URL, else whatever is configured.
    let mut agent = config.agent.clone();
    if let Some(url) = env::lookup(env::DD_TRACE_AGENT_URL) {
        agent.url = url;
    } else {
        let host = env::lookup(env::DD_AGENT_HOST);
        let port = env::lookup(env::DD_TRACE_AGENT_PORT);
        if host.is_some() || port.is_some() {
            let port = match port {
                Some(text) => {
                    let number = env::parse_integer(&text).map_err(|error| {
                        error.with_prefix("While parsing DD_TRACE_AGENT_PORT: ")
                    })?;
                    if !(1..=65_535).contains(&number) {
                        return Err(Error::new(
                            Code::InvalidInteger,
                            format!("DD_TRACE_AGENT_PORT {} is not a valid port", number),
                        ));
                    }
                    number
                }
                None => 8126,
            };
            agent.url = format!(
                "http://{}:{}",
                host.unwrap_or_else(|| "localhost".to_string()),
                port
            );
        }
    }

    // Booleans.
    let report_traces = match env::lookup(env::DD_TRACE_ENABLED) {
        Some(value) => env::parse_bool(&value),
        None => config.report_traces.unwrap_or(true),
    };
    let log_on_startup = match env::lookup(env::DD_TRACE_STARTUP_LOGS) {
        Some(value) => env::parse_bool(&value),
        None => config.log_on_startup.unwrap_or(true),
    };
    let trace_id_128_bit = match env::lookup(env::DD_TRACE_128_BIT_TRACEID_GENERATION_ENABLED) {
        Some(value) => env::parse_bool(&value),
        None => config.trace_id_128_bit.unwrap_or(false),
    };
    let report_telemetry = match env::lookup(env::DD_INSTRUMENTATION_TELEMETRY_ENABLED) {
        Some(value) => env::parse_bool(&value),
        None => config.report_telemetry.unwrap_or(true),
    };

    // Trace sampling.
    let mut trace_rules = match env::lookup(env::DD_TRACE_SAMPLING_RULES) {
        Some(json) => rules::parse_trace_rules(&json)
            .map_err(|error| error.with_prefix("While parsing DD_TRACE_SAMPLING_RULES: "))?,
        None => {
            let mut parsed = Vec::with_capacity(config.trace_sampler.rules.len());
            for rule in &config.trace_sampler.rules {
                parsed.push(TraceRule {
                    matcher: rule.matcher.clone(),
                    rate: Rate::try_new(rule.sample_rate)?,
                });
            }
            parsed
        }
    };

    let sample_rate = match env::lookup(env::DD_TRACE_SAMPLE_RATE) {
        Some(text) => {
            let number = env::parse_double(&text)
                .map_err(|error| error.with_prefix("While parsing DD_TRACE_SAMPLE_RATE: "))?;
            Some(
                Rate::try_new(number)
                    .map_err(|error| error.with_prefix("While parsing DD_TRACE_SAMPLE_RATE: "))?,
            )
        }
        None => match config.trace_sampler.sample_rate {
            Some(number) => Some(Rate::try_new(number)?),
            None => None,
        },
    };
    if let Some(rate) = sample_rate {
        if trace_rules.is_empty() {
            trace_rules.push(TraceRule {
                matcher: SpanMatcher::default(),
                rate,
            });
        } else {
            logger.log_warning(
                "Both sampling rules and a trace sample rate are configured; the rules take \
                 precedence and the sample rate is ignored.",
            );
        }
    }

    let trace_limit_per_second = match env::lookup(env::DD_TRACE_RATE_LIMIT) {
        Some(text) => Some(
            env::parse_double(&text)
                .map_err(|error| error.with_prefix("While parsing DD_TRACE_RATE_LIMIT: "))?,
        ),
        None => config.trace_sampler.max_per_second,
    };
    let trace_limit_per_second = match trace_limit_per_second {
        Some(limit) => {
            if !limit.is_finite() || limit <= 0.0 {
                return Err(Error::new(
                    Code::MaxPerSecondOutOfRange,
                    format!("trace rate limit must be greater than zero, but got {}", limit),
                ));
            }
            limit
        }
        None => DEFAULT_TRACE_LIMIT_PER_SECOND,
    };

    // Span sampling.
    let span_rules = match env::lookup(env::DD_SPAN_SAMPLING_RULES) {
        Some(json) => {
            if env::lookup(env::DD_SPAN_SAMPLING_RULES_FILE).is_some() {
                logger.log_warning(
                    "Ignoring DD_SPAN_SAMPLING_RULES_FILE because DD_SPAN_SAMPLING_RULES is \
                     also set.",
                );
            }
            rules::parse_span_rules(&json)
                .map_err(|error| error.with_prefix("While parsing DD_SPAN_SAMPLING_RULES: "))?
        }
        None => match env::lookup(env::DD_SPAN_SAMPLING_RULES_FILE) {
            Some(path) => {
                let json = std::fs::read_to_string(&path).map_err(|io_error| {
                    Error::new(
                        Code::SpanSamplingRulesFileIo,
                        format!("unable to read {:?}: {}", path, io_error),
                    )
                })?;
                rules::parse_span_rules(&json).map_err(|error| {
                    error.with_prefix(&format!("With DD_SPAN_SAMPLING_RULES_FILE={}: ", path))
                })?
            }
            None => {
                let mut parsed = Vec::with_capacity(config.span_sampler.rules.len());
                for rule in &config.span_sampler.rules {
                    if let Some(limit) = rule.max_per_second {
                        if !limit.is_finite() || limit <= 0.0 {
                            return Err(Error::new(
                                Code::MaxPerSecondOutOfRange,
                                format!(
                                    "span rule max_per_second must be greater than zero, but \
                                     got {}",
                                    limit
                                ),
                            ));
                        }
                    }
                    parsed.push(SpanRule {
                        matcher: rule.matcher.clone(),
                        rate: Rate::try_new(rule.sample_rate)?,
                        max_per_second: rule.max_per_second,
                    });
                }
                parsed
            }
        },
    };

    // Propagation styles: the specific variable wins over the shared one,
    // which wins over the configured value.
    let both_styles = match env::lookup(env::DD_TRACE_PROPAGATION_STYLE) {
        Some(text) => Some(
            env::parse_styles(&text)
                .map_err(|error| error.with_prefix("While parsing DD_TRACE_PROPAGATION_STYLE: "))?,
        ),
        None => None,
    };
    let injection_styles = match env::lookup(env::DD_PROPAGATION_STYLE_INJECT) {
        Some(text) => env::parse_styles(&text)
            .map_err(|error| error.with_prefix("While parsing DD_PROPAGATION_STYLE_INJECT: "))?,
        None => both_styles
            .clone()
            .or_else(|| config.injection_styles.clone())
            .unwrap_or_else(default_styles),
    };
    if injection_styles.is_empty() {
        return Err(Error::new(
            Code::MissingSpanInjectionStyle,
            "at least one injection propagation style is required",
        ));
    }
    let extraction_styles = match env::lookup(env::DD_PROPAGATION_STYLE_EXTRACT) {
        Some(text) => env::parse_styles(&text)
            .map_err(|error| error.with_prefix("While parsing DD_PROPAGATION_STYLE_EXTRACT: "))?,
        None => both_styles
            .or_else(|| config.extraction_styles.clone())
            .unwrap_or_else(default_styles),
    };
    if extraction_styles.is_empty() {
        return Err(Error::new(
            Code::MissingSpanExtractionStyle,
            "at least one extraction propagation style is required",
        ));
    }

    let hostname = if config.report_hostname.unwrap_or(false) {
        system_hostname()
    } else {
        None
    };

    let collector = match config.collector.clone() {
        Some(custom) => CollectorChoice::Custom(custom),
        None => CollectorChoice::Agent(finalize_agent_config(&agent)?),
    };

    Ok(FinalizedTracerConfig {
        defaults,
        collector,
        trace_rules,
        trace_limit_per_second,
        span_rules,
        injection_styles,
        extraction_styles,
        hostname,
        max_tags_header_size: config
            .max_tags_header_size
            .unwrap_or(DEFAULT_TAGS_HEADER_MAX_SIZE),
        logger,
        log_on_startup,
        trace_id_128_bit,
        report_traces,
        report_telemetry,
        runtime_id: config
            .runtime_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        clock,
        id_generator: config
            .id_generator
            .clone()
            .unwrap_or_else(|| Arc::new(RandomIdGenerator { trace_id_128_bit })),
        integration_name: config.integration_name.clone(),
        integration_version: config.integration_version.clone(),
        shutdown_timeout: Duration::from_millis(agent.shutdown_timeout_milliseconds),
    })
}

fn default_styles() -> Vec<PropagationStyle> {
    vec![PropagationStyle::Datadog, PropagationStyle::TraceContext]
}

fn system_hostname() -> Option<String> {
    nix::unistd::gethostname()
        .ok()
        .and_then(|hostname| hostname.into_string().ok())
        .filter(|hostname| !hostname.is_empty())
}
