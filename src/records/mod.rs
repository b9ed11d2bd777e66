//! Concrete test records: cartesian expansion of (label, urls, methods,
//! header bundles) tuples, reproduction-command rendering, and deduplication
//! of operationally identical probes.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use itertools::iproduct;
use regex::Regex;

use crate::utils;

pub const MAX_REDIRECTS: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transport {
    /// Spawned curl process, one per request.
    Curl,
    /// In-process reqwest client, one per request.
    Library,
}

impl Transport {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "curl" => Some(Self::Curl),
            "library" | "lib" => Some(Self::Library),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Curl => "curl",
            Self::Library => "library",
        }
    }
}

/// One concrete test attempt. Created once, mutated once by execution.
#[derive(Clone, Debug)]
pub struct Record {
    pub sequence: usize,
    pub test_id: String,
    pub url: String,
    pub method: String,
    /// raw header lines in send order; duplicate keys are representable
    pub headers: Vec<String>,
    pub body: Option<String>,
    pub user_agent: String,
    pub proxy: Option<String>,
    pub transport: Transport,
    /// built once at creation, never recomputed
    pub command: String,
    /// 0 = never completed, -1 = filtered false positive, -2 = duplicate
    /// response, >0 = real HTTP status
    pub code: i32,
    pub length: usize,
    /// captured only for passthrough probes
    pub response_headers: Option<Vec<(String, String)>>,
}

/// Monotonic sequence ids, owned by the orchestrator and shared by reference
/// with every factory.
#[derive(Debug, Default)]
pub struct SequenceGenerator(AtomicUsize);

impl SequenceGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(AtomicUsize::new(0)))
    }

    pub fn next(&self) -> usize {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Run-level defaults every record inherits.
#[derive(Clone, Debug)]
pub struct RecordDefaults {
    pub method: String,
    pub user_agents: Vec<String>,
    pub proxy: Option<String>,
    pub transport: Transport,
    pub connect_timeout: u64,
    pub read_timeout: u64,
}

pub struct RecordFactory {
    sequence: Arc<SequenceGenerator>,
    defaults: RecordDefaults,
}

impl RecordFactory {
    pub fn new(sequence: Arc<SequenceGenerator>, defaults: RecordDefaults) -> Self {
        Self { sequence, defaults }
    }

    /// Cartesian expansion of urls x methods x header bundles. An empty
    /// method list falls back to the default method; an empty bundle list
    /// expands urls x methods only.
    pub fn expand(
        &self,
        label: &str,
        urls: &[String],
        methods: &[String],
        headers: &[Vec<String>],
        body: Option<&str>,
        transport: Option<Transport>,
    ) -> Vec<Record> {
        let methods: Vec<String> = if methods.is_empty() {
            vec![self.defaults.method.clone()]
        } else {
            methods.to_vec()
        };
        let mut out = Vec::new();
        if headers.is_empty() {
            for (url, method) in iproduct!(urls, &methods) {
                out.push(self.record(label, url, method, &[], body, transport));
            }
        } else {
            for (url, method, bundle) in iproduct!(urls, &methods, headers) {
                out.push(self.record(label, url, method, bundle, body, transport));
            }
        }
        out
    }

    /// Single record, used for the validation and discovery probes.
    pub fn single(&self, label: &str, url: &str, method: &str) -> Record {
        self.record(label, url, method, &[], None, None)
    }

    fn record(
        &self,
        label: &str,
        url: &str,
        method: &str,
        headers: &[String],
        body: Option<&str>,
        transport: Option<Transport>,
    ) -> Record {
        let sequence = self.sequence.next();
        let user_agent = utils::pick_user_agent(&self.defaults.user_agents);
        let mut record = Record {
            sequence,
            test_id: format!("{sequence}-{label}"),
            url: url.to_string(),
            method: method.to_string(),
            headers: headers.to_vec(),
            body: body.map(|b| b.to_string()),
            user_agent,
            proxy: self.defaults.proxy.clone(),
            transport: transport.unwrap_or(self.defaults.transport),
            command: String::new(),
            code: 0,
            length: 0,
            response_headers: None,
        };
        record.command = build_command(
            &record,
            self.defaults.connect_timeout,
            self.defaults.read_timeout,
        );
        record
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "\\'"))
}

fn set_param(flag: &str, value: &str) -> String {
    format!("{flag} {}", quote(value))
}

/// Renders the byte-stable reproduction command: transport flags, body,
/// proxy, user agent, headers in original order, explicit method, URL.
pub fn build_command(record: &Record, connect_timeout: u64, read_timeout: u64) -> String {
    let mut parts: Vec<String> = vec![
        "curl".to_string(),
        format!("--connect-timeout {connect_timeout}"),
        format!("-m {read_timeout}"),
        "-iskL".to_string(),
        format!("--max-redirs {MAX_REDIRECTS}"),
        "--path-as-is".to_string(),
    ];
    if let Some(body) = record.body.as_deref() {
        parts.push(set_param("-d", body));
    }
    if let Some(proxy) = record.proxy.as_deref() {
        parts.push(set_param("-x", proxy));
    }
    if !record.user_agent.is_empty() {
        parts.push(set_param("-A", &record.user_agent));
    }
    for header in &record.headers {
        parts.push(set_param("-H", header));
    }
    parts.push(set_param("-X", &record.method));
    parts.push(quote(&record.url));
    parts.join(" ")
}

static UA_COMPONENT: OnceLock<Regex> = OnceLock::new();

fn dedup_key(record: &Record) -> String {
    let re = UA_COMPONENT
        .get_or_init(|| Regex::new(r" -A '.+?'").expect("user-agent mask pattern"));
    re.replace(&record.command, "").into_owned()
}

/// Drops records whose externally observable request is identical to one
/// already scheduled. The user agent is randomized per record and is masked
/// out of the key so it cannot defeat deduplication.
pub fn dedup(records: Vec<Record>) -> Vec<Record> {
    let mut seen: HashSet<String> = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(dedup_key(record)))
        .collect()
}
