use std::collections::HashSet;
use std::sync::Arc;

use indicatif::ProgressBar;

use crate::engine::{Engine, EngineConfig, Reply, ResponseFilters, Sender};
use crate::error::TransportError;
use crate::payloads;
use crate::records::{dedup, Record, RecordDefaults, RecordFactory, SequenceGenerator, Transport};
use crate::urls::ParsedUrl;

struct StubSender {
    code: u16,
    length: usize,
}

#[async_trait::async_trait]
impl Sender for StubSender {
    async fn send(&self, _record: &Record) -> Result<Reply, TransportError> {
        Ok(Reply {
            code: self.code,
            length: self.length,
            headers: Vec::new(),
            body: b"response body".to_vec(),
        })
    }
}

struct FailingSender;

#[async_trait::async_trait]
impl Sender for FailingSender {
    async fn send(&self, _record: &Record) -> Result<Reply, TransportError> {
        Err(TransportError::MalformedOutput)
    }
}

fn factory() -> RecordFactory {
    RecordFactory::new(
        SequenceGenerator::new(),
        RecordDefaults {
            method: "GET".to_string(),
            user_agents: vec!["gatecrasher/test".to_string()],
            proxy: None,
            transport: Transport::Curl,
            connect_timeout: 60,
            read_timeout: 60,
        },
    )
}

fn engine(sender: Arc<dyn Sender>, threads: usize, filters: ResponseFilters) -> Engine {
    Engine {
        curl: sender.clone(),
        library: sender,
        filters,
        config: EngineConfig {
            threads,
            sleep_ms: 0,
            debug: false,
        },
    }
}

fn parse(raw: &str, label: &str) -> ParsedUrl {
    ParsedUrl::parse(raw, label, false, false).unwrap()
}

#[test]
fn header_tests_cover_the_canonical_bypass_example() {
    // target https://example.com/admin with evil https://github.com must
    // produce an X-Original-URL: /admin rewrite and an X-Forwarded-Host
    // pointing at the evil host
    let target = parse("https://example.com/admin", "Inaccessible URL");
    let evil = parse("https://github.com", "Evil URL");

    let mut url_values = target.relative_paths.clone();
    url_values.extend(target.absolute_paths.clone());
    url_values.extend(payloads::all_values(&target, &evil, true, false));
    let url_headers = payloads::url_headers(&crate::utils::unique(url_values));
    assert!(url_headers.contains(&"X-Original-URL: /admin".to_string()));

    let ip_values = payloads::all_values(&target, &evil, false, false);
    let ip_headers = payloads::ip_headers(&ip_values);
    assert!(ip_headers.contains(&"X-Forwarded-Host: github.com".to_string()));
}

#[test]
fn dedup_collapses_records_differing_only_in_user_agent() {
    let one = RecordFactory::new(
        SequenceGenerator::new(),
        RecordDefaults {
            method: "GET".to_string(),
            user_agents: vec!["agent-one".to_string()],
            proxy: None,
            transport: Transport::Curl,
            connect_timeout: 60,
            read_timeout: 60,
        },
    );
    let two = RecordFactory::new(
        SequenceGenerator::new(),
        RecordDefaults {
            method: "GET".to_string(),
            user_agents: vec!["agent-two".to_string()],
            proxy: None,
            transport: Transport::Curl,
            connect_timeout: 60,
            read_timeout: 60,
        },
    );
    let urls = vec!["https://example.com:443/admin".to_string()];
    let headers = vec![vec!["X-Original-URL: /admin".to_string()]];
    let mut records = one.expand("HEADERS-2", &urls, &[], &headers, None, None);
    records.extend(two.expand("HEADERS-2", &urls, &[], &headers, None, None));
    assert_eq!(dedup(records).len(), 1);
}

#[tokio::test]
async fn executor_returns_every_record_exactly_once() {
    let f = factory();
    let urls: Vec<String> = (0..25)
        .map(|i| format!("https://example.com/admin/{i}"))
        .collect();
    let records = f.expand("PATHS-1", &urls, &[], &[], None, None);
    let expected: HashSet<usize> = records.iter().map(|r| r.sequence).collect();

    for width in [1, 4, 25] {
        let records = f.expand("PATHS-1", &urls, &[], &[], None, None);
        let e = engine(
            Arc::new(StubSender {
                code: 200,
                length: 10,
            }),
            width,
            ResponseFilters::default(),
        );
        let finished = e.run(records, &ProgressBar::hidden()).await;
        assert_eq!(finished.len(), 25);
        let sequences: HashSet<usize> = finished.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences.len(), 25);
        assert!(finished.iter().all(|r| r.code == 200 && r.length == 10));
    }
    assert_eq!(expected.len(), 25);
}

#[tokio::test]
async fn executor_contains_transport_failures_in_the_record() {
    let f = factory();
    let urls = vec!["https://example.com/admin".to_string()];
    let records = f.expand("BASE-1", &urls, &[], &[], None, None);
    let e = engine(Arc::new(FailingSender), 2, ResponseFilters::default());
    let finished = e.run(records, &ProgressBar::hidden()).await;
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].code, 0);
    assert_eq!(finished[0].length, 0);
}

#[tokio::test]
async fn executor_applies_the_content_length_filter() {
    let f = factory();
    let urls = vec!["https://example.com/admin".to_string()];
    let records = f.expand("BASE-1", &urls, &[], &[], None, None);
    let filters = ResponseFilters {
        content_lengths: vec![1234],
        ignore: None,
    };
    let e = engine(
        Arc::new(StubSender {
            code: 200,
            length: 1234,
        }),
        2,
        filters,
    );
    let finished = e.run(records, &ProgressBar::hidden()).await;
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].code, -1);
}

#[tokio::test]
async fn executor_ignore_regex_filters_matching_bodies() {
    let f = factory();
    let urls = vec!["https://example.com/admin".to_string()];
    let records = f.expand("BASE-1", &urls, &[], &[], None, None);
    let re = regex::RegexBuilder::new("RESPONSE BODY")
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .unwrap();
    let filters = ResponseFilters {
        content_lengths: Vec::new(),
        ignore: Some(Arc::new(re)),
    };
    let e = engine(
        Arc::new(StubSender {
            code: 200,
            length: 13,
        }),
        2,
        filters,
    );
    let finished = e.run(records, &ProgressBar::hidden()).await;
    assert_eq!(finished[0].code, -1);
}

#[tokio::test]
async fn probes_capture_headers_and_skip_filters() {
    struct HeaderSender;

    #[async_trait::async_trait]
    impl Sender for HeaderSender {
        async fn send(&self, _record: &Record) -> Result<Reply, TransportError> {
            Ok(Reply {
                code: 405,
                length: 0,
                headers: vec![("allow".to_string(), "GET, POST, OPTIONS".to_string())],
                body: Vec::new(),
            })
        }
    }

    let f = factory();
    let filters = ResponseFilters {
        content_lengths: vec![0],
        ignore: None,
    };
    let e = engine(Arc::new(HeaderSender), 1, filters);
    let record = e
        .probe(f.single("SYSTEM-0", "https://example.com/admin", "OPTIONS"))
        .await;
    // passthrough keeps the real status even though length 0 is ignored
    assert_eq!(record.code, 405);
    let headers = record.response_headers.unwrap();
    assert!(headers
        .iter()
        .any(|(k, v)| k == "allow" && v.contains("POST")));
}
