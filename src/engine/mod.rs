//! Bounded-concurrency execution: a fixed-width worker pool drains the record
//! collection through per-worker channels fed by a round-robin dispatcher,
//! fans completed records into a collector, and honors cooperative
//! cancellation at the dispatch boundary. Two interchangeable senders back
//! the pool; the transport is chosen per record.

pub mod client;
pub mod curl;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use colored::Colorize;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use indicatif::ProgressBar;
use regex::Regex;
use tokio::sync::{mpsc, Notify};
use tokio::task;

use crate::error::TransportError;
use crate::records::{Record, Transport};

/// What a sender hands back for a single attempt. The body is kept only long
/// enough to run the false-positive filter.
#[derive(Clone, Debug, Default)]
pub struct Reply {
    pub code: u16,
    pub length: usize,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait Sender: Send + Sync {
    async fn send(&self, record: &Record) -> Result<Reply, TransportError>;
}

/// False-positive suppression applied to every non-probe reply before it is
/// recorded: known "still blocked" body sizes and an optional body regex
/// (compiled case-insensitive and multi-line).
#[derive(Clone, Default)]
pub struct ResponseFilters {
    pub content_lengths: Vec<usize>,
    pub ignore: Option<Arc<Regex>>,
}

impl ResponseFilters {
    pub fn matches(&self, reply: &Reply) -> bool {
        if self.content_lengths.contains(&reply.length) {
            return true;
        }
        if let Some(re) = self.ignore.as_ref() {
            if re.is_match(&String::from_utf8_lossy(&reply.body)) {
                return true;
            }
        }
        false
    }
}

#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    pub threads: usize,
    pub sleep_ms: u64,
    pub debug: bool,
}

#[derive(Clone)]
pub struct Engine {
    pub curl: Arc<dyn Sender>,
    pub library: Arc<dyn Sender>,
    pub filters: ResponseFilters,
    pub config: EngineConfig,
}

impl Engine {
    /// Runs a single passthrough probe outside the pool: response headers are
    /// captured and the false-positive filter is skipped.
    pub async fn probe(&self, record: Record) -> Record {
        self.execute(record, true, None).await
    }

    /// Drains the full collection through the worker pool. Completion order is
    /// not guaranteed; every dispatched record yields exactly one output
    /// record. Ctrl-C stops dispatching new work, lets in-flight requests
    /// finish, and returns everything completed so far.
    pub async fn run(&self, records: Vec<Record>, pb: &ProgressBar) -> Vec<Record> {
        if records.is_empty() {
            return Vec::new();
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let cancel = Arc::new(Notify::new());
        {
            let cancelled = cancelled.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancelled.store(true, Ordering::SeqCst);
                    cancel.notify_waiters();
                }
            });
        }

        let worker_count = self.config.threads.max(1);
        let mut worker_txs = Vec::with_capacity(worker_count);
        let mut worker_rxs = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let (tx, rx) = mpsc::channel::<Record>(1024);
            worker_txs.push(tx);
            worker_rxs.push(rx);
        }
        let (result_tx, mut result_rx) = mpsc::channel::<Record>(1024);

        let dispatch_handle = tokio::spawn({
            let cancelled = cancelled.clone();
            let cancel = cancel.clone();
            async move {
                let mut idx = 0usize;
                for record in records {
                    if cancelled.load(Ordering::SeqCst) {
                        break;
                    }
                    let tx = worker_txs[idx % worker_txs.len()].clone();
                    tokio::select! {
                        _ = cancel.notified() => break,
                        sent = tx.send(record) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                    idx = idx.wrapping_add(1);
                }
            }
        });

        let workers = FuturesUnordered::new();
        for mut rx in worker_rxs {
            let engine = self.clone();
            let tx = result_tx.clone();
            let wpb = pb.clone();
            workers.push(task::spawn(async move {
                while let Some(record) = rx.recv().await {
                    wpb.set_message(record.test_id.clone());
                    let done = engine.execute(record, false, Some(&wpb)).await;
                    wpb.inc(1);
                    if tx.send(done).await.is_err() {
                        break;
                    }
                }
            }));
        }
        drop(result_tx);

        let collect_handle = task::spawn(async move {
            let mut out: Vec<Record> = Vec::new();
            while let Some(record) = result_rx.recv().await {
                out.push(record);
            }
            out
        });

        let _ = dispatch_handle.await;
        let _: Vec<_> = workers.collect().await;
        collect_handle.await.unwrap_or_default()
    }

    async fn execute(&self, mut record: Record, passthrough: bool, pb: Option<&ProgressBar>) -> Record {
        if self.config.sleep_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.sleep_ms)).await;
        }
        let sender = match record.transport {
            Transport::Curl => self.curl.clone(),
            Transport::Library => self.library.clone(),
        };
        match sender.send(&record).await {
            Ok(reply) => {
                record.code = i32::from(reply.code);
                record.length = reply.length;
                if passthrough {
                    record.response_headers = Some(reply.headers);
                } else if self.filters.matches(&reply) {
                    record.code = -1;
                }
            }
            Err(err) => self.log_failure(&record, &err, pb),
        }
        record
    }

    fn log_failure(&self, record: &Record, err: &TransportError, pb: Option<&ProgressBar>) {
        if !self.config.debug {
            return;
        }
        let context = format!("{}: {}", record.test_id, record.command)
            .yellow()
            .to_string();
        let error = err.to_string().cyan().to_string();
        match pb {
            Some(pb) => {
                pb.println(context);
                pb.println(error);
            }
            None => {
                println!("{context}");
                println!("{error}");
            }
        }
    }
}

/// Splits a raw header line into (name, value). A line like `Key;` denotes an
/// intentionally empty header value.
pub(crate) fn split_header_line(line: &str) -> Result<(String, String), TransportError> {
    if let Some((key, value)) = line.split_once(':') {
        let key = key.trim().trim_end_matches(';');
        if key.is_empty() {
            return Err(TransportError::InvalidHeader(line.to_string()));
        }
        return Ok((key.to_string(), value.trim().to_string()));
    }
    if let Some(key) = line.strip_suffix(';') {
        let key = key.trim();
        if !key.is_empty() {
            return Ok((key.to_string(), String::new()));
        }
    }
    Err(TransportError::InvalidHeader(line.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_header_line_handles_empty_value_marker() {
        assert_eq!(
            split_header_line("Content-Type: text/plain").unwrap(),
            ("Content-Type".to_string(), "text/plain".to_string())
        );
        assert_eq!(
            split_header_line("Content-Type;").unwrap(),
            ("Content-Type".to_string(), String::new())
        );
        assert_eq!(
            split_header_line("XSTH: XSTV").unwrap(),
            ("XSTH".to_string(), "XSTV".to_string())
        );
        assert!(split_header_line("not-a-header").is_err());
    }

    #[test]
    fn filters_match_on_length_or_body_regex() {
        let re = regex::RegexBuilder::new("access denied")
            .case_insensitive(true)
            .multi_line(true)
            .build()
            .unwrap();
        let filters = ResponseFilters {
            content_lengths: vec![42],
            ignore: Some(Arc::new(re)),
        };
        let by_length = Reply {
            code: 200,
            length: 42,
            ..Default::default()
        };
        assert!(filters.matches(&by_length));
        let by_body = Reply {
            code: 200,
            length: 7,
            body: b"<html>Access Denied</html>".to_vec(),
            ..Default::default()
        };
        assert!(filters.matches(&by_body));
        let clean = Reply {
            code: 200,
            length: 7,
            body: b"welcome".to_vec(),
            ..Default::default()
        };
        assert!(!filters.matches(&clean));
    }
}
