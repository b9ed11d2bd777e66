//! Process sender: one spawned curl per request. The process boundary gives
//! each attempt an isolated cookie store for free (`-b ""` turns the engine
//! on for the redirect chain only), and curl accepts the hostile URLs the
//! in-process parser refuses.

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::TransportError;
use crate::records::{Record, MAX_REDIRECTS};

use super::{Reply, Sender};

pub struct CurlSender {
    pub connect_timeout: u64,
    pub read_timeout: u64,
}

impl CurlSender {
    fn build_args(&self, record: &Record) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--connect-timeout".to_string(),
            self.connect_timeout.to_string(),
            "-m".to_string(),
            self.read_timeout.to_string(),
            "-i".to_string(),
            "-s".to_string(),
            "-k".to_string(),
            "-L".to_string(),
            "--max-redirs".to_string(),
            MAX_REDIRECTS.to_string(),
            "--path-as-is".to_string(),
            "-b".to_string(),
            String::new(),
        ];
        if let Some(body) = record.body.as_deref() {
            args.push("-d".to_string());
            args.push(body.to_string());
        }
        if let Some(proxy) = record.proxy.as_deref() {
            args.push("-x".to_string());
            args.push(proxy.to_string());
        }
        if !record.user_agent.is_empty() {
            args.push("-A".to_string());
            args.push(record.user_agent.clone());
        }
        for header in &record.headers {
            args.push("-H".to_string());
            args.push(header.clone());
        }
        if record.method == "HEAD" {
            args.push("--head".to_string());
        } else {
            args.push("-X".to_string());
            args.push(record.method.clone());
        }
        args.push(record.url.clone());
        args
    }
}

#[async_trait]
impl Sender for CurlSender {
    async fn send(&self, record: &Record) -> Result<Reply, TransportError> {
        let output = Command::new("curl")
            .args(self.build_args(record))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(TransportError::Spawn)?;
        if output.stdout.is_empty() {
            return Err(TransportError::CurlExit(
                output.status.code().unwrap_or(-1),
            ));
        }
        parse_output(&output.stdout)
    }
}

/// Parses `-i` output: one header block per hop in the redirect chain, then
/// the final body. The last block wins.
fn parse_output(stdout: &[u8]) -> Result<Reply, TransportError> {
    let mut rest = stdout;
    let mut code: u16 = 0;
    let mut headers: Vec<(String, String)> = Vec::new();
    while rest.starts_with(b"HTTP/") {
        let (block, remainder) = split_block(rest)?;
        let text = String::from_utf8_lossy(block);
        let mut lines = text.lines();
        let status_line = lines.next().unwrap_or("");
        code = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        headers = lines
            .filter_map(|line| {
                line.split_once(':')
                    .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
            })
            .collect();
        rest = remainder;
    }
    if code == 0 {
        return Err(TransportError::MalformedOutput);
    }
    Ok(Reply {
        code,
        length: rest.len(),
        headers,
        body: rest.to_vec(),
    })
}

fn split_block(data: &[u8]) -> Result<(&[u8], &[u8]), TransportError> {
    for (sep, len) in [(&b"\r\n\r\n"[..], 4), (&b"\n\n"[..], 2)] {
        if let Some(pos) = find_subslice(data, sep) {
            return Ok((&data[..pos], &data[pos + len..]));
        }
    }
    // header-only output (HEAD requests) has no separator at all
    Ok((data, &[]))
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
