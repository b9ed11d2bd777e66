//! Post-processing of completed records: duplicate-response marking, the
//! total sort order, internal-field stripping, the status-code summary table,
//! and the JSON report sink.

use std::collections::{BTreeMap, HashSet};
use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::records::Record;

/// Externally exposed record shape with internal-only fields (sequence id,
/// proxy, transport, captured headers) stripped. Field names are stable.
#[derive(Clone, Debug, Serialize)]
pub struct ReportRecord {
    pub id: String,
    pub url: String,
    pub method: String,
    pub headers: Vec<String>,
    pub body: Option<String>,
    pub user_agent: String,
    pub command: String,
    pub code: i32,
    pub length: usize,
}

impl ReportRecord {
    fn from_record(record: &Record) -> Self {
        Self {
            id: record.test_id.clone(),
            url: record.url.clone(),
            method: record.method.clone(),
            headers: record.headers.clone(),
            body: record.body.clone(),
            user_agent: record.user_agent.clone(),
            command: record.command.clone(),
            code: record.code,
            length: record.length,
        }
    }
}

/// Total, stable order: ascending status code, then descending content
/// length, then ascending sequence id as the tie-break.
pub fn sort_records(records: &mut [Record]) {
    records.sort_by(|a, b| {
        a.code
            .cmp(&b.code)
            .then(b.length.cmp(&a.length))
            .then(a.sequence.cmp(&b.sequence))
    });
}

fn label_of(test_id: &str) -> &str {
    test_id.split_once('-').map(|(_, l)| l).unwrap_or(test_id)
}

/// Stress-mode duplicate marking: all but the first record sharing
/// (status, length, test label) are forced to -2.
pub fn mark_duplicates(records: &mut [Record]) {
    let mut seen: HashSet<String> = HashSet::new();
    for record in records.iter_mut() {
        let key = format!(
            "{}-{}-{}",
            record.code,
            record.length,
            label_of(&record.test_id)
        );
        if !seen.insert(key) {
            record.code = -2;
        }
    }
}

/// Builds the externally exposed result list: only anomalies worth reading
/// (2xx and 3xx) survive; everything else stays summary-table-only.
pub fn build_report(records: &[Record]) -> Vec<ReportRecord> {
    records
        .iter()
        .filter(|r| r.code >= 200 && r.code < 400)
        .map(ReportRecord::from_record)
        .collect()
}

/// Prints surviving records as colored JSON objects, green for success and
/// yellow for redirects. Other status classes are suppressed from verbose
/// output by design.
pub fn print_report(records: &[ReportRecord]) {
    for record in records {
        let rendered = serde_json::to_string_pretty(record)
            .unwrap_or_else(|_| format!("{:?}", record.id));
        if record.code >= 300 {
            println!("{}", rendered.yellow());
        } else {
            println!("{}", rendered.green());
        }
    }
}

/// Counts per status code plus the special buckets Errors (0), Ignored (-1),
/// and Duplicates (-2).
pub struct SummaryTable {
    rows: BTreeMap<i32, usize>,
}

impl SummaryTable {
    pub fn new(records: &[Record]) -> Self {
        let mut rows: BTreeMap<i32, usize> = BTreeMap::new();
        for record in records {
            *rows.entry(record.code).or_insert(0) += 1;
        }
        Self { rows }
    }

    pub fn count(&self, code: i32) -> usize {
        self.rows.get(&code).copied().unwrap_or(0)
    }

    fn label(code: i32) -> String {
        match code {
            0 => "Errors".to_string(),
            -1 => "Ignored".to_string(),
            -2 => "Duplicates".to_string(),
            _ => code.to_string(),
        }
    }

    fn colorize(code: i32, text: String) -> String {
        if code >= 500 {
            text.cyan().to_string()
        } else if code >= 400 {
            text.red().to_string()
        } else if code >= 300 {
            text.yellow().to_string()
        } else if code >= 200 {
            text.green().to_string()
        } else {
            text.white().to_string()
        }
    }

    pub fn print(&self) {
        if self.rows.is_empty() {
            return;
        }
        let width = self
            .rows
            .keys()
            .map(|code| Self::label(*code).len())
            .chain(["Code".len()].into_iter())
            .max()
            .unwrap_or(4);
        let separator = format!("+-{}-+-------+", "-".repeat(width));
        println!("{separator}");
        println!("| {:<width$} | Count |", "Code");
        println!("{separator}");
        for (code, count) in &self.rows {
            let line = format!("| {:<width$} | {:<5} |", Self::label(*code), count);
            println!("{}", Self::colorize(*code, line));
        }
        println!("{separator}");
    }
}

pub fn render_json(records: &[ReportRecord]) -> String {
    serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string())
}

/// Persists the report. An existing file requires interactive confirmation
/// before being overwritten.
pub fn save_report(records: &[ReportRecord], path: &str) {
    if std::path::Path::new(path).exists() {
        println!("'{path}' already exists");
        print!("Overwrite the output file (yes): ");
        let _ = std::io::stdout().flush();
        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err() {
            return;
        }
        if answer.trim().to_lowercase() != "yes" {
            return;
        }
    }
    match std::fs::write(path, render_json(records)) {
        Ok(()) => println!("Results have been saved to '{path}'"),
        Err(_) => println!("Cannot save results to '{path}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Transport;

    fn record(sequence: usize, label: &str, code: i32, length: usize) -> Record {
        Record {
            sequence,
            test_id: format!("{sequence}-{label}"),
            url: "https://example.com/admin".to_string(),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            user_agent: "gatecrasher/test".to_string(),
            proxy: Some("http://127.0.0.1:8080".to_string()),
            transport: Transport::Curl,
            command: String::new(),
            code,
            length,
            response_headers: None,
        }
    }

    #[test]
    fn sort_orders_by_code_then_length_desc_then_sequence() {
        let mut records = vec![
            record(1, "T", 200, 50),
            record(2, "T", 200, 100),
            record(3, "T", 404, 10),
        ];
        sort_records(&mut records);
        let order: Vec<usize> = records.iter().map(|r| r.sequence).collect();
        assert_eq!(order, vec![2, 1, 3]);
    }

    #[test]
    fn sort_is_stable_via_sequence_tiebreak() {
        let mut records = vec![record(7, "T", 200, 50), record(3, "T", 200, 50)];
        sort_records(&mut records);
        let order: Vec<usize> = records.iter().map(|r| r.sequence).collect();
        assert_eq!(order, vec![3, 7]);
    }

    #[test]
    fn mark_duplicates_keys_on_code_length_and_label() {
        let mut records = vec![
            record(1, "STRESS-1", 200, 1234),
            record(2, "STRESS-1", 200, 1234),
            record(3, "STRESS-1", 200, 999),
            record(4, "OTHER-1", 200, 1234),
        ];
        mark_duplicates(&mut records);
        assert_eq!(records[0].code, 200);
        assert_eq!(records[1].code, -2);
        assert_eq!(records[2].code, 200);
        assert_eq!(records[3].code, 200);
    }

    #[test]
    fn report_keeps_success_and_redirect_records_only() {
        let records = vec![
            record(1, "T", 200, 10),
            record(2, "T", 302, 10),
            record(3, "T", 403, 10),
            record(4, "T", 0, 0),
            record(5, "T", -1, 10),
        ];
        let report = build_report(&records);
        let codes: Vec<i32> = report.iter().map(|r| r.code).collect();
        assert_eq!(codes, vec![200, 302]);
    }

    #[test]
    fn report_strips_internal_fields() {
        let report = build_report(&[record(1, "T", 200, 10)]);
        let json = render_json(&report);
        assert!(!json.contains("sequence"));
        assert!(!json.contains("proxy"));
        assert!(!json.contains("transport"));
        assert!(json.contains("\"id\": \"1-T\""));
        assert!(json.contains("\"command\""));
    }

    #[test]
    fn summary_table_buckets_special_codes() {
        let records = vec![
            record(1, "T", 200, 10),
            record(2, "T", 200, 10),
            record(3, "T", 0, 0),
            record(4, "T", -1, 10),
            record(5, "T", -2, 10),
        ];
        let table = SummaryTable::new(&records);
        assert_eq!(table.count(200), 2);
        assert_eq!(table.count(0), 1);
        assert_eq!(table.count(-1), 1);
        assert_eq!(table.count(-2), 1);
    }
}
