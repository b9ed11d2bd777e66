use std::collections::HashSet;

use rand::Rng;

pub const DEFAULT_USER_AGENT: &str = concat!("gatecrasher/", env!("CARGO_PKG_VERSION"));

// Small embedded catalog used by --user-agent random / random-all.
pub const USER_AGENT_CATALOG: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:95.0) Gecko/20100101 Firefox/95.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/115.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:102.0) Gecko/20100101 Firefox/102.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.5 Safari/605.1.15",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 16_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.5 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Mobile Safari/537.36",
    "curl/7.88.1",
    "Wget/1.21.3",
];

/// First-seen-order deduplication. Every derived list in the tool is a set
/// semantically but keeps insertion order for determinism.
pub fn unique(values: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    values.into_iter().filter(|v| seen.insert(v.clone())).collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestKind {
    Base,
    Methods,
    MethodOverrides,
    SchemeOverrides,
    PortOverrides,
    Headers,
    Paths,
    Encodings,
    Auths,
    Redirects,
    Parsers,
    All,
}

impl TestKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "base" => Some(Self::Base),
            "methods" => Some(Self::Methods),
            "method-overrides" => Some(Self::MethodOverrides),
            "scheme-overrides" => Some(Self::SchemeOverrides),
            "port-overrides" => Some(Self::PortOverrides),
            "headers" => Some(Self::Headers),
            "paths" => Some(Self::Paths),
            "encodings" => Some(Self::Encodings),
            "auths" => Some(Self::Auths),
            "redirects" => Some(Self::Redirects),
            "parsers" => Some(Self::Parsers),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Methods => "methods",
            Self::MethodOverrides => "method-overrides",
            Self::SchemeOverrides => "scheme-overrides",
            Self::PortOverrides => "port-overrides",
            Self::Headers => "headers",
            Self::Paths => "paths",
            Self::Encodings => "encodings",
            Self::Auths => "auths",
            Self::Redirects => "redirects",
            Self::Parsers => "parsers",
            Self::All => "all",
        }
    }
}

pub fn parse_tests_csv(value: &str) -> Result<Vec<TestKind>, String> {
    let mut out: Vec<TestKind> = Vec::new();
    for part in value.to_lowercase().split(',') {
        let item = part.trim();
        if item.is_empty() {
            continue;
        }
        let kind = TestKind::parse(item).ok_or_else(|| {
            "Supported tests are 'base', 'methods', '[method|scheme|port]-overrides', \
             'headers', 'paths', 'encodings', 'auths', 'redirects', 'parsers', or 'all'"
                .to_string()
        })?;
        if kind == TestKind::All {
            return Ok(vec![TestKind::All]);
        }
        if !out.contains(&kind) {
            out.push(kind);
        }
    }
    if out.is_empty() {
        return Err("tests list is empty".to_string());
    }
    Ok(out)
}

/// True when the selected set contains `all` or any of the wanted kinds.
pub fn requires(tests: &[TestKind], any_of: &[TestKind]) -> bool {
    tests
        .iter()
        .any(|t| *t == TestKind::All || any_of.contains(t))
}

/// A content-length filter entry. `base` and `path` are placeholders resolved
/// at run time from the baseline and accessible-path probe responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LengthSpec {
    Base,
    Path,
    Value(usize),
}

pub fn parse_content_lengths_csv(value: &str) -> Result<Vec<LengthSpec>, String> {
    let mut out: Vec<LengthSpec> = Vec::new();
    for part in value.to_lowercase().split(',') {
        let item = part.trim();
        if item.is_empty() {
            continue;
        }
        let spec = match item {
            "base" => LengthSpec::Base,
            "path" => LengthSpec::Path,
            _ => {
                let n: usize = item.parse().map_err(|_| {
                    "Content lengths must be either 'base', 'path', or numeric equal or greater than zero"
                        .to_string()
                })?;
                LengthSpec::Value(n)
            }
        };
        if !out.contains(&spec) {
            out.push(spec);
        }
    }
    Ok(out)
}

/// Resolves the --user-agent option into the pool used for record creation:
/// a fixed value, one random pick, or the whole embedded catalog.
pub fn resolve_user_agents(value: Option<&str>) -> Vec<String> {
    match value {
        None => vec![DEFAULT_USER_AGENT.to_string()],
        Some(raw) => match raw.to_lowercase().as_str() {
            "random-all" => USER_AGENT_CATALOG.iter().map(|s| s.to_string()).collect(),
            "random" => vec![pick_random(USER_AGENT_CATALOG).to_string()],
            _ => vec![raw.to_string()],
        },
    }
}

fn pick_random<'a>(pool: &'a [&'a str]) -> &'a str {
    let idx = rand::thread_rng().gen_range(0..pool.len());
    pool[idx]
}

/// Picks the user agent for a single record. Pools with more than one entry
/// yield a random member per record.
pub fn pick_user_agent(pool: &[String]) -> String {
    match pool.len() {
        0 => DEFAULT_USER_AGENT.to_string(),
        1 => pool[0].clone(),
        n => pool[rand::thread_rng().gen_range(0..n)].clone(),
    }
}

/// Reads an additional-values file: trimmed, empty lines dropped, duplicates
/// removed, first-seen order kept.
pub fn read_values_file(path: &str) -> Result<Vec<String>, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read values file '{path}': {e}"))?;
    let values = unique(
        contents
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect(),
    );
    if values.is_empty() {
        return Err("No additional values were found".to_string());
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_keeps_first_seen_order() {
        let out = unique(vec![
            "b".to_string(),
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
        ]);
        assert_eq!(out, vec!["b".to_string(), "a".to_string(), "c".to_string()]);
    }

    #[test]
    fn parse_tests_csv_collapses_all() {
        let out = parse_tests_csv("headers,ALL,paths").unwrap();
        assert_eq!(out, vec![TestKind::All]);
    }

    #[test]
    fn parse_tests_csv_dedupes_and_rejects_unknown() {
        let out = parse_tests_csv("headers, paths,headers").unwrap();
        assert_eq!(out, vec![TestKind::Headers, TestKind::Paths]);
        assert!(parse_tests_csv("bogus").is_err());
        assert!(parse_tests_csv(" , ,").is_err());
    }

    #[test]
    fn requires_honors_all() {
        assert!(requires(&[TestKind::All], &[TestKind::Auths]));
        assert!(requires(
            &[TestKind::Paths, TestKind::Auths],
            &[TestKind::Auths]
        ));
        assert!(!requires(&[TestKind::Paths], &[TestKind::Auths]));
    }

    #[test]
    fn parse_content_lengths_accepts_symbolic_entries() {
        let out = parse_content_lengths_csv("12,base,path,12").unwrap();
        assert_eq!(
            out,
            vec![LengthSpec::Value(12), LengthSpec::Base, LengthSpec::Path]
        );
        assert!(parse_content_lengths_csv("-5").is_err());
        assert!(parse_content_lengths_csv("abc").is_err());
    }

    #[test]
    fn user_agent_resolution_modes() {
        assert_eq!(
            resolve_user_agents(None),
            vec![DEFAULT_USER_AGENT.to_string()]
        );
        assert_eq!(
            resolve_user_agents(Some("curl/3.30.1")),
            vec!["curl/3.30.1".to_string()]
        );
        assert_eq!(resolve_user_agents(Some("random")).len(), 1);
        assert_eq!(
            resolve_user_agents(Some("random-all")).len(),
            USER_AGENT_CATALOG.len()
        );
    }
}
