use std::sync::Arc;
use std::time::Duration;

use clap::{error::ErrorKind, Parser};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use regex::{Regex, RegexBuilder};
use tokio::time::Instant;

use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::engine::client::LibrarySender;
use crate::engine::curl::CurlSender;
use crate::engine::{Engine, EngineConfig, ResponseFilters};
use crate::payloads::{self, auth};
use crate::records::{self, Record, RecordDefaults, RecordFactory, SequenceGenerator, Transport};
use crate::results::{self, SummaryTable};
use crate::urls::{self, ParsedUrl};
use crate::utils::{self, LengthSpec, TestKind};

fn print_banner() {
    const BANNER: &str = r#"
                __                              __
   ____ _____ _/ /____  _____________ ________/ /_  ___  _____
  / __ `/ __ `/ __/ _ \/ ___/ ___/ _ `/ ___/ __  \/ _ \/ ___/
 / /_/ / /_/ / /_/  __/ /__/ /  / /_/ (__  ) / / /  __/ /
 \__, /\__,_/\__/\___/\___/_/   \__,_/____/_/ /_/\___/_/
/____/
       v0.4.2 - HTTP 403 bypass probing tool
    "#;
    print!("{}", BANNER);
    println!();
}

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<10}: {}", label, value);
}

struct RunConfig {
    url: String,
    evil: String,
    tests: Vec<TestKind>,
    force: Option<String>,
    values: Vec<String>,
    accessible_paths: Vec<String>,
    ignore: Option<Regex>,
    content_lengths: Vec<LengthSpec>,
    request_timeout: u64,
    threads: usize,
    sleep: u64,
    user_agents: Vec<String>,
    proxy: Option<String>,
    transport: Transport,
    repeat: usize,
    out: Option<String>,
    ignore_query: bool,
    no_color: bool,
    debug: bool,
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let url = args
        .url
        .or(cfg.url)
        .ok_or_else(|| "Inaccessible URL is required (-u)".to_string())?;
    let evil = args
        .evil
        .or(cfg.evil)
        .unwrap_or_else(|| "https://github.com".to_string());
    let tests_raw = args
        .tests
        .or(cfg.tests)
        .ok_or_else(|| "tests selection is required (-t)".to_string())?;
    let tests = utils::parse_tests_csv(&tests_raw)?;

    let force = args.force.or(cfg.force).map(|m| m.to_uppercase());

    let values = match args.values.or(cfg.values) {
        Some(path) => utils::read_values_file(&config::expand_tilde_string(&path))?,
        None => Vec::new(),
    };

    let raw_paths: Vec<String> = if args.path.is_empty() {
        cfg.paths.unwrap_or_default()
    } else {
        args.path
    };
    let accessible_paths: Vec<String> = if raw_paths.is_empty() {
        ["/robots.txt", "/index.html", "/sitemap.xml", "/README.txt"]
            .into_iter()
            .map(String::from)
            .collect()
    } else {
        raw_paths
            .iter()
            .map(|p| urls::prepend_slash(&urls::collapse_slashes(p.trim())))
            .collect()
    };

    let ignore = match args.ignore.or(cfg.ignore) {
        Some(raw) => Some(
            RegexBuilder::new(&raw)
                .case_insensitive(true)
                .multi_line(true)
                .build()
                .map_err(|_| format!("Invalid RegEx: {raw}"))?,
        ),
        None => None,
    };
    let content_lengths = match args.content_lengths.or(cfg.content_lengths) {
        Some(raw) => utils::parse_content_lengths_csv(&raw)?,
        None => Vec::new(),
    };

    let request_timeout = args.request_timeout.or(cfg.request_timeout).unwrap_or(60);
    let threads = args.threads.or(cfg.threads).unwrap_or(5);
    let sleep = args.sleep.or(cfg.sleep).unwrap_or(0);
    let user_agents = utils::resolve_user_agents(args.user_agent.or(cfg.user_agent).as_deref());
    let proxy = args.proxy.or(cfg.proxy);
    let transport = match args.transport.or(cfg.transport) {
        Some(raw) => Transport::parse(&raw)
            .ok_or_else(|| format!("invalid transport '{raw}', expected 'curl' or 'library'"))?,
        None => Transport::Curl,
    };
    let repeat = args.repeat.or(cfg.repeat).unwrap_or(0);
    let out = args.out.or(cfg.out).map(|p| config::expand_tilde_string(&p));
    let ignore_query = args.ignore_query_string_and_fragment
        || cfg.ignore_query_string_and_fragment.unwrap_or(false);
    let no_color = args.no_color || cfg.no_color.unwrap_or(false);
    let debug = args.debug || cfg.debug.unwrap_or(false);

    Ok(RunConfig {
        url,
        evil,
        tests,
        force,
        values,
        accessible_paths,
        ignore,
        content_lengths,
        request_timeout,
        threads,
        sleep,
        user_agents,
        proxy,
        transport,
        repeat,
        out,
        ignore_query,
        no_color,
        debug,
    })
}

fn to_bundles(lines: Vec<String>) -> Vec<Vec<String>> {
    lines.into_iter().map(|line| vec![line]).collect()
}

fn allow_header_methods(headers: &[(String, String)]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for (key, value) in headers {
        if key.eq_ignore_ascii_case("allow") {
            for method in value.split(',') {
                let method = method.trim().to_uppercase();
                if !method.is_empty() && !out.contains(&method) {
                    out.push(method);
                }
            }
            break;
        }
    }
    out
}

/// Expands the selected test set into the flat record collection, mirroring
/// the catalog order: base, methods, overrides, headers, paths, encodings,
/// auths, redirects, parsers, stress.
fn prepare_collection(
    factory: &RecordFactory,
    run: &RunConfig,
    target: &ParsedUrl,
    evil: &ParsedUrl,
    accessible: Option<&str>,
    allowed_methods: &[String],
) -> Vec<Record> {
    let tests = &run.tests;
    let base = std::slice::from_ref(&target.base_url);
    let mut collection: Vec<Record> = Vec::new();

    if utils::requires(tests, &[TestKind::Base]) {
        // both schemes against both the domain and the resolved IP
        let mut base_urls = vec![target.https_url.clone(), target.http_url.clone()];
        base_urls.extend(target.ip_https_url.clone());
        base_urls.extend(target.ip_http_url.clone());
        collection.extend(factory.expand(
            "BASE-1",
            &utils::unique(base_urls),
            &[],
            &[],
            None,
            None,
        ));
    }

    if utils::requires(tests, &[TestKind::Methods]) {
        collection.extend(factory.expand("METHODS-1", base, allowed_methods, &[], None, None));
        collection.extend(factory.expand(
            "METHODS-2",
            base,
            allowed_methods,
            &[vec!["Content-Length: 0".to_string()]],
            None,
            None,
        ));
        // cross-site tracing; a reflected 'XSTH: XSTV' response header confirms it
        collection.extend(factory.expand(
            "METHODS-3",
            base,
            &["TRACE".to_string(), "TRACK".to_string()],
            &[vec!["XSTH: XSTV".to_string()]],
            None,
            None,
        ));
        // text file upload at every ancestor path; 'Content-Type;' expands to
        // an intentionally empty header
        collection.extend(factory.expand(
            "METHODS-4",
            &payloads::file_upload_urls(target, &["/pentest.txt"]),
            &["PUT".to_string()],
            &[
                vec!["Content-Type;".to_string()],
                vec!["Content-Type: text/plain".to_string()],
            ],
            Some("pentest"),
            None,
        ));
    }

    if utils::requires(tests, &[TestKind::MethodOverrides]) {
        collection.extend(factory.expand(
            "METHOD-OVERRIDES-1",
            base,
            allowed_methods,
            &to_bundles(payloads::method_override_headers()),
            None,
            None,
        ));
        collection.extend(factory.expand(
            "METHOD-OVERRIDES-2",
            &payloads::method_override_urls(target),
            allowed_methods,
            &[],
            None,
            None,
        ));
    }

    if utils::requires(tests, &[TestKind::SchemeOverrides]) {
        collection.extend(factory.expand(
            "SCHEME-OVERRIDES-1",
            std::slice::from_ref(&target.https_url),
            &[],
            &to_bundles(payloads::scheme_override_headers("http")),
            None,
            None,
        ));
        collection.extend(factory.expand(
            "SCHEME-OVERRIDES-2",
            std::slice::from_ref(&target.http_url),
            &[],
            &to_bundles(payloads::scheme_override_headers("https")),
            None,
            None,
        ));
    }

    if utils::requires(tests, &[TestKind::PortOverrides]) {
        collection.extend(factory.expand(
            "PORT-OVERRIDES-1",
            base,
            &[],
            &to_bundles(payloads::port_override_headers(target)),
            None,
            None,
        ));
    }

    if utils::requires(tests, &[TestKind::Headers]) {
        collection.extend(factory.expand(
            "HEADERS-1",
            base,
            &[],
            &to_bundles(vec![
                "Accept: application/json,text/javascript,*/*;q=0.01".to_string()
            ]),
            None,
            None,
        ));

        let mut url_values = target.relative_paths.clone();
        url_values.extend(target.absolute_paths.clone());
        url_values.extend(payloads::all_values(target, evil, true, false));
        collection.extend(factory.expand(
            "HEADERS-2",
            base,
            &[],
            &to_bundles(payloads::url_headers(&utils::unique(url_values))),
            None,
            None,
        ));

        let mut ip_values = payloads::all_values(target, evil, false, false);
        ip_values.extend(payloads::all_values(target, evil, false, true));
        collection.extend(factory.expand(
            "HEADERS-3",
            base,
            &[],
            &to_bundles(payloads::ip_headers(&utils::unique(ip_values))),
            None,
            None,
        ));

        collection.extend(factory.expand(
            "HEADERS-4",
            base,
            &[],
            &to_bundles(payloads::special_headers(target, evil)),
            None,
            None,
        ));

        if !run.values.is_empty() {
            collection.extend(factory.expand(
                "HEADERS-5",
                base,
                &[],
                &to_bundles(payloads::all_headers(&run.values)),
                None,
                None,
            ));
        }

        let mut override_paths = target.relative_paths.clone();
        override_paths.extend(target.absolute_paths.clone());
        let override_paths = utils::unique(override_paths);
        collection.extend(factory.expand(
            "HEADERS-6",
            std::slice::from_ref(&target.scheme_domain),
            &[],
            &to_bundles(payloads::url_headers(&override_paths)),
            None,
            None,
        ));
        if let Some(accessible) = accessible {
            collection.extend(factory.expand(
                "HEADERS-7",
                &[accessible.to_string()],
                &[],
                &to_bundles(payloads::url_headers(&override_paths)),
                None,
                None,
            ));
        }

        // duplicate Host lines must reach the wire verbatim; the process
        // sender passes raw -H lines through untouched
        let mut host_bundles = payloads::double_host_headers(target, evil, false);
        host_bundles.extend(payloads::double_host_headers(target, evil, true));
        collection.extend(factory.expand(
            "HEADERS-8",
            base,
            &[],
            &host_bundles,
            None,
            Some(Transport::Curl),
        ));
    }

    if utils::requires(tests, &[TestKind::Paths]) {
        collection.extend(factory.expand(
            "PATHS-1",
            &payloads::path_bypass_urls(target),
            &[],
            &[],
            None,
            None,
        ));
    }

    if utils::requires(tests, &[TestKind::Encodings]) {
        // hostile spellings only survive the process transport
        collection.extend(factory.expand(
            "ENCODINGS-1",
            &payloads::encoded_urls(target),
            &[],
            &[],
            None,
            Some(Transport::Curl),
        ));
    }

    if utils::requires(tests, &[TestKind::Auths]) {
        collection.extend(factory.expand(
            "AUTHS-1",
            base,
            &[],
            &to_bundles(auth::basic_auth_headers()),
            None,
            None,
        ));
        collection.extend(factory.expand(
            "AUTHS-2",
            base,
            &[],
            &to_bundles(auth::bearer_auth_headers(target, evil)),
            None,
            None,
        ));
    }

    if utils::requires(tests, &[TestKind::Redirects]) {
        collection.extend(factory.expand(
            "REDIRECTS-1",
            base,
            &[],
            &to_bundles(payloads::url_headers(&payloads::redirect_urls(
                target, evil, true, false,
            ))),
            None,
            None,
        ));
        let mut values = payloads::redirect_urls(target, evil, false, false);
        values.extend(payloads::redirect_urls(target, evil, false, true));
        collection.extend(factory.expand(
            "REDIRECTS-2",
            base,
            &[],
            &to_bundles(payloads::ip_headers(&utils::unique(values))),
            None,
            None,
        ));
    }

    if utils::requires(tests, &[TestKind::Parsers]) {
        collection.extend(factory.expand(
            "PARSERS-1",
            base,
            &[],
            &to_bundles(payloads::url_headers(&payloads::broken_urls(
                target, evil, true, false,
            ))),
            None,
            None,
        ));
        let mut values = payloads::broken_urls(target, evil, false, false);
        values.extend(payloads::broken_urls(target, evil, false, true));
        collection.extend(factory.expand(
            "PARSERS-2",
            base,
            &[],
            &to_bundles(payloads::ip_headers(&utils::unique(values))),
            None,
            None,
        ));
    }

    if run.repeat > 0 {
        for _ in 0..run.repeat {
            collection.extend(factory.expand("STRESS-1", base, &[], &[], None, None));
        }
    }

    collection
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    let now = Instant::now();

    let mut target = ParsedUrl::parse(&run.url, "Inaccessible URL", run.ignore_query, false)
        .map_err(|e| e.to_string())?;
    let mut evil = ParsedUrl::parse(&run.evil, "Evil URL", run.ignore_query, false)
        .map_err(|e| e.to_string())?;

    let needs_evil = utils::requires(
        &run.tests,
        &[
            TestKind::Headers,
            TestKind::Auths,
            TestKind::Redirects,
            TestKind::Parsers,
        ],
    );

    format_kv_line("Target", &target.base_url);
    if needs_evil {
        format_kv_line("Evil", &evil.base_url);
    }
    format_kv_line(
        "Tests",
        &run.tests
            .iter()
            .map(|t| t.label())
            .collect::<Vec<_>>()
            .join(","),
    );
    format_kv_line(
        "HTTP",
        &format!(
            "threads={} timeout={}s sleep={}ms transport={} proxy={}",
            run.threads,
            run.request_timeout,
            run.sleep,
            run.transport.label(),
            if run.proxy.is_some() { "on" } else { "off" },
        ),
    );
    println!();

    let default_method = run.force.clone().unwrap_or_else(|| "GET".to_string());
    let factory = RecordFactory::new(
        SequenceGenerator::new(),
        RecordDefaults {
            method: default_method.clone(),
            user_agents: run.user_agents.clone(),
            proxy: run.proxy.clone(),
            transport: run.transport,
            connect_timeout: run.request_timeout,
            read_timeout: run.request_timeout,
        },
    );

    let mut engine = Engine {
        curl: Arc::new(CurlSender {
            connect_timeout: run.request_timeout,
            read_timeout: run.request_timeout,
        }),
        library: Arc::new(LibrarySender {
            connect_timeout: run.request_timeout,
            read_timeout: run.request_timeout,
        }),
        filters: ResponseFilters {
            content_lengths: run
                .content_lengths
                .iter()
                .filter_map(|spec| match spec {
                    LengthSpec::Value(n) => Some(*n),
                    _ => None,
                })
                .collect(),
            ignore: run.ignore.clone().map(Arc::new),
        },
        config: EngineConfig {
            threads: run.threads,
            sleep_ms: run.sleep,
            debug: run.debug,
        },
    };

    println!(
        "{}",
        format!("Normalized inaccessible URL: {}", target.base_url).cyan()
    );
    println!(":: Validating the inaccessible URL using HTTP {default_method} method...");
    let baseline = engine
        .probe(factory.single("SYSTEM-0", &target.base_url, &default_method))
        .await;
    if baseline.code <= 0 {
        return Err("Cannot validate the inaccessible URL".to_string());
    }
    if run.content_lengths.contains(&LengthSpec::Base) {
        println!(
            "{}",
            format!(
                "Ignoring the inaccessible URL response content length: {}",
                baseline.length
            )
            .green()
        );
        engine.filters.content_lengths.push(baseline.length);
    }

    if needs_evil {
        println!("{}", format!("Normalized evil URL: {}", evil.base_url).cyan());
        println!(":: Validating the evil URL using HTTP GET method...");
        let evil_probe = engine
            .probe(factory.single("SYSTEM-0", &evil.base_url, "GET"))
            .await;
        if evil_probe.code <= 0 {
            return Err("Cannot validate the evil URL".to_string());
        }
    }

    println!(":: Fetching the IP of inaccessible URL...");
    target
        .resolve_ip()
        .await
        .map_err(|_| "Cannot fetch the IP of inaccessible URL".to_string())?;
    if needs_evil {
        println!(":: Fetching the IP of evil URL...");
        evil.resolve_ip()
            .await
            .map_err(|_| "Cannot fetch the IP of evil URL".to_string())?;
    }

    // only the first valid accessible URL is kept
    let mut accessible: Option<String> = None;
    if utils::requires(&run.tests, &[TestKind::Headers]) {
        println!(":: Validating the accessible URLs using HTTP GET method...");
        let candidates = urls::append_paths(
            &[target.scheme_domain.clone()],
            &run.accessible_paths,
        );
        for candidate in candidates {
            let record = engine
                .probe(factory.single("SYSTEM-0", &candidate, "GET"))
                .await;
            if record.code >= 200 && record.code < 400 {
                println!(
                    "{}",
                    format!("First valid accessible URL: {}", record.url).green()
                );
                if run.content_lengths.contains(&LengthSpec::Path) {
                    println!(
                        "{}",
                        format!(
                            "Ignoring the accessible URL response content length: {}",
                            record.length
                        )
                        .green()
                    );
                    engine.filters.content_lengths.push(record.length);
                }
                accessible = Some(record.url);
                break;
            }
        }
        if accessible.is_none() {
            println!(
                "{}",
                "No valid accessible URLs were found, moving on...".cyan()
            );
        }
    }

    let mut allowed_methods: Vec<String> = Vec::new();
    if let Some(force) = run.force.as_ref() {
        println!(
            "{}",
            format!("Forcing HTTP {force} method for all non-specific test cases...").cyan()
        );
        allowed_methods.push(force.clone());
    } else if utils::requires(&run.tests, &[TestKind::Methods, TestKind::MethodOverrides]) {
        println!(":: Fetching allowed HTTP methods...");
        let record = engine
            .probe(factory.single("SYSTEM-0", &target.base_url, "OPTIONS"))
            .await;
        if record.code > 0 {
            if let Some(headers) = record.response_headers.as_ref() {
                allowed_methods = allow_header_methods(headers);
            }
        }
        if allowed_methods.is_empty() {
            println!("{}", "Cannot fetch allowed HTTP methods, moving on...".cyan());
            allowed_methods = payloads::method_catalog();
        } else {
            println!(
                "{}",
                format!("Allowed HTTP methods: [{}]", allowed_methods.join(", ")).green()
            );
        }
    }

    println!(":: Preparing test records...");
    let collection = prepare_collection(
        &factory,
        &run,
        &target,
        &evil,
        accessible.as_deref(),
        &allowed_methods,
    );
    // stress records are intentionally identical and must survive dedup
    let (stress, normal): (Vec<Record>, Vec<Record>) = collection
        .into_iter()
        .partition(|r| r.test_id.ends_with("-STRESS-1"));
    let mut collection = records::dedup(normal);
    collection.extend(stress);

    if collection.is_empty() {
        println!("No test records were created");
        return Ok(());
    }
    println!(
        "{}",
        format!("Number of created test records: {}", collection.len()).cyan()
    );

    println!(
        ":: Running tests with the {} engine...",
        run.transport.label()
    );
    println!("Press CTRL + C to exit early - results will be saved");

    let pb = ProgressBar::new(collection.len() as u64);
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(200));
    pb.set_style(
        ProgressStyle::with_template(
            ":: Progress: [{pos}/{len}] :: {per_sec} :: Duration: [{elapsed_precise}] :: {msg}",
        )
        .map_err(|e| format!("failed to build progress bar style: {e}"))?
        .progress_chars(r#"#>-"#),
    );

    let mut finished = engine.run(collection, &pb).await;
    pb.finish_and_clear();

    println!(":: Validating results...");
    if run.repeat > 0 {
        finished.sort_by_key(|r| r.sequence);
        results::mark_duplicates(&mut finished);
    }

    let table = SummaryTable::new(&finished);
    results::sort_records(&mut finished);
    let report = results::build_report(&finished);
    results::print_report(&report);
    table.print();

    if let Some(out) = run.out.as_deref() {
        if !report.is_empty() {
            results::save_report(&report, out);
        }
    }

    println!("Script has finished in {}s", now.elapsed().as_secs());
    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{e}");
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    let cfg = match args.config.clone() {
        Some(path) => config::load_config(&config::expand_tilde(&path), false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg)?;
    if run.no_color {
        colored::control::set_override(false);
    }
    print_banner();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;
    rt.block_on(run_async(run))
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    fn parse(argv: &[&str]) -> CliArgs {
        CliArgs::parse_from(argv)
    }

    #[test]
    fn build_run_config_applies_defaults() {
        let args = parse(&["gatecrasher", "-u", "https://example.com/admin", "-t", "all"]);
        let run = build_run_config(args, ConfigFile::default()).unwrap();
        assert_eq!(run.evil, "https://github.com");
        assert_eq!(run.threads, 5);
        assert_eq!(run.request_timeout, 60);
        assert_eq!(run.transport, Transport::Curl);
        assert_eq!(
            run.accessible_paths,
            vec!["/robots.txt", "/index.html", "/sitemap.xml", "/README.txt"]
        );
    }

    #[test]
    fn build_run_config_requires_url_and_tests() {
        let args = parse(&["gatecrasher", "-t", "all"]);
        assert!(build_run_config(args, ConfigFile::default()).is_err());
        let args = parse(&["gatecrasher", "-u", "https://example.com/"]);
        assert!(build_run_config(args, ConfigFile::default()).is_err());
    }

    #[test]
    fn build_run_config_uppercases_forced_method() {
        let args = parse(&[
            "gatecrasher",
            "-u",
            "https://example.com/admin",
            "-t",
            "all",
            "-f",
            "post",
        ]);
        let run = build_run_config(args, ConfigFile::default()).unwrap();
        assert_eq!(run.force.as_deref(), Some("POST"));
    }

    #[test]
    fn build_run_config_rejects_bad_regex_and_transport() {
        let args = parse(&[
            "gatecrasher",
            "-u",
            "https://example.com/admin",
            "-t",
            "all",
            "-i",
            "(unclosed",
        ]);
        assert!(build_run_config(args, ConfigFile::default()).is_err());
        let args = parse(&[
            "gatecrasher",
            "-u",
            "https://example.com/admin",
            "-t",
            "all",
            "--transport",
            "telnet",
        ]);
        assert!(build_run_config(args, ConfigFile::default()).is_err());
    }

    #[test]
    fn cli_args_fall_back_to_config_file() {
        let args = parse(&["gatecrasher"]);
        let cfg = ConfigFile {
            url: Some("https://example.com/admin".to_string()),
            tests: Some("headers".to_string()),
            threads: Some(20),
            ..ConfigFile::default()
        };
        let run = build_run_config(args, cfg).unwrap();
        assert_eq!(run.url, "https://example.com/admin");
        assert_eq!(run.tests, vec![TestKind::Headers]);
        assert_eq!(run.threads, 20);
    }
}
