// Main CLI entry point for counterfeit
// Uses clap for argument parsing

use clap::{Arg, ArgAction, ArgMatches, Command};
use counterfeit::config::AttackConfig;
use counterfeit::context::StopSignal;
use counterfeit::dictionary::{Charset, WordlistFile};
use counterfeit::models::{BaselineResponse, HttpMessage, Method, ParameterLocation};
use counterfeit::orchestrator::JwtScanner;
use counterfeit::probe::{substitute_cookie, substitute_params, HttpProbe};
use counterfeit::reporting::{export_csv, export_json, export_markdown, CollectingSink, FindingSink, LogSink, TeeSink};
use counterfeit::token::looks_like_jwt;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn parse_location(s: &str) -> Option<ParameterLocation> {
    match s.to_ascii_lowercase().as_str() {
        "bearer" => Some(ParameterLocation::BearerHeader),
        "header" => Some(ParameterLocation::Header),
        "cookie" => Some(ParameterLocation::Cookie),
        "query" => Some(ParameterLocation::Query),
        "body" => Some(ParameterLocation::Body),
        _ => None,
    }
}

/// "Name: value" -> (Name, value)
fn parse_header_arg(raw: &str) -> Option<(String, String)> {
    let (name, value) = raw.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

/// Put the token where `location` says it travels, returning the exact
/// parameter value the target sees.
fn place_token(message: &mut HttpMessage, param: &str, token: &str) -> String {
    match message.location() {
        ParameterLocation::BearerHeader => {
            let value = format!("Bearer {}", token);
            message.headers.insert("Authorization".to_string(), value.clone());
            value
        }
        ParameterLocation::Header => {
            message.headers.insert(param.to_string(), token.to_string());
            token.to_string()
        }
        ParameterLocation::Cookie => {
            let key = message.headers.keys().find(|k| k.eq_ignore_ascii_case("cookie")).cloned();
            let existing = key.and_then(|k| message.headers.remove(&k)).unwrap_or_default();
            message
                .headers
                .insert("Cookie".to_string(), substitute_cookie(&existing, param, token));
            token.to_string()
        }
        ParameterLocation::Query => {
            if let Ok(mut url) = reqwest::Url::parse(&message.url) {
                counterfeit::probe::substitute_query(&mut url, param, token);
                message.url = url.to_string();
            }
            token.to_string()
        }
        ParameterLocation::Body => {
            let mut body = message
                .body
                .take()
                .unwrap_or_else(|| Value::Object(Default::default()));
            if let Value::Object(map) = &mut body {
                if !map.contains_key(param) {
                    map.insert(param.to_string(), Value::String(token.to_string()));
                }
            }
            substitute_params(&mut body, param, token);
            message.body = Some(body);
            token.to_string()
        }
    }
}

/// Apply CLI overrides on top of the (file or default) configuration
fn build_config(matches: &ArgMatches) -> Result<AttackConfig, String> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => AttackConfig::load(path).map_err(|e| e.to_string())?,
        None => AttackConfig::default(),
    };
    if let Some(threads) = matches.get_one::<usize>("threads") {
        config.thread_count = *threads;
    }
    if let Some(max) = matches.get_one::<usize>("max_key_length") {
        config.hmac_max_key_length = *max;
    }
    if let Some(store) = matches.get_one::<String>("trust_store") {
        config.trust_store_path = Some(PathBuf::from(store));
    }
    if let Some(password) = matches.get_one::<String>("trust_store_password") {
        config.trust_store_password = Some(password.clone());
    }
    if let Some(wordlist) = matches.get_one::<String>("wordlist") {
        let mut file = config.dictionary.take().unwrap_or_default();
        file.path = PathBuf::from(wordlist);
        config.dictionary = Some(file);
    }
    if let Some(limit) = matches.get_one::<usize>("wordlist_limit") {
        let file = config.dictionary.get_or_insert_with(WordlistFile::default);
        file.limit = *limit;
    }
    if let Some(charset) = matches.get_one::<String>("wordlist_charset") {
        let file = config.dictionary.get_or_insert_with(WordlistFile::default);
        file.charset = charset.parse::<Charset>()?;
    }
    if matches.get_flag("no_client_checks") {
        config.ignore_client_configuration_scan = true;
    }
    if let Some(timeout) = matches.get_one::<u64>("request_timeout") {
        config.request_timeout_secs = *timeout;
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// Send the untouched request once so verdicts and cookie checks have something to compare against
async fn capture_baseline(probe: &HttpProbe, message: &HttpMessage, param: &str, value: &str) -> Option<BaselineResponse> {
    let (_, token) = value.split_once("Bearer ").unwrap_or(("", value));
    let req = match probe.build_request(message, param, token, value) {
        Ok(req) => req,
        Err(e) => {
            warn!("Unable to build baseline request: {}", e);
            return None;
        }
    };
    match req.send().await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            let headers = resp
                .headers()
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
                .collect();
            let body = resp.text().await.unwrap_or_default();
            info!("Baseline response: {} ({} bytes)", status, body.len());
            Some(BaselineResponse { status, headers, body })
        }
        Err(e) => {
            warn!("Baseline request failed, verdicts will rely on status codes only: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_args() {
        assert_eq!(
            parse_header_arg("X-Api-Key: abc: def"),
            Some(("X-Api-Key".to_string(), "abc: def".to_string()))
        );
        assert_eq!(parse_header_arg("no colon"), None);
        assert_eq!(parse_header_arg(": value"), None);
    }

    #[test]
    fn locations() {
        assert_eq!(parse_location("Bearer"), Some(ParameterLocation::BearerHeader));
        assert_eq!(parse_location("cookie"), Some(ParameterLocation::Cookie));
        assert_eq!(parse_location("path"), None);
    }

    #[test]
    fn token_placement() {
        let mut bearer = HttpMessage::new(Method::GET, "http://api.test/me", ParameterLocation::BearerHeader);
        assert_eq!(place_token(&mut bearer, "Authorization", "a.b.c"), "Bearer a.b.c");
        assert_eq!(bearer.headers["Authorization"], "Bearer a.b.c");

        let mut cookie = HttpMessage::new(Method::GET, "http://api.test/me", ParameterLocation::Cookie);
        cookie.headers.insert("Cookie".to_string(), "theme=dark".to_string());
        assert_eq!(place_token(&mut cookie, "jwt", "a.b.c"), "a.b.c");
        assert_eq!(cookie.headers["Cookie"], "theme=dark; jwt=a.b.c");

        let mut query = HttpMessage::new(Method::GET, "http://api.test/me", ParameterLocation::Query);
        place_token(&mut query, "token", "a.b.c");
        assert_eq!(query.url, "http://api.test/me?token=a.b.c");

        let mut body = HttpMessage::new(Method::POST, "http://api.test/me", ParameterLocation::Body);
        place_token(&mut body, "token", "a.b.c");
        assert_eq!(body.body.unwrap()["token"], "a.b.c");
    }
}

#[tokio::main]
async fn main() {
    let matches = Command::new("counterfeit")
        .version(clap::crate_version!())
        .about("Active JWT attack engine: forges tokens and checks whether the target accepts them")
        .after_help("EXAMPLES:\n  counterfeit --url https://api.test/me --token eyJ...\n  counterfeit -u https://api.test/me -t eyJ... --location cookie --param session --wordlist rockyou.txt\n  counterfeit -u https://api.test/me -t eyJ... --trust-store certs/ --json-report\n\nLog verbosity follows RUST_LOG (default: info).")
        .arg(Arg::new("url")
            .short('u')
            .long("url")
            .required(true)
            .num_args(1)
            .help("Target URL that consumes the token"))
        .arg(Arg::new("token")
            .short('t')
            .long("token")
            .required(true)
            .num_args(1)
            .help("A valid JWT for the target"))
        .arg(Arg::new("location")
            .short('l')
            .long("location")
            .num_args(1)
            .default_value("bearer")
            .help("Where the token travels: bearer, header, cookie, query or body"))
        .arg(Arg::new("param")
            .short('p')
            .long("param")
            .num_args(1)
            .default_value("Authorization")
            .help("Header, cookie, query or body field name carrying the token"))
        .arg(Arg::new("method")
            .short('X')
            .long("method")
            .num_args(1)
            .default_value("GET")
            .help("HTTP method of the request"))
        .arg(Arg::new("header")
            .short('H')
            .long("header")
            .num_args(1)
            .action(ArgAction::Append)
            .help("Extra request header, \"Name: value\" (repeatable)"))
        .arg(Arg::new("body")
            .long("body")
            .num_args(1)
            .help("JSON request body"))
        .arg(Arg::new("config")
            .short('c')
            .long("config")
            .num_args(1)
            .help("JSON attack configuration file"))
        .arg(Arg::new("threads")
            .long("threads")
            .num_args(1)
            .value_parser(clap::value_parser!(usize))
            .help("Verification worker count (default: 2)"))
        .arg(Arg::new("max_key_length")
            .long("max-key-length")
            .num_args(1)
            .value_parser(clap::value_parser!(usize))
            .help("Brute force secrets shorter than this (default: 26)"))
        .arg(Arg::new("wordlist")
            .short('w')
            .long("wordlist")
            .num_args(1)
            .help("Wordlist for HMAC secret recovery"))
        .arg(Arg::new("wordlist_limit")
            .long("wordlist-limit")
            .num_args(1)
            .value_parser(clap::value_parser!(usize))
            .help("Use at most this many wordlist entries"))
        .arg(Arg::new("wordlist_charset")
            .long("wordlist-charset")
            .num_args(1)
            .help("Wordlist encoding: UTF-8, ISO-8859-1 or US-ASCII (default: UTF-8)"))
        .arg(Arg::new("trust_store")
            .long("trust-store")
            .num_args(1)
            .help("PEM file, PEM directory or PKCS#12 bundle with the target's public keys"))
        .arg(Arg::new("trust_store_password")
            .long("trust-store-password")
            .num_args(1)
            .help("Password for a PKCS#12 trust store"))
        .arg(Arg::new("request_timeout")
            .long("request-timeout")
            .num_args(1)
            .value_parser(clap::value_parser!(u64))
            .help("Per-request timeout in seconds (default: 30)"))
        .arg(Arg::new("no_client_checks")
            .long("no-client-checks")
            .action(ArgAction::SetTrue)
            .help("Skip cookie flag and URL exposure checks"))
        .arg(Arg::new("csv_report")
            .long("csv-report")
            .action(ArgAction::SetTrue)
            .help("Output CSV report (default: on)"))
        .arg(Arg::new("markdown_report")
            .long("markdown-report")
            .action(ArgAction::SetTrue)
            .help("Output Markdown report (default: on)"))
        .arg(Arg::new("json_report")
            .long("json-report")
            .action(ArgAction::SetTrue)
            .help("Output JSON report (default: off)"))
        .get_matches();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let url = matches.get_one::<String>("url").expect("url is required");
    let token = matches.get_one::<String>("token").expect("token is required");
    let param = matches.get_one::<String>("param").expect("param has a default");
    let location_arg = matches.get_one::<String>("location").expect("location has a default");
    let method_arg = matches.get_one::<String>("method").expect("method has a default");
    let csv_report = matches.get_flag("csv_report") || (!matches.get_flag("markdown_report") && !matches.get_flag("json_report"));
    let markdown_report = matches.get_flag("markdown_report") || (!matches.get_flag("csv_report") && !matches.get_flag("json_report"));
    let json_report = matches.get_flag("json_report");

    let config = build_config(&matches).unwrap_or_else(|e| {
        error!("Invalid configuration: {}", e);
        std::process::exit(2);
    });
    let Some(location) = parse_location(location_arg) else {
        error!("Unsupported location: {}. Use bearer, header, cookie, query or body.", location_arg);
        std::process::exit(2);
    };
    let method: Method = method_arg.parse().unwrap_or_else(|e: String| {
        error!("{}", e);
        std::process::exit(2);
    });
    if !looks_like_jwt(token) {
        error!("The supplied token is not a compact JWS with an alg header");
        std::process::exit(2);
    }

    let mut message = HttpMessage::new(method, url.as_str(), location);
    for raw in matches.get_many::<String>("header").into_iter().flatten() {
        match parse_header_arg(raw) {
            Some((name, value)) => {
                message.headers.insert(name, value);
            }
            None => warn!("Ignoring malformed header: {}", raw),
        }
    }
    if let Some(body) = matches.get_one::<String>("body") {
        match serde_json::from_str::<Value>(body) {
            Ok(json) => message.body = Some(json),
            Err(e) => {
                error!("Request body is not valid JSON: {}", e);
                std::process::exit(2);
            }
        }
    }
    let param_value = place_token(&mut message, param, token);

    let probe = HttpProbe::new(config.request_timeout()).unwrap_or_else(|e| {
        error!("Unable to build HTTP client: {}", e);
        std::process::exit(1);
    });
    message.response = capture_baseline(&probe, &message, param, &param_value).await;

    // findings are logged as they are raised and collected for the reports
    let sink = Arc::new(CollectingSink::new());
    let sinks: Vec<Arc<dyn FindingSink>> = vec![Arc::new(LogSink), sink.clone()];
    let scanner = JwtScanner::new(Arc::new(probe), Arc::new(TeeSink::new(sinks)), config);

    let stop = StopSignal::new();
    let ctrl_c = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping attacks");
            ctrl_c.stop();
        }
    });

    info!("Attacking {} {} ({})", method, url, param);
    let forged = scanner
        .scan_parameter(Arc::new(message), param, &param_value, stop)
        .await;

    let findings = sink.findings();
    if forged {
        println!("[VULNERABLE] {} accepted a forged token", url);
    } else {
        println!("[SECURE] no forged token was accepted by {}", url);
    }
    for f in &findings {
        println!("  [{}] {} ({})", f.risk, f.name, f.confidence);
    }

    let exports: [(bool, fn(&[counterfeit::models::Finding]) -> Result<String, std::io::Error>); 3] =
        [(csv_report, export_csv), (markdown_report, export_markdown), (json_report, export_json)];
    for (enabled, export) in exports {
        if !enabled {
            continue;
        }
        match export(&findings) {
            Ok(file) => println!("Report written to {}", file),
            Err(e) => error!("Failed to write report: {}", e),
        }
    }
}
