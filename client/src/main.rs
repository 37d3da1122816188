use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{arg, value_parser, ArgMatches, Command};
use log::{debug, LevelFilter};

use crate::api::{normalize_url, put_with_token, Api, HttpClient};

mod api;

const USAGE: [&str; 3] = [
    "This program sends POST or PUT request with payload and print the response.",
    "Parameters for POST request:  URL  file_with_payload",
    "Parameters for PUT  request:  URL  file_with_payload  login  password",
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Credentials {
    login: String,
    password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Invocation {
    url: String,
    file: PathBuf,
    credentials: Option<Credentials>,
    timeout: Option<Duration>,
    verbosity: u8,
}

fn cli() -> Command {
    Command::new("request-with-payload")
        .about("Send a payload file with POST, or with token-signed PUT when credentials are given, and print the response")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(arg!(<URL> "Target URL, http:// is assumed when no scheme is given"))
        // Options go before URL, so file and credentials may start with '-'.
        .arg(arg!(<FILE> "File with payload").allow_hyphen_values(true))
        .arg(
            arg!([LOGIN] "Login for PUT request")
                .requires("PASSWORD")
                .allow_hyphen_values(true),
        )
        .arg(arg!([PASSWORD] "Password for PUT request").allow_hyphen_values(true))
        .arg(
            arg!(--timeout <SECONDS> "Request timeout in seconds, requests never time out by default")
                .value_parser(value_parser!(u64).range(1..)),
        )
        .arg(arg!(-v --verbose ... "Log more details to stderr"))
}

impl Invocation {
    fn from_matches(matches: &ArgMatches) -> Self {
        let string = |id: &str| matches.get_one::<String>(id).cloned();

        let credentials = match (string("LOGIN"), string("PASSWORD")) {
            (Some(login), Some(password)) => Some(Credentials { login, password }),
            _ => None,
        };

        Self {
            url: string("URL").unwrap_or_default(),
            file: string("FILE").map(PathBuf::from).unwrap_or_default(),
            credentials,
            timeout: matches
                .get_one::<u64>("timeout")
                .map(|secs| Duration::from_secs(*secs)),
            verbosity: matches.get_count("verbose"),
        }
    }
}

fn parse_args<I, T>(args: I) -> Result<Invocation, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = cli().try_get_matches_from(args)?;
    Ok(Invocation::from_matches(&matches))
}

/// Wrong positional count, as opposed to help, version or a malformed option.
fn is_usage_error(err: &clap::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::MissingRequiredArgument | ErrorKind::UnknownArgument
    )
}

fn print_usage() {
    eprintln!("Incorrect parameters!");
    for line in USAGE {
        println!("{line}");
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();
}

fn send(invocation: &Invocation, api: &impl Api) -> Result<String> {
    let payload = std::fs::read(&invocation.file)
        .with_context(|| format!("Unable to read payload file {:?}", invocation.file))?;
    let url = normalize_url(&invocation.url);
    debug!("Payload: {} bytes, target: {url}", payload.len());

    let response = match &invocation.credentials {
        None => api.post(&url, payload)?,
        Some(Credentials { login, password }) => {
            put_with_token(api, &url, payload, login, password)?
        }
    };

    Ok(response)
}

fn main() -> Result<()> {
    let invocation = match parse_args(std::env::args_os()) {
        Ok(invocation) => invocation,
        Err(err) if is_usage_error(&err) => {
            print_usage();
            std::process::exit(1);
        }
        Err(err) => err.exit(),
    };

    init_logging(invocation.verbosity);

    let api = HttpClient::new(invocation.timeout)?;
    let response = send(&invocation, &api)?;

    println!("{response}");

    Ok(())
}
