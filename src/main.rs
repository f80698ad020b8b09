use anyhow::{bail, Context, Result};
use clap::{App, Arg};
use dot_http_check::output::logger::LoggerSink;
use dot_http_check::output::write_records;
use dot_http_check::{ClientConfig, RunOptions, Runner, SpecParser};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use walkdir::WalkDir;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    let matches = App::new("dot-http-check")
        .version(VERSION)
        .about("Runs HTTP request specs and checks the responses")
        .arg(
            Arg::with_name("SPEC")
                .required(true)
                .multiple(true)
                .help("Spec files, or directories searched for *.http and *.rest files"),
        )
        .arg(
            Arg::with_name("IGNORE_HEADERS")
                .short("i")
                .long("ignore-headers")
                .help("Ignore headers when comparing responses"),
        )
        .arg(
            Arg::with_name("BASE_DIR")
                .short("d")
                .long("base-dir")
                .takes_value(true)
                .help("Directory that file references are resolved against [default: the spec's directory]"),
        )
        .arg(
            Arg::with_name("ACCEPT_INVALID_CERT")
                .short("k")
                .long("danger-accept-invalid-certs")
                .help("Controls the use of certificate validation."),
        )
        .arg(
            Arg::with_name("TIMEOUT")
                .short("t")
                .long("timeout")
                .takes_value(true)
                .validator(is_valid_timeout)
                .help("Request timeout in seconds"),
        )
        .arg(
            Arg::with_name("REPORT")
                .short("r")
                .long("report")
                .takes_value(true)
                .help("Write every outcome as a JSON line to this file"),
        )
        .arg(
            Arg::with_name("VERBOSE")
                .short("v")
                .long("verbose")
                .help("Log every request and comparison"),
        )
        .usage("dot-http-check [OPTIONS] <SPEC>...")
        .get_matches();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if matches.is_present("VERBOSE") {
            "debug"
        } else {
            "info"
        })
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let timeout = match matches.value_of("TIMEOUT") {
        Some(seconds) => Some(parse_timeout(seconds)?),
        None => None,
    };
    let runner = Runner::new(ClientConfig {
        ssl_check: !matches.is_present("ACCEPT_INVALID_CERT"),
        timeout,
    });
    let base_dir = matches.value_of("BASE_DIR").map(PathBuf::from);
    let ignore_headers = matches.is_present("IGNORE_HEADERS");
    let mut report = match matches.value_of("REPORT") {
        Some(path) => Some(BufWriter::new(
            File::create(path).with_context(|| format!("Failed creating report {}", path))?,
        )),
        None => None,
    };

    let mut specs = vec![];
    for path in matches.values_of("SPEC").into_iter().flatten() {
        specs.extend(discover(Path::new(path))?);
    }

    let mut parser = SpecParser::new();
    let mut failed = false;
    for spec in specs {
        info!("Running {}", spec.display());
        let source = fs::read_to_string(&spec)
            .with_context(|| format!("Failed reading {}", spec.display()))?;
        let requests = match parser.parse(&source) {
            Ok(requests) => requests,
            Err(e) => {
                error!("Failed parsing {}: {}", spec.display(), e);
                failed = true;
                continue;
            }
        };

        let options = RunOptions {
            ignore_headers,
            base_dir: base_dir
                .clone()
                .or_else(|| spec.parent().map(Path::to_path_buf))
                .unwrap_or_default(),
        };
        let report_of_spec = runner
            .run(&requests, &options, LoggerSink::new())?
            .into_report();

        info!(
            "{}: {} succeeded, {} failed",
            spec.display(),
            report_of_spec.successes.len(),
            report_of_spec.failures.len()
        );
        failed |= !report_of_spec.is_success();
        if let Some(writer) = report.as_mut() {
            write_records(writer, &report_of_spec)?;
        }
    }

    if let Some(mut writer) = report {
        writer.flush()?;
    }
    if failed {
        process::exit(1);
    }
    Ok(())
}

/// A file as given, or every `.http` and `.rest` file below a directory,
/// sorted by path.
fn discover(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut found = vec![];
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        let is_spec = entry
            .path()
            .extension()
            .map_or(false, |extension| extension == "http" || extension == "rest");
        if entry.file_type().is_file() && is_spec {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

fn parse_timeout(value: &str) -> Result<Duration> {
    let seconds: f64 = value.parse()?;
    if seconds <= 0.0 {
        bail!("The timeout must be a positive number of seconds");
    }
    Ok(Duration::try_from_secs_f64(seconds)?)
}

fn is_valid_timeout(value: String) -> std::result::Result<(), String> {
    parse_timeout(&value).map(|_| ()).map_err(|e| format!("Invalid timeout {}: {}", value, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts() {
        assert_eq!(parse_timeout("1.5").unwrap(), Duration::from_millis(1500));
        for value in &["0", "-1", "inf", "NaN", "1e300", "soon"] {
            assert!(parse_timeout(value).is_err(), "{}", value);
            assert!(is_valid_timeout(value.to_string()).is_err(), "{}", value);
        }
    }
}
