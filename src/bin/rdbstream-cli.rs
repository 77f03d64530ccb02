//! rdbstream command line tool.
//!
//! Decodes an RDB dump from a file or stdin and prints its entries, verifies
//! its structure and checksum, or reports per-type and per-database counts.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use rdbstream::{
    init_logging, CountHandler, Decoder, Entry, KeyValue, LogFormat, Lzf, RdbError, Settings,
    StackError, StackResult, StatusCode, StreamingParser, Value,
};
use rdbstream_error::{ensure, LogLevel};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, error, info, warn};

/// Command line arguments.
#[derive(Parser)]
#[command(name = "rdbstream-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect and verify RDB dumps", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Settings file (TOML, YAML or JSON)
    #[arg(short, long, env = "RDBSTREAM_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Disable logging
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormat>,
    /// Skip footer checksum comparison
    #[arg(long, global = true)]
    no_verify_checksum: bool,
    /// Print failures as a JSON report on stderr
    #[arg(long, global = true)]
    json_errors: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every entry of the dump
    Dump {
        /// Dump file, `-` for stdin
        file: PathBuf,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
        /// Only keys of this database
        #[arg(long)]
        db: Option<u64>,
        /// Stop after this many keys
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Decode the whole dump and check its checksum
    Verify {
        /// Dump file, `-` for stdin
        file: PathBuf,
    },
    /// Count keys per type and database
    Stats {
        /// Dump file, `-` for stdin
        file: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum OutputFormat {
    /// One line per entry
    Text,
    /// One JSON object per line
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_errors = cli.json_errors;

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report_failure(&err, json_errors),
    }
}

fn run(cli: Cli) -> Result<()> {
    check_args(&cli.command)?;
    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(format) = cli.log_format {
        settings.logging.format = format;
    }
    if cli.no_verify_checksum {
        settings.decoder.verify_checksum = false;
    }
    let logging = settings.logging.clone().with_verbosity(cli.verbose, cli.quiet);
    init_logging(logging).map_err(|e| anyhow::anyhow!(e))?;
    debug!(?settings, "settings loaded");

    match cli.command {
        Commands::Dump {
            file,
            format,
            db,
            limit,
        } => dump(&file, &settings, format, db, limit),
        Commands::Verify { file } => verify(&file, &settings),
        Commands::Stats { file } => stats(&file, &settings),
    }
}

fn check_args(command: &Commands) -> StackResult<()> {
    if let Commands::Dump { limit, .. } = command {
        ensure!(
            *limit != Some(0),
            StatusCode::InvalidArgs,
            "--limit must be at least 1"
        );
    }
    Ok(())
}

fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if path == Path::new("-") {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

fn open_decoder(
    path: &Path,
    settings: &Settings,
) -> Result<Decoder<Box<dyn Read>>> {
    let reader = open_input(path)?;
    let decoder = Decoder::with_options(reader, settings.decoder, Lzf)
        .map_err(StackError::from)
        .with_context(|| format!("Failed to read header of {}", path.display()))?;
    info!(version = decoder.version(), path = %path.display(), "dump opened");
    Ok(decoder)
}

fn next_entry(decoder: &mut Decoder<Box<dyn Read>>) -> Result<Entry> {
    let offset = decoder.offset();
    let entry = decoder
        .next_entry()
        .map_err(|e| StackError::from(e).context_at(offset, "Failed to decode entry"))?;
    Ok(entry)
}

fn dump(
    path: &Path,
    settings: &Settings,
    format: OutputFormat,
    db: Option<u64>,
    limit: Option<usize>,
) -> Result<()> {
    let mut decoder = open_decoder(path, settings)?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut printed = 0usize;

    loop {
        if limit.is_some_and(|limit| printed >= limit) {
            break;
        }
        let entry = next_entry(&mut decoder)?;
        if entry.is_end() {
            break;
        }
        if let (Some(db), Entry::KeyValue(kv)) = (db, &entry) {
            if kv.db_index != db {
                continue;
            }
        }
        if entry.as_key_value().is_some() {
            printed += 1;
        }
        match format {
            OutputFormat::Text => writeln!(out, "{}", entry_to_text(&entry))?,
            OutputFormat::Json => writeln!(out, "{}", entry_to_json(&entry))?,
        }
    }

    out.flush()?;
    Ok(())
}

fn verify(
    path: &Path,
    settings: &Settings,
) -> Result<()> {
    let mut decoder = open_decoder(path, settings)?;
    let mut keys = 0u64;
    loop {
        let entry = next_entry(&mut decoder)?;
        match entry {
            Entry::EndOfStream => break,
            Entry::KeyValue(_) => keys += 1,
            _ => {}
        }
    }

    let checked = settings.decoder.verify_checksum && decoder.header().has_footer();
    println!(
        "OK version={} keys={} bytes={} checksum={:#018x}{}",
        decoder.version(),
        keys,
        decoder.offset(),
        decoder.checksum(),
        if checked { "" } else { " (not compared)" },
    );
    Ok(())
}

fn stats(
    path: &Path,
    settings: &Settings,
) -> Result<()> {
    let decoder = open_decoder(path, settings)?;
    let mut parser = StreamingParser::from_decoder(decoder);
    let mut counts = CountHandler::new();
    parser.parse(&mut counts)?;

    let report = json!({
        "counts": counts,
        "total_keys": counts.total_keys(),
        "parse": parser.stats(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn report_failure(
    err: &anyhow::Error,
    json_errors: bool,
) -> ExitCode {
    let Some(stack) = err.chain().find_map(|e| e.downcast_ref::<StackError>()) else {
        eprintln!("error: {err:#}");
        return ExitCode::FAILURE;
    };

    let code = stack.status_code();
    match stack.log_level() {
        LogLevel::Error => error!(%code, offset = stack.offset(), "{}", stack.log_message()),
        LogLevel::Warn => warn!(%code, offset = stack.offset(), "{}", stack.log_message()),
        _ => debug!(%code, offset = stack.offset(), "{}", stack.log_message()),
    }

    if json_errors {
        match serde_json::to_string(&stack.to_response()) {
            Ok(line) => eprintln!("{line}"),
            Err(_) => eprintln!("error: {err:#}"),
        }
    } else {
        eprintln!("error: {err:#}");
        if let Some(hint) = stack
            .downcast_ref::<RdbError>()
            .and_then(RdbError::recovery_hint)
        {
            eprintln!("hint: {hint}");
        }
    }

    ExitCode::from(u8::try_from(code.exit_code()).unwrap_or(1))
}

fn lossy(bytes: &Bytes) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn entry_to_text(entry: &Entry) -> String {
    match entry {
        Entry::SelectDb { index } => format!("SELECTDB {index}"),
        Entry::ResizeHint {
            key_count,
            expire_count,
        } => format!("RESIZEDB keys={key_count} expires={expire_count}"),
        Entry::Aux { key, value } => format!("AUX {:?} = {:?}", lossy(key), lossy(value)),
        Entry::Function { code } => format!("FUNCTION {} bytes", code.len()),
        Entry::KeyValue(kv) => key_value_to_text(kv),
        Entry::EndOfStream => "EOF".to_string(),
    }
}

fn key_value_to_text(kv: &KeyValue) -> String {
    let mut line = format!(
        "db={} {} {:?}",
        kv.db_index,
        kv.value.type_name(),
        lossy(&kv.key)
    );
    if let Some(at) = kv.expire_at_ms {
        line.push_str(&format!(" expire_at_ms={at}"));
    }
    let body = match &kv.value {
        Value::String(s) => format!("{:?}", lossy(s)),
        other => format!("len={}", other.len()),
    };
    line.push(' ');
    line.push_str(&body);
    line
}

fn entry_to_json(entry: &Entry) -> JsonValue {
    match entry {
        Entry::SelectDb { index } => json!({ "kind": "selectdb", "index": index }),
        Entry::ResizeHint {
            key_count,
            expire_count,
        } => json!({
            "kind": "resizedb",
            "key_count": key_count,
            "expire_count": expire_count,
        }),
        Entry::Aux { key, value } => json!({
            "kind": "aux",
            "key": lossy(key),
            "value": lossy(value),
        }),
        Entry::Function { code } => json!({ "kind": "function", "code": lossy(code) }),
        Entry::KeyValue(kv) => json!({
            "kind": "key",
            "db": kv.db_index,
            "key": lossy(&kv.key),
            "type": kv.value.type_name(),
            "expire_at_ms": kv.expire_at_ms,
            "idle": kv.idle,
            "freq": kv.freq,
            "value": value_to_json(&kv.value),
        }),
        Entry::EndOfStream => json!({ "kind": "eof" }),
    }
}

fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::String(s) => json!(lossy(s)),
        Value::List(items) => items.iter().map(lossy).collect(),
        Value::Set(members) => {
            let mut members: Vec<String> = members.iter().map(lossy).collect();
            members.sort();
            json!(members)
        }
        Value::Hash(fields) => {
            let map: serde_json::Map<String, JsonValue> = fields
                .iter()
                .map(|(k, v)| (lossy(k), json!(lossy(v))))
                .collect();
            JsonValue::Object(map)
        }
        Value::SortedSet(pairs) => pairs
            .iter()
            .map(|(member, score)| json!([lossy(member), score.into_inner()]))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dump_command(limit: Option<usize>) -> Commands {
        Commands::Dump {
            file: PathBuf::from("dump.rdb"),
            format: OutputFormat::Text,
            db: None,
            limit,
        }
    }

    #[test]
    fn test_zero_limit_is_invalid_args() {
        let err = check_args(&dump_command(Some(0))).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidArgs);
        assert_eq!(err.status_code().exit_code(), 1);
        assert!(err.to_string().contains("--limit"));

        assert!(check_args(&dump_command(Some(1))).is_ok());
        assert!(check_args(&dump_command(None)).is_ok());
    }

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["rdbstream-cli", "verify", "dump.rdb", "-vv", "--json-errors"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.json_errors);
        assert!(matches!(cli.command, Commands::Verify { .. }));
    }
}
