use std::env;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use csv_reader_input::{
    ChangeEvent, FileCsvInput, FileInfo, LocalFile, ParsedRecord, ReaderSettings,
    SelectionOutcome,
};

const USAGE: &str = "Usage: preview_cli <file-path> [--strict] [--header] [--typed] \
[--encoding <label>] [--accept <types>] [--settings <json-file>] [--max-rows N]";

struct CliArgs {
    file_path: String,
    settings: ReaderSettings,
    max_rows: usize,
}

#[tokio::main]
async fn main() {
    csv_reader_input::utils::logging::init_tracing();

    let args = match parse_args(env::args().skip(1).collect()) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    };

    if let Err(error) = run(args).await {
        eprintln!("Error: {error:#}");
        std::process::exit(1);
    }
}

fn parse_args(raw: Vec<String>) -> Result<CliArgs, String> {
    let mut file_path = None;
    let mut settings_path = None;
    let mut overrides: Vec<(String, Option<String>)> = Vec::new();
    let mut max_rows = 10;

    let mut iter = raw.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--strict" | "--header" | "--typed" => overrides.push((arg, None)),
            "--encoding" | "--accept" => {
                let value = iter.next().ok_or_else(|| format!("{arg} needs a value"))?;
                overrides.push((arg, Some(value)));
            }
            "--settings" => {
                settings_path = Some(iter.next().ok_or("--settings needs a path")?);
            }
            "--max-rows" => {
                max_rows = iter
                    .next()
                    .and_then(|value| value.parse::<usize>().ok())
                    .ok_or("--max-rows needs a number")?;
            }
            _ if arg.starts_with("--") => return Err(format!("Unknown option: {arg}")),
            _ => file_path = Some(arg),
        }
    }

    let mut settings = match settings_path {
        Some(path) => ReaderSettings::load_from(&path).map_err(|e| format!("{e:#}"))?,
        None => ReaderSettings::load_or_default(),
    };

    for (flag, value) in overrides {
        match (flag.as_str(), value) {
            ("--strict", _) => settings.strict = true,
            ("--header", _) => settings.parser_options.header = true,
            ("--typed", _) => settings.parser_options.dynamic_typing = true,
            ("--encoding", Some(value)) => settings.encoding = value,
            ("--accept", Some(value)) => settings.accept = value,
            _ => {}
        }
    }

    Ok(CliArgs {
        file_path: file_path.ok_or("Missing file path")?,
        settings,
        max_rows,
    })
}

async fn run(args: CliArgs) -> anyhow::Result<()> {
    let loaded: Arc<Mutex<Option<(Vec<ParsedRecord>, FileInfo)>>> = Arc::new(Mutex::new(None));
    let errors: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let input = {
        let loaded = loaded.clone();
        let errors = errors.clone();
        FileCsvInput::builder()
            .settings(args.settings)
            .on_error(move |error| errors.lock().push(error.to_string()))
            .on_file_loaded(move |records, info, _file| {
                *loaded.lock() = Some((records, info));
            })
            .build()?
    };

    let file = LocalFile::open(&args.file_path).await?;
    let outcome = input.process_change(ChangeEvent::single(file)).await;

    for error in errors.lock().iter() {
        eprintln!("⚠️  {error}");
    }

    match outcome {
        SelectionOutcome::Loaded { records } => {
            if let Some((rows, info)) = loaded.lock().take() {
                let shown: Vec<&ParsedRecord> = rows.iter().take(args.max_rows).collect();
                let report = json!({
                    "fileInfo": info,
                    "totalRows": records,
                    "rows": shown,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Ok(())
        }
        other => anyhow::bail!("{} was not loaded ({:?})", args.file_path, other),
    }
}
