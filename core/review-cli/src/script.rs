//! Event scripts: JSONL files with one review event per line.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use specreview_core::{
    diff_hash, load_config, RegistryState, ReviewSummary, SessionFacade, SessionSeed,
    UndocumentedUrl,
};
use specreview_protocol::{parse_event_line, ReviewEvent};

/// An event together with the 1-based line it came from.
#[derive(Debug)]
pub struct ScriptLine {
    pub line: usize,
    pub event: ReviewEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineError {
    pub line: usize,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub state: RegistryState,
    pub summary: ReviewSummary,
    pub unhandled_diffs: Vec<String>,
    pub visible_urls: Vec<UndocumentedUrl>,
    pub documented: Vec<String>,
    pub rejected: Vec<LineError>,
}

pub struct ReplayArgs<'a> {
    pub seed: &'a Path,
    pub events: Option<&'a Path>,
    pub config: Option<&'a Path>,
    pub document: &'a [String],
    pub summary_only: bool,
}

/// Parses a script. Blank lines and lines starting with `#` are skipped.
pub fn parse_script(content: &str) -> (Vec<ScriptLine>, Vec<LineError>) {
    let mut events = Vec::new();
    let mut errors = Vec::new();
    for (index, raw) in content.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match parse_event_line(trimmed) {
            Ok(event) => events.push(ScriptLine { line, event }),
            Err(info) => errors.push(LineError {
                line,
                code: info.code,
                message: info.message,
            }),
        }
    }
    (events, errors)
}

/// Splits `"GET /widgets/{id}"` into method and pattern.
pub fn parse_document_arg(arg: &str) -> Result<(&str, &str), String> {
    match arg.trim().split_once(char::is_whitespace) {
        Some((method, pattern)) if !pattern.trim().is_empty() => Ok((method, pattern.trim())),
        _ => Err(format!(
            "--document expects \"METHOD PATTERN\", got {:?}",
            arg
        )),
    }
}

fn read_script(path: &Path) -> Result<String, String> {
    fs_err::read_to_string(path).map_err(|e| format!("Failed to read events: {}", e))
}

pub fn run_replay(args: &ReplayArgs<'_>) -> Result<ReplayReport, String> {
    let config = load_config(args.config)?;
    let seed = SessionSeed::load(args.seed)?;
    let machine = Arc::new(seed.into_machine((&config).into()));
    let session = SessionFacade::with_id_generator(Arc::clone(&machine), config.id_generator());

    let mut rejected = Vec::new();
    if let Some(events_path) = args.events {
        let (events, parse_errors) = parse_script(&read_script(events_path)?);
        for error in &parse_errors {
            tracing::warn!(line = error.line, code = %error.code, "{}", error.message);
        }
        rejected.extend(parse_errors);
        for ScriptLine { line, event } in events {
            if let Err(e) = machine.send(event) {
                tracing::warn!(line, code = e.code(), error = %e, "Event rejected");
                rejected.push(LineError {
                    line,
                    code: e.code().to_string(),
                    message: e.to_string(),
                });
            }
        }
        rejected.sort_by_key(|error| error.line);
    }

    let mut documented = Vec::with_capacity(args.document.len());
    for arg in args.document {
        let (method, pattern) = parse_document_arg(arg)?;
        documented.push(session.document_endpoint(pattern, method)?);
    }

    let registry = session.snapshot();
    Ok(ReplayReport {
        state: registry.state(),
        summary: registry.summary(),
        unhandled_diffs: registry
            .unhandled_diffs()
            .map(|diff| diff.diff_hash().to_string())
            .collect(),
        visible_urls: session.visible_undocumented_urls(),
        documented,
        rejected,
    })
}

pub fn replay(args: ReplayArgs<'_>) -> Result<(), String> {
    let report = run_replay(&args)?;
    let output = if args.summary_only {
        serde_json::to_string_pretty(&report.summary)
    } else {
        serde_json::to_string_pretty(&report)
    }
    .map_err(|e| format!("Failed to serialize report: {}", e))?;
    println!("{}", output);
    Ok(())
}

pub fn check(events: &Path) -> Result<(), String> {
    let (parsed, errors) = parse_script(&read_script(events)?);
    for error in &errors {
        println!("line {}: {}: {}", error.line, error.code, error.message);
    }
    if errors.is_empty() {
        println!("{} events ok", parsed.len());
        Ok(())
    } else {
        Err(format!("{} malformed event line(s)", errors.len()))
    }
}

pub fn fingerprint(diff: &Path) -> Result<(), String> {
    let content =
        fs_err::read_to_string(diff).map_err(|e| format!("Failed to read diff: {}", e))?;
    let value: Value =
        serde_json::from_str(&content).map_err(|e| format!("Diff is not valid JSON: {}", e))?;
    println!("{}", diff_hash(&value));
    Ok(())
}
