use std::path::PathBuf;
use std::time::Duration;

use atty::Stream;
use bead_core::{self, CommandContext, CommandInfo, ExecutionOutcome, GlobalOptions};
use clap::{value_parser, ArgAction, Args, Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde_json::{json, Value};

mod style;

use style::Style;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = BeadCli::parse();
    init_tracing(cli.trace, cli.verbose);

    let global = GlobalOptions {
        quiet: cli.quiet,
        verbose: cli.verbose,
        trace: cli.trace,
        json: cli.json,
        app_root: cli.app_root.clone(),
    };

    let (info, outcome) = execute(&global, &cli.command)?;
    let code = emit_output(&cli, info, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, verbose: u8) {
    let level = if trace {
        "trace"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("bead_core={level},bead={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn execute(
    global: &GlobalOptions,
    command: &CommandGroupCli,
) -> Result<(CommandInfo, ExecutionOutcome)> {
    let CommandGroupCli::Cache(args) = command;
    let info = CommandInfo::new("cache", args.command.name());
    let ctx = match CommandContext::new(global) {
        Ok(ctx) => ctx,
        Err(err) => {
            return Ok((
                info,
                ExecutionOutcome::user_error(
                    format!("{err:#}"),
                    json!({
                        "reason": "invalid_config",
                        "hint": "check the BEAD_* environment variables",
                    }),
                ),
            ))
        }
    };
    let outcome = run_cache_command(&ctx, &args.command).map_err(|err| eyre!("{err:?}"))?;
    Ok((info, outcome))
}

fn run_cache_command(
    ctx: &CommandContext,
    command: &CacheSubcommand,
) -> anyhow::Result<ExecutionOutcome> {
    match command {
        CacheSubcommand::Path => bead_core::cache_path(ctx, bead_core::CachePathRequest),
        CacheSubcommand::Stats => bead_core::cache_stats(ctx, bead_core::CacheStatsRequest),
        CacheSubcommand::List => bead_core::cache_list(ctx, bead_core::CacheListRequest),
        CacheSubcommand::Ingest(args) => bead_core::cache_ingest(
            ctx,
            bead_core::CacheIngestRequest {
                db: args.db.clone(),
                query: args.query.clone(),
                id: args.id.clone(),
            },
        ),
        CacheSubcommand::Show(args) => bead_core::cache_show(
            ctx,
            bead_core::CacheShowRequest {
                id: args.id.clone(),
                row: args.row,
                offset: args.offset,
                limit: args.limit,
            },
        ),
        CacheSubcommand::Purge(args) => bead_core::cache_purge(
            ctx,
            bead_core::CachePurgeRequest {
                older_than: args.older_than.map(Duration::from_secs),
                dry_run: args.dry_run,
            },
        ),
        CacheSubcommand::Drop(args) => bead_core::cache_drop(
            ctx,
            bead_core::CacheDropRequest {
                id: args.id.clone(),
            },
        ),
    }
}

fn emit_output(cli: &BeadCli, info: CommandInfo, outcome: &ExecutionOutcome) -> Result<i32> {
    if cli.json {
        let payload = bead_core::to_json_response(info, outcome);
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if cli.quiet {
        // Quiet keeps stdout empty but still explains failures.
        if !outcome.is_ok() {
            let style = Style::new(cli.no_color, atty::is(Stream::Stderr));
            for line in status_lines(&style, info, outcome) {
                eprintln!("{line}");
            }
        }
    } else {
        let style = Style::new(cli.no_color, atty::is(Stream::Stdout));
        for line in status_lines(&style, info, outcome) {
            println!("{line}");
        }
        if let Some(body) = render_details(&style, info, &outcome.details) {
            println!("{body}");
        }
    }

    Ok(outcome.status.exit_code())
}

fn status_lines(style: &Style, info: CommandInfo, outcome: &ExecutionOutcome) -> Vec<String> {
    let message = bead_core::format_status_message(info, &outcome.message);
    let mut lines = vec![style.status(outcome.status, &message)];
    if let Some(hint) = outcome.hint() {
        lines.push(style.info(&format!("Hint: {hint}")));
    }
    lines
}

fn render_details(style: &Style, info: CommandInfo, details: &Value) -> Option<String> {
    match info.name {
        "list" => render_entry_table(style, details),
        "show" => render_rows(details),
        "purge" => render_purge_errors(style, details),
        _ => None,
    }
}

fn render_rows(details: &Value) -> Option<String> {
    let rows = details.get("rows")?.as_array()?;
    if rows.is_empty() {
        return None;
    }
    let offset = details.get("offset").and_then(Value::as_i64).unwrap_or(0);
    let lines: Vec<String> = rows
        .iter()
        .zip(offset..)
        .map(|(row, index)| format!("{index:>6}  {row}"))
        .collect();
    Some(lines.join("\n"))
}

fn render_purge_errors(style: &Style, details: &Value) -> Option<String> {
    let errors = details.get("errors")?.as_array()?;
    if errors.is_empty() {
        return None;
    }
    let lines: Vec<String> = errors
        .iter()
        .filter_map(|err| {
            let path = err.get("path")?.as_str()?;
            let error = err.get("error")?.as_str()?;
            Some(style.warning(&format!("  {path}: {error}")))
        })
        .collect();
    Some(lines.join("\n"))
}

struct EntryRow {
    id: String,
    rows: String,
    chunks: String,
    bytes: String,
    idle: String,
}

fn render_entry_table(style: &Style, details: &Value) -> Option<String> {
    let entries = details.get("entries")?.as_array()?;
    if entries.is_empty() {
        return None;
    }

    let mut rows = Vec::new();
    for entry in entries {
        let obj = entry.as_object()?;
        rows.push(EntryRow {
            id: obj.get("id")?.as_str()?.to_string(),
            rows: obj
                .get("row_count")
                .and_then(Value::as_u64)
                .map_or_else(|| "?".to_string(), |count| count.to_string()),
            chunks: obj.get("chunk_files")?.as_u64()?.to_string(),
            bytes: obj.get("size_bytes")?.as_u64()?.to_string(),
            idle: obj
                .get("idle_seconds")
                .and_then(Value::as_u64)
                .map_or_else(|| "?".to_string(), format_idle),
        });
    }

    Some(format_entry_table(style, &rows))
}

fn format_idle(seconds: u64) -> String {
    match seconds {
        0..=59 => format!("{seconds}s"),
        60..=3599 => format!("{}m", seconds / 60),
        _ => format!("{}h", seconds / 3600),
    }
}

fn format_entry_table(style: &Style, rows: &[EntryRow]) -> String {
    let headers = ["Id", "Rows", "Chunks", "Bytes", "Idle"];
    let mut widths = headers.map(str::len);
    for row in rows {
        widths[0] = widths[0].max(row.id.len());
        widths[1] = widths[1].max(row.rows.len());
        widths[2] = widths[2].max(row.chunks.len());
        widths[3] = widths[3].max(row.bytes.len());
        widths[4] = widths[4].max(row.idle.len());
    }

    let header_line = format!(
        "{:<w0$}  {:>w1$}  {:>w2$}  {:>w3$}  {:>w4$}",
        headers[0],
        headers[1],
        headers[2],
        headers[3],
        headers[4],
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
        w3 = widths[3],
        w4 = widths[4],
    );

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(style.table_header(&header_line));
    lines.push(style.dimmed(&"-".repeat(header_line.len())));
    for row in rows {
        lines.push(format!(
            "{:<w0$}  {:>w1$}  {:>w2$}  {:>w3$}  {:>w4$}",
            row.id,
            row.rows,
            row.chunks,
            row.bytes,
            row.idle,
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
            w3 = widths[3],
            w4 = widths[4],
        ));
    }
    lines.join("\n")
}

#[derive(Parser, Debug)]
#[command(
    name = "bead",
    author,
    version,
    about = "Inspect and maintain the bead results cache",
    long_about = "Chunked, file-backed storage for one-shot database result sets.",
    after_help = "Examples:\n  bead cache path\n  bead --json cache list\n  bead cache purge --dry-run"
)]
struct BeadCli {
    #[arg(
        short,
        long,
        global = true,
        help = "Suppress human output (errors still print to stderr)"
    )]
    quiet: bool,
    #[arg(short, long, global = true, action = ArgAction::Count, help = "Increase logging (-vv reaches trace)")]
    verbose: u8,
    #[arg(long, global = true, help = "Force trace logging regardless of -v/-q")]
    trace: bool,
    #[arg(long, global = true, help = "Emit {status,message,details} JSON envelopes")]
    json: bool,
    #[arg(long, global = true, help = "Disable colored human output")]
    no_color: bool,
    #[arg(
        long,
        global = true,
        value_parser = value_parser!(PathBuf),
        help = "Application root (defaults to BEAD_APP_ROOT, then the current directory)"
    )]
    app_root: Option<PathBuf>,
    #[command(subcommand)]
    command: CommandGroupCli,
}

#[derive(Subcommand, Debug)]
enum CommandGroupCli {
    #[command(
        about = "Inspect, fill, and purge the results cache.",
        after_help = "Examples:\n  bead cache stats\n  bead cache ingest --db app.db --query 'SELECT * FROM users'\n  bead cache purge --older-than 600\n"
    )]
    Cache(CacheArgs),
}

#[derive(Args, Debug)]
struct CacheArgs {
    #[command(subcommand)]
    command: CacheSubcommand,
}

#[derive(Subcommand, Debug)]
enum CacheSubcommand {
    #[command(
        about = "Print the resolved results cache directory (creating it if needed).",
        after_help = "Example:\n  bead cache path\n"
    )]
    Path,
    #[command(
        about = "Report cached entries, files, and total bytes.",
        after_help = "Example:\n  bead cache stats\n"
    )]
    Stats,
    #[command(
        about = "List cached result sets without marking them as used.",
        after_help = "Examples:\n  bead cache list\n  bead --json cache list\n"
    )]
    List,
    #[command(
        about = "Run a query against a SQLite database and cache its rows.",
        after_help = "Examples:\n  bead cache ingest --db app.db --query 'SELECT * FROM orders'\n  bead cache ingest --db app.db --query 'SELECT 1' --id smoke\n"
    )]
    Ingest(IngestArgs),
    #[command(
        about = "Print rows from a cached result set.",
        after_help = "Examples:\n  bead cache show smoke\n  bead cache show smoke --row 5000\n  bead cache show smoke --offset 100 --limit 10\n"
    )]
    Show(ShowArgs),
    #[command(
        about = "Delete entries idle for longer than the expiry (pair with --dry-run to preview).",
        after_help = "Examples:\n  bead cache purge --dry-run\n  BEAD_RESULTS_CACHE_EXPIRY=600 bead cache purge\n"
    )]
    Purge(PurgeArgs),
    #[command(
        about = "Delete one cached result set.",
        after_help = "Example:\n  bead cache drop smoke\n"
    )]
    Drop(DropArgs),
}

impl CacheSubcommand {
    fn name(&self) -> &'static str {
        match self {
            CacheSubcommand::Path => "path",
            CacheSubcommand::Stats => "stats",
            CacheSubcommand::List => "list",
            CacheSubcommand::Ingest(_) => "ingest",
            CacheSubcommand::Show(_) => "show",
            CacheSubcommand::Purge(_) => "purge",
            CacheSubcommand::Drop(_) => "drop",
        }
    }
}

#[derive(Args, Debug)]
struct IngestArgs {
    #[arg(long, value_parser = value_parser!(PathBuf), help = "SQLite database to query")]
    db: PathBuf,
    #[arg(long, help = "SQL statement whose rows are cached")]
    query: String,
    #[arg(long, help = "Identifier for the entry (random when omitted)")]
    id: Option<String>,
}

#[derive(Args, Debug)]
struct ShowArgs {
    #[arg(value_name = "ID")]
    id: String,
    #[arg(
        long,
        allow_negative_numbers = true,
        conflicts_with_all = ["offset", "limit"],
        help = "Print the single row at this zero-based index"
    )]
    row: Option<i64>,
    #[arg(long, default_value_t = 0, help = "First row to print")]
    offset: usize,
    #[arg(long, help = "Maximum rows to print (default 20)")]
    limit: Option<usize>,
}

#[derive(Args, Debug)]
struct PurgeArgs {
    #[arg(
        long,
        value_name = "SECS",
        help = "Idle time before an entry expires (defaults to BEAD_RESULTS_CACHE_EXPIRY or 1800)"
    )]
    older_than: Option<u64>,
    #[arg(long, help = "Show what would be removed without deleting files")]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct DropArgs {
    #[arg(value_name = "ID")]
    id: String,
}
