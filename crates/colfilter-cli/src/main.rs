use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colfilter_engine::{
    cmp_case_insensitive, narrow_candidates, EngineConfig, Extractor, FilterEngine, RowOrder,
    RowSource,
};

mod table;

use crate::table::{field, load_csv, Record};

#[derive(Debug, Parser)]
#[command(name = "colfilter")]
#[command(about = "Filter CSV rows per column and list the candidate filter values of a column.")]
struct Cli {
    /// Engine configuration (JSON), e.g. `{"candidates": {"includeBlank": false}}`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the rows accepted by every column filter.
    Rows(RowsArgs),
    /// Print the distinct values of a column, ignoring that column's own filter.
    Candidates(CandidatesArgs),
}

#[derive(Debug, Args)]
struct TableArgs {
    /// CSV file with a header row. Header names identify the columns.
    #[arg(long)]
    input: PathBuf,

    /// Column filter `COLUMN=EXPR` (repeatable). EXPR is a substring, `>bound` or `<bound`.
    #[arg(long = "filter", value_name = "COLUMN=EXPR", value_parser = parse_filter_arg)]
    filters: Vec<FilterArg>,
}

#[derive(Debug, Args)]
struct RowsArgs {
    #[command(flatten)]
    table: TableArgs,

    /// Sort the visible rows by this column (case-insensitive).
    #[arg(long)]
    sort: Option<String>,

    #[arg(long, requires = "sort")]
    descending: bool,

    #[arg(long, value_enum, default_value_t = RowFormat::Csv)]
    format: RowFormat,
}

#[derive(Debug, Args)]
struct CandidatesArgs {
    #[command(flatten)]
    table: TableArgs,

    /// Column whose candidate values are listed.
    #[arg(long)]
    column: String,

    /// Keep only candidates containing this text (case-insensitive).
    #[arg(long)]
    narrow: Option<String>,

    #[arg(long, value_enum, default_value_t = ListFormat::Lines)]
    format: ListFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RowFormat {
    Csv,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ListFormat {
    Lines,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FilterArg {
    column: String,
    expression: String,
}

fn parse_filter_arg(raw: &str) -> Result<FilterArg, String> {
    let (column, expression) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected COLUMN=EXPR, got `{raw}`"))?;
    if column.is_empty() {
        return Err(format!("missing column name in `{raw}`"));
    }
    Ok(FilterArg {
        column: column.to_string(),
        expression: expression.to_string(),
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run(cli, &mut out)
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Rows(args) => print_rows(args, config, out),
        Command::Candidates(args) => print_candidates(args, config, out),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    EngineConfig::from_json_str(&json).with_context(|| format!("parse config {}", path.display()))
}

/// Loads the CSV, registers one extractor per header and applies the requested filters.
fn build_engine(
    args: &TableArgs,
    config: EngineConfig,
) -> Result<(Vec<String>, FilterEngine<Record, String>)> {
    let table = load_csv(&args.input)?;

    let mut engine = FilterEngine::new(config);
    for (index, header) in table.headers.iter().enumerate() {
        if engine.is_registered(header) {
            log::warn!("duplicate column `{header}`; the rightmost one is used");
        }
        engine.register_column(
            header.clone(),
            Extractor::new(move |row: &Record| field(row, index).to_string()),
        );
    }
    engine.attach(RowSource::new(table.rows))?;

    for filter in &args.filters {
        let status = engine
            .set_column_filter(&filter.column, &filter.expression)
            .with_context(|| format!("apply filter on column `{}`", filter.column))?;
        log::debug!(
            "filter `{}` on `{}`: active={}, {} visible row(s)",
            filter.expression,
            filter.column,
            status.active,
            status.visible_rows
        );
    }

    Ok((table.headers, engine))
}

fn print_rows(args: RowsArgs, config: EngineConfig, out: &mut impl Write) -> Result<()> {
    let (headers, mut engine) = build_engine(&args.table, config)?;

    if let Some(sort) = &args.sort {
        let index = headers
            .iter()
            .position(|header| header == sort)
            .with_context(|| format!("unknown sort column `{sort}`"))?;
        let order = RowOrder::new(move |a: &Record, b: &Record| {
            cmp_case_insensitive(field(a, index), field(b, index))
        });
        let order = if args.descending { order.reversed() } else { order };
        engine.set_order(Some(order))?;
    }

    let rows = engine.view()?.map_visible(Record::clone);
    match args.format {
        RowFormat::Csv => {
            let mut writer = csv::Writer::from_writer(&mut *out);
            writer.write_record(&headers)?;
            for row in &rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        RowFormat::Json => {
            let objects: Vec<serde_json::Map<String, serde_json::Value>> = rows
                .into_iter()
                .map(|row| {
                    headers
                        .iter()
                        .cloned()
                        .zip(row.into_iter().map(serde_json::Value::String))
                        .collect()
                })
                .collect();
            serde_json::to_writer_pretty(&mut *out, &objects)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn print_candidates(
    args: CandidatesArgs,
    config: EngineConfig,
    out: &mut impl Write,
) -> Result<()> {
    let (_, engine) = build_engine(&args.table, config)?;

    let candidates = engine
        .distinct_values_for(&args.column)
        .with_context(|| format!("list candidates of column `{}`", args.column))?;
    let shown: Vec<&str> = match &args.narrow {
        Some(text) => narrow_candidates(&candidates, text),
        None => candidates.iter().map(String::as_str).collect(),
    };

    match args.format {
        ListFormat::Lines => {
            for value in &shown {
                writeln!(out, "{value}")?;
            }
        }
        ListFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &shown)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
