use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::info;

use sheet_cards::cycle::{self, Dashboard};
use sheet_cards::parser::{matrix, reduce::PLACEHOLDER};
use sheet_cards::sheet::{FileSource, GoogleSheet, SheetSource};
use sheet_cards::window::View;
use sheet_cards::{AbsenceSource, AuxRange, DayCard, PipelineConfig, PipelineError};

#[derive(Parser)]
#[command(name = "sheet-cards", about = "Daily metric cards from a Google Sheets CSV export")]
struct Cli {
    #[command(flatten)]
    pipeline: PipelineArgs,

    #[command(flatten)]
    output: OutputArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PipelineArgs {
    /// Row holding the day labels (1-based)
    #[arg(long, global = true, env = "SHEET_HEADER_ROW", default_value_t = 1,
          value_parser = clap::value_parser!(u32).range(1..))]
    header_row: u32,
    /// Column holding the metric names (1-based, A=1)
    #[arg(long, global = true, env = "SHEET_METRIC_COL", default_value_t = 1,
          value_parser = clap::value_parser!(u32).range(1..))]
    metric_col: u32,
    /// Days before the latest day with data to keep visible
    #[arg(long, global = true, env = "SHEET_WINDOW_DAYS", default_value_t = 6)]
    window_days: u32,
    /// Rows of the fixed absence-identifier block, e.g. 30:45
    #[arg(long, global = true, env = "SHEET_AUX_ROWS", value_parser = parse_span,
          requires = "aux_cols")]
    aux_rows: Option<(usize, usize)>,
    /// Columns of the fixed absence-identifier block, e.g. 2:40
    #[arg(long, global = true, env = "SHEET_AUX_COLS", value_parser = parse_span,
          requires = "aux_rows")]
    aux_cols: Option<(usize, usize)>,
}

impl PipelineArgs {
    fn to_config(&self) -> PipelineConfig {
        let absences = match (self.aux_rows, self.aux_cols) {
            (Some(rows), Some(cols)) => AbsenceSource::FixedRange(AuxRange::new(rows, cols)),
            _ => AbsenceSource::ByMetricName,
        };
        PipelineConfig {
            header_row: self.header_row as usize,
            metric_col: self.metric_col as usize,
            window_days: self.window_days,
            absences,
        }
    }
}

#[derive(Args)]
struct OutputArgs {
    /// Print the windowed cards as JSON
    #[arg(long, global = true)]
    json: bool,
    /// Keep only cards mentioning this text
    #[arg(short, long, global = true)]
    search: Option<String>,
}

#[derive(Args)]
struct SheetArgs {
    /// Google Sheets URL (any URL containing /spreadsheets/d/<id>)
    #[arg(long, env = "SHEET_URL")]
    sheet_url: String,
    /// Tab id
    #[arg(long, env = "SHEET_GID", default_value = "0")]
    gid: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the sheet once and show the current window
    Fetch {
        #[command(flatten)]
        sheet: SheetArgs,
    },
    /// Same as fetch, from a local CSV file
    Show {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Refresh periodically until Ctrl-C
    Watch {
        #[command(flatten)]
        sheet: SheetArgs,
        /// Seconds between refreshes
        #[arg(short, long, default_value = "300")]
        interval: u64,
    },
    /// Re-emit a CSV file with normalized quoting and trimmed cells
    Normalize {
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let config = cli.pipeline.to_config();

    let result = match cli.command {
        Commands::Fetch { sheet } => {
            let source = GoogleSheet::from_url(&sheet.sheet_url, &sheet.gid)?;
            run_once(&source, &config, &cli.output).await
        }
        Commands::Show { file } => {
            let source = FileSource::new(file);
            run_once(&source, &config, &cli.output).await
        }
        Commands::Watch { sheet, interval } => {
            let source = GoogleSheet::from_url(&sheet.sheet_url, &sheet.gid)?;
            let shutdown = CancellationToken::new();
            let on_signal = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_signal.cancel();
                }
            });

            info!("Watching {} every {}s", source.describe(), interval);
            let output = &cli.output;
            cycle::watch(&source, &config, Duration::from_secs(interval), shutdown, |dash| {
                if let Some(s) = dash.snapshot() {
                    println!("\n=== {} ===", s.loaded_at.format("%d/%m/%Y %H:%M:%S"));
                }
                print_view(dash.view(cycle::today()), output);
            })
            .await;
            Ok(())
        }
        Commands::Normalize { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let m = matrix::parse(&raw)?;
            print!("{}", m.to_csv()?);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

async fn run_once(
    source: &dyn SheetSource,
    config: &PipelineConfig,
    output: &OutputArgs,
) -> anyhow::Result<()> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(format!("Downloading {}...", source.describe()));
    pb.enable_steady_tick(Duration::from_millis(100));

    let today = cycle::today();
    let outcome = cycle::run_cycle(source, config, today, &CancellationToken::new()).await;
    pb.finish_and_clear();

    // A single run has no previous cards to fall back on; the error is
    // reported once, by main's return.
    let snapshot = match outcome {
        Ok(s) => s,
        Err(e) => {
            let headline = failure_headline(&e);
            return Err(anyhow::Error::new(e).context(headline));
        }
    };
    let mut dash = Dashboard::new(config.window_days);
    dash.apply(Ok(snapshot));
    print_view(dash.view(today), output);
    Ok(())
}

fn failure_headline(e: &PipelineError) -> &'static str {
    if e.is_retrieval() {
        "Could not download the sheet"
    } else {
        "Could not read the sheet"
    }
}

fn print_view(view: View<'_>, output: &OutputArgs) {
    match view {
        View::Loading => println!("Loading..."),
        View::Failed(e) => println!("{}: {}", failure_headline(e), e),
        View::NoQualifyingDay => println!("No day on or before today has data yet."),
        View::Cards { cards, stale } => {
            if let Some(e) = stale {
                println!("(showing previous data; last refresh failed: {})", e);
            }
            let shown: Vec<&DayCard> = match output.search.as_deref().map(str::trim) {
                Some(q) if !q.is_empty() => {
                    let q = q.to_lowercase();
                    cards.into_iter().filter(|c| search_blob(c).contains(&q)).collect()
                }
                _ => cards,
            };

            if output.json {
                match serde_json::to_string_pretty(&shown) {
                    Ok(s) => println!("{}", s),
                    Err(e) => println!("Could not encode cards: {}", e),
                }
                return;
            }
            if shown.is_empty() {
                println!("No cards match that search.");
                return;
            }
            for card in &shown {
                print_card(card);
            }
            println!("\n{} card(s), one per day.", shown.len());
        }
    }
}

fn print_card(card: &DayCard) {
    println!(
        "\n{} · {} métricas ({} con valor)",
        day_label(card.date),
        card.total(),
        card.filled_count()
    );
    let ids = if card.kpis.absence_ids.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        card.kpis.absence_ids.join(", ")
    };
    println!(
        "  Línea TM: {:<6} Línea TT: {:<6} Inasistencias: {}",
        card.kpis.line_tm, card.kpis.line_tt, ids
    );
    for m in &card.table {
        let value = if m.value.is_empty() { PLACEHOLDER } else { m.value.as_str() };
        println!("  {:<32} {}", truncate(&m.name, 32), value);
    }
}

fn day_label(date: NaiveDate) -> String {
    const WEEKDAYS: [&str; 7] = ["lun", "mar", "mié", "jue", "vie", "sáb", "dom"];
    let wd = WEEKDAYS[date.weekday().num_days_from_monday() as usize];
    format!("{} {}", wd, date.format("%d/%m/%Y"))
}

fn search_blob(card: &DayCard) -> String {
    let pairs: Vec<String> = card
        .table
        .iter()
        .map(|m| format!("{} {}", m.name, m.value))
        .collect();
    let kpis = &card.kpis;
    format!(
        "{} {} {} | tm {} | tt {} | {}",
        card.label,
        day_label(card.date),
        pairs.join(" | "),
        kpis.line_tm,
        kpis.line_tt,
        kpis.absence_ids.join(" ")
    )
    .to_lowercase()
}

fn parse_span(s: &str) -> Result<(usize, usize), String> {
    let (a, b) = s
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got {:?}", s))?;
    let parse = |v: &str| -> Result<usize, String> {
        match v.trim().parse::<usize>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(format!("{:?} is not a positive integer", v)),
        }
    };
    Ok((parse(a)?, parse(b)?))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max - 3).collect();
        format!("{}...", truncated)
    }
}
