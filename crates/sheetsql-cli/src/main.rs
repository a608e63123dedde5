mod config;

use clap::Parser;
use config::Config;
use metrics_exporter_prometheus::PrometheusBuilder;
use sheetsql_core::types::ResultSet;
use sheetsql_session::Session;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "sheetsql")]
#[command(about = "Run SQL statements against spreadsheet workbooks")]
struct Cli {
    /// TOML config with [session] and [logging] sections.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Workbook to load, and to save back to on exit.
    #[arg(long)]
    workbook: Option<PathBuf>,

    /// Statement to run; repeat to run several. Reads stdin when absent.
    #[arg(long, short = 'e')]
    execute: Vec<String>,

    /// Print statement counters in Prometheus text format before exiting.
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };
    if let Some(path) = cli.workbook {
        config.session.filename = Some(path);
        config.session.data = None;
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level()?)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    let metrics_handle = PrometheusBuilder::new().install_recorder()?;

    let statements = if cli.execute.is_empty() {
        let mut input = String::new();
        tokio::io::stdin().read_to_string(&mut input).await?;
        vec![input]
    } else {
        cli.execute
    };

    let session = Session::open(config.session)?;
    for sql in &statements {
        let result = session.execute(sql).await?;
        print_result(&result);
    }
    session.close().await?;
    info!("ran {} statement batch(es)", statements.len());
    if cli.metrics {
        print!("{}", metrics_handle.render());
    }
    Ok(())
}

fn print_result(result: &ResultSet) {
    let columns = result.columns();
    if columns.is_empty() {
        return;
    }
    println!("{}", columns.join("\t"));
    for row in result {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| row.get(c).map(ToString::to_string).unwrap_or_default())
            .collect();
        println!("{}", cells.join("\t"));
    }
    println!("({} rows)", result.len());
}
