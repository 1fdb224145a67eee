use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod config;
mod fetch;
mod grid;
mod models;
mod payload;
mod render;

use config::{ApiArgs, RenderArgs};
use models::ActivityMap;
use payload::ActivityPayload;

#[derive(Parser)]
#[command(name = "monkeytype-heatmap")]
#[command(about = "Render Monkeytype typing activity as a contribution heatmap", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch activity from the api and write the heatmap
    Generate {
        #[command(flatten)]
        api: ApiArgs,
        #[command(flatten)]
        render: RenderArgs,
    },
    /// Render a saved api response body instead of calling the api
    Render {
        #[arg(long)]
        input: PathBuf,
        #[command(flatten)]
        render: RenderArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate { api, render } => {
            let config = api.into_config()?;
            let client = fetch::build_client(config.timeout)?;
            println!("Fetching {} data from {}...", config.endpoint.name(), config.base_url);
            let activity = fetch::fetch_activity(&client, &config).await;
            write_heatmap(&activity, &render)?;
        }
        Commands::Render { input, render } => {
            let activity = load_saved_activity(&input, &Local)?;
            write_heatmap(&activity, &render)?;
        }
    }

    Ok(())
}

fn load_saved_activity<Tz: TimeZone>(input: &Path, tz: &Tz) -> anyhow::Result<ActivityMap> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let body: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid json", input.display()))?;
    let activity = ActivityPayload::from_body(body)
        .and_then(|payload| payload.into_activity(tz))
        .with_context(|| format!("could not decode activity from {}", input.display()))?;
    Ok(activity)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn write_heatmap(activity: &ActivityMap, args: &RenderArgs) -> anyhow::Result<()> {
    if activity.is_empty() {
        println!("FAILED: No data found.");
        anyhow::bail!("no typing activity; {} left untouched", args.out.display());
    }

    if let Some((busiest, count)) = activity.iter().max_by_key(|&(_, count)| count) {
        tracing::debug!(%busiest, count, "busiest day");
    }

    let today = Local::now().date_naive();
    let svg = render::render_heatmap(activity, today, &args.layout());
    std::fs::write(&args.out, svg)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    println!(
        "SUCCESS: Generated heatmap with {} total tests across {} days at {}.",
        activity.total_tests(),
        activity.len(),
        args.out.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name)
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn saved_profile_body_decodes() {
        let activity = load_saved_activity(&fixture("profile_body.json"), &Utc).unwrap();
        assert_eq!(activity.len(), 3);
        assert_eq!(activity.get(day(2024, 6, 10)), 4);
        assert_eq!(activity.get(day(2024, 6, 11)), 0);
        assert_eq!(activity.get(day(2024, 6, 12)), 12);
        assert_eq!(activity.total_tests(), 16);
    }

    #[test]
    fn saved_result_list_decodes() {
        let activity = load_saved_activity(&fixture("results_body.json"), &Utc).unwrap();
        assert_eq!(activity.get(day(2024, 6, 12)), 2);
        assert_eq!(activity.total_tests(), 2);
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load_saved_activity(&fixture("absent.json"), &Utc).unwrap_err();
        assert!(err.to_string().contains("absent.json"));
    }

    #[test]
    fn body_without_data_is_an_error() {
        let err = load_saved_activity(&fixture("error_body.json"), &Utc).unwrap_err();
        assert!(err.to_string().contains("could not decode activity"));
    }
}
