use anyhow::Context;
use basic_cleaning::config::{CleaningArgs, TrackingSettings};
use basic_cleaning::logging;
use basic_cleaning::pipeline::run_basic_cleaning;
use basic_cleaning::tracking::{ArtifactStore, FsArtifactStore};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "basic_cleaning")]
#[command(about = "A very basic data cleaning")]
#[command(version = "0.1.0")]
struct Cli {
    /// Input artifact name
    #[arg(long = "input_artifact")]
    input_artifact: String,

    /// Output artifact name
    #[arg(long = "output_artifact")]
    output_artifact: String,

    /// Output artifact type
    #[arg(long = "output_type")]
    output_type: String,

    /// Output artifact description
    #[arg(long = "output_description")]
    output_description: String,

    /// Minimum price to consider
    #[arg(long = "min_price", allow_negative_numbers = true)]
    min_price: f64,

    /// Maximum price to consider
    #[arg(long = "max_price", allow_negative_numbers = true)]
    max_price: f64,
}

impl From<Cli> for CleaningArgs {
    fn from(cli: Cli) -> Self {
        Self {
            input_artifact: cli.input_artifact,
            output_artifact: cli.output_artifact,
            output_type: cli.output_type,
            output_description: cli.output_description,
            min_price: cli.min_price,
            max_price: cli.max_price,
        }
    }
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging();

    let args: CleaningArgs = Cli::parse().into();

    let settings = TrackingSettings::load().context("loading tracking settings")?;
    info!(root = %settings.root.display(), project = %settings.project, "Using artifact store");
    let store: Arc<dyn ArtifactStore> = Arc::new(FsArtifactStore::new(settings.root.clone()));

    let work_dir = std::env::current_dir().context("resolving working directory")?;
    let (result, record) = run_basic_cleaning(store, &settings, &args, &work_dir)
        .with_context(|| format!("basic cleaning of {} failed", args.input_artifact))?;

    info!(
        run_id = %record.id,
        input = %result.input_artifact,
        output = %result.output_artifact,
        rows_read = result.rows_read,
        rows_kept = result.rows_kept,
        "Cleaning run complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: [&str; 13] = [
        "basic_cleaning",
        "--input_artifact",
        "sample.csv:latest",
        "--output_artifact",
        "clean_sample.csv",
        "--output_type",
        "clean_sample",
        "--output_description",
        "Data with outliers and null values removed",
        "--min_price",
        "10",
        "--max_price",
        "350.5",
    ];

    #[test]
    fn test_all_flags_parse_into_args() {
        let args: CleaningArgs = Cli::try_parse_from(FULL).unwrap().into();
        assert_eq!(
            args,
            CleaningArgs {
                input_artifact: "sample.csv:latest".to_string(),
                output_artifact: "clean_sample.csv".to_string(),
                output_type: "clean_sample".to_string(),
                output_description: "Data with outliers and null values removed".to_string(),
                min_price: 10.0,
                max_price: 350.5,
            }
        );
    }

    #[test]
    fn test_missing_flag_is_rejected() {
        let without_max = &FULL[..11];
        let err = Cli::try_parse_from(without_max).err().unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_negative_min_price_is_accepted() {
        let mut argv = FULL.to_vec();
        argv[10] = "-5";
        let cli = Cli::try_parse_from(argv).unwrap();
        assert_eq!(cli.min_price, -5.0);
    }

    #[test]
    fn test_non_numeric_price_is_rejected() {
        let mut argv = FULL.to_vec();
        argv[12] = "lots";
        let err = Cli::try_parse_from(argv).err().unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_hyphenated_flag_names_are_not_accepted() {
        let mut argv = FULL.to_vec();
        argv[1] = "--input-artifact";
        assert!(Cli::try_parse_from(argv).is_err());
    }
}
