use crate::cleaning::{self, ConversionReport, LAST_REVIEW_COLUMN, PRICE_COLUMN};
use crate::config::{CleaningArgs, TrackingSettings};
use crate::error::Result;
use crate::metrics::{time_step, CleaningMetrics};
use crate::table::Table;
use crate::tracking::{Artifact, ArtifactManifest, ArtifactStore, Run, RunRecord};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const JOB_TYPE: &str = "basic_cleaning";
pub const CLEAN_SAMPLE_FILE: &str = "clean_sample.csv";

/// Result of one cleaning run
#[derive(Debug, Serialize)]
pub struct CleaningResult {
    pub input_artifact: String,
    pub rows_read: usize,
    pub rows_kept: usize,
    pub dates: DateStats,
    pub output_file: PathBuf,
    pub output_artifact: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DateStats {
    pub parsed: usize,
    pub missing: usize,
    pub coerced: usize,
}

impl From<ConversionReport> for DateStats {
    fn from(r: ConversionReport) -> Self {
        Self {
            parsed: r.parsed,
            missing: r.missing,
            coerced: r.coerced,
        }
    }
}

pub struct Pipeline;

impl Pipeline {
    /// Download, filter, convert, save and publish, in that order.
    /// Any failure aborts the remaining steps.
    #[instrument(skip(run, args, work_dir), fields(run_id = %run.id()))]
    pub fn run(run: &mut Run, args: &CleaningArgs, work_dir: &Path) -> Result<CleaningResult> {
        // Step 1: Resolve the input artifact
        info!("Obtaining artifact {}", args.input_artifact);
        let handle = run.use_artifact(&args.input_artifact)?;
        let artifact_local_path = handle.file()?;

        // Step 2: Load
        info!("Reading input dataframe from {}", artifact_local_path.display());
        let table = {
            let _timing = time_step("load");
            Table::read_csv(&artifact_local_path)?
        };

        // Step 3: Filter
        info!(
            "Restricting to items with prices between {} and {}",
            args.min_price, args.max_price
        );
        if args.min_price > args.max_price {
            warn!(
                min_price = args.min_price,
                max_price = args.max_price,
                "Minimum price exceeds maximum price, no rows can match"
            );
        }
        let mut cleaned = {
            let _timing = time_step("filter");
            cleaning::filter_price_range(&table, PRICE_COLUMN, args.min_price, args.max_price)?
        };
        CleaningMetrics::record_filter(table.len(), cleaned.len());
        info!(
            rows_read = table.len(),
            rows_kept = cleaned.len(),
            "Filtered rows by price"
        );

        // Step 4: Normalize
        info!("Converting column {} to datetime", LAST_REVIEW_COLUMN);
        let report = {
            let _timing = time_step("convert");
            cleaning::convert_datetime_column(&mut cleaned, LAST_REVIEW_COLUMN)?
        };
        if report.coerced > 0 {
            warn!(
                coerced = report.coerced,
                "Unparseable {} values replaced with missing", LAST_REVIEW_COLUMN
            );
            CleaningMetrics::record_dates_coerced(report.coerced);
        }

        // Step 5: Persist locally
        let output_file = work_dir.join(CLEAN_SAMPLE_FILE);
        info!("Saving cleaned dataset to {}", output_file.display());
        {
            let _timing = time_step("save");
            cleaned.write_csv(&output_file)?;
        }

        // Step 6: Publish
        info!("Logging cleaned dataset as artifact {}", args.output_artifact);
        let manifest = {
            let _timing = time_step("publish");
            Self::publish(run, args, &output_file)?
        };
        CleaningMetrics::record_published();
        info!("Published {}", manifest.qualified_name());

        Ok(CleaningResult {
            input_artifact: handle.manifest.qualified_name(),
            rows_read: table.len(),
            rows_kept: cleaned.len(),
            dates: report.into(),
            output_file,
            output_artifact: manifest.qualified_name(),
        })
    }

    fn publish(run: &mut Run, args: &CleaningArgs, file: &Path) -> Result<ArtifactManifest> {
        let mut artifact = Artifact::new(
            &args.output_artifact,
            &args.output_type,
            &args.output_description,
        )?;
        artifact.add_file(file)?;
        run.log_artifact(&artifact)
    }
}

/// Run the whole job inside a fresh tracked run.
///
/// The run is closed as finished on success and as failed otherwise; the
/// pipeline's own error is returned in the latter case.
pub fn run_basic_cleaning(
    store: Arc<dyn ArtifactStore>,
    settings: &TrackingSettings,
    args: &CleaningArgs,
    work_dir: &Path,
) -> Result<(CleaningResult, RunRecord)> {
    let mut run = Run::start(store, settings, JOB_TYPE)?;

    let outcome = run
        .update_config(args)
        .and_then(|_| Pipeline::run(&mut run, args, work_dir));

    match outcome {
        Ok(result) => {
            let record = run.finish()?;
            Ok((result, record))
        }
        Err(e) => {
            if let Err(close_err) = run.fail(&e) {
                warn!("Could not record run failure: {}", close_err);
            }
            Err(e)
        }
    }
}
