use anyhow::{Context, Result, anyhow};
use clap::Parser;
use labscan::{
    ExtractionError, ReportExtractor,
    config::ExtractorConfig,
    ocr::TextRecognizer,
    report::Report,
    risk::{HemoglobinThreshold, RiskLabel, RiskModel},
};
use log::{error, info};
use serde::Serialize;
use std::{path::PathBuf, time::Duration};
use tokio::{signal, task::JoinHandle};

/// Lab report scanner - extracts blood test values from a report image
#[derive(Parser, Debug)]
#[command(name = "labscan")]
#[command(about = "Extract and classify lab values from a scanned report", long_about = None)]
struct Args {
    /// Report image (PNG, JPEG, ...)
    #[arg(required_unless_present = "engine_version")]
    image: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Directory containing the tesseract language data
    #[arg(long)]
    tessdata: Option<PathBuf>,

    /// Tesseract language, e.g. "eng" or "eng+hin"
    #[arg(short = 'l', long)]
    lang: Option<String>,

    /// Give up on the request after this many seconds
    #[arg(short = 't', long, default_value = "120")]
    timeout_secs: u64,

    /// Run recognition calls one after another instead of on the thread pool
    #[arg(long, default_value = "false")]
    sequential: bool,

    /// Skip the deskewed image variant
    #[arg(long, default_value = "false")]
    no_deskew: bool,

    /// Add an anemia risk prediction when hemoglobin was recognized
    #[arg(long, default_value = "false")]
    assess_risk: bool,

    /// Print the report on a single line
    #[arg(long, default_value = "false")]
    compact: bool,

    /// Print the OCR engine version and exit
    #[arg(long, default_value = "false")]
    engine_version: bool,
}

#[derive(Serialize)]
struct RiskAssessment {
    hemoglobin: f64,
    prediction: RiskLabel,
}

#[derive(Serialize)]
struct Output<'a> {
    status: &'static str,
    filename: String,
    #[serde(flatten)]
    report: &'a Report,
    #[serde(skip_serializing_if = "Option::is_none")]
    risk_assessment: Option<RiskAssessment>,
}

fn build_config(args: &Args) -> Result<ExtractorConfig> {
    let mut config = match &args.config {
        Some(path) => ExtractorConfig::load(path)?,
        None => ExtractorConfig::default(),
    };

    if let Some(dir) = &args.tessdata {
        config.tesseract.tessdata_dir = Some(dir.clone());
    }
    if let Some(lang) = &args.lang {
        config.tesseract.language = lang.clone();
    }
    if args.sequential {
        config.parallel = false;
    }
    if args.no_deskew {
        config.preprocess.deskew = false;
    }

    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter(None, log::LevelFilter::Info)
        .filter(Some("labscan"), log::LevelFilter::Debug)
        .parse_default_env()
        .init();

    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(args));
    // A timed out or cancelled extraction may still occupy a blocking thread.
    runtime.shutdown_background();
    result
}

/// Waits for the extraction worker, giving up on timeout or when `cancel`
/// resolves. The worker itself is left to the runtime shutdown.
async fn await_extraction(
    worker: JoinHandle<Result<Report, ExtractionError>>,
    timeout: Duration,
    cancel: impl Future<Output = std::io::Result<()>>,
) -> Result<Report> {
    tokio::select! {
        result = tokio::time::timeout(timeout, worker) => {
            match result {
                Ok(Ok(Ok(report))) => Ok(report),
                Ok(Ok(Err(err))) => {
                    error!("Extraction failed: {}", err);
                    Err(err.into())
                }
                Ok(Err(join_err)) => {
                    let err = ExtractionError::Internal(anyhow!("extraction task aborted: {}", join_err));
                    error!("{}", err);
                    Err(err.into())
                }
                Err(_) => {
                    anyhow::bail!("Extraction timed out after {:?}", timeout);
                }
            }
        }
        result = cancel => {
            match result {
                Ok(()) => {
                    info!("Received Ctrl-C, abandoning extraction");
                    anyhow::bail!("Extraction cancelled");
                }
                Err(err) => {
                    anyhow::bail!("Unable to listen for shutdown signal: {}", err);
                }
            }
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = build_config(&args)?;
    let extractor = ReportExtractor::with_tesseract(config);

    if args.engine_version {
        println!("{}", extractor.recognizer().version()?);
        return Ok(());
    }

    let Some(path) = args.image.clone() else {
        anyhow::bail!("No image given");
    };
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    info!("Processing {} ({} bytes)", path.display(), bytes.len());

    let worker = tokio::task::spawn_blocking(move || extractor.extract(&bytes));
    let report = await_extraction(
        worker,
        Duration::from_secs(args.timeout_secs),
        signal::ctrl_c(),
    )
    .await?;

    let risk_assessment = if args.assess_risk {
        report.parameters.get("Hemoglobin").map(|hb| RiskAssessment {
            hemoglobin: hb.value,
            prediction: HemoglobinThreshold::default().predict(hb.value),
        })
    } else {
        None
    };

    let output = Output {
        status: "success",
        filename: path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        report: &report,
        risk_assessment,
    };

    let json = if args.compact {
        serde_json::to_string(&output)?
    } else {
        serde_json::to_string_pretty(&output)?
    };
    println!("{json}");

    info!("Done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use labscan::report::ProcessingInfo;
    use std::{collections::BTreeMap, future, time::Instant};

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    fn slow_worker() -> JoinHandle<Result<Report, ExtractionError>> {
        tokio::task::spawn_blocking(|| {
            std::thread::sleep(Duration::from_secs(5));
            Err(ExtractionError::NoTextExtracted { attempts: 0 })
        })
    }

    #[test]
    fn test_timeout_does_not_wait_for_worker() {
        let start = Instant::now();
        let runtime = runtime();
        let result = runtime.block_on(async {
            await_extraction(slow_worker(), Duration::from_millis(50), future::pending()).await
        });
        runtime.shutdown_background();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_cancel_is_an_error() {
        let start = Instant::now();
        let runtime = runtime();
        let result = runtime.block_on(async {
            await_extraction(slow_worker(), Duration::from_secs(60), async { Ok(()) }).await
        });
        runtime.shutdown_background();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("cancelled"), "{err}");
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_worker_outcomes() {
        let runtime = runtime();

        let report = runtime
            .block_on(async {
                let worker = tokio::task::spawn_blocking(|| {
                    Ok(Report::build(BTreeMap::new(), ProcessingInfo::default()))
                });
                await_extraction(worker, Duration::from_secs(60), future::pending()).await
            })
            .unwrap();
        assert_eq!(report.summary.total_parameters, 0);

        let err = runtime
            .block_on(async {
                let worker = tokio::task::spawn_blocking(|| {
                    Err(ExtractionError::NoTextExtracted { attempts: 15 })
                });
                await_extraction(worker, Duration::from_secs(60), future::pending()).await
            })
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExtractionError>(),
            Some(ExtractionError::NoTextExtracted { attempts: 15 })
        ));

        let err = runtime
            .block_on(async {
                let worker = tokio::task::spawn_blocking(|| -> Result<Report, ExtractionError> {
                    panic!("worker crashed")
                });
                await_extraction(worker, Duration::from_secs(60), future::pending()).await
            })
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExtractionError>(),
            Some(ExtractionError::Internal(_))
        ));
    }
}
