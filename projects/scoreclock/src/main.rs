mod cli;
mod clock;
mod mapping;
mod matcher;
mod pipeline;
mod probe;
mod video;

use anyhow::{Context, Result};
use cli::Args;
use pipeline::detection::ScoreboardDetector;
use pipeline::ocr::ScoreboardOcr;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use video::opencv_reader::OpencvReader;

/// Playback starts this long before the matched offset.
const RENDER_LEAD_IN_MS: u64 = 3_000;

fn main() -> Result<ExitCode> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    let args = Args::parse_args();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Arguments: {:?}", args);

    if let Some(image_path) = &args.probe_image {
        let (mut detector, mut ocr) = load_models(&args)?;
        let report = probe::probe_image(image_path, &mut detector, &mut ocr, args.render)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(ExitCode::SUCCESS);
    }

    if args.map {
        let mut reader = OpencvReader::new(&args.video_path)?;
        let (mut detector, mut ocr) = load_models(&args)?;
        let (table, stats) =
            mapping::builder::build_mapping(&mut reader, &mut detector, &mut ocr, args.step_size)?;
        if table.is_empty() {
            tracing::warn!(
                "No clock readings recorded from {} sampled frames",
                stats.sampled
            );
        }
        table.save(&args.output_path)?;
    }

    let mappings_path = args.resolve_mappings_path();
    let table = mapping::MappingTable::load(&mappings_path)?;

    // clap guarantees a timestamp outside probe mode
    let timestamp = args.timestamp.as_deref().context("--timestamp is required")?;

    match matcher::find_nearest(&table, timestamp, args.error_margin)? {
        Some(found) => {
            tracing::info!(
                "Matched {} ({} ms away); the corresponding video timestamp is: {}",
                found.clock,
                found.distance_ms,
                found.video_offset
            );
            println!("{}", found.video_offset);
            if args.render {
                video::player::play_from(
                    &args.video_path,
                    found.video_offset_ms()?,
                    RENDER_LEAD_IN_MS,
                )?;
            }
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("No frames found within the error margin");
            Ok(ExitCode::from(2))
        }
    }
}

fn load_models(args: &Args) -> Result<(ScoreboardDetector, ScoreboardOcr)> {
    let weights = args
        .weights_path
        .to_str()
        .context("Weights path is not valid UTF-8")?;
    let detector = ScoreboardDetector::new(weights, args.min_confidence)
        .map_err(|e| anyhow::anyhow!("Failed to load model: {}", e))?;
    let ocr = ScoreboardOcr::new(&args.ocr_det_model, &args.ocr_rec_model, &args.ocr_charset)?;
    Ok((detector, ocr))
}
