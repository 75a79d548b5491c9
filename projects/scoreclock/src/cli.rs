use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Map a soccer broadcast's scoreboard clock to video positions and look up
/// where a given match time was shown.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Scoreboard detector weights (ONNX)
    #[arg(long, env = "SCORECLOCK_WEIGHTS", default_value = "model/weights/best.onnx")]
    pub weights_path: PathBuf,

    /// OCR text detection model
    #[arg(long, env = "SCORECLOCK_OCR_DET", default_value = "model/ocr/det.mnn")]
    pub ocr_det_model: PathBuf,

    /// OCR text recognition model
    #[arg(long, env = "SCORECLOCK_OCR_REC", default_value = "model/ocr/rec.mnn")]
    pub ocr_rec_model: PathBuf,

    /// OCR character set
    #[arg(long, env = "SCORECLOCK_OCR_CHARSET", default_value = "model/ocr/keys.txt")]
    pub ocr_charset: PathBuf,

    /// Input video
    #[arg(long, env = "SCORECLOCK_VIDEO", default_value = "samples/videos/match.mp4")]
    pub video_path: PathBuf,

    /// Where a freshly built mapping table is written
    #[arg(long, env = "SCORECLOCK_OUTPUT", default_value = "samples/mappings/match.json")]
    pub output_path: PathBuf,

    /// Existing mapping table to use when not rebuilding
    #[arg(long, env = "SCORECLOCK_MAPPINGS")]
    pub mappings_path: Option<PathBuf>,

    /// Match time to look up, e.g. `67:12` or `48:30+`
    #[arg(long, required_unless_present = "probe_image")]
    pub timestamp: Option<String>,

    /// Rebuild the mapping table from the video
    #[arg(long, default_value = "true", action = ArgAction::Set, value_parser = parse_flag)]
    pub map: bool,

    /// Play the video from the matched position
    #[arg(long, default_value = "true", action = ArgAction::Set, value_parser = parse_flag)]
    pub render: bool,

    /// Maximum distance in seconds between the requested time and a recorded reading
    #[arg(long, default_value_t = 2)]
    pub error_margin: u64,

    /// Seconds between sampled frames during mapping
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub step_size: u64,

    /// Minimum detector confidence for a scoreboard box
    #[arg(long, default_value_t = 0.35)]
    pub min_confidence: f32,

    /// Run detection and OCR on a single image and print what was read
    #[arg(long)]
    pub probe_image: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short)]
    pub verbose: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Table the matcher reads: the fresh output when mapping, otherwise the
    /// explicit mappings path, falling back to the output path.
    pub fn resolve_mappings_path(&self) -> PathBuf {
        if self.map {
            return self.output_path.clone();
        }
        self.mappings_path
            .clone()
            .unwrap_or_else(|| self.output_path.clone())
    }
}

/// Strict boolean: `true` or `false` in any letter case.
fn parse_flag(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(format!("expected `true` or `false`, got `{}`", value)),
    }
}
