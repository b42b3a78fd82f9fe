use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

use crate::report::DEFAULT_REPORT_FILE;

pub const MAX_PLANTS: usize = 10;

#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "Leaf health and sprayer status for a handful of plants", long_about = None)]
pub struct Args {
    /// Config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// ONNX model path, overrides config and environment
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Run inference on CUDA
    #[arg(long)]
    pub cuda: bool,

    /// Moisture percentage below which sprayers switch on
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Upper bound for one forward pass, in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// One plant as MOISTURE[:IMAGE], e.g. `30:leaf1.jpg` or `10`
    #[arg(long = "plant", required = true, num_args = 1, value_name = "MOISTURE[:IMAGE]")]
    pub plants: Vec<PlantArg>,

    /// CSV report path
    #[arg(long, default_value = DEFAULT_REPORT_FILE)]
    pub output: PathBuf,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlantArg {
    pub moisture: f32,
    pub image: Option<PathBuf>,
}

impl FromStr for PlantArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (moisture, image) = match s.split_once(':') {
            Some((m, img)) if !img.is_empty() => (m, Some(PathBuf::from(img))),
            Some((m, _)) => (m, None),
            None => (s, None),
        };
        let moisture: f32 = moisture
            .trim()
            .parse()
            .map_err(|_| format!("invalid moisture `{moisture}`"))?;
        if !(0.0..=100.0).contains(&moisture) {
            return Err(format!("moisture {moisture} is outside 0-100"));
        }
        Ok(Self { moisture, image })
    }
}
