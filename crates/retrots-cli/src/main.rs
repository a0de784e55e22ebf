use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::Parser;
use retrots_core::regressors::parse_offsets;
use retrots_core::{run, ColumnLayout, OutputFormat, RetroConfig};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Slice-based RETROICOR regressors from cardiac and respiratory recordings.
#[derive(Parser, Debug)]
#[command(name = "retrots", version)]
struct Cli {
    /// TOML run configuration; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Respiratory recording, one value per line
    #[arg(long)]
    resp_file: Option<PathBuf>,

    /// Cardiac recording, one value per line
    #[arg(long)]
    card_file: Option<PathBuf>,

    /// BIDS physio TSV (may be gzipped); needs --phys-json
    #[arg(long)]
    phys_file: Option<PathBuf>,

    /// BIDS physio JSON sidecar
    #[arg(long)]
    phys_json: Option<PathBuf>,

    /// Sampling frequency of the recordings in Hz
    #[arg(long = "freq", alias = "phys-fs")]
    phys_fs: Option<f64>,

    #[arg(long = "num-slices")]
    number_of_slices: Option<usize>,

    /// Volume repetition time in seconds
    #[arg(long)]
    volume_tr: Option<f64>,

    /// Number of output volumes
    #[arg(long, alias = "Nt")]
    num_time_pts: Option<usize>,

    /// Seconds (<= 0) between recording start and the first volume
    #[arg(long, allow_hyphen_values = true)]
    start_time: Option<f64>,

    /// alt+z, alt-z, seq+z, seq-z, custom, or a file of offsets
    #[arg(long)]
    slice_pattern: Option<String>,

    /// Offsets for the custom pattern, e.g. "[0, 1, 0.5]"
    #[arg(long)]
    slice_offset: Option<String>,

    /// Fit a/b amplitudes instead of unit harmonics
    #[arg(long)]
    aby: bool,

    /// niml or csv
    #[arg(long)]
    format: Option<OutputFormat>,

    /// slice_major or signal_major
    #[arg(long)]
    layout: Option<ColumnLayout>,

    #[arg(long, value_parser = BoolishValueParser::new())]
    card_out: Option<bool>,

    #[arg(long, value_parser = BoolishValueParser::new())]
    resp_out: Option<bool>,

    /// Accepted for compatibility; RVT regressors are not produced
    #[arg(long, value_parser = BoolishValueParser::new())]
    rvt_out: Option<bool>,

    #[arg(long)]
    prefix: Option<String>,

    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env();
    if let Ok(d) = format!("retrots_core={level}").parse() {
        filter = filter.add_directive(d);
    }
    if let Ok(d) = format!("retrots={level}").parse() {
        filter = filter.add_directive(d);
    }

    fmt().with_env_filter(filter).init();
}

impl Cli {
    /// Layer explicit flags over the file (or default) configuration.
    fn into_config(self) -> Result<RetroConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => RetroConfig::layered(path)?,
            None => {
                let mut config = RetroConfig::default();
                config.apply_env_overrides()?;
                config
            }
        };

        let inputs = &mut config.inputs;
        if self.resp_file.is_some() {
            inputs.resp_file = self.resp_file;
        }
        if self.card_file.is_some() {
            inputs.card_file = self.card_file;
        }
        if self.phys_file.is_some() {
            inputs.phys_file = self.phys_file;
        }
        if self.phys_json.is_some() {
            inputs.phys_json = self.phys_json;
        }

        if let Some(fs) = self.phys_fs {
            config.phys_fs = Some(fs);
        }
        if let Some(n) = self.number_of_slices {
            config.number_of_slices = n;
        }
        if let Some(tr) = self.volume_tr {
            config.volume_tr = tr;
        }
        if self.num_time_pts.is_some() {
            config.num_time_pts = self.num_time_pts;
        }
        if let Some(t) = self.start_time {
            config.start_time = t;
        }
        if let Some(pattern) = self.slice_pattern {
            config.slice_pattern = pattern;
        }
        if let Some(offsets) = self.slice_offset {
            config.slice_offsets = Some(parse_offsets(&offsets)?);
        }
        config.fit_coefficients |= self.aby;
        if let Some(format) = self.format {
            config.output_format = format;
        }
        if let Some(layout) = self.layout {
            config.layout = layout;
        }
        if let Some(on) = self.card_out {
            config.cardiac_out = on;
        }
        if let Some(on) = self.resp_out {
            config.respiration_out = on;
        }
        if let Some(on) = self.rvt_out {
            config.rvt_out = on;
        }
        if self.prefix.is_some() {
            config.prefix = self.prefix;
        }
        if let Some(dir) = self.out_dir {
            config.out_dir = dir;
        }
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().collect();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.into_config()?;
    match run(&config, &argv) {
        Ok(outcome) => {
            for (kind, reason) in &outcome.dropped {
                info!(signal = %kind, %reason, "signal type omitted from the table");
            }
            println!(
                "{} regressors x {} volumes -> {}",
                outcome.table.cols(),
                outcome.table.rows(),
                outcome.table_path.display()
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "run failed");
            Err(e.into())
        }
    }
}
