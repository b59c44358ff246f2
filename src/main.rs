use std::path::PathBuf;

use clap::Parser;
use keyrank::{
    config::{Config, OutputFormat},
    rank::{DEFAULT_NUM_BINS, KeyRankEstimator},
    scores::ScoreDirectory,
    series::{KeyRankRecord, key_rank_series, par_key_rank_series},
};

#[cfg(feature = "progress_bar")]
use keyrank::util::progress_bar;

#[derive(Parser)]
#[command(name = "keyrank")]
#[command(about = "Estimate bounds on the key rank from side channel attack scores", long_about = None)]
struct Cli {
    /// Correct key, in hexadecimal. Example: e07f16bdb9e50346a2277cd382774270
    key: String,

    /// Number of traces between two steps
    step_size: usize,

    /// Number of traces of the attack
    num_traces: usize,

    /// Directory holding the final_kr/<step>.txt score files
    results_dir: PathBuf,

    /// Number of histogram bins per key byte
    #[arg(long, default_value_t = DEFAULT_NUM_BINS)]
    bins: usize,

    /// Process steps in parallel
    #[arg(long)]
    parallel: bool,

    /// Results file [default: <RESULTS_DIR>/keyrank_results.csv]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Results file format
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,
}

impl Cli {
    fn into_config(self) -> Result<Config, keyrank::Error> {
        let config = Config {
            num_bins: self.bins,
            parallel: self.parallel,
            output: self.output,
            format: self.format,
            ..Config::new(&self.key, self.step_size, self.num_traces, self.results_dir)?
        };
        config.validate()?;

        Ok(config)
    }
}

fn report(record: &KeyRankRecord) {
    println!("Key Rank after {} traces", record.traces);
    println!("\t lower bound {}", record.lower_bound);
    println!("\t upper bound {}", record.upper_bound);
}

fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_config()?;
    let steps = config.steps();
    let estimator = KeyRankEstimator::new(&config.key, config.num_bins);
    let source = ScoreDirectory::new(&config.results_dir);

    #[cfg(feature = "progress_bar")]
    let bar = progress_bar(steps.len());
    #[cfg(feature = "progress_bar")]
    let on_step = |record: &KeyRankRecord| {
        bar.suspend(|| report(record));
        bar.inc(1);
    };
    #[cfg(not(feature = "progress_bar"))]
    let on_step = report;

    let series = if config.parallel {
        par_key_rank_series(&estimator, &source, steps, on_step)?
    } else {
        key_rank_series(&estimator, &source, steps, on_step)?
    };

    #[cfg(feature = "progress_bar")]
    bar.finish();

    let output = config.output_path();
    match config.format {
        OutputFormat::Csv => series.save_csv(&output)?,
        OutputFormat::Json => series.save_json(&output)?,
    }
    println!("Key rank results saved to {}", output.display());

    Ok(())
}
