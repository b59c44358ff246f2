//! Run configuration.
use std::path::PathBuf;

use crate::{Error, rank::DEFAULT_NUM_BINS, series::Steps};

/// Name of the results file written in the results directory.
pub const RESULTS_FILE: &str = "keyrank_results.csv";

/// Output format of the key rank series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

/// Validated parameters of a key rank run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Correct key
    pub key: Vec<u8>,
    /// Number of traces between two steps
    pub step_size: usize,
    /// Number of traces of the attack
    pub num_traces: usize,
    /// Directory holding the `final_kr` score files
    pub results_dir: PathBuf,
    /// Number of histogram bins per key byte
    pub num_bins: usize,
    /// Process steps in parallel
    pub parallel: bool,
    /// Output file, defaults to [`RESULTS_FILE`] in `results_dir`
    pub output: Option<PathBuf>,
    pub format: OutputFormat,
}

impl Config {
    /// Create a configuration with default options.
    ///
    /// `key` is hex encoded.
    pub fn new(
        key: &str,
        step_size: usize,
        num_traces: usize,
        results_dir: impl Into<PathBuf>,
    ) -> Result<Self, Error> {
        let config = Self {
            key: hex::decode(key.trim())?,
            step_size,
            num_traces,
            results_dir: results_dir.into(),
            num_bins: DEFAULT_NUM_BINS,
            parallel: false,
            output: None,
            format: OutputFormat::default(),
        };
        config.validate()?;

        Ok(config)
    }

    /// Check the parameters are consistent.
    pub fn validate(&self) -> Result<(), Error> {
        if self.key.is_empty() {
            return Err(Error::InvalidConfig("key is empty".to_string()));
        }
        if self.step_size == 0 {
            return Err(Error::InvalidConfig(
                "step size must be strictly positive".to_string(),
            ));
        }
        if self.num_traces < self.step_size {
            return Err(Error::InvalidConfig(format!(
                "number of traces ({}) is lower than the step size ({})",
                self.num_traces, self.step_size
            )));
        }
        if self.num_bins == 0 {
            return Err(Error::InvalidConfig(
                "number of bins must be strictly positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Return the steps of the run.
    pub fn steps(&self) -> Steps {
        Steps::new(self.step_size, self.num_traces)
    }

    /// Return the path of the results file.
    pub fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => match self.format {
                OutputFormat::Csv => self.results_dir.join(RESULTS_FILE),
                OutputFormat::Json => self.results_dir.join(RESULTS_FILE).with_extension("json"),
            },
        }
    }
}
