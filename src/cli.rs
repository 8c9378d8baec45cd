
use clap::Parser;
use chrono::Datelike;
use lazy_static::lazy_static;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::data_types::sites::AmbiguityPolicy;
use crate::engine::EngineParameters;
use crate::pipeline::PipelineConfig;
use crate::writers::haplotype_writer::HaplotypeNaming;

lazy_static! {
    /// Stores the full version string we plan to use.
    /// # Examples
    /// * `0.1.0-6bb9635-dirty` - while on a dirty branch
    /// * `0.1.0-6bb9635` - with a fresh commit
    pub static ref FULL_VERSION: String = format!("{}-{}", env!("CARGO_PKG_VERSION"), option_env!("VERGEN_GIT_DESCRIBE").unwrap_or("unknown"));
}

#[derive(Clone, Parser)]
#[clap(author,
    version = &**FULL_VERSION,
    about,
    after_help = format!("Copyright (C) 2021-{}     ConvPhase developers
This program comes with ABSOLUTELY NO WARRANTY; it is free software
distributed under the GNU General Public License v3 or later.", chrono::Utc::now().year()))]
pub struct Settings {
    /// Input multiple sequence alignment in FASTA format (optionally gzipped)
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "input")]
    #[clap(value_name = "FASTA")]
    #[clap(help_heading = Some("Input/Output"))]
    pub input_filename: PathBuf,

    /// Output phased haplotypes in FASTA format, two records per individual
    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(value_name = "FASTA")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_filename: PathBuf,

    /// Output per-column classification file (optional, csv/tsv)
    #[clap(long = "sites-file")]
    #[clap(value_name = "FILE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub sites_filename: Option<PathBuf>,

    /// Output per-individual summary file (optional, csv/tsv)
    #[clap(long = "summary-file")]
    #[clap(value_name = "FILE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub summary_filename: Option<PathBuf>,

    /// Suffix appended to the identifier of the first haplotype
    #[clap(long = "suffix-a")]
    #[clap(value_name = "SUFFIX")]
    #[clap(default_value = "a")]
    #[clap(help_heading = Some("Input/Output"))]
    pub suffix_a: String,

    /// Suffix appended to the identifier of the second haplotype
    #[clap(long = "suffix-b")]
    #[clap(value_name = "SUFFIX")]
    #[clap(default_value = "b")]
    #[clap(help_heading = Some("Input/Output"))]
    pub suffix_b: String,

    /// Enable verbose output
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Controls which ambiguity codes may add alleles to a column
    #[clap(long = "ambiguity-policy")]
    #[clap(value_name = "POLICY")]
    #[clap(value_enum)]
    #[clap(default_value_t = AmbiguityPolicy::PairCodes)]
    #[clap(help_heading = Some("Site Classification"))]
    pub ambiguity_policy: AmbiguityPolicy,

    /// Path or name of the PHASE engine executable
    #[clap(long = "engine")]
    #[clap(value_name = "PROGRAM")]
    #[clap(default_value = "PHASE")]
    #[clap(help_heading = Some("Engine"))]
    pub engine_program: PathBuf,

    /// Extra argument passed to the engine before the positional arguments (repeatable)
    #[clap(long = "engine-arg")]
    #[clap(value_name = "ARG")]
    #[clap(allow_hyphen_values = true)]
    #[clap(help_heading = Some("Engine"))]
    pub engine_args: Vec<String>,

    /// Number of main iterations
    #[clap(long = "iterations")]
    #[clap(value_name = "COUNT")]
    #[clap(default_value = "100")]
    #[clap(help_heading = Some("Engine"))]
    pub iterations: usize,

    /// Thinning interval between samples
    #[clap(long = "thinning")]
    #[clap(value_name = "COUNT")]
    #[clap(default_value = "1")]
    #[clap(help_heading = Some("Engine"))]
    pub thinning: usize,

    /// Number of burn-in iterations
    #[clap(long = "burn-in")]
    #[clap(value_name = "COUNT")]
    #[clap(default_value = "100")]
    #[clap(help_heading = Some("Engine"))]
    pub burn_in: usize,

    /// Fixed random seed for the engine (default: engine chooses)
    #[clap(long = "seed")]
    #[clap(value_name = "SEED")]
    #[clap(help_heading = Some("Engine"))]
    pub seed: Option<u64>,

    /// Minimum posterior probability for a confident phase call
    #[clap(long = "phase-threshold")]
    #[clap(value_name = "PROB")]
    #[clap(default_value = "0.9")]
    #[clap(help_heading = Some("Engine"))]
    pub phase_threshold: f64,

    /// Minimum posterior probability for a confident genotype call
    #[clap(long = "allele-threshold")]
    #[clap(value_name = "PROB")]
    #[clap(default_value = "0.9")]
    #[clap(help_heading = Some("Engine"))]
    pub allele_threshold: f64,

    /// Wall-clock limit for the engine in seconds (default: no limit)
    #[clap(long = "engine-timeout")]
    #[clap(value_name = "SECONDS")]
    #[clap(help_heading = Some("Engine"))]
    pub engine_timeout: Option<f64>,

    /// Parent directory for the run-scoped engine directory (default: system temp)
    #[clap(long = "temp-dir")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Engine"))]
    pub temp_dir: Option<PathBuf>,

    /// Keep the engine input/output files after the run
    #[clap(long = "keep-temp")]
    #[clap(help_heading = Some("Engine"))]
    pub keep_temp: bool,
}

/// Checks if a file exists and will otherwise exit
/// # Arguments
/// * `filename` - the file path to check for
/// * `label` - the label to use for error messages
fn check_required_filename(filename: &Path, label: &str) {
    if !filename.exists() {
        error!("{} does not exist: \"{}\"", label, filename.display());
        std::process::exit(exitcode::NOINPUT);
    } else {
        info!("{}: \"{}\"", label, filename.display());
    }
}

/// Checks that a probability flag is within [0.0, 1.0] and will otherwise exit
fn check_probability(value: f64, flag: &str) {
    if !(0.0..=1.0).contains(&value) {
        error!("{} must be in the range [0.0, 1.0], got {}", flag, value);
        std::process::exit(exitcode::USAGE);
    }
}

impl Settings {
    /// Builds the library-level pipeline configuration from our CLI settings
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            ambiguity_policy: self.ambiguity_policy
        }
    }

    /// Builds the engine run parameters from our CLI settings
    pub fn engine_parameters(&self) -> EngineParameters {
        EngineParameters {
            iterations: self.iterations,
            thinning: self.thinning,
            burn_in: self.burn_in,
            seed: self.seed,
            phase_threshold: self.phase_threshold,
            allele_threshold: self.allele_threshold,
            timeout: self.engine_timeout.map(Duration::from_secs_f64)
        }
    }

    /// Builds the haplotype naming scheme; suffixes were validated in `check_settings`
    pub fn haplotype_naming(&self) -> HaplotypeNaming {
        HaplotypeNaming::new(&self.suffix_a, &self.suffix_b).unwrap_or_default()
    }
}

pub fn get_raw_settings() -> Settings {
    Settings::parse()
}

/// Do some additional checks here, we may increase these as we go.
/// Also can modify settings if needed since we're passing it around.
/// # Arguments
/// * `settings` - the raw settings, nothing has been checked other than what clap does for us.
pub fn check_settings(mut settings: Settings) -> Settings {
    //check for any of our required files
    check_required_filename(&settings.input_filename, "Alignment file");
    info!("Output file: \"{}\"", settings.output_filename.display());
    if let Some(sites_fn) = settings.sites_filename.as_ref() {
        info!("Sites file: \"{}\"", sites_fn.display());
    }
    if let Some(summary_fn) = settings.summary_filename.as_ref() {
        info!("Summary file: \"{}\"", summary_fn.display());
    }
    if let Some(temp_dir) = settings.temp_dir.as_ref() {
        check_required_filename(temp_dir, "Temporary directory");
    }

    if let Err(e) = HaplotypeNaming::new(&settings.suffix_a, &settings.suffix_b) {
        error!("Invalid haplotype suffixes: {}", e);
        std::process::exit(exitcode::USAGE);
    }

    check_probability(settings.phase_threshold, "--phase-threshold");
    check_probability(settings.allele_threshold, "--allele-threshold");

    // 0 doesn't make sense, so lets just error proof it up to 1
    if settings.iterations == 0 {
        warn!("--iterations of 0 is not supported, using 1");
        settings.iterations = 1;
    }
    if settings.thinning == 0 {
        warn!("--thinning of 0 is not supported, using 1");
        settings.thinning = 1;
    }

    // a non-positive timeout means no limit
    if let Some(timeout) = settings.engine_timeout {
        if !timeout.is_finite() || timeout <= 0.0 {
            warn!("Ignoring --engine-timeout {}, the engine will run without a limit", timeout);
            settings.engine_timeout = None;
        }
    }

    // dump stuff to the logger
    info!("Site classification:");
    info!("\tAmbiguity policy: {}", settings.ambiguity_policy);

    info!("Engine:");
    info!("\tProgram: {:?}", settings.engine_program);
    if !settings.engine_args.is_empty() {
        info!("\tExtra arguments: {:?}", settings.engine_args);
    }
    info!("\tIterations / thinning / burn-in: {} / {} / {}", settings.iterations, settings.thinning, settings.burn_in);
    match settings.seed {
        Some(seed) => info!("\tSeed: {}", seed),
        None => info!("\tSeed: ENGINE DEFAULT")
    };
    info!("\tPhase threshold: {}", settings.phase_threshold);
    info!("\tAllele threshold: {}", settings.allele_threshold);
    match settings.engine_timeout {
        Some(timeout) => info!("\tTimeout: {} seconds", timeout),
        None => info!("\tTimeout: DISABLED")
    };
    if settings.keep_temp {
        info!("\tKeep engine files: ENABLED");
    }

    info!("Haplotype suffixes: {:?}, {:?}", settings.suffix_a, settings.suffix_b);

    //send the settings back
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::try_parse_from(["convphase", "-i", "in.fa", "-o", "out.fa"]).unwrap();
        assert_eq!(settings.ambiguity_policy, AmbiguityPolicy::PairCodes);
        assert_eq!(settings.engine_program, PathBuf::from("PHASE"));
        assert_eq!(settings.engine_parameters(), EngineParameters::default());
        assert_eq!(settings.haplotype_naming(), HaplotypeNaming::default());
        assert_eq!(settings.pipeline_config(), PipelineConfig::default());
        assert!(!settings.keep_temp);
    }

    #[test]
    fn test_engine_options() {
        let settings = Settings::try_parse_from([
            "convphase", "-i", "in.fa", "-o", "out.fa",
            "--ambiguity-policy", "unambiguous",
            "--engine", "/opt/phase/PHASE",
            "--engine-arg", "-MR", "--engine-arg", "-X10",
            "--iterations", "500", "--seed", "42",
            "--engine-timeout", "2.5",
            "--suffix-a", "_1", "--suffix-b", "_2"
        ]).unwrap();
        assert_eq!(settings.ambiguity_policy, AmbiguityPolicy::Unambiguous);
        assert_eq!(settings.engine_args, vec!["-MR".to_string(), "-X10".to_string()]);
        let parameters = settings.engine_parameters();
        assert_eq!(parameters.iterations, 500);
        assert_eq!(parameters.seed, Some(42));
        assert_eq!(parameters.timeout, Some(Duration::from_millis(2500)));
        assert_eq!(settings.haplotype_naming().name("x", 1), "x_2");
    }

    #[test]
    fn test_missing_required() {
        assert!(Settings::try_parse_from(["convphase", "-i", "in.fa"]).is_err());
        assert!(Settings::try_parse_from(["convphase", "-i", "in.fa", "-o", "out.fa", "--ambiguity-policy", "bogus"]).is_err());
    }
}
