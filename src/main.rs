
use convphase::cli::{Settings, check_settings, get_raw_settings};
use convphase::data_types::alignment::Alignment;
use convphase::data_types::iupac::validate_symbol_table;
use convphase::engine::{ExternalPhaseEngine, RunContext};
use convphase::pipeline::{ConversionResult, run_conversion};
use convphase::writers::haplotype_writer::HaplotypeWriter;
use convphase::writers::sample_stats::SampleStatsWriter;
use convphase::writers::site_stats::SiteStatsWriter;

use log::{LevelFilter, error, info};
use std::time::Instant;

fn main() {
    // get the settings
    let settings: Settings = get_raw_settings();
    let filter_level: LevelFilter = match settings.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };

    // immediately setup logging first
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();

    // okay, now we can check all the other settings
    let cli_settings: Settings = check_settings(settings);
    let start_time = Instant::now();

    if let Err(e) = validate_symbol_table() {
        error!("Internal symbol table is inconsistent: {}", e);
        std::process::exit(exitcode::SOFTWARE);
    }

    info!("Loading alignment from {:?}...", cli_settings.input_filename);
    let alignment: Alignment = match Alignment::from_path(&cli_settings.input_filename) {
        Ok(a) => a,
        Err(e) => {
            error!("Error while loading alignment: {}", e);
            std::process::exit(e.exit_code());
        }
    };
    info!("Loaded {} sequences of length {}.", alignment.num_sequences(), alignment.length());

    // scoped so the run directory is cleaned up before we write outputs
    let result: ConversionResult = {
        let context: RunContext = match RunContext::new(cli_settings.temp_dir.as_deref(), cli_settings.keep_temp) {
            Ok(c) => c,
            Err(e) => {
                error!("Error while creating run directory: {}", e);
                std::process::exit(exitcode::CANTCREAT);
            }
        };
        let engine = ExternalPhaseEngine::new(cli_settings.engine_program.clone(), cli_settings.engine_parameters())
            .with_args(cli_settings.engine_args.clone());

        match run_conversion(&alignment, &cli_settings.pipeline_config(), &engine, &context) {
            Ok(r) => r,
            Err(e) => {
                error!("Error while phasing: {}", e);
                let code = e.exit_code();
                // exit skips destructors, so clean up the run directory first
                std::mem::drop(context);
                std::process::exit(code);
            }
        }
    };

    info!("Saving haplotypes to {:?}...", cli_settings.output_filename);
    let mut haplotype_writer = match HaplotypeWriter::from_path(&cli_settings.output_filename, cli_settings.haplotype_naming()) {
        Ok(w) => w,
        Err(e) => {
            error!("Error while creating output file: {}", e);
            std::process::exit(exitcode::CANTCREAT);
        }
    };
    let write_result = haplotype_writer.write_sequences(&result.sequences)
        .and_then(|()| haplotype_writer.finish());
    if let Err(e) = write_result {
        error!("Error while writing haplotypes: {}", e);
        std::process::exit(e.exit_code());
    }

    if let Some(ref filename) = cli_settings.sites_filename {
        info!("Saving site classification to {:?}...", filename);
        let write_result = SiteStatsWriter::new(filename)
            .and_then(|mut writer| writer.write_sites(&result.classification));
        if let Err(e) = write_result {
            error!("Error while writing sites file: {}", e);
            std::process::exit(exitcode::IOERR);
        }
    }

    if let Some(ref filename) = cli_settings.summary_filename {
        info!("Saving summary statistics to {:?}...", filename);
        let write_result = SampleStatsWriter::new(filename)
            .and_then(|mut writer| writer.write_stats(&result.sample_stats));
        if let Err(e) = write_result {
            error!("Error while writing summary statistics file: {}", e);
            std::process::exit(exitcode::IOERR);
        }
    }

    info!("Finished successfully after {} seconds.", start_time.elapsed().as_secs_f64());
}
