
use crate::data_types::alignment::Alignment;
use crate::data_types::sites::{classify_sites, AmbiguityPolicy, SiteClassification};
use crate::decoder::{decode_results, parse_phase_output, reconstruct_sequences, PhaseResult, ReconstructedSequence};
use crate::encoder::encode_matrix;
use crate::engine::{PhaseEngine, RunContext};
use crate::errors::ConvPhaseError;
use crate::genotypes::{expand_genotypes, GenotypeTable};
use crate::writers::sample_stats::SampleStats;

use log::{debug, info};
use std::time::Instant;

/// Library-level settings for one conversion run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineConfig {
    /// How ambiguity codes contribute to site classification
    pub ambiguity_policy: AmbiguityPolicy
}

/// Everything a run produces
#[derive(Clone, Debug)]
pub struct ConversionResult {
    /// Classification of every input column
    pub classification: SiteClassification,
    /// Two full-length haplotypes per input individual, in input order
    pub sequences: Vec<ReconstructedSequence>,
    /// Per-individual summary
    pub sample_stats: Vec<SampleStats>
}

/// Runs classification, encoding, the engine, and reconstruction for one alignment.
/// Nothing partial is returned: any failure aborts the whole run.
/// # Arguments
/// * `alignment` - the loaded input alignment
/// * `config` - classification settings
/// * `engine` - the phasing engine to call; skipped when there is nothing to phase
/// * `context` - run-scoped directory and cancellation token
pub fn run_conversion<E: PhaseEngine + ?Sized>(
    alignment: &Alignment, config: &PipelineConfig, engine: &E, context: &RunContext
) -> Result<ConversionResult, ConvPhaseError> {
    let classification = classify_sites(alignment, config.ambiguity_policy);
    let genotypes = expand_genotypes(alignment, &classification);

    let results: Vec<PhaseResult> = if classification.num_phaseable() == 0 {
        info!("No phaseable sites found, skipping the phasing engine.");
        alignment.sequences().iter()
            .map(|s| PhaseResult::unphased(s.id().to_string()))
            .collect()
    } else {
        // the matrix only lives for the engine call, the decode map is all we keep
        let (matrix, decode_map) = encode_matrix(alignment, &classification, &genotypes)?;
        let engine_input: String = matrix.to_phase_input();

        info!("Phasing {} individuals at {} sites...", matrix.num_individuals(), matrix.num_sites());
        let start_time = Instant::now();
        let engine_output: String = engine.invoke(&engine_input, context)?;
        info!("Phasing engine finished in {:.3} seconds.", start_time.elapsed().as_secs_f64());

        let records = parse_phase_output(&engine_output)?;
        decode_results(records, matrix.ids(), &decode_map)?
    };

    let sequences = reconstruct_sequences(alignment, &classification, &genotypes, &results)?;
    let sample_stats = collect_sample_stats(&genotypes, &results);
    for stats in sample_stats.iter() {
        debug!("{:?}", stats);
    }

    Ok(ConversionResult {
        classification,
        sequences,
        sample_stats
    })
}

fn collect_sample_stats(genotypes: &GenotypeTable, results: &[PhaseResult]) -> Vec<SampleStats> {
    results.iter().enumerate()
        .map(|(individual, result)| {
            let missing_sites = genotypes.missing_count(individual);
            SampleStats {
                sample_name: result.id().to_string(),
                phased_sites: genotypes.num_sites() - missing_sites,
                missing_sites,
                uncertain_phase: result.uncertain_phase(),
                uncertain_genotype: result.uncertain_genotype()
            }
        })
        .collect()
}
