
use crate::data_types::alignment::Alignment;
use crate::data_types::iupac::Nucleotide;
use crate::data_types::sites::SiteClassification;
use crate::encoder::DecodeMap;
use crate::errors::ConvPhaseError;
use crate::genotypes::{Genotype, GenotypeTable};

use log::{debug, info, trace};
use rustc_hash::FxHashMap as HashMap;

const SECTION_BEGIN: &str = "BEGIN BESTPAIRS1";
const SECTION_END: &str = "END BESTPAIRS1";

/// One individual's haplotype pair as reported by the engine, still in code space
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PhasedCodes {
    id: String,
    /// 1-based line of the header, for error reporting
    line: usize,
    haplotypes: [Vec<i32>; 2],
    /// Number of tokens the engine wrapped in `()`
    uncertain_phase: usize,
    /// Number of tokens the engine wrapped in `[]`
    uncertain_genotype: usize
}

impl PhasedCodes {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn haplotypes(&self) -> &[Vec<i32>; 2] {
        &self.haplotypes
    }

    pub fn uncertain_phase(&self) -> usize {
        self.uncertain_phase
    }

    pub fn uncertain_genotype(&self) -> usize {
        self.uncertain_genotype
    }
}

/// Uncertainty marker found around a token
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TokenMark {
    Plain,
    UncertainPhase,
    UncertainGenotype
}

/// Strips `()` / `[]` from a token and parses the code
fn parse_token(token: &str, line: usize) -> Result<(i32, TokenMark), ConvPhaseError> {
    let (inner, mark) = if let Some(t) = token.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        (t, TokenMark::UncertainPhase)
    } else if let Some(t) = token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        (t, TokenMark::UncertainGenotype)
    } else {
        (token, TokenMark::Plain)
    };
    let code: i32 = inner.parse().map_err(|_| ConvPhaseError::ResultParse {
        line,
        message: format!("unrecognized allele token {token:?}")
    })?;
    Ok((code, mark))
}

/// Returns the identifier if this line is a record header (`#id` or `<n> #id`)
fn parse_header(line: &str) -> Option<&str> {
    let last = line.split_whitespace().last()?;
    last.strip_prefix('#')
}

/// Parses the best-pairs section of the engine output.
/// If the `BEGIN BESTPAIRS1` marker is absent, the whole text is treated as that section.
/// # Errors
/// * `ResultParse` if records are truncated, headers are missing, or a token is not an integer code
pub fn parse_phase_output(text: &str) -> Result<Vec<PhasedCodes>, ConvPhaseError> {
    let numbered: Vec<(usize, &str)> = text.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .collect();

    let section: &[(usize, &str)] = match numbered.iter().position(|(_i, l)| *l == SECTION_BEGIN) {
        Some(begin) => {
            let end = numbered[begin..].iter().position(|(_i, l)| *l == SECTION_END)
                .ok_or_else(|| ConvPhaseError::ResultParse {
                    line: numbered.len(),
                    message: format!("{SECTION_BEGIN:?} without matching {SECTION_END:?}")
                })?;
            &numbered[begin + 1..begin + end]
        },
        None => &numbered[..]
    };

    let mut records: Vec<PhasedCodes> = vec![];
    let mut lines = section.iter().filter(|(_i, l)| !l.is_empty());
    while let Some(&(line_number, header)) = lines.next() {
        let id = parse_header(header).ok_or_else(|| ConvPhaseError::ResultParse {
            line: line_number,
            message: format!("expected a record header \"#<id>\", found {header:?}")
        })?;

        let mut haplotypes: [Vec<i32>; 2] = [vec![], vec![]];
        let mut uncertain_phase: usize = 0;
        let mut uncertain_genotype: usize = 0;
        for haplotype in haplotypes.iter_mut() {
            let &(row_line, row) = lines.next().ok_or_else(|| ConvPhaseError::ResultParse {
                line: line_number,
                message: format!("record {id:?} ends before both haplotype rows")
            })?;
            if parse_header(row).is_some() {
                return Err(ConvPhaseError::ResultParse {
                    line: row_line,
                    message: format!("record {id:?} ends before both haplotype rows")
                });
            }
            for token in row.split_whitespace() {
                let (code, mark) = parse_token(token, row_line)?;
                match mark {
                    TokenMark::UncertainPhase => uncertain_phase += 1,
                    TokenMark::UncertainGenotype => uncertain_genotype += 1,
                    TokenMark::Plain => {}
                };
                haplotype.push(code);
            }
        }
        trace!("Parsed record {:?} at line {}", id, line_number);
        records.push(PhasedCodes {
            id: id.to_string(),
            line: line_number,
            haplotypes,
            uncertain_phase,
            uncertain_genotype
        });
    }
    debug!("Parsed {} records from engine output", records.len());
    Ok(records)
}

/// Decoded haplotypes over the phaseable sites for one individual
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PhaseResult {
    id: String,
    haplotypes: [Vec<Nucleotide>; 2],
    uncertain_phase: usize,
    uncertain_genotype: usize
}

impl PhaseResult {
    /// A result with no phaseable sites, used when the engine is skipped
    pub fn unphased(id: String) -> PhaseResult {
        PhaseResult {
            id,
            haplotypes: [vec![], vec![]],
            uncertain_phase: 0,
            uncertain_genotype: 0
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn haplotypes(&self) -> &[Vec<Nucleotide>; 2] {
        &self.haplotypes
    }

    pub fn uncertain_phase(&self) -> usize {
        self.uncertain_phase
    }

    pub fn uncertain_genotype(&self) -> usize {
        self.uncertain_genotype
    }
}

/// Matches parsed records to the submitted individuals and decodes the codes.
/// Records are associated by identifier, so engine-side reordering is tolerated.
/// # Arguments
/// * `records` - parsed engine output
/// * `ids` - the submitted identifiers, in submission order
/// * `decode_map` - the retained code mapping
/// # Errors
/// * `ResultMismatch` if the individual set or the number of sites differs from what was submitted
/// * `Decode` if a code is out of range for its site
pub fn decode_results(records: Vec<PhasedCodes>, ids: &[String], decode_map: &DecodeMap) -> Result<Vec<PhaseResult>, ConvPhaseError> {
    if records.len() != ids.len() {
        return Err(ConvPhaseError::ResultMismatch {
            message: format!("engine returned {} individuals, {} were submitted", records.len(), ids.len())
        });
    }

    let mut by_id: HashMap<String, PhasedCodes> = Default::default();
    for record in records.into_iter() {
        let line = record.line;
        if let Some(previous) = by_id.insert(record.id.clone(), record) {
            return Err(ConvPhaseError::ResultMismatch {
                message: format!("individual {:?} appears more than once (line {})", previous.id, line)
            });
        }
    }

    let num_sites: usize = decode_map.num_sites();
    let mut results: Vec<PhaseResult> = Vec::with_capacity(ids.len());
    for id in ids.iter() {
        let record = by_id.remove(id).ok_or_else(|| ConvPhaseError::ResultMismatch {
            message: format!("individual {id:?} is missing from the engine output")
        })?;

        let mut haplotypes: [Vec<Nucleotide>; 2] = [Vec::with_capacity(num_sites), Vec::with_capacity(num_sites)];
        for (hap_index, codes) in record.haplotypes.iter().enumerate() {
            if codes.len() != num_sites {
                return Err(ConvPhaseError::ResultMismatch {
                    message: format!(
                        "individual {:?} haplotype {} has {} sites, {} were submitted (line {})",
                        id, hap_index + 1, codes.len(), num_sites, record.line
                    )
                });
            }
            for (site_index, &code) in codes.iter().enumerate() {
                let allele = u8::try_from(code).ok()
                    .and_then(|c| decode_map.site(site_index).decode(c))
                    .ok_or_else(|| ConvPhaseError::Decode {
                        individual: id.clone(),
                        site: site_index,
                        code: code.to_string()
                    })?;
                haplotypes[hap_index].push(allele);
            }
        }

        results.push(PhaseResult {
            id: id.clone(),
            haplotypes,
            uncertain_phase: record.uncertain_phase,
            uncertain_genotype: record.uncertain_genotype
        });
    }
    info!("Decoded haplotypes for {} individuals at {} sites.", results.len(), num_sites);
    Ok(results)
}

/// Full-length haplotype pair for one individual
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReconstructedSequence {
    id: String,
    haplotypes: [Vec<u8>; 2]
}

impl ReconstructedSequence {
    pub fn new(id: String, haplotypes: [Vec<u8>; 2]) -> ReconstructedSequence {
        ReconstructedSequence {
            id,
            haplotypes
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn haplotypes(&self) -> &[Vec<u8>; 2] {
        &self.haplotypes
    }
}

/// Merges decoded alleles into the original sequences.
/// Pass-through columns and cells that were missing before encoding keep the original symbol.
/// # Arguments
/// * `alignment` - the original alignment
/// * `classification` - the site classification used for encoding
/// * `genotypes` - the genotypes submitted to the engine
/// * `results` - decoded results, in alignment order
/// # Errors
/// * `ResultMismatch` if the result set does not line up with the alignment, or the engine changed a called genotype
pub fn reconstruct_sequences(
    alignment: &Alignment, classification: &SiteClassification, genotypes: &GenotypeTable, results: &[PhaseResult]
) -> Result<Vec<ReconstructedSequence>, ConvPhaseError> {
    if results.len() != alignment.num_sequences() {
        return Err(ConvPhaseError::ResultMismatch {
            message: format!("{} results for {} sequences", results.len(), alignment.num_sequences())
        });
    }

    let mut reconstructed: Vec<ReconstructedSequence> = Vec::with_capacity(results.len());
    for (individual, (sequence, result)) in alignment.sequences().iter().zip(results.iter()).enumerate() {
        if sequence.id() != result.id() {
            return Err(ConvPhaseError::ResultMismatch {
                message: format!("result {:?} is in the slot of sequence {:?}", result.id(), sequence.id())
            });
        }

        if result.haplotypes.iter().any(|h| h.len() != classification.num_phaseable()) {
            return Err(ConvPhaseError::ResultMismatch {
                message: format!("result {:?} does not cover all {} phaseable sites", result.id(), classification.num_phaseable())
            });
        }

        let mut haplotypes: [Vec<u8>; 2] = [sequence.symbols().to_vec(), sequence.symbols().to_vec()];
        for (site_index, &column) in classification.phaseable_columns().iter().enumerate() {
            let (a, b) = match genotypes.get(individual, site_index) {
                Genotype::Called(a, b) => (a, b),
                Genotype::Missing(_) => continue
            };
            let alleles = classification.site(column).allele_set().alleles();
            let phased = [result.haplotypes[0][site_index], result.haplotypes[1][site_index]];

            // the engine must only phase a called genotype, never change it
            let expected = [alleles[a as usize], alleles[b as usize]];
            let same_pair = (phased[0] == expected[0] && phased[1] == expected[1]) ||
                (phased[0] == expected[1] && phased[1] == expected[0]);
            if !same_pair {
                return Err(ConvPhaseError::ResultMismatch {
                    message: format!(
                        "{:?} column {}: engine returned {}/{} for genotype {}/{}",
                        sequence.id(), column + 1, phased[0], phased[1], expected[0], expected[1]
                    )
                });
            }
            haplotypes[0][column] = phased[0].to_ascii();
            haplotypes[1][column] = phased[1].to_ascii();
        }

        reconstructed.push(ReconstructedSequence {
            id: sequence.id().to_string(),
            haplotypes
        });
    }
    Ok(reconstructed)
}
