
/// CLI functionality and checks
pub mod cli;
/// Contains multiple wrappers for useful data types in ConvPhase
pub mod data_types;
/// Parses engine output and rebuilds full-length haplotypes
pub mod decoder;
/// Converts genotypes into the PHASE input matrix and keeps the mapping back to nucleotides
pub mod encoder;
/// Runs the external PHASE engine inside a run-scoped directory
pub mod engine;
/// Error type shared by every stage
pub mod errors;
/// Expansion of alignment symbols into diploid genotypes at phaseable sites
pub mod genotypes;
/// Organizes the primary workflow: classify, expand, encode, phase, decode, and reconstruct
pub mod pipeline;
/// Contains all the various output writer functionality
pub mod writers;
