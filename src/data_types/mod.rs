
/// Wrapper for an in-memory multiple sequence alignment
pub mod alignment;
/// IUPAC nucleotide alphabet and ambiguity code tables
pub mod iupac;
/// Per-column allele tallies and site classes
pub mod sites;
