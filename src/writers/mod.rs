/// Contains the FASTA writer for reconstructed haplotypes
pub mod haplotype_writer;
/// Contains the writer for the per-individual summary file
pub mod sample_stats;
/// Contains the writer for the per-column classification file
pub mod site_stats;
