
use crate::data_types::iupac::decode_symbol;
use crate::errors::ConvPhaseError;

use bio::io::fasta;
use flate2::bufread::MultiGzDecoder;
use log::{debug, info};
use rustc_hash::FxHashSet as HashSet;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One individual's row of the alignment
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Sequence {
    /// Unique identifier from the FASTA header
    id: String,
    /// The raw symbols as they appeared in the input, one per column
    symbols: Vec<u8>
}

impl Sequence {
    pub fn new(id: String, symbols: Vec<u8>) -> Sequence {
        Sequence {
            id,
            symbols
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// A set of equal-length sequences, kept in input order
#[derive(Clone, Debug)]
pub struct Alignment {
    sequences: Vec<Sequence>,
    /// Shared length of every sequence
    length: usize
}

impl Alignment {
    /// Builds an alignment from already-loaded sequences.
    /// # Arguments
    /// * `sequences` - the rows, order is preserved
    /// # Errors
    /// * `EmptyInput` if no sequences are provided
    /// * `Format` if identifiers repeat, lengths differ, a sequence is empty, or a symbol is outside the IUPAC alphabet
    pub fn new(sequences: Vec<Sequence>) -> Result<Alignment, ConvPhaseError> {
        if sequences.is_empty() {
            return Err(ConvPhaseError::EmptyInput);
        }

        let length: usize = sequences[0].len();
        let mut seen_ids: HashSet<String> = Default::default();
        for sequence in sequences.iter() {
            if sequence.id().is_empty() {
                return Err(ConvPhaseError::format("sequence header has an empty identifier"));
            }
            if !seen_ids.insert(sequence.id().to_string()) {
                return Err(ConvPhaseError::format(format!("duplicate identifier {:?}", sequence.id())));
            }
            if sequence.is_empty() {
                return Err(ConvPhaseError::format(format!("sequence {:?} is empty", sequence.id())));
            }
            if sequence.len() != length {
                return Err(ConvPhaseError::format(format!(
                    "sequence {:?} has length {}, expected {} (from {:?})",
                    sequence.id(), sequence.len(), length, sequences[0].id()
                )));
            }
            if let Some((column, &byte)) = sequence.symbols().iter().enumerate().find(|(_i, &b)| decode_symbol(b).is_none()) {
                return Err(ConvPhaseError::format(format!(
                    "sequence {:?} has unsupported symbol {:?} at column {}",
                    sequence.id(), byte as char, column + 1
                )));
            }
        }

        Ok(Alignment {
            sequences,
            length
        })
    }

    /// Parses FASTA records from any buffered reader.
    /// # Errors
    /// * `Format` if a record cannot be parsed, plus everything checked by `Alignment::new`
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Alignment, ConvPhaseError> {
        let fasta_reader = fasta::Reader::from_bufread(reader);
        let mut sequences: Vec<Sequence> = vec![];
        for (index, entry) in fasta_reader.records().enumerate() {
            let record: fasta::Record = entry.map_err(|e| ConvPhaseError::format(format!("record {}: {}", index + 1, e)))?;
            // bio accepts headerless text as long as it starts with '>'; an empty id is still malformed
            record.check().map_err(|e| ConvPhaseError::format(format!("record {:?}: {}", record.id(), e)))?;
            sequences.push(Sequence::new(record.id().to_string(), record.seq().to_vec()));
        }
        Alignment::new(sequences)
    }

    /// Loads an alignment from a FASTA file, gzip is allowed
    /// # Arguments
    /// * `fasta_fn` - the FASTA filename; a `.gz` extension enables decompression
    pub fn from_path(fasta_fn: &Path) -> Result<Alignment, ConvPhaseError> {
        info!("Loading {:?}...", fasta_fn);
        let fasta_file: std::fs::File = std::fs::File::open(fasta_fn)?;
        let file_reader = BufReader::new(fasta_file);
        let alignment = if fasta_fn.extension().unwrap_or_default() == "gz" {
            debug!("Detected gzip extension, loading alignment with MultiGzDecoder...");
            let gz_decoder = MultiGzDecoder::new(file_reader);
            Alignment::from_reader(BufReader::new(gz_decoder))?
        } else {
            debug!("Loading alignment as plain-text file...");
            Alignment::from_reader(file_reader)?
        };
        info!("Finished loading {} sequences of length {}.", alignment.num_sequences(), alignment.length());
        Ok(alignment)
    }

    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    pub fn num_sequences(&self) -> usize {
        self.sequences.len()
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Iterates the raw symbols of one column, in sequence order
    pub fn column(&self, column: usize) -> impl Iterator<Item = u8> + '_ {
        self.sequences.iter().map(move |s| s.symbols[column])
    }
}
