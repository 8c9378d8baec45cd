

use crate::decoder::ReconstructedSequence;
use crate::errors::ConvPhaseError;

use bio::io::fasta;
use flate2::Compression;
use flate2::write::GzEncoder;
use log::{debug, info};
use simple_error::{SimpleError, bail};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// Controls how the two haplotype records of an individual are named
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HaplotypeNaming {
    suffixes: [String; 2]
}

impl Default for HaplotypeNaming {
    fn default() -> Self {
        HaplotypeNaming {
            suffixes: ["a".to_string(), "b".to_string()]
        }
    }
}

impl HaplotypeNaming {
    /// Creates a naming scheme from two suffixes
    /// # Errors
    /// * if the suffixes are identical, since the two records would collide
    /// * if a suffix contains whitespace, which FASTA readers would truncate
    pub fn new(first: &str, second: &str) -> Result<HaplotypeNaming, SimpleError> {
        if first == second {
            bail!("Haplotype suffixes must differ, both are {:?}", first);
        }
        if first.chars().chain(second.chars()).any(|c| c.is_whitespace()) {
            bail!("Haplotype suffixes cannot contain whitespace: {:?}, {:?}", first, second);
        }
        Ok(HaplotypeNaming {
            suffixes: [first.to_string(), second.to_string()]
        })
    }

    /// Record name for haplotype 0 or 1 of an individual
    pub fn name(&self, id: &str, haplotype: usize) -> String {
        format!("{}{}", id, self.suffixes[haplotype])
    }
}

/// Output stream for the haplotype file, plain or gzip
enum OutputStream {
    Plain(BufWriter<File>),
    Gz(GzEncoder<BufWriter<File>>)
}

impl Write for OutputStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            OutputStream::Plain(w) => w.write(buf),
            OutputStream::Gz(w) => w.write(buf)
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            OutputStream::Plain(w) => w.flush(),
            OutputStream::Gz(w) => w.flush()
        }
    }
}

impl OutputStream {
    /// Completes any compressed stream and flushes everything down to the file
    fn finish(self) -> std::io::Result<File> {
        let buffered: BufWriter<File> = match self {
            OutputStream::Plain(w) => w,
            OutputStream::Gz(w) => w.finish()?
        };
        buffered.into_inner().map_err(|e| e.into_error())
    }
}

/// Writes reconstructed haplotypes as FASTA, two records per individual.
/// Records go to a staging file next to the destination, which only replaces the destination in `finish`.
/// If the writer is dropped without finishing, the staging file is removed.
pub struct HaplotypeWriter {
    stream: OutputStream,
    /// Staging file, deleted on drop unless persisted
    staging_path: TempPath,
    final_path: PathBuf,
    naming: HaplotypeNaming,
    records_written: usize
}

impl HaplotypeWriter {
    /// Creates a writer for a file path; a `.gz` extension enables gzip compression
    /// # Errors
    /// * if the staging file cannot be created in the destination directory
    pub fn from_path(filename: &Path, naming: HaplotypeNaming) -> std::io::Result<HaplotypeWriter> {
        let directory: &Path = match filename.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new(".")
        };
        let (file, staging_path) = tempfile::Builder::new()
            .prefix(".convphase-")
            .suffix(".tmp")
            .tempfile_in(directory)?
            .into_parts();
        debug!("Staging haplotypes in {:?}", staging_path);

        let file = BufWriter::new(file);
        let stream = if filename.extension().unwrap_or_default() == "gz" {
            debug!("Detected gzip extension, compressing output...");
            OutputStream::Gz(GzEncoder::new(file, Compression::default()))
        } else {
            OutputStream::Plain(file)
        };
        Ok(HaplotypeWriter {
            stream,
            staging_path,
            final_path: filename.to_path_buf(),
            naming,
            records_written: 0
        })
    }

    /// Writes both haplotypes of every individual, in the given order
    /// # Errors
    /// * if the underlying writer fails
    pub fn write_sequences(&mut self, sequences: &[ReconstructedSequence]) -> Result<(), ConvPhaseError> {
        let mut fasta_writer = fasta::Writer::new(&mut self.stream);
        for sequence in sequences.iter() {
            for (hap_index, haplotype) in sequence.haplotypes().iter().enumerate() {
                let name = self.naming.name(sequence.id(), hap_index);
                fasta_writer.write(&name, None, haplotype)?;
                self.records_written += 1;
            }
        }
        fasta_writer.flush()?;
        Ok(())
    }

    /// Completes the output and moves it into place.
    /// # Errors
    /// * if finishing the gzip stream, syncing, or renaming the staging file fails
    pub fn finish(self) -> Result<(), ConvPhaseError> {
        let file: File = self.stream.finish()?;
        file.sync_all()?;
        self.staging_path.persist(&self.final_path).map_err(|e| e.error)?;
        info!("Wrote {} haplotype records to {:?}.", self.records_written, self.final_path);
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }
}
