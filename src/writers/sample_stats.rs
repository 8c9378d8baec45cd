
use serde::Serialize;
use std::fs::File;
use std::path::Path;

/// Per-individual summary of a conversion run
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct SampleStats {
    /// the individual identifier
    pub sample_name: String,
    /// phaseable sites with a called genotype
    pub phased_sites: usize,
    /// phaseable sites with a missing genotype, copied through unchanged
    pub missing_sites: usize,
    /// calls the engine flagged as low-confidence phase
    pub uncertain_phase: usize,
    /// calls the engine flagged as low-confidence genotype
    pub uncertain_genotype: usize
}

/// This is a wrapper for writing the per-individual summary to a file
pub struct SampleStatsWriter {
    /// Handle for the CSV writer
    csv_writer: csv::Writer<File>
}

impl SampleStatsWriter {
    /// Creates a new writer for a given filename
    /// # Arguments
    /// * `filename` - the path to write all stats to; ".csv" selects commas, anything else tabs
    pub fn new(filename: &Path) -> csv::Result<SampleStatsWriter> {
        let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
        let delimiter: u8 = if is_csv { b',' } else { b'\t' };
        let csv_writer: csv::Writer<File> = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(filename)?;
        Ok(SampleStatsWriter {
            csv_writer
        })
    }

    /// Writes one row per individual
    /// # Errors
    /// * if the csv_writer has any errors
    pub fn write_stats(&mut self, stats: &[SampleStats]) -> csv::Result<()> {
        for row in stats.iter() {
            self.csv_writer.serialize(row)?;
        }
        self.csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_csv() {
        let tmp = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        {
            let mut writer = SampleStatsWriter::new(tmp.path()).unwrap();
            writer.write_stats(&[
                SampleStats { sample_name: "ind1".to_string(), phased_sites: 3, missing_sites: 1, uncertain_phase: 2, uncertain_genotype: 0 },
                SampleStats { sample_name: "ind2".to_string(), ..Default::default() }
            ]).unwrap();
        }
        let text = std::fs::read_to_string(tmp.path()).unwrap();
        assert_eq!(text, "sample_name,phased_sites,missing_sites,uncertain_phase,uncertain_genotype\nind1,3,1,2,0\nind2,0,0,0,0\n");
    }
}
