
use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::data_types::sites::SiteClassification;

/// Writes one row per alignment column describing how it was classified
pub struct SiteStatsWriter {
    /// Handle for the CSV writer
    csv_writer: csv::Writer<File>
}

/// Contains all the data written to each row of the sites file
#[derive(Serialize)]
struct SiteRow {
    /// 1-based alignment column
    column: usize,
    /// invariant, phaseable, or multi_allelic
    class: String,
    /// distinct alleles in first-seen order, e.g. "A,T"
    alleles: String,
    /// individuals with a gap
    gap_count: usize,
    /// individuals with explicit missing data
    missing_count: usize,
    /// individuals with an ambiguity code
    ambiguous_count: usize
}

impl SiteStatsWriter {
    /// Creates a new writer for a given filename
    /// # Arguments
    /// * `filename` - the path to write all site rows to; ".csv" selects commas, anything else tabs
    pub fn new(filename: &Path) -> csv::Result<SiteStatsWriter> {
        let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
        let delimiter: u8 = if is_csv { b',' } else { b'\t' };
        let csv_writer: csv::Writer<File> = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(filename)?;
        Ok(SiteStatsWriter {
            csv_writer
        })
    }

    /// Writes every column of a classification
    /// # Errors
    /// * if the csv_writer has any errors
    pub fn write_sites(&mut self, classification: &SiteClassification) -> csv::Result<()> {
        for site in classification.sites().iter() {
            let allele_set = site.allele_set();
            let alleles: Vec<String> = allele_set.alleles().iter().map(|a| a.to_string()).collect();
            let row: SiteRow = SiteRow {
                column: site.column() + 1,
                class: site.class().to_string(),
                alleles: alleles.join(","),
                gap_count: allele_set.gap_count(),
                missing_count: allele_set.missing_count(),
                ambiguous_count: allele_set.ambiguous_count()
            };
            self.csv_writer.serialize(&row)?;
        }
        self.csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::alignment::Alignment;
    use crate::data_types::sites::{classify_sites, AmbiguityPolicy};

    #[test]
    fn test_write_sites() {
        let alignment = Alignment::from_reader(">a\nAAC\n>b\nAW-\n>c\nATG\n".as_bytes()).unwrap();
        let classification = classify_sites(&alignment, AmbiguityPolicy::PairCodes);
        let tmp = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
        {
            let mut writer = SiteStatsWriter::new(tmp.path()).unwrap();
            writer.write_sites(&classification).unwrap();
        }
        let text = std::fs::read_to_string(tmp.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "column\tclass\talleles\tgap_count\tmissing_count\tambiguous_count");
        assert_eq!(lines[1], "1\tinvariant\tA\t0\t0\t0");
        assert_eq!(lines[2], "2\tphaseable\tA,T\t0\t0\t1");
        assert_eq!(lines[3], "3\tphaseable\tC,G\t1\t0\t0");
    }
}
