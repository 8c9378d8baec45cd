
use crate::data_types::alignment::Alignment;
use crate::data_types::iupac::Nucleotide;
use crate::data_types::sites::{SiteClass, SiteClassification};
use crate::errors::ConvPhaseError;
use crate::genotypes::{Genotype, GenotypeTable};

use log::{debug, info};
use std::fmt::Write;

/// Token written for an unknown allele copy (PHASE multi-allelic locus convention)
pub const MISSING_TOKEN: &str = "-1";

/// The two allele codes assigned to a phaseable site; code `n` maps to `alleles[n - 1]`
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SiteCodes {
    /// 0-based alignment column
    column: usize,
    alleles: [Nucleotide; 2]
}

impl SiteCodes {
    pub fn column(&self) -> usize {
        self.column
    }

    pub fn alleles(&self) -> &[Nucleotide; 2] {
        &self.alleles
    }

    /// Returns the allele for a 1-based code, or `None` if it is out of range
    pub fn decode(&self, code: u8) -> Option<Nucleotide> {
        match code {
            1 => Some(self.alleles[0]),
            2 => Some(self.alleles[1]),
            _ => None
        }
    }
}

/// Retained mapping from engine codes back to alleles, one entry per submitted site
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DecodeMap {
    sites: Vec<SiteCodes>
}

impl DecodeMap {
    pub fn sites(&self) -> &[SiteCodes] {
        &self.sites
    }

    pub fn num_sites(&self) -> usize {
        self.sites.len()
    }

    pub fn site(&self, site_index: usize) -> &SiteCodes {
        &self.sites[site_index]
    }
}

/// One allele copy in the encoded matrix
pub type AlleleCode = Option<u8>;

/// The genotype matrix in engine code space
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EncodedMatrix {
    /// Individual identifiers, in submission order
    ids: Vec<String>,
    /// 0-based columns of the submitted sites
    columns: Vec<usize>,
    /// Per individual, per site: the two allele copies
    rows: Vec<Vec<(AlleleCode, AlleleCode)>>
}

impl EncodedMatrix {
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<(AlleleCode, AlleleCode)>] {
        &self.rows
    }

    pub fn num_individuals(&self) -> usize {
        self.ids.len()
    }

    pub fn num_sites(&self) -> usize {
        self.columns.len()
    }

    /// Serializes the matrix in PHASE input layout with every locus typed as `M`.
    pub fn to_phase_input(&self) -> String {
        let mut output = String::new();
        // writing to a String cannot fail
        let _ = writeln!(output, "{}", self.num_individuals());
        let _ = writeln!(output, "{}", self.num_sites());
        let positions: Vec<String> = self.columns.iter().map(|c| (c + 1).to_string()).collect();
        let _ = writeln!(output, "P {}", positions.join(" "));
        let _ = writeln!(output, "{}", "M".repeat(self.num_sites()));
        for (id, row) in self.ids.iter().zip(self.rows.iter()) {
            let _ = writeln!(output, "#{id}");
            let first: Vec<String> = row.iter().map(|&(a, _b)| code_token(a)).collect();
            let second: Vec<String> = row.iter().map(|&(_a, b)| code_token(b)).collect();
            let _ = writeln!(output, "{}", first.join(" "));
            let _ = writeln!(output, "{}", second.join(" "));
        }
        output
    }
}

fn code_token(code: AlleleCode) -> String {
    match code {
        Some(c) => c.to_string(),
        None => MISSING_TOKEN.to_string()
    }
}

/// Assigns codes 1 and 2 to each phaseable site (in first-seen order) and encodes every genotype.
/// # Arguments
/// * `alignment` - the alignment, used for individual identifiers
/// * `classification` - the site classification
/// * `genotypes` - the expanded genotypes for the phaseable sites
/// # Errors
/// * `Encoding` if a site is not biallelic or a genotype references an allele outside its site
pub fn encode_matrix(
    alignment: &Alignment, classification: &SiteClassification, genotypes: &GenotypeTable
) -> Result<(EncodedMatrix, DecodeMap), ConvPhaseError> {
    let mut decode_sites: Vec<SiteCodes> = Vec::with_capacity(classification.num_phaseable());
    for (site_index, site) in classification.phaseable_sites().enumerate() {
        let alleles = site.allele_set().alleles();
        if site.class() != SiteClass::Phaseable || alleles.len() != 2 {
            return Err(ConvPhaseError::Encoding {
                individual: String::new(),
                site: site_index,
                column: site.column() + 1,
                message: format!("site has {} alleles, expected 2", alleles.len())
            });
        }
        decode_sites.push(SiteCodes {
            column: site.column(),
            alleles: [alleles[0], alleles[1]]
        });
    }

    let mut rows: Vec<Vec<(AlleleCode, AlleleCode)>> = Vec::with_capacity(alignment.num_sequences());
    for (individual, sequence) in alignment.sequences().iter().enumerate() {
        let genotype_row = &genotypes.rows()[individual];
        if genotype_row.len() != decode_sites.len() {
            return Err(ConvPhaseError::Encoding {
                individual: sequence.id().to_string(),
                site: genotype_row.len().min(decode_sites.len()),
                column: 0,
                message: format!("genotype row has {} sites, expected {}", genotype_row.len(), decode_sites.len())
            });
        }

        let mut row: Vec<(AlleleCode, AlleleCode)> = Vec::with_capacity(decode_sites.len());
        for (site_index, (genotype, site_codes)) in genotype_row.iter().zip(decode_sites.iter()).enumerate() {
            let pair = match *genotype {
                Genotype::Called(a, b) => {
                    if a > 1 || b > 1 {
                        return Err(ConvPhaseError::Encoding {
                            individual: sequence.id().to_string(),
                            site: site_index,
                            column: site_codes.column + 1,
                            message: format!("genotype ({a}, {b}) is outside the biallelic code space")
                        });
                    }
                    (Some(a + 1), Some(b + 1))
                },
                Genotype::Missing(_) => (None, None)
            };
            row.push(pair);
        }
        rows.push(row);
    }

    let matrix = EncodedMatrix {
        ids: alignment.sequences().iter().map(|s| s.id().to_string()).collect(),
        columns: classification.phaseable_columns().to_vec(),
        rows
    };
    for (site_index, site_codes) in decode_sites.iter().enumerate() {
        debug!("Site {} (column {}): 1 -> {}, 2 -> {}", site_index, site_codes.column + 1, site_codes.alleles[0], site_codes.alleles[1]);
    }
    info!("Encoded {} individuals x {} sites.", matrix.num_individuals(), matrix.num_sites());
    Ok((matrix, DecodeMap { sites: decode_sites }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::sites::{classify_sites, AmbiguityPolicy};
    use crate::genotypes::expand_genotypes;

    fn encode(text: &str) -> (EncodedMatrix, DecodeMap) {
        let alignment = Alignment::from_reader(text.as_bytes()).unwrap();
        let classification = classify_sites(&alignment, AmbiguityPolicy::PairCodes);
        let genotypes = expand_genotypes(&alignment, &classification);
        encode_matrix(&alignment, &classification, &genotypes).unwrap()
    }

    #[test]
    fn test_three_individual_scenario() {
        let (matrix, decode_map) = encode(">ind1\nAA\n>ind2\nAW\n>ind3\nAT\n");
        assert_eq!(matrix.columns(), &[1]);
        assert_eq!(decode_map.num_sites(), 1);
        assert_eq!(decode_map.site(0).decode(1), Some(Nucleotide::A));
        assert_eq!(decode_map.site(0).decode(2), Some(Nucleotide::T));
        assert_eq!(decode_map.site(0).decode(0), None);
        assert_eq!(decode_map.site(0).decode(3), None);
        assert_eq!(matrix.rows()[0], vec![(Some(1), Some(1))]);
        assert_eq!(matrix.rows()[1], vec![(Some(1), Some(2))]);
        assert_eq!(matrix.rows()[2], vec![(Some(2), Some(2))]);

        let expected = "3\n1\nP 2\nM\n#ind1\n1\n1\n#ind2\n1\n2\n#ind3\n2\n2\n";
        assert_eq!(matrix.to_phase_input(), expected);
    }

    #[test]
    fn test_codes_distinct() {
        let (_matrix, decode_map) = encode(">a\nACGTA\n>b\nGCTTA\n>c\nRCKTA\n");
        for site in decode_map.sites().iter() {
            let first = site.decode(1).unwrap();
            let second = site.decode(2).unwrap();
            assert_ne!(first, second);
        }
    }

    #[test]
    fn test_missing_tokens() {
        let (matrix, _decode_map) = encode(">a\nAC\n>b\nTG\n>c\n-S\n");
        assert_eq!(matrix.rows()[2], vec![(None, None), (Some(1), Some(2))]);
        let text = matrix.to_phase_input();
        assert!(text.contains("#c\n-1 1\n-1 2\n"));
        assert!(text.starts_with("3\n2\nP 1 2\nMM\n"));
    }

    #[test]
    fn test_multiallelic_not_encoded() {
        let (matrix, decode_map) = encode(">a\nAA\n>b\nCT\n>c\nGT\n");
        assert_eq!(matrix.columns(), &[1]);
        assert_eq!(decode_map.site(0).column(), 1);
    }

    #[test]
    fn test_bad_genotype_rejected() {
        let alignment = Alignment::from_reader(">a\nA\n>b\nT\n".as_bytes()).unwrap();
        let classification = classify_sites(&alignment, AmbiguityPolicy::PairCodes);
        let genotypes = GenotypeTable::from_rows(vec![
            vec![Genotype::Called(0, 0)],
            vec![Genotype::Called(0, 2)]
        ]);
        let result = encode_matrix(&alignment, &classification, &genotypes);
        match result {
            Err(ConvPhaseError::Encoding { individual, .. }) => assert_eq!(individual, "b"),
            _ => panic!("expected an encoding error")
        };
    }
}
