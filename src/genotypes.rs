
use crate::data_types::alignment::Alignment;
use crate::data_types::iupac::{decode_symbol, BaseSet, Symbol};
use crate::data_types::sites::{Site, SiteClassification};

use log::{debug, info, trace};

/// Why a genotype could not be called
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MissingReason {
    /// The individual has a gap in this column
    Gap,
    /// `?` or a code covering every base
    Unknown,
    /// An ambiguity code that does not map onto the site's two alleles
    Unresolvable
}

/// A genotype at a phaseable site.
/// Allele indices refer to the site's `AlleleSet` ordering and are stored sorted.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Genotype {
    Called(u8, u8),
    Missing(MissingReason)
}

impl Genotype {
    pub fn is_missing(&self) -> bool {
        matches!(self, Genotype::Missing(_))
    }

    pub fn is_heterozygous(&self) -> bool {
        matches!(self, Genotype::Called(a, b) if a != b)
    }
}

/// Decodes a single raw symbol into a genotype for a phaseable site.
/// # Arguments
/// * `byte` - the raw alignment symbol
/// * `site` - the phaseable site, must have exactly two alleles
pub fn expand_symbol(byte: u8, site: &Site) -> Genotype {
    let allele_set = site.allele_set();
    let site_bases = BaseSet::from_bases(allele_set.alleles());
    match decode_symbol(byte) {
        Some(Symbol::Gap) => Genotype::Missing(MissingReason::Gap),
        Some(Symbol::Missing) | None => Genotype::Missing(MissingReason::Unknown),
        Some(Symbol::Bases(bases)) => {
            if bases.len() == 4 {
                Genotype::Missing(MissingReason::Unknown)
            } else if !bases.is_subset(&site_bases) {
                // covers something outside the site, never pick between the remaining options
                Genotype::Missing(MissingReason::Unresolvable)
            } else {
                let mut indices = bases.iter().filter_map(|b| allele_set.index_of(b));
                match (indices.next(), indices.next()) {
                    (Some(a), None) => Genotype::Called(a as u8, a as u8),
                    (Some(a), Some(b)) => Genotype::Called(a.min(b) as u8, a.max(b) as u8),
                    _ => Genotype::Missing(MissingReason::Unresolvable)
                }
            }
        }
    }
}

/// Dense genotype table: individuals x phaseable sites
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GenotypeTable {
    /// One row per individual, one cell per phaseable site
    rows: Vec<Vec<Genotype>>,
    /// Number of missing cells per individual
    missing_counts: Vec<usize>
}

impl GenotypeTable {
    /// Builds a table from rows, computing the per-individual missing counts
    pub fn from_rows(rows: Vec<Vec<Genotype>>) -> GenotypeTable {
        let missing_counts: Vec<usize> = rows.iter()
            .map(|row| row.iter().filter(|g| g.is_missing()).count())
            .collect();
        GenotypeTable {
            rows,
            missing_counts
        }
    }

    pub fn rows(&self) -> &[Vec<Genotype>] {
        &self.rows
    }

    pub fn get(&self, individual: usize, site_index: usize) -> Genotype {
        self.rows[individual][site_index]
    }

    pub fn missing_count(&self, individual: usize) -> usize {
        self.missing_counts[individual]
    }

    pub fn num_individuals(&self) -> usize {
        self.rows.len()
    }

    pub fn num_sites(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or(0)
    }
}

/// Expands every individual's call at every phaseable site.
/// # Arguments
/// * `alignment` - the loaded alignment
/// * `classification` - the site classification built from the same alignment
pub fn expand_genotypes(alignment: &Alignment, classification: &SiteClassification) -> GenotypeTable {
    info!("Expanding genotypes for {} individuals at {} phaseable sites...", alignment.num_sequences(), classification.num_phaseable());
    let mut rows: Vec<Vec<Genotype>> = Vec::with_capacity(alignment.num_sequences());
    for sequence in alignment.sequences().iter() {
        let row: Vec<Genotype> = classification.phaseable_sites()
            .map(|site| {
                let genotype = expand_symbol(sequence.symbols()[site.column()], site);
                if let Genotype::Missing(reason) = genotype {
                    trace!("{} column {}: missing ({:?})", sequence.id(), site.column() + 1, reason);
                }
                genotype
            })
            .collect();
        let missing: usize = row.iter().filter(|g| g.is_missing()).count();
        if missing > 0 {
            debug!("{}: {} of {} phaseable sites are missing", sequence.id(), missing, row.len());
        }
        rows.push(row);
    }
    GenotypeTable::from_rows(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::sites::{classify_sites, AmbiguityPolicy};

    fn expand_text(text: &str) -> GenotypeTable {
        let alignment = Alignment::from_reader(text.as_bytes()).unwrap();
        let classification = classify_sites(&alignment, AmbiguityPolicy::PairCodes);
        expand_genotypes(&alignment, &classification)
    }

    #[test]
    fn test_expand_basic() {
        // single A/T site, first-seen A=0, T=1
        let table = expand_text(">i1\nA\n>i2\nW\n>i3\nT\n>i4\n-\n>i5\n?\n>i6\nN\n");
        assert_eq!(table.num_individuals(), 6);
        assert_eq!(table.num_sites(), 1);
        assert_eq!(table.get(0, 0), Genotype::Called(0, 0));
        assert_eq!(table.get(1, 0), Genotype::Called(0, 1));
        assert!(table.get(1, 0).is_heterozygous());
        assert_eq!(table.get(2, 0), Genotype::Called(1, 1));
        assert_eq!(table.get(3, 0), Genotype::Missing(MissingReason::Gap));
        assert_eq!(table.get(4, 0), Genotype::Missing(MissingReason::Unknown));
        assert_eq!(table.get(5, 0), Genotype::Missing(MissingReason::Unknown));
        assert_eq!(table.missing_count(0), 0);
        assert_eq!(table.missing_count(3), 1);
    }

    #[test]
    fn test_het_order_sorted() {
        // T seen first, so W is (T, A) by bases but stored as sorted indices
        let table = expand_text(">i1\nT\n>i2\nW\n>i3\nA\n");
        assert_eq!(table.get(1, 0), Genotype::Called(0, 1));
        assert_eq!(table.get(0, 0), Genotype::Called(0, 0));
        assert_eq!(table.get(2, 0), Genotype::Called(1, 1));
    }

    #[test]
    fn test_contradictions() {
        // site alleles are A/G; R is het, V (A/C/G) covers an extra base
        let table = expand_text(">i1\nA\n>i2\nG\n>i3\nR\n>i4\nV\n");
        assert_eq!(table.get(2, 0), Genotype::Called(0, 1));
        assert_eq!(table.get(3, 0), Genotype::Missing(MissingReason::Unresolvable));

        // M adds C under pair-codes, so the site becomes multi-allelic and nothing is phased
        let table = expand_text(">i1\nA\n>i2\nG\n>i3\nR\n>i4\nM\n");
        assert_eq!(table.num_sites(), 0);

        let alignment = Alignment::from_reader(">i1\nA\n>i2\nG\n>i3\nM\n>i4\nV\n".as_bytes()).unwrap();
        let classification = classify_sites(&alignment, AmbiguityPolicy::Unambiguous);
        let table = expand_genotypes(&alignment, &classification);
        assert_eq!(table.num_sites(), 1);
        assert_eq!(table.get(2, 0), Genotype::Missing(MissingReason::Unresolvable));
        // V covers both alleles plus C
        assert_eq!(table.get(3, 0), Genotype::Missing(MissingReason::Unresolvable));
    }

    #[test]
    fn test_only_phaseable_columns() {
        let table = expand_text(">i1\nAAC\n>i2\nATC\n");
        assert_eq!(table.num_sites(), 1);
        assert_eq!(table.rows()[1], vec![Genotype::Called(1, 1)]);
    }
}
