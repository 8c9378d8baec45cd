
use crate::data_types::alignment::Alignment;
use crate::data_types::iupac::{decode_symbol, Nucleotide, Symbol};

use log::{debug, info, trace, warn};

/// Controls which symbols are allowed to add alleles to a column's tally
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, clap::ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum AmbiguityPolicy {
    /// Every base an ambiguity code can stand for is counted
    Expand,
    /// Plain bases and two-base codes are counted; codes covering 3+ bases are not
    #[default]
    PairCodes,
    /// Only plain A/C/G/T calls are counted
    Unambiguous
}

impl AmbiguityPolicy {
    /// Returns true if this symbol's bases should enter the tally
    fn counts(&self, symbol: &Symbol) -> bool {
        match (self, symbol) {
            (_, Symbol::Gap) | (_, Symbol::Missing) => false,
            (AmbiguityPolicy::Expand, Symbol::Bases(_)) => true,
            (AmbiguityPolicy::PairCodes, Symbol::Bases(set)) => set.len() <= 2,
            (AmbiguityPolicy::Unambiguous, Symbol::Bases(set)) => set.len() == 1
        }
    }
}

/// How a column is treated by the rest of the pipeline
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SiteClass {
    /// 0 or 1 distinct alleles, copied through
    Invariant,
    /// Exactly 2 distinct alleles, sent to the engine
    Phaseable,
    /// 3+ distinct alleles, copied through
    MultiAllelic
}

/// The distinct alleles observed in one column plus the non-allele tallies
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AlleleSet {
    /// Distinct alleles in first-seen order across individuals
    alleles: Vec<Nucleotide>,
    /// Number of individuals with a gap
    gap_count: usize,
    /// Number of individuals with `?`
    missing_count: usize,
    /// Number of individuals with an ambiguity code
    ambiguous_count: usize
}

impl AlleleSet {
    /// Builds the tally for one column
    /// # Arguments
    /// * `symbols` - the raw column bytes, in individual order; must already be alphabet-checked
    /// * `policy` - which symbols are allowed to contribute alleles
    pub fn from_column<I: Iterator<Item = u8>>(symbols: I, policy: AmbiguityPolicy) -> AlleleSet {
        let mut allele_set: AlleleSet = Default::default();
        for byte in symbols {
            let symbol = match decode_symbol(byte) {
                Some(s) => s,
                // the reader rejects these, but be strict if someone builds a column by hand
                None => {
                    allele_set.missing_count += 1;
                    continue;
                }
            };
            match symbol {
                Symbol::Gap => allele_set.gap_count += 1,
                Symbol::Missing => allele_set.missing_count += 1,
                Symbol::Bases(set) => {
                    if set.len() > 1 {
                        allele_set.ambiguous_count += 1;
                    }
                    if policy.counts(&symbol) {
                        for base in set.iter() {
                            if !allele_set.alleles.contains(&base) {
                                allele_set.alleles.push(base);
                            }
                        }
                    }
                }
            };
        }
        allele_set
    }

    pub fn alleles(&self) -> &[Nucleotide] {
        &self.alleles
    }

    pub fn len(&self) -> usize {
        self.alleles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alleles.is_empty()
    }

    pub fn gap_count(&self) -> usize {
        self.gap_count
    }

    pub fn missing_count(&self) -> usize {
        self.missing_count
    }

    pub fn ambiguous_count(&self) -> usize {
        self.ambiguous_count
    }

    /// Index of an allele within the first-seen ordering
    pub fn index_of(&self, base: Nucleotide) -> Option<usize> {
        self.alleles.iter().position(|&a| a == base)
    }

    pub fn classify(&self) -> SiteClass {
        match self.alleles.len() {
            0 | 1 => SiteClass::Invariant,
            2 => SiteClass::Phaseable,
            _ => SiteClass::MultiAllelic
        }
    }
}

/// A single classified column
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Site {
    /// 0-based column in the alignment
    column: usize,
    class: SiteClass,
    allele_set: AlleleSet
}

impl Site {
    pub fn column(&self) -> usize {
        self.column
    }

    pub fn class(&self) -> SiteClass {
        self.class
    }

    pub fn allele_set(&self) -> &AlleleSet {
        &self.allele_set
    }
}

/// Classification of every column of an alignment
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SiteClassification {
    /// One entry per alignment column, in column order
    sites: Vec<Site>,
    /// Columns that go to the engine, in column order
    phaseable_columns: Vec<usize>
}

impl SiteClassification {
    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn site(&self, column: usize) -> &Site {
        &self.sites[column]
    }

    pub fn phaseable_columns(&self) -> &[usize] {
        &self.phaseable_columns
    }

    pub fn num_phaseable(&self) -> usize {
        self.phaseable_columns.len()
    }

    /// Iterates the phaseable sites in submission order
    pub fn phaseable_sites(&self) -> impl Iterator<Item = &Site> + '_ {
        self.phaseable_columns.iter().map(move |&c| &self.sites[c])
    }

    /// Counts how many columns fall in a class
    pub fn count(&self, class: SiteClass) -> usize {
        self.sites.iter().filter(|s| s.class == class).count()
    }
}

/// Scans every column and decides which ones are phaseable.
/// Deterministic for a given alignment and policy: allele order is first-seen in input order.
/// # Arguments
/// * `alignment` - the loaded alignment
/// * `policy` - how ambiguity codes contribute to the allele tally
pub fn classify_sites(alignment: &Alignment, policy: AmbiguityPolicy) -> SiteClassification {
    info!("Classifying {} columns with ambiguity policy {}...", alignment.length(), policy);
    let mut sites: Vec<Site> = Vec::with_capacity(alignment.length());
    let mut phaseable_columns: Vec<usize> = vec![];
    for column in 0..alignment.length() {
        let allele_set = AlleleSet::from_column(alignment.column(column), policy);
        let class = allele_set.classify();
        match class {
            SiteClass::Phaseable => {
                debug!("Column {}: phaseable {:?}", column + 1, allele_set.alleles());
                phaseable_columns.push(column);
            },
            SiteClass::MultiAllelic => {
                warn!("Column {}: {} alleles {:?}, excluding from phasing", column + 1, allele_set.len(), allele_set.alleles());
            },
            SiteClass::Invariant => {
                trace!("Column {}: invariant {:?}", column + 1, allele_set.alleles());
            }
        };
        sites.push(Site {
            column,
            class,
            allele_set
        });
    }

    let classification = SiteClassification {
        sites,
        phaseable_columns
    };
    info!(
        "Site classes: {} phaseable, {} invariant, {} multi-allelic",
        classification.count(SiteClass::Phaseable),
        classification.count(SiteClass::Invariant),
        classification.count(SiteClass::MultiAllelic)
    );
    classification
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(text: &str) -> Alignment {
        Alignment::from_reader(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_basic_classes() {
        // col1 invariant, col2 A/T, col3 A/C/G, col4 all gaps
        let alignment = load(">i1\nAAA-\n>i2\nAWC-\n>i3\nATG-\n");
        let classification = classify_sites(&alignment, AmbiguityPolicy::PairCodes);
        assert_eq!(classification.site(0).class(), SiteClass::Invariant);
        assert_eq!(classification.site(1).class(), SiteClass::Phaseable);
        assert_eq!(classification.site(2).class(), SiteClass::MultiAllelic);
        assert_eq!(classification.site(3).class(), SiteClass::Invariant);
        assert_eq!(classification.site(3).allele_set().gap_count(), 3);
        assert_eq!(classification.phaseable_columns(), &[1]);
        assert_eq!(classification.site(1).allele_set().alleles(), &[Nucleotide::A, Nucleotide::T]);
        assert_eq!(classification.site(1).allele_set().ambiguous_count(), 1);
    }

    #[test]
    fn test_first_seen_order() {
        let alignment = load(">i1\nT\n>i2\nA\n>i3\nT\n");
        let classification = classify_sites(&alignment, AmbiguityPolicy::PairCodes);
        assert_eq!(classification.site(0).allele_set().alleles(), &[Nucleotide::T, Nucleotide::A]);
        assert_eq!(classification.site(0).allele_set().index_of(Nucleotide::A), Some(1));
        assert_eq!(classification.site(0).allele_set().index_of(Nucleotide::G), None);
    }

    #[test]
    fn test_idempotent() {
        let alignment = load(">i1\nAGTN\n>i2\nRGCA\n>i3\nGG-A\n");
        for policy in [AmbiguityPolicy::Expand, AmbiguityPolicy::PairCodes, AmbiguityPolicy::Unambiguous] {
            let first = classify_sites(&alignment, policy);
            let second = classify_sites(&alignment, policy);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_policies() {
        // A and T confirmed, plus one N
        let alignment = load(">i1\nA\n>i2\nT\n>i3\nN\n");
        assert_eq!(classify_sites(&alignment, AmbiguityPolicy::Expand).site(0).class(), SiteClass::MultiAllelic);
        assert_eq!(classify_sites(&alignment, AmbiguityPolicy::PairCodes).site(0).class(), SiteClass::Phaseable);
        assert_eq!(classify_sites(&alignment, AmbiguityPolicy::Unambiguous).site(0).class(), SiteClass::Phaseable);

        // only heterozygous calls observed
        let alignment = load(">i1\nW\n>i2\nW\n>i3\nA\n");
        assert_eq!(classify_sites(&alignment, AmbiguityPolicy::PairCodes).site(0).class(), SiteClass::Phaseable);
        assert_eq!(classify_sites(&alignment, AmbiguityPolicy::Unambiguous).site(0).class(), SiteClass::Invariant);
    }

    #[test]
    fn test_missing_and_lowercase() {
        let alignment = load(">i1\na\n>i2\n?\n>i3\nt\n");
        let classification = classify_sites(&alignment, AmbiguityPolicy::PairCodes);
        assert_eq!(classification.site(0).class(), SiteClass::Phaseable);
        assert_eq!(classification.site(0).allele_set().missing_count(), 1);
        assert_eq!(classification.site(0).allele_set().alleles(), &[Nucleotide::A, Nucleotide::T]);
    }

    #[test]
    fn test_policy_display() {
        assert_eq!(AmbiguityPolicy::PairCodes.to_string(), "pair-codes");
        assert_eq!(SiteClass::MultiAllelic.to_string(), "multi_allelic");
    }
}
