
use lazy_static::lazy_static;
use simple_error::bail;

/// The four resolvable nucleotides, in the order used for bitmasks and tie-breaking.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, strum_macros::FromRepr, strum_macros::Display)]
pub enum Nucleotide {
    A=0,
    C=1,
    G=2,
    T=3
}

impl Nucleotide {
    /// Upper-case ASCII representation of the base
    pub fn to_ascii(self) -> u8 {
        match self {
            Nucleotide::A => b'A',
            Nucleotide::C => b'C',
            Nucleotide::G => b'G',
            Nucleotide::T => b'T'
        }
    }

    fn mask(self) -> u8 {
        1 << (self as u8)
    }
}

/// A compact set of nucleotides stored as a 4-bit mask.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct BaseSet(u8);

impl BaseSet {
    /// Builds a set from a list of bases
    pub fn from_bases(bases: &[Nucleotide]) -> BaseSet {
        let mut set = BaseSet::default();
        for &b in bases.iter() {
            set.insert(b);
        }
        set
    }

    pub fn insert(&mut self, base: Nucleotide) {
        self.0 |= base.mask();
    }

    pub fn contains(&self, base: Nucleotide) -> bool {
        self.0 & base.mask() != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// True if every base in `self` is also in `other`
    pub fn is_subset(&self, other: &BaseSet) -> bool {
        self.0 & !other.0 == 0
    }

    /// Iterates the bases in A, C, G, T order
    pub fn iter(&self) -> impl Iterator<Item = Nucleotide> + '_ {
        (0..4u8)
            .filter(move |&i| self.0 & (1 << i) != 0)
            .filter_map(Nucleotide::from_repr)
    }
}

/// Classification of a single alignment byte.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Symbol {
    /// A base or an ambiguity code, with the bases it can represent
    Bases(BaseSet),
    /// An alignment gap (`-` or `.`)
    Gap,
    /// Explicitly unknown data (`?`)
    Missing
}

impl Symbol {
    /// True for plain A/C/G/T(/U) calls
    pub fn is_unambiguous(&self) -> bool {
        matches!(self, Symbol::Bases(set) if set.len() == 1)
    }
}

/// The closed IUPAC table: symbol -> bases it stands for.
const IUPAC_CODES: [(u8, &[Nucleotide]); 15] = [
    (b'A', &[Nucleotide::A]),
    (b'C', &[Nucleotide::C]),
    (b'G', &[Nucleotide::G]),
    (b'T', &[Nucleotide::T]),
    (b'R', &[Nucleotide::A, Nucleotide::G]),
    (b'Y', &[Nucleotide::C, Nucleotide::T]),
    (b'S', &[Nucleotide::C, Nucleotide::G]),
    (b'W', &[Nucleotide::A, Nucleotide::T]),
    (b'K', &[Nucleotide::G, Nucleotide::T]),
    (b'M', &[Nucleotide::A, Nucleotide::C]),
    (b'B', &[Nucleotide::C, Nucleotide::G, Nucleotide::T]),
    (b'D', &[Nucleotide::A, Nucleotide::G, Nucleotide::T]),
    (b'H', &[Nucleotide::A, Nucleotide::C, Nucleotide::T]),
    (b'V', &[Nucleotide::A, Nucleotide::C, Nucleotide::G]),
    (b'N', &[Nucleotide::A, Nucleotide::C, Nucleotide::G, Nucleotide::T])
];

fn build_symbol_table() -> [Option<Symbol>; 256] {
    let mut table: [Option<Symbol>; 256] = [None; 256];
    for &(code, bases) in IUPAC_CODES.iter() {
        let symbol = Symbol::Bases(BaseSet::from_bases(bases));
        table[code as usize] = Some(symbol);
        table[code.to_ascii_lowercase() as usize] = Some(symbol);
    }
    // RNA input
    table[b'U' as usize] = table[b'T' as usize];
    table[b'u' as usize] = table[b'T' as usize];
    table[b'-' as usize] = Some(Symbol::Gap);
    table[b'.' as usize] = Some(Symbol::Gap);
    table[b'?' as usize] = Some(Symbol::Missing);
    table
}

lazy_static! {
    /// Byte-indexed lookup built from `IUPAC_CODES`
    static ref SYMBOL_TABLE: [Option<Symbol>; 256] = build_symbol_table();
}

/// Classifies a single alignment byte, returning `None` for anything outside the alphabet.
pub fn decode_symbol(byte: u8) -> Option<Symbol> {
    SYMBOL_TABLE[byte as usize]
}

/// Returns the upper-case IUPAC code for a non-empty base set.
pub fn ambiguity_code(set: BaseSet) -> Option<u8> {
    IUPAC_CODES.iter()
        .find(|(_code, bases)| BaseSet::from_bases(bases) == set)
        .map(|&(code, _bases)| code)
}

/// Sanity checks the symbol table, intended to run once at startup.
/// # Errors
/// * if any code maps to an empty base set
/// * if any multi-base set does not have exactly one code
/// * if the lower-case form of a code disagrees with the upper-case form
pub fn validate_symbol_table() -> Result<(), simple_error::SimpleError> {
    for &(code, bases) in IUPAC_CODES.iter() {
        let set = BaseSet::from_bases(bases);
        if set.is_empty() {
            bail!("IUPAC code {:?} maps to no bases", code as char);
        }
        let count = IUPAC_CODES.iter()
            .filter(|(_c, other)| BaseSet::from_bases(other) == set)
            .count();
        if count != 1 {
            bail!("IUPAC base set for {:?} is claimed by {} codes", code as char, count);
        }
        if decode_symbol(code.to_ascii_lowercase()) != decode_symbol(code) {
            bail!("Lower-case form of {:?} is not equivalent", code as char);
        }
    }

    // every non-empty subset of ACGT needs a code
    for mask in 1..16u8 {
        if ambiguity_code(BaseSet(mask)).is_none() {
            bail!("No IUPAC code for base mask {:#06b}", mask);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_table_valid() {
        validate_symbol_table().unwrap();
    }

    #[test]
    fn test_decode_symbol() {
        assert_eq!(decode_symbol(b'A'), Some(Symbol::Bases(BaseSet::from_bases(&[Nucleotide::A]))));
        assert_eq!(decode_symbol(b'u'), decode_symbol(b'T'));
        assert_eq!(decode_symbol(b'w'), Some(Symbol::Bases(BaseSet::from_bases(&[Nucleotide::A, Nucleotide::T]))));
        assert_eq!(decode_symbol(b'-'), Some(Symbol::Gap));
        assert_eq!(decode_symbol(b'.'), Some(Symbol::Gap));
        assert_eq!(decode_symbol(b'?'), Some(Symbol::Missing));
        assert_eq!(decode_symbol(b'X'), None);
        assert_eq!(decode_symbol(b'*'), None);

        assert!(decode_symbol(b'G').unwrap().is_unambiguous());
        assert!(!decode_symbol(b'N').unwrap().is_unambiguous());
        assert!(!decode_symbol(b'-').unwrap().is_unambiguous());
    }

    #[test]
    fn test_base_set() {
        let set = BaseSet::from_bases(&[Nucleotide::T, Nucleotide::A]);
        assert_eq!(set.len(), 2);
        assert!(set.contains(Nucleotide::A));
        assert!(!set.contains(Nucleotide::C));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Nucleotide::A, Nucleotide::T]);
        assert!(BaseSet::from_bases(&[Nucleotide::A]).is_subset(&set));
        assert!(!set.is_subset(&BaseSet::from_bases(&[Nucleotide::A, Nucleotide::G])));
        assert_eq!(ambiguity_code(set), Some(b'W'));
        assert!(BaseSet::default().is_empty());
    }
}
