const RNA_BITMASK_A: u8 = 1;
const RNA_BITMASK_C: u8 = 2;
const RNA_BITMASK_G: u8 = 4;
const RNA_BITMASK_U: u8 = 8;
const RNA_BITMASK_N: u8 = RNA_BITMASK_A | RNA_BITMASK_C | RNA_BITMASK_G | RNA_BITMASK_U;

/// Order in which represented bases are spelled out: purines first, G before A.
const SPELLING_ORDER: [(u8, char); 4] = [
    (RNA_BITMASK_G, 'G'),
    (RNA_BITMASK_A, 'A'),
    (RNA_BITMASK_C, 'C'),
    (RNA_BITMASK_U, 'U'),
];

/// A bitmasked IUPAC code for RNA bases, eg RNA_BITMASK_A|RNA_BITMASK_G
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct IupacCode(u8);

impl IupacCode {
    #[inline(always)]
    pub fn from_letter(letter: u8) -> Self {
        match letter.to_ascii_uppercase() {
            b'A' => Self(RNA_BITMASK_A),
            b'C' => Self(RNA_BITMASK_C),
            b'G' => Self(RNA_BITMASK_G),
            b'U' | b'T' => Self(RNA_BITMASK_U),
            b'W' => Self(RNA_BITMASK_A | RNA_BITMASK_U),
            b'S' => Self(RNA_BITMASK_C | RNA_BITMASK_G),
            b'M' => Self(RNA_BITMASK_A | RNA_BITMASK_C),
            b'K' => Self(RNA_BITMASK_G | RNA_BITMASK_U),
            b'R' => Self(RNA_BITMASK_A | RNA_BITMASK_G),
            b'Y' => Self(RNA_BITMASK_C | RNA_BITMASK_U),
            b'B' => Self(RNA_BITMASK_C | RNA_BITMASK_G | RNA_BITMASK_U),
            b'D' => Self(RNA_BITMASK_A | RNA_BITMASK_G | RNA_BITMASK_U),
            b'H' => Self(RNA_BITMASK_A | RNA_BITMASK_C | RNA_BITMASK_U),
            b'V' => Self(RNA_BITMASK_A | RNA_BITMASK_C | RNA_BITMASK_G),
            b'N' => Self(RNA_BITMASK_N),
            _ => Self(0),
        }
    }

    /// Parses a diagram label that consists of exactly one nucleotide letter.
    pub fn from_label(label: &str) -> Option<Self> {
        let mut chars = label.trim().chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return None;
        };
        if !c.is_ascii() || !Self::is_valid_letter(c as u8) {
            return None;
        }
        Some(Self::from_letter(c as u8))
    }

    #[inline(always)]
    pub fn is_ambiguous(&self) -> bool {
        self.0.count_ones() > 1
    }

    #[inline(always)]
    pub fn is_valid_letter(letter: u8) -> bool {
        matches!(
            letter.to_ascii_uppercase(),
            b'A' | b'C'
                | b'G'
                | b'U'
                | b'T'
                | b'W'
                | b'S'
                | b'M'
                | b'K'
                | b'R'
                | b'Y'
                | b'B'
                | b'D'
                | b'H'
                | b'V'
                | b'N'
        )
    }

    /// Represented bases in spelling order.
    pub fn bases(&self) -> Vec<char> {
        SPELLING_ORDER
            .iter()
            .filter(|(mask, _)| self.0 & mask != 0)
            .map(|(_, base)| *base)
            .collect()
    }

    /// Human reading of the code, eg "G or A" for R.
    pub fn expansion(&self) -> String {
        if self.0 == RNA_BITMASK_N {
            return "any nucleotide".to_string();
        }
        let bases = self.bases();
        match bases.as_slice() {
            [] => String::new(),
            [single] => single.to_string(),
            [head @ .., last] => {
                let head = head.iter().map(char::to_string).collect::<Vec<_>>();
                format!("{} or {last}", head.join(", "))
            }
        }
    }
}
