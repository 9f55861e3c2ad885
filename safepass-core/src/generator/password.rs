use serde::{Deserialize, Serialize};

use crate::platform::SecureRandom;

pub const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
pub const DIGITS: &str = "0123456789";
pub const SYMBOLS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

/// One of the four character classes a password can draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharClass {
    Upper,
    Lower,
    Digit,
    Symbol,
}

impl CharClass {
    pub const ALL: [CharClass; 4] = [
        CharClass::Upper,
        CharClass::Lower,
        CharClass::Digit,
        CharClass::Symbol,
    ];

    pub fn charset(self) -> &'static str {
        match self {
            Self::Upper => UPPERCASE,
            Self::Lower => LOWERCASE,
            Self::Digit => DIGITS,
            Self::Symbol => SYMBOLS,
        }
    }

    pub fn of(c: char) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.charset().contains(c))
    }
}

/// Which character classes the generator may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterClasses {
    pub uppercase: bool,
    pub lowercase: bool,
    pub digits: bool,
    pub symbols: bool,
}

impl Default for CharacterClasses {
    fn default() -> Self {
        Self {
            uppercase: true,
            lowercase: true,
            digits: true,
            symbols: true,
        }
    }
}

impl CharacterClasses {
    pub fn none() -> Self {
        Self {
            uppercase: false,
            lowercase: false,
            digits: false,
            symbols: false,
        }
    }

    pub fn contains(&self, class: CharClass) -> bool {
        match class {
            CharClass::Upper => self.uppercase,
            CharClass::Lower => self.lowercase,
            CharClass::Digit => self.digits,
            CharClass::Symbol => self.symbols,
        }
    }

    /// Enabled classes, or upper+lower+digit when nothing is enabled.
    pub fn effective(&self) -> Vec<CharClass> {
        let enabled: Vec<CharClass> = CharClass::ALL
            .into_iter()
            .filter(|class| self.contains(*class))
            .collect();
        if enabled.is_empty() {
            vec![CharClass::Upper, CharClass::Lower, CharClass::Digit]
        } else {
            enabled
        }
    }
}

/// Uniform-ish index in `0..bound` from four random bytes (big-endian).
///
/// Modulo bias is accepted for the small bounds used here.
pub fn secure_index(rng: &dyn SecureRandom, bound: usize) -> usize {
    if bound <= 1 {
        return 0;
    }
    let mut buf = [0u8; 4];
    rng.fill_bytes(&mut buf);
    u32::from_be_bytes(buf) as usize % bound
}

fn pick(rng: &dyn SecureRandom, charset: &[char]) -> char {
    charset[secure_index(rng, charset.len())]
}

/// Generate a random password of exactly `length` characters.
///
/// Every enabled class appears at least once when `length` allows it. A
/// `length` of 0 is raised to 1 so the result is never empty.
pub fn generate(length: usize, classes: &CharacterClasses, rng: &dyn SecureRandom) -> String {
    let length = length.max(1);
    let enabled = classes.effective();
    let alphabet: Vec<char> = enabled
        .iter()
        .flat_map(|class| class.charset().chars())
        .collect();

    // One byte per character, reduced modulo the alphabet size
    let mut password: Vec<char> = rng
        .bytes(length)
        .into_iter()
        .map(|b| alphabet[b as usize % alphabet.len()])
        .collect();

    ensure_each_class(&mut password, &enabled, rng);
    password.into_iter().collect()
}

/// Overwrite one position per missing class with a member of that class.
///
/// A position is only overwritten if it was not forced earlier in this pass
/// and its character is not the last of its class, so classes placed or
/// already present are not lost. Falls back to any position when the
/// password is shorter than the number of classes.
fn ensure_each_class(password: &mut [char], enabled: &[CharClass], rng: &dyn SecureRandom) {
    let mut forced = vec![false; password.len()];

    for class in enabled {
        if password.iter().any(|c| CharClass::of(*c) == Some(*class)) {
            continue;
        }

        let candidates: Vec<usize> = (0..password.len())
            .filter(|i| !forced[*i] && !is_last_of_class(password, *i))
            .collect();
        let position = if candidates.is_empty() {
            secure_index(rng, password.len())
        } else {
            candidates[secure_index(rng, candidates.len())]
        };

        let charset: Vec<char> = class.charset().chars().collect();
        password[position] = pick(rng, &charset);
        forced[position] = true;
    }
}

fn is_last_of_class(password: &[char], index: usize) -> bool {
    let class = CharClass::of(password[index]);
    password
        .iter()
        .enumerate()
        .all(|(i, c)| i == index || CharClass::of(*c) != class)
}
