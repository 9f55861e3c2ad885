use serde::{Deserialize, Serialize};

/// Substrings that make a password easy to guess.
const COMMON_SEQUENCES: [&str; 4] = ["123", "abc", "password", "qwerty"];

/// Highest score `check_strength` can return.
pub const MAX_SCORE: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Weak,
    Medium,
    Strong,
}

impl Strength {
    pub fn from_score(score: u8) -> Self {
        match score {
            s if s >= 6 => Self::Strong,
            s if s >= 4 => Self::Medium,
            _ => Self::Weak,
        }
    }
}

impl std::fmt::Display for Strength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Weak => write!(f, "weak"),
            Self::Medium => write!(f, "medium"),
            Self::Strong => write!(f, "strong"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrengthReport {
    pub score: u8,
    pub level: Strength,
}

/// Heuristic 0-8 strength score.
pub fn check_strength(password: &str) -> StrengthReport {
    let length = password.chars().count();
    let mut score = 0u8;

    if length >= 12 {
        score += 2;
    } else if length >= 8 {
        score += 1;
    }

    let checks = [
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        // Anything outside [a-zA-Z0-9] counts as a symbol, letters of other scripts included
        password.chars().any(|c| !c.is_ascii_alphanumeric()),
        !has_repeated_run(password, 3),
        !has_common_sequence(password),
    ];
    score += checks.iter().filter(|passed| **passed).count() as u8;

    StrengthReport {
        score,
        level: Strength::from_score(score),
    }
}

/// `run` or more identical characters in a row.
fn has_repeated_run(password: &str, run: usize) -> bool {
    let chars: Vec<char> = password.chars().collect();
    chars
        .windows(run)
        .any(|window| window.iter().all(|c| *c == window[0]))
}

fn has_common_sequence(password: &str) -> bool {
    let lowered = password.to_lowercase();
    COMMON_SEQUENCES.iter().any(|seq| lowered.contains(seq))
}
