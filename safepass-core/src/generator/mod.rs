//! Password and passphrase generation, and strength scoring.

pub mod passphrase;
pub mod password;
pub mod strength;

pub use passphrase::generate_passphrase;
pub use password::{generate, secure_index, CharClass, CharacterClasses};
pub use strength::{check_strength, Strength, StrengthReport};
