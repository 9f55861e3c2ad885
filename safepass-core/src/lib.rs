pub mod backup;
pub mod config;
pub mod error;
pub mod generator;
pub mod platform;
pub mod reveal;
pub mod vault;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use backup::{BackupFormat, BackupService};
pub use config::{load_settings, save_settings, VaultSettings};
pub use error::{AuthUnavailable, Result, SafePassError};
pub use generator::{check_strength, generate, generate_passphrase, CharacterClasses, Strength};
pub use reveal::{RevealGate, RevealOutcome, RevealState};
pub use vault::{CredentialRecord, KeyMaterial, VaultContext, VaultManager};

/// Install a fmt subscriber filtered by `RUST_LOG` (default
/// `safepass_core=debug`). Does nothing if a subscriber is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "safepass_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
