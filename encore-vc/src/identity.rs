//! Voter identity
//!
//! A voter is either an authenticated user (id supplied by the caller's
//! auth layer) or an anonymous pseudonym `anon-<uuid>`. The anonymous
//! pseudonym is the only thing the voting core persists locally; quotas are
//! enforced by the ledger.

use encore_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// File under the root folder holding the anonymous pseudonym
pub const IDENTITY_FILE: &str = "identity.toml";

const ANONYMOUS_PREFIX: &str = "anon-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterIdentity {
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl VoterIdentity {
    pub fn authenticated(user_id: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name,
        }
    }

    /// Fresh anonymous pseudonym
    pub fn anonymous() -> Self {
        Self {
            user_id: format!("{}{}", ANONYMOUS_PREFIX, Uuid::new_v4()),
            display_name: None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.starts_with(ANONYMOUS_PREFIX)
    }

    /// Whether this identity may vote at all
    pub fn is_identified(&self) -> bool {
        !self.user_id.trim().is_empty()
    }
}

/// Path of the identity file inside `root_folder`
pub fn identity_path(root_folder: &Path) -> PathBuf {
    root_folder.join(IDENTITY_FILE)
}

/// Load the stored anonymous identity, creating and persisting one if absent
pub fn load_or_create_anonymous(root_folder: &Path) -> Result<VoterIdentity> {
    let path = identity_path(root_folder);

    if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        let identity: VoterIdentity = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        if !identity.is_anonymous() {
            return Err(Error::Config(format!(
                "{} does not hold an anonymous identity",
                path.display()
            )));
        }
        debug!(user_id = %identity.user_id, "Loaded anonymous identity");
        return Ok(identity);
    }

    std::fs::create_dir_all(root_folder)?;
    let identity = VoterIdentity::anonymous();
    let content = toml::to_string(&identity)
        .map_err(|e| Error::Internal(format!("Failed to serialize identity: {}", e)))?;
    std::fs::write(&path, content)?;
    info!(user_id = %identity.user_id, "Created anonymous identity at {}", path.display());

    Ok(identity)
}
