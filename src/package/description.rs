use serde::{Deserialize, Serialize};
use std::fmt;

/// Version sentinel meaning "whatever the newest tag is".
pub const LATEST: &str = "latest";

/// Identity of one installable unit: where it lives, which tag, which kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageDescription {
    /// Repository in `owner/repo` form.
    pub full_name: String,
    /// Tag literal, or [`LATEST`] before resolution.
    pub version: String,
    /// Registry key, e.g. `integrations` or `plugins`.
    pub kind: String,
}

impl PackageDescription {
    pub fn new(
        full_name: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Repository name without the owner (`owner/repo` -> `repo`).
    pub fn short_name(&self) -> &str {
        match self.full_name.rfind('/') {
            Some(i) => &self.full_name[i + 1..],
            None => &self.full_name,
        }
    }

    pub fn is_latest(&self) -> bool {
        self.version == LATEST
    }
}

impl fmt::Display for PackageDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.full_name, self.version)
    }
}
