use serde::{Deserialize, Serialize};
use std::fmt;

/// Requested version sentinel meaning "whatever the source marks as its newest release".
pub const LATEST_VERSION: &str = "latest";

/// One manageable binary, as persisted in the state file.
///
/// Field names on disk are PascalCase (`FullName`, `InstalledVersion`, ...) and any
/// missing field decodes to an empty string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct BinaryInfo {
    pub full_name: String,
    pub name: String,
    pub owner: String,
    /// Version asked for by the user, possibly [`LATEST_VERSION`].
    pub version: String,
    /// Concrete tag that was resolved and installed.
    pub installed_version: String,
    /// Name of the resolver that produced the installed artifact.
    pub resolver: String,
}

impl BinaryInfo {
    /// Build a descriptor from user input:
    /// - "owner/name" uses both parts
    /// - "name" is self-owned, i.e. "name/name"
    ///
    /// An empty version defaults to [`LATEST_VERSION`].
    pub fn parse(binary_id: &str, version: &str) -> Result<Self, String> {
        if binary_id.is_empty() {
            return Err("Binary name cannot be empty".to_string());
        }

        if binary_id.starts_with('-') {
            return Err(format!(
                "Invalid binary name '{}'. It looks like a CLI flag.",
                binary_id
            ));
        }

        let parts: Vec<&str> = binary_id.split('/').collect();
        let (owner, name) = match parts.as_slice() {
            [name] => (*name, *name),
            [owner, name] if !owner.is_empty() && !name.is_empty() => (*owner, *name),
            _ => return Err(format!("Invalid binary name format: {}", binary_id)),
        };

        let version = if version.is_empty() {
            LATEST_VERSION
        } else {
            version
        };

        Ok(BinaryInfo {
            full_name: format!("{}/{}", owner, name),
            name: name.to_string(),
            owner: owner.to_string(),
            version: version.to_string(),
            ..Default::default()
        })
    }

    /// Short form shown to users: the bare name for self-owned binaries.
    pub fn display_name(&self) -> &str {
        if self.name == self.owner {
            &self.name
        } else {
            &self.full_name
        }
    }
}

/// Turn user input into the state key, expanding bare names to "name/name".
pub fn normalize_name(binary_id: &str) -> String {
    if binary_id.contains('/') {
        binary_id.to_string()
    } else {
        format!("{}/{}", binary_id, binary_id)
    }
}

impl fmt::Display for BinaryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.full_name.is_empty() {
            return Ok(());
        }
        write!(
            f,
            "{} in version {}",
            self.display_name(),
            self.installed_version
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformInfo {
    pub os: String,
    pub arch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GitHubRelease {
    #[serde(default)]
    pub tag_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

impl GitHubRelease {
    /// Tag of the release, preferring `tag_name` over the display `name`.
    pub fn version(&self) -> Option<&str> {
        [self.tag_name.as_deref(), self.name.as_deref()]
            .into_iter()
            .flatten()
            .find(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitHubAsset {
    pub browser_download_url: String,
}
