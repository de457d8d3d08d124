//! Release file naming and hashing helpers.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Location of one release file: `<plugin_id>/<release_id>/<filename>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseFileKey {
    pub plugin_id: Uuid,
    pub release_id: Uuid,
    pub filename: String,
}

impl ReleaseFileKey {
    /// Build a key, sanitising `filename`.
    pub fn new(plugin_id: Uuid, release_id: Uuid, filename: &str) -> Self {
        Self {
            plugin_id,
            release_id,
            filename: sanitize_filename(filename),
        }
    }

    /// Parse a stored file reference back into its parts.
    ///
    /// The filename must already be in sanitised form.
    pub fn parse(file_ref: &str) -> Result<Self> {
        let mut parts = file_ref.splitn(3, '/');
        let (Some(plugin), Some(release), Some(filename)) =
            (parts.next(), parts.next(), parts.next())
        else {
            bail!("file reference must have three segments: {file_ref}");
        };

        let plugin_id = Uuid::parse_str(plugin).context("invalid plugin id in file reference")?;
        let release_id =
            Uuid::parse_str(release).context("invalid release id in file reference")?;
        if sanitize_filename(filename) != filename {
            bail!("unsafe filename in file reference: {filename}");
        }

        Ok(Self {
            plugin_id,
            release_id,
            filename: filename.to_string(),
        })
    }

    pub fn file_ref(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ReleaseFileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.plugin_id, self.release_id, self.filename)
    }
}

/// Reduce an uploaded filename to a safe single path component.
pub fn sanitize_filename(filename: &str) -> String {
    // Get just the filename part (no path)
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    let cleaned: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .take(200)
        .collect();

    if cleaned.chars().all(|c| c == '.') {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Hex-encoded SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
