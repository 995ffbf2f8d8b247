use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{FormworkError, Result};

/// Fixed path of the sidecar generation manifest inside a target directory.
/// Its presence is what marks a directory as a generated project.
pub const SIDECAR_FILE: &str = ".formwork-manifest.toml";

/// The engine's own record of what it wrote: each customizable artifact's
/// relative path mapped to the SHA-256 of the content written. This is the
/// only state the engine persists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationManifest {
    pub files: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize)]
struct SidecarDoc {
    generation: GenerationMeta,
    #[serde(default)]
    files: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize)]
struct GenerationMeta {
    version: String,
}

/// SHA-256 of a byte slice, lowercase hex.
pub fn hash_bytes(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Hash a file on disk. Returns Ok(None) if the file does not exist.
pub fn hash_file(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read(path)
        .map_err(|e| FormworkError::io(format!("reading {}", path.display()), e))?;
    Ok(Some(hash_bytes(&content)))
}

/// Load the sidecar manifest from a target directory, if present.
pub fn load(target_dir: &Path) -> Result<Option<GenerationManifest>> {
    let path = target_dir.join(SIDECAR_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| FormworkError::io(format!("reading {}", path.display()), e))?;
    let doc: SidecarDoc =
        toml::from_str(&content).map_err(|e| FormworkError::SidecarParse { path, source: e })?;
    Ok(Some(GenerationManifest { files: doc.files }))
}

/// Write the sidecar manifest into a target directory.
pub fn store(target_dir: &Path, manifest: &GenerationManifest) -> Result<()> {
    let doc = SidecarDoc {
        generation: GenerationMeta {
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        files: manifest.files.clone(),
    };
    let content = toml::to_string_pretty(&doc).map_err(|e| {
        FormworkError::io(
            "serializing generation manifest".to_string(),
            std::io::Error::other(e),
        )
    })?;
    let path = target_dir.join(SIDECAR_FILE);
    std::fs::write(&path, content)
        .map_err(|e| FormworkError::io(format!("writing {}", path.display()), e))
}
