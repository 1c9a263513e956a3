//! Catalog of available sign clips.
//!
//! The catalog is an ordered list of [`ClipEntry`] values loaded once at
//! startup. Files may be a bare JSON array or the script form
//! `sigmlList = [ ... ];`, where everything between the first `[` and the
//! last `]` is parsed.

use crate::defaults::CLIP_EXTENSION;
use crate::error::{IslError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// One sign clip: a word or a single letter and the file that animates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipEntry {
    #[serde(rename = "sid")]
    pub id: u32,
    pub name: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
}

/// Ordered clip collection with name lookup.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<ClipEntry>,
    /// Name → position of its first occurrence in `entries`.
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog from entries, keeping their order.
    pub fn new(entries: Vec<ClipEntry>) -> Self {
        let mut index = HashMap::with_capacity(entries.len());
        for (pos, entry) in entries.iter().enumerate() {
            index.entry(entry.name.clone()).or_insert(pos);
        }
        Self { entries, index }
    }

    /// Parse catalog JSON, accepting the script-wrapped form.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let (Some(start), Some(end)) = (content.find('['), content.rfind(']')) else {
            return Err(IslError::CatalogParse {
                message: "no JSON array found".to_string(),
            });
        };
        if end < start {
            return Err(IslError::CatalogParse {
                message: "no JSON array found".to_string(),
            });
        }

        let entries: Vec<ClipEntry> =
            serde_json::from_str(&content[start..=end]).map_err(|e| IslError::CatalogParse {
                message: e.to_string(),
            })?;
        Ok(Self::new(entries))
    }

    /// Load a catalog file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IslError::CatalogNotFound {
                    path: path.display().to_string(),
                }
            } else {
                IslError::Io(e)
            }
        })?;
        let catalog = Self::from_json_str(&content)?;
        tracing::info!(
            path = %path.display(),
            clips = catalog.len(),
            "loaded clip catalog"
        );
        Ok(catalog)
    }

    /// Write the catalog as a bare JSON array.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries).map_err(|e| {
            IslError::CatalogParse {
                message: e.to_string(),
            }
        })?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;
        Ok(())
    }

    /// First entry whose name equals `name` exactly.
    pub fn lookup(&self, name: &str) -> Option<&ClipEntry> {
        self.index.get(name).map(|&pos| &self.entries[pos])
    }

    /// First single-character entry for `c`.
    pub fn lookup_char(&self, c: char) -> Option<&ClipEntry> {
        let mut buf = [0u8; 4];
        self.lookup(c.encode_utf8(&mut buf))
    }

    /// Identifier the next inserted entry would receive (max id + 1).
    pub fn next_id(&self) -> u32 {
        self.entries
            .iter()
            .map(|e| e.id)
            .max()
            .map_or(1, |max| max.saturating_add(1))
    }

    /// Append a new clip. Names must be unique.
    pub fn insert(&mut self, name: &str, file_name: Option<&str>) -> Result<ClipEntry> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(IslError::Other("clip name must not be empty".to_string()));
        }
        if self.index.contains_key(&name) {
            return Err(IslError::DuplicateClip { name });
        }

        let entry = ClipEntry {
            id: self.next_id(),
            file_name: file_name
                .map(str::to_string)
                .unwrap_or_else(|| format!("{name}{CLIP_EXTENSION}")),
            name: name.clone(),
        };
        self.index.insert(name, self.entries.len());
        self.entries.push(entry.clone());
        Ok(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClipEntry> {
        self.entries.iter()
    }
}
