use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest not found at {0}")]
    Missing(PathBuf),
    #[error("failed to read manifest {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse manifest {path}: {source}")]
    Parse {
        source: serde_json::Error,
        path: PathBuf,
    },
    #[error("manifest {0} contains no eras")]
    Empty(PathBuf),
}

/// One historical period to illustrate, exactly as declared in the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct Era {
    pub era_index: EraIndex,
    pub title: String,
    #[serde(default)]
    pub icrawler_queries: Vec<String>,
}

/// Manifests in the wild carry both integer and pre-formatted string indices.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EraIndex {
    Number(u64),
    Text(String),
}

impl fmt::Display for EraIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EraIndex::Number(value) => write!(f, "{value:02}"),
            EraIndex::Text(value) => f.write_str(value),
        }
    }
}

impl Era {
    /// Durable key shared by the checkpoint and the filesystem, e.g.
    /// `01_ancient_egypt_and_mesopotamia`. Must stay stable across runs.
    pub fn folder_name(&self) -> String {
        format!("{}_{}", self.era_index, slugify(&self.title))
    }
}

/// `"Ancient Egypt and Mesopotamia"` -> `"ancient_egypt_and_mesopotamia"`.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped = Regex::new(r"[^\w\s]")
        .unwrap()
        .replace_all(lowered.trim(), "");
    let collapsed = Regex::new(r"[\s_]+").unwrap().replace_all(&stripped, "_");
    collapsed.trim_matches('_').to_string()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ManifestDocument {
    Bare(Vec<Era>),
    Wrapped {
        #[serde(default)]
        eras: Vec<Era>,
    },
}

/// Loads the era/query manifest. Accepts a bare JSON array of eras or an
/// object with an `eras` key. A missing file or an empty era list is fatal.
pub fn load_manifest<P: AsRef<Path>>(path: P) -> Result<Vec<Era>, ManifestError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ManifestError::Missing(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    let document: ManifestDocument =
        serde_json::from_str(&content).map_err(|source| ManifestError::Parse {
            source,
            path: path.to_path_buf(),
        })?;
    let eras = match document {
        ManifestDocument::Bare(eras) => eras,
        ManifestDocument::Wrapped { eras } => eras,
    };
    if eras.is_empty() {
        return Err(ManifestError::Empty(path.to_path_buf()));
    }
    Ok(eras)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_strips_punctuation_and_collapses_whitespace() {
        assert_eq!(
            slugify("Ancient Egypt and Mesopotamia"),
            "ancient_egypt_and_mesopotamia"
        );
        assert_eq!(slugify("  Belle Époque: 1890–1914!  "), "belle_époque_18901914");
        assert_eq!(slugify("__already_slugged__"), "already_slugged");
    }

    #[test]
    fn folder_name_zero_pads_numeric_indices() {
        let era = Era {
            era_index: EraIndex::Number(1),
            title: "Ancient Egypt and Mesopotamia".to_string(),
            icrawler_queries: vec![],
        };
        assert_eq!(era.folder_name(), "01_ancient_egypt_and_mesopotamia");
    }

    #[test]
    fn folder_name_keeps_string_indices_verbatim() {
        let era = Era {
            era_index: EraIndex::Text("XIV".to_string()),
            title: "Late Middle Ages".to_string(),
            icrawler_queries: vec![],
        };
        assert_eq!(era.folder_name(), "XIV_late_middle_ages");
    }

    #[test]
    fn manifest_accepts_bare_array_and_wrapper() {
        let dir = tempfile::tempdir().unwrap();
        let bare = dir.path().join("bare.json");
        std::fs::write(
            &bare,
            r#"[{"era_index": 1, "title": "One", "icrawler_queries": ["q"]}]"#,
        )
        .unwrap();
        let eras = load_manifest(&bare).unwrap();
        assert_eq!(eras.len(), 1);
        assert_eq!(eras[0].icrawler_queries, vec!["q".to_string()]);

        let wrapped = dir.path().join("wrapped.json");
        std::fs::write(
            &wrapped,
            r#"{"eras": [{"era_index": "02", "title": "Two"}]}"#,
        )
        .unwrap();
        let eras = load_manifest(&wrapped).unwrap();
        assert_eq!(eras[0].folder_name(), "02_two");
    }

    #[test]
    fn missing_and_empty_manifests_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = load_manifest(dir.path().join("absent.json"));
        assert!(matches!(missing, Err(ManifestError::Missing(_))));

        let empty = dir.path().join("empty.json");
        std::fs::write(&empty, r#"{"eras": []}"#).unwrap();
        assert!(matches!(
            load_manifest(&empty),
            Err(ManifestError::Empty(_))
        ));
    }
}
