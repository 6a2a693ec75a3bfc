//! Discovers per-product forecast artifacts for a festival.
//!
//! Artifacts live flat in one directory and are named
//! `<festival>_<product>.<ext>`. Matching by file name is a heuristic: a file
//! may be claimed by two festivals whose spellings share a prefix, and the
//! longest matching spelling decides where the product name starts.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::calendar::FestivalKey;
use super::model::{ModelArtifact, Predictor};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Model folder not found.")]
    FolderMissing,

    #[error("failed to read model folder: {0}")]
    Io(#[from] io::Error),

    #[error("failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
}

/// A matched artifact file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelHandle {
    pub product: String,
    pub path: PathBuf,
}

/// Turns artifact bytes into a predictor.
pub trait ModelCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Predictor>, String>;
}

/// Reads JSON-serialized [`ModelArtifact`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonModelCodec;

impl ModelCodec for JsonModelCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Predictor>, String> {
        let artifact: ModelArtifact = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        artifact.into_predictor()
    }
}

#[derive(Clone)]
pub struct ForecastLoader {
    model_dir: PathBuf,
    codec: Arc<dyn ModelCodec>,
}

impl std::fmt::Debug for ForecastLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastLoader")
            .field("model_dir", &self.model_dir)
            .finish_non_exhaustive()
    }
}

impl ForecastLoader {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self::with_codec(model_dir, Arc::new(JsonModelCodec))
    }

    pub fn with_codec(model_dir: impl Into<PathBuf>, codec: Arc<dyn ModelCodec>) -> Self {
        Self {
            model_dir: model_dir.into(),
            codec,
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Artifacts belonging to `festival`, in file-name order.
    pub fn list_models(&self, festival: &FestivalKey) -> Result<Vec<ModelHandle>, LoadError> {
        let entries = match fs::read_dir(&self.model_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(LoadError::FolderMissing),
            Err(e) => return Err(e.into()),
        };

        let mut file_names = Vec::new();
        for entry in entries {
            let entry = entry?;
            // follows symlinks; dangling links are skipped
            match fs::metadata(entry.path()) {
                Ok(meta) if meta.is_file() => {}
                _ => continue,
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            file_names.push(name);
        }
        file_names.sort();

        let spellings = festival_spellings(festival);
        let handles: Vec<ModelHandle> = file_names
            .into_iter()
            .filter_map(|file_name| {
                let product = match_artifact(&file_name, &spellings)?;
                Some(ModelHandle {
                    product,
                    path: self.model_dir.join(&file_name),
                })
            })
            .collect();

        debug!(
            festival = %festival.name,
            matched = handles.len(),
            "listed forecast artifacts"
        );
        Ok(handles)
    }

    /// Read and decode one artifact.
    pub fn load(&self, handle: &ModelHandle) -> Result<Box<dyn Predictor>, LoadError> {
        let bytes = fs::read(&handle.path)?;
        self.codec
            .decode(&bytes)
            .map_err(|reason| LoadError::Decode {
                path: handle.path.clone(),
                reason,
            })
    }
}

fn title_case(words: &str) -> String {
    words
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lower-cased spellings a file name may start with, longest first.
pub(crate) fn festival_spellings(festival: &FestivalKey) -> Vec<String> {
    let mut spellings = BTreeSet::new();

    for source in std::iter::once(&festival.name).chain(festival.aliases.iter()) {
        let lowered = source.to_lowercase();
        let forms = [
            lowered.clone(),
            lowered.replace('\'', ""),
            lowered.replace('&', "and"),
        ];
        for form in forms {
            let words: Vec<&str> = form
                .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
                .filter(|w| !w.is_empty())
                .collect();
            if words.is_empty() {
                continue;
            }
            for joiner in [" ", "_", "-", ""] {
                spellings.insert(words.join(joiner));
            }
        }
    }

    let mut spellings: Vec<String> = spellings.into_iter().collect();
    // stable: equal lengths keep lexicographic order
    spellings.sort_by(|a, b| b.len().cmp(&a.len()));
    spellings
}

/// Product name when `file_name` belongs to one of `spellings`.
pub(crate) fn match_artifact(file_name: &str, spellings: &[String]) -> Option<String> {
    let lowered = file_name.to_lowercase();

    let rest = spellings.iter().find_map(|spelling| {
        let rest = lowered.strip_prefix(spelling.as_str())?;
        let mut chars = rest.chars();
        match chars.next() {
            Some('_' | '-' | ' ') => Some(chars.as_str()),
            _ => None,
        }
    })?;

    let stem = rest.rsplit_once('.').map_or(rest, |(stem, _ext)| stem);
    let product = title_case(&stem.replace(['_', '-'], " "));
    if product.is_empty() {
        None
    } else {
        Some(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::festival::calendar::resolve;
    use assert_matches::assert_matches;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &str) {
        let mut file = File::create(dir.join(name)).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    fn names(handles: &[ModelHandle]) -> Vec<&str> {
        handles.iter().map(|h| h.product.as_str()).collect()
    }

    #[test]
    fn spellings_cover_aliases_and_separators() {
        let spellings = festival_spellings(&resolve("christmas").unwrap());
        for expected in ["christmas", "xmas", "x-mas", "x_mas", "x mas"] {
            assert!(spellings.contains(&expected.to_string()), "{expected}");
        }
        let lengths: Vec<usize> = spellings.iter().map(String::len).collect();
        assert!(lengths.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn apostrophes_are_optional() {
        let spellings = festival_spellings(&resolve("valentine's day").unwrap());
        assert!(spellings.contains(&"valentines_day".to_string()));
        assert!(spellings.contains(&"valentine's day".to_string()));
    }

    #[test]
    fn product_name_from_remainder() {
        let spellings = festival_spellings(&resolve("new year").unwrap());
        assert_eq!(
            match_artifact("New_Year_party-poppers.json", &spellings).as_deref(),
            Some("Party Poppers")
        );
        assert_eq!(
            match_artifact("newyear_LED_lights.pkl", &spellings).as_deref(),
            Some("Led Lights")
        );
        assert!(match_artifact("New_Year_.json", &spellings).is_none());
        assert!(match_artifact("New_Yearbook.json", &spellings).is_none());
    }

    #[test]
    fn prefix_collision_is_claimed_by_shorter_festival() {
        let spellings = festival_spellings(&resolve("holi").unwrap());
        assert_eq!(
            match_artifact("Holi_Day_Sweets.json", &spellings).as_deref(),
            Some("Day Sweets")
        );
    }

    #[test]
    fn lists_matching_files_sorted_and_skips_hidden() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "Diwali_Sweets.json", "{}");
        write(dir.path(), "deepawali_Candles.json", "{}");
        write(dir.path(), "Christmas_Mug.json", "{}");
        write(dir.path(), ".Diwali_Hidden.json", "{}");
        fs::create_dir(dir.path().join("Diwali_Folder")).unwrap();

        let loader = ForecastLoader::new(dir.path());
        let handles = loader.list_models(&resolve("diwali").unwrap()).unwrap();
        assert_eq!(names(&handles), vec!["Sweets", "Candles"]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_artifacts_are_listed() {
        let store = TempDir::new().unwrap();
        write(store.path(), "sweets.json", r#"{"kind":"constant","value":3.0}"#);

        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(store.path().join("sweets.json"), dir.path().join("Diwali_Sweets.json"))
            .unwrap();
        std::os::unix::fs::symlink(store.path().join("gone.json"), dir.path().join("Diwali_Gone.json"))
            .unwrap();

        let loader = ForecastLoader::new(dir.path());
        let handles = loader.list_models(&resolve("diwali").unwrap()).unwrap();
        assert_eq!(names(&handles), vec!["Sweets"]);
    }

    #[test]
    fn missing_folder_is_reported() {
        let dir = TempDir::new().unwrap();
        let loader = ForecastLoader::new(dir.path().join("nope"));
        assert_matches!(
            loader.list_models(&resolve("diwali").unwrap()),
            Err(LoadError::FolderMissing)
        );
    }

    #[test]
    fn load_decodes_json_and_reports_garbage() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "Holi_Colours.pkl",
            r#"{"kind":"constant","value":7.0}"#,
        );
        write(dir.path(), "Holi_Water_Guns.pkl", "\u{0}\u{1}not json");

        let loader = ForecastLoader::new(dir.path());
        let handles = loader.list_models(&resolve("holi").unwrap()).unwrap();
        assert_eq!(names(&handles), vec!["Colours", "Water Guns"]);

        let predictor = loader.load(&handles[0]).unwrap();
        let date = chrono::NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(predictor.predict(date).unwrap(), 7.0);
        assert!(matches!(loader.load(&handles[1]), Err(LoadError::Decode { .. })));
    }
}
