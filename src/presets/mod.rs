//! Harmonic preset catalog
//!
//! Presets are named lists of partials. A few timbres are built in, and more
//! can be loaded from a YAML or JSON library file:
//!
//! ```yaml
//! presets:
//!   bell:
//!     - { number: 1, amplitude: 1.0 }
//!     - { number: 4, amplitude: 0.3 }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::synth::Harmonic;

/// Source of named harmonic sets.
///
/// Unknown presets yield an empty list, which plays as silence.
pub trait PresetCatalog {
    fn harmonics(&self, preset: &str) -> Vec<Harmonic>;
}

/// Errors raised while loading a preset library
#[derive(Debug, Error)]
pub enum PresetError {
    #[error("failed to read preset library {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML preset library")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON preset library")]
    Json(#[from] serde_json::Error),

    #[error("preset '{0}' has no harmonics")]
    Empty(String),
}

/// Presets compiled into the binary
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPresets;

const BUILTIN_NAMES: [&str; 5] = ["sine", "organ", "clarinet", "bright", "hollow"];

impl BuiltinPresets {
    pub fn names() -> &'static [&'static str] {
        &BUILTIN_NAMES
    }
}

impl PresetCatalog for BuiltinPresets {
    fn harmonics(&self, preset: &str) -> Vec<Harmonic> {
        match preset {
            "sine" => vec![Harmonic::new(1, 1.0)],
            "organ" => vec![
                Harmonic::new(1, 0.6),
                Harmonic::new(2, 0.25),
                Harmonic::new(4, 0.1),
                Harmonic::new(8, 0.05),
            ],
            // Odd partials only
            "clarinet" => (0..6)
                .map(|i| {
                    let n = 2 * i + 1;
                    Harmonic::new(n, 0.5 / n as f32)
                })
                .collect(),
            "bright" => (1..=8).map(|n| Harmonic::new(n, 0.35 / n as f32)).collect(),
            "hollow" => vec![
                Harmonic::new(1, 0.7),
                Harmonic::new(3, 0.2),
                Harmonic::new(5, 0.1),
            ],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LibraryFile {
    #[serde(default)]
    presets: BTreeMap<String, Vec<Harmonic>>,
}

/// Presets loaded from a file, backed by the built-in set
#[derive(Debug, Default)]
pub struct PresetLibrary {
    presets: BTreeMap<String, Vec<Harmonic>>,
}

impl PresetLibrary {
    /// Load a library; `.json` files are parsed as JSON, anything else as YAML
    pub fn load(path: &Path) -> Result<Self, PresetError> {
        let contents = std::fs::read_to_string(path).map_err(|source| PresetError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let file: LibraryFile = if is_json {
            serde_json::from_str(&contents)?
        } else {
            serde_yaml::from_str(&contents)?
        };

        if let Some((name, _)) = file.presets.iter().find(|(_, h)| h.is_empty()) {
            return Err(PresetError::Empty(name.clone()));
        }

        log::debug!("Loaded {} presets from {:?}", file.presets.len(), path);
        Ok(Self {
            presets: file.presets,
        })
    }

    /// Names defined by the file, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

impl PresetCatalog for PresetLibrary {
    fn harmonics(&self, preset: &str) -> Vec<Harmonic> {
        match self.presets.get(preset) {
            Some(harmonics) => harmonics.clone(),
            None => BuiltinPresets.harmonics(preset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_builtins_are_non_empty() {
        for name in BuiltinPresets::names() {
            assert!(!BuiltinPresets.harmonics(name).is_empty(), "{} is empty", name);
        }
    }

    #[test]
    fn test_unknown_preset_is_empty() {
        assert!(BuiltinPresets.harmonics("kazoo").is_empty());
        assert!(PresetLibrary::default().harmonics("kazoo").is_empty());
    }

    #[test]
    fn test_clarinet_is_odd_only() {
        let harmonics = BuiltinPresets.harmonics("clarinet");
        assert!(harmonics.iter().all(|h| h.number % 2 == 1));
    }

    #[test]
    fn test_load_yaml_library() {
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(
            b"presets:\n  bell:\n    - { number: 1, amplitude: 1.0 }\n    - { number: 4, amplitude: 0.3 }\n",
        )
        .unwrap();

        let library = PresetLibrary::load(file.path()).unwrap();
        assert_eq!(library.len(), 1);
        assert_eq!(
            library.harmonics("bell"),
            vec![Harmonic::new(1, 1.0), Harmonic::new(4, 0.3)]
        );
        // Falls back to the built-ins
        assert_eq!(library.harmonics("sine"), vec![Harmonic::new(1, 1.0)]);
    }

    #[test]
    fn test_load_json_library() {
        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(br#"{"presets": {"pure": [{"number": 2, "amplitude": 0.5}]}}"#)
            .unwrap();

        let library = PresetLibrary::load(file.path()).unwrap();
        assert_eq!(library.names().collect::<Vec<_>>(), vec!["pure"]);
        assert_eq!(library.harmonics("pure"), vec![Harmonic::new(2, 0.5)]);
    }

    #[test]
    fn test_empty_preset_rejected() {
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(b"presets:\n  nothing: []\n").unwrap();
        assert!(matches!(
            PresetLibrary::load(file.path()),
            Err(PresetError::Empty(name)) if name == "nothing"
        ));
    }

    #[test]
    fn test_missing_library() {
        assert!(matches!(
            PresetLibrary::load(Path::new("/nonexistent/presets.yaml")),
            Err(PresetError::Io { .. })
        ));
    }
}
