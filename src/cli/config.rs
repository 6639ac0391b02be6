// FILE: src/cli/config.rs

use crate::error::{CompilerError, Result};
use crate::{CacheSettings, IconSettings, ReactSettings, Settings, ThemeSettings, WriterSettings};
use serde::{Deserialize, Serialize};
use std::fs;

/// Optional overrides. Sections that are present replace the defaults;
/// keys missing inside a section keep their default values.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub react: Option<ReactSettings>,
    pub writer: Option<WriterSettings>,
    pub theme: Option<ThemeSettings>,
    pub icons: Option<IconSettings>,
    pub cache: Option<CacheSettings>,
    pub compile_yield_ms: Option<u64>,
    pub theme_interval_ms: Option<u64>,
    pub output_directory: Option<String>,
}

impl ConfigFile {
    pub fn apply(&self, settings: &mut Settings) -> Result<()> {
        if let Some(react) = &self.react {
            settings.react = react.clone();
        }
        if let Some(writer) = &self.writer {
            settings.writer = writer.clone();
        }
        if let Some(theme) = &self.theme {
            settings.theme = theme.clone();
        }
        if let Some(icons) = &self.icons {
            settings.icons = icons.clone();
        }
        if let Some(cache) = &self.cache {
            if cache.namespace.is_empty() || cache.key.is_empty() {
                return Err(CompilerError::InvalidFormat {
                    message: "cache.namespace and cache.key must not be empty".to_string(),
                });
            }
            settings.cache = cache.clone();
        }
        if let Some(ms) = self.compile_yield_ms {
            settings.compile_yield_ms = ms;
        }
        if let Some(ms) = self.theme_interval_ms {
            if ms == 0 {
                return Err(CompilerError::InvalidFormat {
                    message: "theme_interval_ms must be greater than zero".to_string(),
                });
            }
            settings.theme_interval_ms = ms;
        }
        Ok(())
    }
}

pub fn load(config_path: &str) -> Result<ConfigFile> {
    let config_content = fs::read_to_string(config_path).map_err(|e| CompilerError::FileNotFound {
        path: format!("Config file {}: {}", config_path, e),
    })?;

    let config = if config_path.ends_with(".json") {
        serde_json::from_str(&config_content).map_err(|e| CompilerError::InvalidFormat {
            message: format!("Invalid JSON config: {}", e),
        })
    } else if config_path.ends_with(".toml") {
        toml::from_str(&config_content).map_err(|e| CompilerError::InvalidFormat {
            message: format!("Invalid TOML config: {}", e),
        })
    } else {
        Err(CompilerError::InvalidFormat {
            message: "Config file must be .json or .toml format".to_string(),
        })
    }?;
    log::info!("Loaded configuration from {}", config_path);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_toml_sections_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "output_directory = \"out\"\ncompile_yield_ms = 0\n\n[writer]\nuse_tabs = true\n\n[icons]\ncomponent = \"Glyph\""
        )
        .unwrap();

        let config = load(file.path().to_str().unwrap()).unwrap();
        let mut settings = Settings::default();
        config.apply(&mut settings).unwrap();
        assert!(settings.writer.use_tabs);
        assert!(settings.writer.use_single_quote);
        assert_eq!(settings.icons.component, "Glyph");
        assert_eq!(settings.icons.import_path, "react-native-iconify");
        assert_eq!(settings.compile_yield_ms, 0);
        assert_eq!(config.output_directory.as_deref(), Some("out"));
    }

    #[test]
    fn test_json_config_and_validation() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{{\"theme_interval_ms\": 0}}").unwrap();
        let config = load(file.path().to_str().unwrap()).unwrap();
        assert!(config.apply(&mut Settings::default()).is_err());
    }

    #[test]
    fn test_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = load(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, CompilerError::InvalidFormat { .. }));
    }
}
