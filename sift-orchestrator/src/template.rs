//! Default pipeline template
//!
//! New organizations start from this config. A template file can be
//! configured; otherwise the one bundled into the binary is used.

use serde_json::{Value, json};
use std::path::PathBuf;
use tracing::{error, warn};

const BUNDLED_TEMPLATE: &str = include_str!("../templates/default.yaml");

#[derive(Debug, Clone, Default)]
pub struct TemplateLoader {
    path: Option<PathBuf>,
}

impl TemplateLoader {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Loads the template, never failing
    ///
    /// An unreadable or invalid template file falls back to the bundled
    /// template; if that is broken too, an empty pipeline is returned.
    pub async fn load(&self) -> Value {
        if let Some(path) = &self.path {
            match tokio::fs::read_to_string(path).await {
                Ok(raw) => match serde_yaml::from_str::<Value>(&raw) {
                    Ok(config) => return config,
                    Err(e) => warn!("Invalid template {}: {}", path.display(), e),
                },
                Err(e) => warn!("Failed to read template {}: {}", path.display(), e),
            }
        }

        match serde_yaml::from_str(BUNDLED_TEMPLATE) {
            Ok(config) => config,
            Err(e) => {
                error!("Bundled template is invalid: {}", e);
                empty_pipeline()
            }
        }
    }
}

pub fn empty_pipeline() -> Value {
    json!({
        "sources": {},
        "transforms": {},
        "sinks": {},
    })
}

/// The bundled template, parsed
#[cfg(test)]
pub fn bundled() -> Value {
    serde_yaml::from_str(BUNDLED_TEMPLATE).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bundled_template_is_a_pipeline() {
        let config = TemplateLoader::default().load().await;

        assert!(config["sources"].is_object());
        assert!(config["sinks"].is_object());
        assert_eq!(config, bundled());
    }

    #[tokio::test]
    async fn test_missing_file_falls_back_to_bundled() {
        let loader = TemplateLoader::new(Some(PathBuf::from("/nonexistent/sift/template.yaml")));
        assert_eq!(loader.load().await, bundled());
    }

    #[tokio::test]
    async fn test_template_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.yaml");
        tokio::fs::write(&path, "sources:\n  stdin_in:\n    type: stdin\n")
            .await
            .unwrap();

        let config = TemplateLoader::new(Some(path)).load().await;

        assert_eq!(config["sources"]["stdin_in"]["type"], "stdin");
    }
}
