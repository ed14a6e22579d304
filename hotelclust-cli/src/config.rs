use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use hotelclust_features::embedding::DEFAULT_COMPONENTS;
use hotelclust_model::batched::DEFAULT_CHUNK_SIZE;
use hotelclust_model::config::ForestConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Composantes ACP gardées par destination.
    pub n_components: usize,
    pub chunk_size: usize,
    /// Fraction finale du fichier d'entraînement gardée pour la validation.
    pub holdout: f64,
    pub forest: ForestConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            n_components: DEFAULT_COMPONENTS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            holdout: 0.2,
            forest: ForestConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Impossible de lire {:?}", path))?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("Configuration invalide : {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration par défaut si aucun fichier n'est donné.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("Impossible d'écrire {:?}", path))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_components == 0 {
            bail!("n_components doit être strictement positif");
        }
        if self.chunk_size == 0 {
            bail!("chunk_size doit être strictement positif");
        }
        if !(self.holdout > 0.0 && self.holdout < 1.0) {
            bail!("holdout doit être dans ]0, 1[ (reçu {})", self.holdout);
        }
        if self.forest.n_trees == 0 {
            bail!("forest.n_trees doit être strictement positif");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.n_components, 10);
        assert_eq!(config.chunk_size, 10_000);
        assert_eq!(config.holdout, 0.2);
        assert_eq!(config.forest.n_trees, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"n_components": 4, "forest": {"n_trees": 3}}"#).unwrap();
        assert_eq!(config.n_components, 4);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.forest.n_trees, 3);
        assert_eq!(config.forest.max_depth, ForestConfig::default().max_depth);
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join("hotelclust_test_config.json");
        let config = PipelineConfig {
            n_components: 6,
            holdout: 0.25,
            ..PipelineConfig::default()
        };
        config.save(&path).unwrap();
        let loaded = PipelineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_holdout = PipelineConfig {
            holdout: 1.0,
            ..PipelineConfig::default()
        };
        assert!(bad_holdout.validate().is_err());

        let bad_chunk = PipelineConfig {
            chunk_size: 0,
            ..PipelineConfig::default()
        };
        assert!(bad_chunk.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join("hotelclust_absent_config.json");
        assert!(PipelineConfig::load_or_default(Some(&path)).is_err());
        assert_eq!(PipelineConfig::load_or_default(None).unwrap(), PipelineConfig::default());
    }
}
