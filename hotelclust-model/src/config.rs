use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    /// Taille minimale d'un nœud pour tenter une coupure.
    pub min_samples_split: usize,
    /// Features tirées par coupure ; `None` → ceil(sqrt(d)).
    pub max_features: Option<usize>,
    /// Nombre approximatif de seuils testés par feature.
    pub threshold_samples: usize,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 20,
            max_depth: 12,
            min_samples_split: 4,
            max_features: None,
            threshold_samples: 10,
            seed: 42,
        }
    }
}

impl ForestConfig {
    pub fn features_per_split(&self, n_features: usize) -> usize {
        let default = (n_features as f64).sqrt().ceil() as usize;
        self.max_features.unwrap_or(default).clamp(1, n_features.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ForestConfig::default();
        assert_eq!(config.n_trees, 20);
        assert_eq!(config.seed, 42);
        assert!(config.max_features.is_none());
    }

    #[test]
    fn test_features_per_split() {
        let config = ForestConfig::default();
        assert_eq!(config.features_per_split(36), 6);
        assert_eq!(config.features_per_split(37), 7);
        let config = ForestConfig { max_features: Some(100), ..ForestConfig::default() };
        assert_eq!(config.features_per_split(36), 36);
    }

    #[test]
    fn test_config_partial_json() {
        let config: ForestConfig = serde_json::from_str(r#"{"n_trees": 5}"#).unwrap();
        assert_eq!(config.n_trees, 5);
        assert_eq!(config.max_depth, 12);
    }
}
