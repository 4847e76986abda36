//! Shared construction of the engine and store for CLI commands.

use std::sync::Arc;

use kudos_core::achievements::AchievementDefinition;
use kudos_core::storage::{data_dir, SqliteStore};
use kudos_core::{EngineConfig, GamificationEngine};
use serde::Deserialize;

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    achievements: Vec<AchievementDefinition>,
}

/// Load the achievement catalog from `achievements.toml` in the data
/// directory. An absent file means an empty catalog.
pub fn load_catalog() -> Result<Vec<AchievementDefinition>, Box<dyn std::error::Error>> {
    let path = data_dir()?.join("achievements.toml");
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(&path)?;
    let file: CatalogFile = toml::from_str(&text)?;
    Ok(file.achievements)
}

/// The default SQLite store, serving the on-disk achievement catalog.
pub fn open_store() -> Result<Arc<SqliteStore>, Box<dyn std::error::Error>> {
    Ok(Arc::new(SqliteStore::open_default(load_catalog()?)?))
}

/// Engine over the default store and the on-disk configuration.
pub fn build_engine() -> Result<GamificationEngine, Box<dyn std::error::Error>> {
    let config = Arc::new(EngineConfig::load()?);
    Ok(GamificationEngine::with_config(config, open_store()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_file_parses() {
        let text = r#"
            [[achievements]]
            id = "first-steps"
            name = "First Steps"
            description = "Earn your first 100 points"
            points_reward = 25

            [[achievements.conditions]]
            kind = "min_points"
            points = 100
        "#;
        let file: CatalogFile = toml::from_str(text).unwrap();
        assert_eq!(file.achievements.len(), 1);
        assert_eq!(file.achievements[0].id, "first-steps");
        assert_eq!(file.achievements[0].conditions.len(), 1);
    }

    #[test]
    fn test_empty_catalog_file_parses() {
        let file: CatalogFile = toml::from_str("").unwrap();
        assert!(file.achievements.is_empty());
    }
}
