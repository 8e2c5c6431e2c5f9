//! Configuracion del cache.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Prefijo de las variables de entorno que sobreescriben la configuracion.
pub const ENV_PREFIX: &str = "FRONT_CACHE";

/// Estrategia para insertar una entry nueva cuando la key no se encontro.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertPolicy {
    /// Inserta solo si la key sigue ausente bajo el lock de la tabla.
    /// Si otro caller gano la carrera, se espera a su entry.
    /// Garantiza un unico fetch en vuelo por key.
    #[default]
    InsertIfAbsent,
    /// Reemplaza incondicionalmente cualquier entry presente.
    /// Misses concurrentes pueden terminar llamando al fetcher varias veces
    /// para la misma key.
    Overwrite,
}

/// Configuracion del cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Nombre del cache, usado como label en metricas y logs (default: "default")
    #[serde(default = "default_name")]
    name: String,

    /// Estrategia de insercion (default: insert_if_absent)
    #[serde(default)]
    insert_policy: InsertPolicy,
}

fn default_name() -> String {
    "default".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            insert_policy: InsertPolicy::default(),
        }
    }
}

impl CacheConfig {
    /// Crea un builder para CacheConfig.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Carga la configuracion desde un archivo opcional, sobreescrita por
    /// variables de entorno `FRONT_CACHE_*`.
    ///
    /// El formato del archivo se deduce por su extension (toml, yaml, json...).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use front_cache::CacheConfig;
    /// use std::path::Path;
    ///
    /// let config = CacheConfig::load(Some(Path::new("cache.toml"))).unwrap();
    /// println!("cache name: {}", config.name());
    /// ```
    pub fn load(path: Option<&Path>) -> Result<Self, CacheError> {
        Self::load_with_env(path, config::Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(path: Option<&Path>, env: config::Environment) -> Result<Self, CacheError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let loaded: CacheConfig = builder.add_source(env).build()?.try_deserialize()?;
        loaded.validate()?;

        Ok(loaded)
    }

    /// Valida la configuracion.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.name.trim().is_empty() {
            return Err(CacheError::invalid_config("cache name must not be empty"));
        }
        Ok(())
    }

    /// Retorna el nombre del cache.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Retorna la estrategia de insercion.
    pub fn insert_policy(&self) -> InsertPolicy {
        self.insert_policy
    }
}

/// Builder para CacheConfig.
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    name: Option<String>,
    insert_policy: Option<InsertPolicy>,
}

impl CacheConfigBuilder {
    /// Define el nombre del cache.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Define la estrategia de insercion.
    pub fn insert_policy(mut self, policy: InsertPolicy) -> Self {
        self.insert_policy = Some(policy);
        self
    }

    /// Construye y valida la configuracion.
    pub fn build(self) -> Result<CacheConfig, CacheError> {
        let config = CacheConfig {
            name: self.name.unwrap_or_else(default_name),
            insert_policy: self.insert_policy.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn empty_env() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX).source(Some(config::Map::new()))
    }

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.name(), "default");
        assert_eq!(config.insert_policy(), InsertPolicy::InsertIfAbsent);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = CacheConfig::builder()
            .name("upstream")
            .insert_policy(InsertPolicy::Overwrite)
            .build()
            .unwrap();

        assert_eq!(config.name(), "upstream");
        assert_eq!(config.insert_policy(), InsertPolicy::Overwrite);
    }

    #[test]
    fn test_builder_rejects_empty_name() {
        let result = CacheConfig::builder().name("  ").build();
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: CacheConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CacheConfig::default());

        let config: CacheConfig =
            serde_json::from_str(r#"{"name": "pages", "insert_policy": "overwrite"}"#).unwrap();
        assert_eq!(config.name(), "pages");
        assert_eq!(config.insert_policy(), InsertPolicy::Overwrite);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = CacheConfig::load_with_env(None, empty_env()).unwrap();
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "name = \"pages\"").unwrap();
        writeln!(file, "insert_policy = \"overwrite\"").unwrap();

        let config = CacheConfig::load_with_env(Some(file.path()), empty_env()).unwrap();
        assert_eq!(config.name(), "pages");
        assert_eq!(config.insert_policy(), InsertPolicy::Overwrite);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "name = \"pages\"").unwrap();

        let mut vars = config::Map::new();
        vars.insert("FRONT_CACHE_NAME".to_string(), "assets".to_string());
        let env = config::Environment::with_prefix(ENV_PREFIX).source(Some(vars));

        let config = CacheConfig::load_with_env(Some(file.path()), env).unwrap();
        assert_eq!(config.name(), "assets");
        assert_eq!(config.insert_policy(), InsertPolicy::InsertIfAbsent);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "name = \"\"").unwrap();

        let result = CacheConfig::load_with_env(Some(file.path()), empty_env());
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = CacheConfig::load_with_env(
            Some(Path::new("/nonexistent/front-cache.toml")),
            empty_env(),
        );
        assert!(matches!(result, Err(CacheError::Config(_))));
    }
}
