//! Configuration loading and validation.
//!
//! Settings come from a Java-style properties file (`sync.properties` by
//! default) using the keys `source.*`, `target.*` and `batch.size`, or from a
//! YAML file with the same structure nested under `source:` / `target:`.

mod types;
mod validation;

pub use types::*;

use crate::error::{Result, SyncError};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

impl SyncConfig {
    /// Load configuration from a properties or YAML file.
    ///
    /// Files ending in `.yaml`/`.yml` are parsed as YAML; anything else is
    /// parsed as a properties file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            let shown = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
            return Err(SyncError::Config(format!(
                "settings file {} not found",
                shown.display()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!("cannot read settings file {}: {}", path.display(), e))
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_properties(&content),
        }
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: SyncConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from properties text (`key=value` lines).
    pub fn from_properties(text: &str) -> Result<Self> {
        let props = java_properties::read(text.as_bytes())
            .map_err(|e| SyncError::Config(format!("invalid properties file: {}", e)))?;

        let config = SyncConfig {
            source: EndpointConfig::from_properties(&props, "source"),
            target: EndpointConfig::from_properties(&props, "target"),
            batch_size: parse_batch_size(props.get("batch.size").map(String::as_str)),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Log every setting, with passwords redacted.
    pub fn log_settings(&self) {
        info!("batch.size={}", self.batch_size);
        self.source.log_settings("source");
        self.target.log_settings("target");
    }
}

impl EndpointConfig {
    fn from_properties(props: &HashMap<String, String>, prefix: &str) -> Self {
        let get = |key: &str| {
            props
                .get(&format!("{}.{}", prefix, key))
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };
        Self {
            driver: get("driver"),
            url: get("url"),
            username: get("username"),
            password: get("password"),
            table: get("table"),
        }
    }

    fn log_settings(&self, prefix: &str) {
        info!("{}.driver={}", prefix, self.driver);
        info!("{}.url={}", prefix, self.url);
        info!("{}.username={}", prefix, self.username);
        info!("{}.password=[REDACTED]", prefix);
        info!("{}.table={}", prefix, self.table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PROPERTIES: &str = "\
source.driver=PostgreSQL Unicode
source.url=Server=db1;Database=sales
source.username=reader
source.password=secret
source.table=orders
target.driver=ODBC Driver 18 for SQL Server
target.url=Server=db2;Database=archive
target.username=writer
target.password=hunter2
target.table=orders_copy
batch.size=250
";

    #[test]
    fn test_from_properties_reads_all_keys() {
        let config = SyncConfig::from_properties(PROPERTIES).unwrap();
        assert_eq!(config.source.driver, "PostgreSQL Unicode");
        assert_eq!(config.source.url, "Server=db1;Database=sales");
        assert_eq!(config.source.username, "reader");
        assert_eq!(config.source.password, "secret");
        assert_eq!(config.source.table, "orders");
        assert_eq!(config.target.table, "orders_copy");
        assert_eq!(config.batch_size, 250);
    }

    #[test]
    fn test_unparseable_batch_size_uses_default() {
        let text = PROPERTIES.replace("batch.size=250", "batch.size=abc");
        let config = SyncConfig::from_properties(&text).unwrap();
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_missing_or_zero_batch_size_uses_default() {
        let missing = PROPERTIES.replace("batch.size=250\n", "");
        assert_eq!(
            SyncConfig::from_properties(&missing).unwrap().batch_size,
            DEFAULT_BATCH_SIZE
        );

        let zero = PROPERTIES.replace("batch.size=250", "batch.size=0");
        assert_eq!(
            SyncConfig::from_properties(&zero).unwrap().batch_size,
            DEFAULT_BATCH_SIZE
        );
    }

    #[test]
    fn test_from_yaml_with_lenient_batch_size() {
        let yaml = r#"
source:
  url: "DSN=src"
  table: orders
target:
  url: "DSN=dst"
  table: orders_copy
batch_size: "abc"
"#;
        let config = SyncConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.source.url, "DSN=src");

        let yaml = yaml.replace("\"abc\"", "50");
        assert_eq!(SyncConfig::from_yaml(&yaml).unwrap().batch_size, 50);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = SyncConfig::load("definitely_missing_sync.properties").unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
        assert!(err.to_string().contains("definitely_missing_sync.properties"));
    }

    #[test]
    fn test_load_dispatches_on_extension() {
        let mut props = tempfile::Builder::new()
            .suffix(".properties")
            .tempfile()
            .unwrap();
        write!(props, "{}", PROPERTIES).unwrap();
        assert_eq!(SyncConfig::load(props.path()).unwrap().batch_size, 250);

        let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            yaml,
            "source: {{url: 'DSN=a', table: t1}}\ntarget: {{url: 'DSN=b', table: t2}}\n"
        )
        .unwrap();
        let config = SyncConfig::load(yaml.path()).unwrap();
        assert_eq!(config.target.table, "t2");
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    }
}
