use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix for environment overrides; `__` separates nested keys.
pub const ENV_PREFIX: &str = "PRHARVEST_";

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["config"]))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChecksSource, OutputFormat};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[source]
container = "octo/widgets"

[concurrency]
page_workers = 8
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.source.container, "octo/widgets");
        assert_eq!(config.concurrency.page_workers, 8);
        assert_eq!(config.concurrency.enrich_workers, 20);
        assert_eq!(config.source.per_page, 100);
        assert_eq!(config.source.state, "closed");
        assert_eq!(config.source.checks_source, ChecksSource::CheckRuns);
        assert_eq!(config.api.base_url, "https://api.github.com");
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.output.format, OutputFormat::Json);
    }

    #[test]
    fn test_load_config_from_str_missing_source() {
        let toml = r#"
[api]
timeout_secs = 5
"#;
        let result = load_config_from_str(toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_legacy_checks_source() {
        let toml = r#"
[source]
container = "octo/widgets"
checks_source = "combined_status"

[output]
format = "sqlite"
path = "out/report.db"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.source.checks_source, ChecksSource::CombinedStatus);
        assert_eq!(config.output.format, OutputFormat::Sqlite);
        assert_eq!(config.output.path.to_str(), Some("out/report.db"));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/prharvest.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[source]
container = "octo/widgets"

[retry]
max_retries = 2
retry_statuses = [502, 503]
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.retry_statuses, vec![502, 503]);
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "prharvest.toml",
                r#"
[source]
container = "octo/widgets"

[concurrency]
page_workers = 4
"#,
            )?;
            jail.set_env("PRHARVEST_CONCURRENCY__PAGE_WORKERS", "12");
            jail.set_env("PRHARVEST_SOURCE__CONTAINER", "octo/gadgets");

            let config = load_config(Path::new("prharvest.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.concurrency.page_workers, 12);
            assert_eq!(config.source.container, "octo/gadgets");
            Ok(())
        });
    }
}
