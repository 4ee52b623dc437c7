use dust_core::resolver::ResolverConfig;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_BASE_DOMAIN: &str = "localhost";
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_DEV_HOST_ALIASES: &str = "localhost,127.0.0.1";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: PathBuf,
    pub resolver: ResolverConfig,
}

impl Config {
    /// Reads `PORT`, `BASE_DOMAIN`, `DATA_DIR` and `DEV_HOST_ALIASES` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key: "PORT", value: raw })?,
            None => DEFAULT_PORT,
        };

        let base_domain = lookup("BASE_DOMAIN").unwrap_or_else(|| DEFAULT_BASE_DOMAIN.to_string());
        let base_domain = base_domain.trim().to_string();
        if base_domain.is_empty() {
            return Err(ConfigError::Invalid {
                key: "BASE_DOMAIN",
                value: base_domain,
            });
        }

        let dev_aliases = lookup("DEV_HOST_ALIASES")
            .unwrap_or_else(|| DEFAULT_DEV_HOST_ALIASES.to_string())
            .split(',')
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
            .map(str::to_string)
            .collect();

        let data_dir = lookup("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        Ok(Self {
            port,
            data_dir,
            resolver: ResolverConfig::new(base_domain, dev_aliases),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.resolver.base_domain, "localhost");
        assert_eq!(config.resolver.dev_aliases, vec!["localhost", "127.0.0.1"]);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("BASE_DOMAIN", "Example.com"),
            ("DATA_DIR", "/var/lib/dust"),
            ("DEV_HOST_ALIASES", " localhost , dev.test ,"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.resolver.base_domain, "example.com");
        assert_eq!(config.resolver.dev_aliases, vec!["localhost", "dev.test"]);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/dust"));
    }

    #[test]
    fn test_bad_port_is_an_error() {
        match Config::from_lookup(lookup(&[("PORT", "eighty")])) {
            Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, "PORT"),
            other => panic!("Expected invalid PORT, got {:?}", other),
        }
    }
}
