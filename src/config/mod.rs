use serde::Deserialize;
use std::collections::BTreeSet;
use std::env;
use std::str::FromStr;

use crate::inventory::RelationshipGraph;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("failed to load hierarchy from {path}: {source}")]
    HierarchyFile {
        path: String,
        #[source]
        source: config::ConfigError,
    },
    #[error("package '{package}' bundles undeclared listing '{listing}'")]
    UndeclaredListing { package: String, listing: String },
    #[error("listing '{0}' is declared more than once")]
    DuplicateListing(String),
}

/// Top-level settings container.
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub hierarchy: HierarchyConfig,
    pub features: FeatureFlags,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

/// Redis is optional; without a URL the seat-view cache is disabled.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub seat_ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct FeatureFlags {
    pub include_sibling_events: bool,
    pub seed_on_start: bool,
    pub enable_kill_routes: bool,
}

/// Listings of the venue and the packages that bundle them.
///
/// Loaded from `HIERARCHY_FILE` when set, e.g. in TOML:
///
/// ```toml
/// listings = ["season", "packageA", "event1", "event2"]
///
/// [[packages]]
/// id = "packageA"
/// events = ["event1", "event2"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HierarchyConfig {
    pub listings: Vec<String>,
    #[serde(default)]
    pub packages: Vec<PackageConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PackageConfig {
    pub id: String,
    pub events: Vec<String>,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        let package = |id: &str, events: &[&str]| PackageConfig {
            id: id.to_string(),
            events: events.iter().map(|e| e.to_string()).collect(),
        };
        HierarchyConfig {
            listings: ["season", "packageA", "packageB", "event1", "event2", "event3"]
                .into_iter()
                .map(String::from)
                .collect(),
            packages: vec![
                package("packageA", &["event1", "event2", "event3"]),
                package("packageB", &["event2", "event3"]),
            ],
        }
    }
}

impl HierarchyConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let hierarchy: HierarchyConfig = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .and_then(|raw| raw.try_deserialize())
            .map_err(|source| ConfigError::HierarchyFile { path: path.to_string(), source })?;
        hierarchy.validate()?;
        Ok(hierarchy)
    }

    /// Every package and bundled event must be a declared listing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut declared = BTreeSet::new();
        for listing in &self.listings {
            if !declared.insert(listing.as_str()) {
                return Err(ConfigError::DuplicateListing(listing.clone()));
            }
        }
        for package in &self.packages {
            for listing in std::iter::once(&package.id).chain(&package.events) {
                if !declared.contains(listing.as_str()) {
                    return Err(ConfigError::UndeclaredListing {
                        package: package.id.clone(),
                        listing: listing.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn graph(&self, include_sibling_events: bool) -> RelationshipGraph {
        RelationshipGraph::new(
            self.packages
                .iter()
                .map(|package| (package.id.clone(), package.events.clone())),
        )
        .with_sibling_events(include_sibling_events)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            app: AppConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                environment: "development".to_string(),
                rust_log: "seat_inventory=debug,tower_http=debug".to_string(),
                log_format: LogFormat::Pretty,
            },
            database: DatabaseConfig {
                url: String::new(),
                pool_size: 20,
            },
            redis: RedisConfig {
                url: None,
                seat_ttl_seconds: 300,
            },
            hierarchy: HierarchyConfig::default(),
            features: FeatureFlags {
                include_sibling_events: false,
                seed_on_start: true,
                enable_kill_routes: false,
            },
        }
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T: FromStr>(
    name: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match var(name) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value,
        }),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let hierarchy = match var("HIERARCHY_FILE") {
            Some(path) => HierarchyConfig::load(&path)?,
            None => defaults.hierarchy,
        };

        Ok(Config {
            app: AppConfig {
                host: var("HOST").unwrap_or(defaults.app.host),
                port: parse_var("PORT", defaults.app.port, "a valid port number")?,
                environment: var("ENVIRONMENT").unwrap_or(defaults.app.environment),
                rust_log: var("RUST_LOG").unwrap_or(defaults.app.rust_log),
                log_format: parse_var("LOG_FORMAT", LogFormat::Pretty, "'pretty' or 'json'")?,
            },
            database: DatabaseConfig {
                url: var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
                pool_size: parse_var("DB_POOL_SIZE", defaults.database.pool_size, "a valid number")?,
            },
            redis: RedisConfig {
                url: var("REDIS_URL"),
                seat_ttl_seconds: parse_var(
                    "SEAT_CACHE_TTL_SECONDS",
                    defaults.redis.seat_ttl_seconds,
                    "a number of seconds",
                )?,
            },
            hierarchy,
            features: FeatureFlags {
                include_sibling_events: parse_var(
                    "INCLUDE_SIBLING_EVENTS",
                    defaults.features.include_sibling_events,
                    "true or false",
                )?,
                seed_on_start: parse_var(
                    "SEED_ON_START",
                    defaults.features.seed_on_start,
                    "true or false",
                )?,
                enable_kill_routes: parse_var(
                    "ENABLE_KILL_ROUTES",
                    defaults.features.enable_kill_routes,
                    "true or false",
                )?,
            },
        })
    }

    pub fn graph(&self) -> RelationshipGraph {
        self.hierarchy.graph(self.features.include_sibling_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_venue_is_valid() {
        let hierarchy = HierarchyConfig::default();
        assert!(hierarchy.validate().is_ok());
        let graph = hierarchy.graph(false);
        assert!(graph.is_package("packageA"));
        assert!(!graph.contains("season"));
    }

    #[test]
    fn undeclared_bundled_listing_is_rejected() {
        let hierarchy = HierarchyConfig {
            listings: vec!["packageA".into(), "event1".into()],
            packages: vec![PackageConfig {
                id: "packageA".into(),
                events: vec!["event1".into(), "event9".into()],
            }],
        };
        assert!(matches!(
            hierarchy.validate(),
            Err(ConfigError::UndeclaredListing { listing, .. }) if listing == "event9"
        ));
    }

    #[test]
    fn duplicate_listing_is_rejected() {
        let hierarchy = HierarchyConfig {
            listings: vec!["event1".into(), "event1".into()],
            packages: Vec::new(),
        };
        assert!(matches!(
            hierarchy.validate(),
            Err(ConfigError::DuplicateListing(id)) if id == "event1"
        ));
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
