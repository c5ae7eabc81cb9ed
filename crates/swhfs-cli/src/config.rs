//! YAML configuration (§6, §10.4), loaded the way `tinymist-world`'s
//! `CompileOpts` loads its own: a plain `serde::Deserialize` struct, no
//! custom visitor code.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use swhfs_cache::Budget;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub graph: GraphConfig,
    #[serde(rename = "web-api")]
    pub web_api: WebApiConfig,
    pub content: ContentConfig,
    #[serde(rename = "json-indent")]
    pub json_indent: JsonIndent,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    pub metadata: MetadataCacheConfig,
    pub blob: BlobCacheConfig,
    pub direntry: DirEntryCacheConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct MetadataCacheConfig {
    pub path: Option<PathOrMemory>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct BlobCacheConfig {
    pub path: Option<PathOrMemory>,
    pub bypass: bool,
}

/// `cache.metadata.path`/`cache.blob.path` accept either a filesystem path
/// or the literal `true`, meaning "in-memory" (§4.3 "in-memory mode is
/// supported for tests", also useful for a throwaway mount).
#[derive(Debug)]
pub enum PathOrMemory {
    Path(PathBuf),
    InMemory,
}

impl<'de> Deserialize<'de> for PathOrMemory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Path(PathBuf),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Bool(true) => Ok(PathOrMemory::InMemory),
            Raw::Bool(false) => Err(serde::de::Error::custom("`path: false` is not meaningful, omit the key instead")),
            Raw::Path(p) => Ok(PathOrMemory::Path(p)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DirEntryCacheConfig {
    #[serde(rename = "maxram")]
    pub max_ram: MaxRam,
}

impl Default for DirEntryCacheConfig {
    fn default() -> Self {
        Self {
            max_ram: MaxRam(Budget::Percent(5.0)),
        }
    }
}

/// Parses `cache.direntry.maxram` (§6): either a percentage like `"10%"` or
/// an absolute size like `"256MB"`/`"256MiB"`.
#[derive(Debug)]
pub struct MaxRam(pub Budget);

impl<'de> Deserialize<'de> for MaxRam {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_max_ram(&raw).map(MaxRam).map_err(serde::de::Error::custom)
    }
}

fn parse_max_ram(raw: &str) -> Result<Budget, String> {
    let raw = raw.trim();
    if let Some(pct) = raw.strip_suffix('%') {
        return pct
            .trim()
            .parse::<f64>()
            .map(Budget::Percent)
            .map_err(|e| format!("invalid percentage {raw:?}: {e}"));
    }
    let (digits, multiplier) = if let Some(n) = raw.strip_suffix("GiB").or_else(|| raw.strip_suffix("GB")) {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = raw.strip_suffix("MiB").or_else(|| raw.strip_suffix("MB")) {
        (n, 1024 * 1024)
    } else if let Some(n) = raw.strip_suffix("KiB").or_else(|| raw.strip_suffix("KB")) {
        (n, 1024)
    } else {
        (raw, 1)
    };
    digits
        .trim()
        .parse::<usize>()
        .map(|n| Budget::Bytes(n * multiplier))
        .map_err(|e| format!("invalid size {raw:?}: {e}"))
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct GraphConfig {
    #[serde(rename = "grpc-url")]
    pub grpc_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct WebApiConfig {
    pub url: Option<String>,
    #[serde(rename = "auth-token")]
    pub auth_token: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ContentConfig {
    pub storage: Option<String>,
    pub objstorage: Option<String>,
}

#[derive(Debug)]
pub struct JsonIndent(pub usize);

impl Default for JsonIndent {
    fn default() -> Self {
        Self(2)
    }
}

impl<'de> Deserialize<'de> for JsonIndent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        usize::deserialize(deserializer).map(JsonIndent)
    }
}

/// Resolves the configuration file path (§10.4): `SWH_CONFIG_FILE` first,
/// else `$XDG_CONFIG_HOME/swh/fuse/config.yml` via the `dirs` crate.
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("SWH_CONFIG_FILE") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("swh").join("fuse").join("config.yml"))
}

/// Loads the configuration from `path`, or from the default location if
/// `path` is `None`. A missing default file is not an error — it yields a
/// `Config::default()` so `mount` works against the public Web API with no
/// setup.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let resolved = path.map(Path::to_path_buf).or_else(config_path);
    let Some(resolved) = resolved else {
        log::info!("no configuration file resolved, using defaults");
        return Ok(Config::default());
    };
    match std::fs::read_to_string(&resolved) {
        Ok(contents) => {
            serde_yaml::from_str(&contents).with_context(|| format!("parsing {}", resolved.display()))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            log::info!("configuration file {} not found, using defaults", resolved.display());
            Ok(Config::default())
        }
        Err(err) => Err(err).with_context(|| format!("reading {}", resolved.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_percentage_maxram() {
        assert!(matches!(parse_max_ram("10%").unwrap(), Budget::Percent(p) if p == 10.0));
    }

    #[test]
    fn parses_absolute_maxram() {
        assert!(matches!(parse_max_ram("256MB").unwrap(), Budget::Bytes(n) if n == 256 * 1024 * 1024));
        assert!(matches!(parse_max_ram("1GiB").unwrap(), Budget::Bytes(n) if n == 1024 * 1024 * 1024));
    }

    #[test]
    fn parses_minimal_yaml() {
        let cfg: Config = serde_yaml::from_str("web-api:\n  url: https://example.test\n").unwrap();
        assert_eq!(cfg.web_api.url.as_deref(), Some("https://example.test"));
        assert_eq!(cfg.json_indent.0, 2);
    }
}
