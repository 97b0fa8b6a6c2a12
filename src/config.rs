use crate::lens::cymru::{RetryPolicy, TransportFailurePolicy, DEFAULT_CONCURRENCY};
use anyhow::{anyhow, Result};
use config::Config;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const DNS_PORT: u16 = 53;
const RESOLV_CONF: &str = "/etc/resolv.conf";

pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

pub struct EnrichConfig {
    /// Resolver to query; `None` means the first system nameserver
    pub resolver: Option<SocketAddr>,

    /// Per-query timeout in milliseconds (default: 2000)
    pub timeout_ms: u64,

    /// Extra attempts after a transport failure (default: 0)
    pub retries: u32,

    /// Addresses looked up in parallel (default: 8)
    pub concurrency: usize,

    /// Batch behavior after a transport failure (default: record)
    pub on_transport_failure: TransportFailurePolicy,
}

const EMPTY_CONFIG: &str = r#"### cymru-enrich configuration file

### DNS resolver to query, as ip or ip:port (default: first nameserver in /etc/resolv.conf)
# resolver = "9.9.9.9"

### per-query timeout in milliseconds, and retries after a timeout or network error
# timeout_ms = 2000
# retries = 0

### number of addresses looked up in parallel
# concurrency = 8

### what to do after a transport failure: "record" it and continue, or "halt" the batch
# on_transport_failure = "record"
"#;

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            resolver: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retries: 0,
            concurrency: DEFAULT_CONCURRENCY,
            on_transport_failure: TransportFailurePolicy::default(),
        }
    }
}

impl EnrichConfig {
    /// Load configuration from the given TOML file (or the default one) and
    /// `CYMRU_ENRICH_*` environment variables.
    ///
    /// A missing configuration file is created from a commented template.
    pub fn new(path: &Option<String>) -> Result<EnrichConfig> {
        let mut builder = Config::builder();

        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                let p = Self::config_file_path()?;
                let dir = Path::new(&p)
                    .parent()
                    .ok_or_else(|| anyhow!("Invalid config file path {}", p))?;
                std::fs::create_dir_all(dir)
                    .map_err(|e| anyhow!("Unable to create config directory: {}", e))?;
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // E.g., `CYMRU_ENRICH_RESOLVER=1.1.1.1 cymru-enrich ...`
        builder = builder.add_source(config::Environment::with_prefix("CYMRU_ENRICH"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let values = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_values(&values)
    }

    /// Build a configuration from raw key/value pairs.
    ///
    /// Unknown keys are ignored; present but unparsable values are errors.
    pub fn from_values(values: &HashMap<String, String>) -> Result<EnrichConfig> {
        let defaults = EnrichConfig::default();

        let resolver = match values.get("resolver").map(|s| s.trim()) {
            Some(s) if !s.is_empty() => Some(Self::parse_resolver(s)?),
            _ => None,
        };

        let concurrency = parse_value(values, "concurrency", defaults.concurrency)?;
        if concurrency == 0 {
            return Err(anyhow!("Invalid concurrency 0: must be at least 1"));
        }

        let on_transport_failure = match values.get("on_transport_failure") {
            Some(s) => TransportFailurePolicy::from_str(s).map_err(|e| anyhow!(e))?,
            None => defaults.on_transport_failure,
        };

        Ok(EnrichConfig {
            resolver,
            timeout_ms: parse_value(values, "timeout_ms", defaults.timeout_ms)?,
            retries: parse_value(values, "retries", defaults.retries)?,
            concurrency,
            on_transport_failure,
        })
    }

    /// Parse `ip` or `ip:port` (IPv6 with a port as `[ip]:port`); port defaults to 53
    pub fn parse_resolver(s: &str) -> Result<SocketAddr> {
        let s = s.trim();
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(addr);
        }
        s.parse::<IpAddr>()
            .map(|ip| SocketAddr::new(ip, DNS_PORT))
            .map_err(|_| anyhow!("Invalid resolver address '{}': expected ip or ip:port", s))
    }

    /// First usable `nameserver` entry of a resolv.conf file
    pub fn parse_resolv_conf(content: &str) -> Option<SocketAddr> {
        content
            .lines()
            .map(|line| line.split(['#', ';']).next().unwrap_or_default())
            .filter_map(|line| {
                let mut tokens = line.split_whitespace();
                match (tokens.next(), tokens.next()) {
                    (Some("nameserver"), Some(addr)) => addr.parse::<IpAddr>().ok(),
                    _ => None,
                }
            })
            .map(|ip| SocketAddr::new(ip, DNS_PORT))
            .next()
    }

    /// Resolver to query: the configured one, or the first system nameserver
    pub fn resolver_addr(&self) -> Result<SocketAddr> {
        if let Some(addr) = self.resolver {
            return Ok(addr);
        }
        let content = std::fs::read_to_string(RESOLV_CONF).map_err(|e| {
            anyhow!(
                "No resolver configured and unable to read {}: {}",
                RESOLV_CONF,
                e
            )
        })?;
        Self::parse_resolv_conf(&content).ok_or_else(|| {
            anyhow!(
                "No resolver configured and no nameserver found in {}",
                RESOLV_CONF
            )
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries)
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let resolver = match self.resolver {
            Some(addr) => addr.to_string(),
            None => match self.resolver_addr() {
                Ok(addr) => format!("{} (from {})", addr, RESOLV_CONF),
                Err(_) => "not found".to_string(),
            },
        };
        let config_file =
            Self::config_file_path().unwrap_or_else(|_| "~/.cymru-enrich/cymru-enrich.toml".into());

        [
            format!("Config File:           {}", config_file),
            format!("Resolver:              {}", resolver),
            format!("Query Timeout:         {} ms", self.timeout_ms),
            format!("Retries:               {}", self.retries),
            format!("Concurrency:           {}", self.concurrency),
            format!("On Transport Failure:  {}", self.on_transport_failure),
        ]
        .join("\n")
    }

    /// Default config file path, `$HOME/.cymru-enrich/cymru-enrich.toml`
    pub fn config_file_path() -> Result<String> {
        let home_dir = dirs::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(format!(
            "{}/.cymru-enrich/cymru-enrich.toml",
            home_dir.to_string_lossy()
        ))
    }
}

fn parse_value<T: FromStr>(values: &HashMap<String, String>, key: &str, default: T) -> Result<T> {
    match values.get(key) {
        Some(s) => s
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid value '{}' for {}", s, key)),
        None => Ok(default),
    }
}
