//! Configuration loading: a top-level `scrape_configs` list loaded from
//! YAML, with the per-target schema trimmed to what the collector
//! actually consumes — targets and labels — since service discovery
//! beyond static targets is delegated to an external scrape framework
//! this crate doesn't vendor.

use crate::core::error::{LokiError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration file shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Collector HTTP server options.
    pub server: ServerConfig,
    /// Scrape target groups.
    pub scrape_configs: Vec<ScrapeConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            scrape_configs: Vec::new(),
        }
    }
}

/// Collector-side HTTP server options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the query API listens on.
    pub bind_address: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: "0.0.0.0:3100".parse().unwrap(),
        }
    }
}

/// One `scrape_configs` entry: a job, its cadence, and its static targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScrapeConfig {
    /// Job name, usually propagated into the `job` tag on scraped spans.
    pub job_name: String,
    /// How often to scrape each target in this group.
    #[serde(with = "humantime_serde")]
    pub scrape_interval: Duration,
    /// Per-request timeout for the scrape GET.
    #[serde(with = "humantime_serde")]
    pub scrape_timeout: Duration,
    /// Static target groups.
    pub static_configs: Vec<StaticConfig>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        ScrapeConfig {
            job_name: String::new(),
            scrape_interval: Duration::from_secs(15),
            scrape_timeout: Duration::from_secs(10),
            static_configs: Vec::new(),
        }
    }
}

/// One group of targets sharing a label set.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct StaticConfig {
    /// `host:port` targets to scrape, relative to the agent's HTTP path.
    pub targets: Vec<String>,
    /// Extra labels merged onto every target in this group, in addition to
    /// the scraper's own `job`/`instance`.
    pub labels: HashMap<String, String>,
}

/// A fully resolved scrape target: one URL plus the tags to attach to every
/// span scraped from it.
#[derive(Debug, Clone)]
pub struct Target {
    /// Job this target belongs to.
    pub job_name: String,
    /// URL to GET.
    pub url: String,
    /// `instance` label (`host:port`).
    pub instance: String,
    /// Extra static labels.
    pub labels: HashMap<String, String>,
    /// Scrape cadence for this target.
    pub scrape_interval: Duration,
    /// Per-request timeout for this target.
    pub scrape_timeout: Duration,
}

impl Config {
    /// Load and parse a YAML config file.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| LokiError::Config(format!("reading {}: {e}", path.as_ref().display())))?;
        Self::parse(&content)
    }

    /// Parse a YAML config document.
    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(LokiError::from)
    }

    /// Flatten `scrape_configs` into a list of concrete targets, one per
    /// `static_configs[].targets[]` entry, with the agent's HTTP path
    /// appended.
    pub fn targets(&self, agent_path: &str) -> Vec<Target> {
        let mut out = Vec::new();
        for scrape in &self.scrape_configs {
            for group in &scrape.static_configs {
                for addr in &group.targets {
                    let url = format!("http://{addr}{agent_path}");
                    out.push(Target {
                        job_name: scrape.job_name.clone(),
                        url,
                        instance: addr.clone(),
                        labels: group.labels.clone(),
                        scrape_interval: scrape.scrape_interval,
                        scrape_timeout: scrape.scrape_timeout,
                    });
                }
            }
        }
        out
    }
}
