// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static CONFIG: OnceLock<MudstoneConfig> = OnceLock::new();

fn default_log_level() -> String {
    "info".to_string()
}

pub fn init_from_path(path: impl AsRef<Path>) -> Result<&'static MudstoneConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let path = path.as_ref().to_path_buf();
    let cfg = MudstoneConfig::load_from_file(&path)?;
    let _ = CONFIG.set(cfg);
    Ok(CONFIG.get().expect("CONFIG set"))
}

pub fn init_from_env_or_default() -> Result<&'static MudstoneConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let path = config_path_from_env_or_default()?;
    let cfg = MudstoneConfig::load_from_file(&path)?;
    let _ = CONFIG.set(cfg);
    Ok(CONFIG.get().expect("CONFIG set"))
}

pub fn config() -> Result<&'static MudstoneConfig> {
    init_from_env_or_default()
}

fn config_path_from_env_or_default() -> Result<PathBuf> {
    if let Ok(p) = std::env::var("MUDSTONE_CONFIG") {
        if !p.trim().is_empty() {
            return Ok(PathBuf::from(p));
        }
    }

    let candidates = [PathBuf::from("mudstone.toml")];
    for p in candidates {
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!(
        "missing config file: set $MUDSTONE_CONFIG or create ./mudstone.toml"
    ))
}

#[derive(Clone, Deserialize)]
pub struct MudstoneConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional full tracing EnvFilter expression.
    /// If set, this takes precedence over `log_level`.
    /// Example: "mudstone=debug"
    #[serde(default)]
    pub log_filter: Option<String>,

    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl MudstoneConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config file: {}", path.display()))?;
        let cfg: MudstoneConfig =
            toml::from_str(&s).with_context(|| format!("parse toml: {}", path.display()))?;
        Ok(cfg)
    }

    pub fn effective_log_filter(&self) -> String {
        self.log_filter
            .clone()
            .unwrap_or_else(|| self.log_level.clone())
    }
}

impl Default for MudstoneConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_filter: None,
            runtime: RuntimeConfig::default(),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Cap on concurrent per-column copy workers during shard
    /// partitioning. 0 means one worker per available core.
    #[serde(default)]
    pub insert_copy_threads: usize,

    /// Cap on concurrent per-bucket dispatch workers during a sharded
    /// insert. 0 means one worker per non-empty bucket.
    #[serde(default)]
    pub insert_dispatch_threads: usize,
}

impl RuntimeConfig {
    pub fn actual_copy_threads(&self) -> usize {
        if self.insert_copy_threads > 0 {
            self.insert_copy_threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            insert_copy_threads: 0,
            insert_dispatch_threads: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let cfg: MudstoneConfig = toml::from_str("").expect("empty config parses");
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.log_filter.is_none());
        assert_eq!(cfg.runtime.insert_copy_threads, 0);
        assert_eq!(cfg.runtime.insert_dispatch_threads, 0);
    }

    #[test]
    fn parse_runtime_section() {
        let cfg: MudstoneConfig = toml::from_str(
            r#"
log_level = "debug"

[runtime]
insert_copy_threads = 3
insert_dispatch_threads = 2
"#,
        )
        .expect("config parses");
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.runtime.insert_copy_threads, 3);
        assert_eq!(cfg.runtime.actual_copy_threads(), 3);
        assert_eq!(cfg.runtime.insert_dispatch_threads, 2);
    }

    #[test]
    fn copy_threads_default_to_available_parallelism() {
        let cfg = RuntimeConfig::default();
        assert!(cfg.actual_copy_threads() >= 1);
    }

    #[test]
    fn log_filter_overrides_level() {
        let cfg: MudstoneConfig = toml::from_str(
            r#"
log_level = "info"
log_filter = "mudstone=trace"
"#,
        )
        .expect("config parses");
        assert_eq!(cfg.effective_log_filter(), "mudstone=trace");
    }
}
