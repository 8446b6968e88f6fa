#![allow(dead_code)]
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize, Clone)]
pub struct EnumerateConfig {
    pub probe_timeout_ms: Option<u64>,
    pub batch_timeout_ms: Option<u64>,
    pub screenshot_timeout_ms: Option<u64>,
    pub method_concurrency: Option<usize>,
    pub posture_concurrency: Option<usize>,
    pub screenshot_concurrency: Option<usize>,
    pub wordlist: Option<String>,
    pub resolvers: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    pub db: Option<PathBuf>,
    pub enumerate: Option<EnumerateConfig>,
}

pub fn load_config(path: Option<&Path>) -> Option<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new("surface.yaml");
            if p.exists() { p.to_path_buf() } else { return None; }
        }
    };
    let s = fs::read_to_string(path).ok()?;
    serde_yaml::from_str(&s).ok()
}
