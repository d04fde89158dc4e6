use anyhow::{bail, Context};
use clap::Subcommand;
use mneme_store::{MnemePaths, StoreConfig};
use serde_json::Value;
use std::path::Path;

// ── CLI Schema ──

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Set a config value
    Set {
        /// Dotted key (e.g. chain.recent)
        key: String,
        /// Value (true/false/number/string)
        value: String,
    },
    /// Get a config value
    Get {
        /// Dotted key
        key: String,
    },
    /// List all config values, defaults included
    List,
}

// ── Dispatch ──

pub fn run(cmd: ConfigCmd, cwd: &Path) -> anyhow::Result<()> {
    let root = MnemePaths::find_root(cwd).unwrap_or_else(|| cwd.to_path_buf());
    let paths = MnemePaths::discover(root);
    if !paths.is_initialized() {
        bail!("No .mneme/ repository found. Run `mneme init` first.");
    }
    match cmd {
        ConfigCmd::Set { key, value } => set(&paths.config_json, &key, &value),
        ConfigCmd::Get { key } => get(&paths.config_json, &key),
        ConfigCmd::List => list(&paths.config_json),
    }
}

// ── Helpers ──

/// Parse a string value into an appropriate JSON value (bool/number/string).
fn parse_value(s: &str) -> Value {
    match s {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(n) = s.parse::<u64>() {
                Value::Number(n.into())
            } else {
                Value::String(s.to_string())
            }
        }
    }
}

fn lookup<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(root, |v, part| v.get(part))
}

fn lookup_mut<'a>(root: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    key.split('.').try_fold(root, |v, part| v.get_mut(part))
}

/// Leaf keys in dotted form, in serialization order.
fn flatten(prefix: &str, v: &Value, out: &mut Vec<(String, String)>) {
    match v {
        Value::Object(map) => {
            for (k, child) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten(&key, child, out);
            }
        }
        leaf => out.push((prefix.to_string(), leaf.to_string())),
    }
}

/// Apply `key = value` to a config. Unknown keys and values of the wrong
/// type are rejected.
fn apply(config: &StoreConfig, key: &str, value: &str) -> anyhow::Result<StoreConfig> {
    let mut tree = serde_json::to_value(config)?;
    let slot = lookup_mut(&mut tree, key)
        .filter(|v| !v.is_object())
        .with_context(|| format!("unknown config key: {key}"))?;
    *slot = parse_value(value);
    serde_json::from_value(tree).with_context(|| format!("invalid value for {key}: {value}"))
}

// ── Command Implementations ──

/// `mneme config set <key> <value>`
fn set(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let config = StoreConfig::load(path)?;
    let updated = apply(&config, key, value)?;
    updated.save(path)?;
    println!("{key} = {value}");
    Ok(())
}

/// `mneme config get <key>`
fn get(path: &Path, key: &str) -> anyhow::Result<()> {
    let tree = serde_json::to_value(StoreConfig::load(path)?)?;
    match lookup(&tree, key) {
        Some(v) => println!("{v}"),
        None => bail!("unknown config key: {key}"),
    }
    Ok(())
}

/// `mneme config list`
fn list(path: &Path) -> anyhow::Result<()> {
    let tree = serde_json::to_value(StoreConfig::load(path)?)?;
    let mut rows = Vec::new();
    flatten("", &tree, &mut rows);
    for (k, v) in rows {
        println!("{k} = {v}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_nested_key() {
        let cfg = apply(&StoreConfig::default(), "chain.recent", "5").unwrap();
        assert_eq!(cfg.chain.recent, 5);
        assert_eq!(cfg.lock_timeout_ms, StoreConfig::default().lock_timeout_ms);
    }

    #[test]
    fn unknown_key_and_bad_type_rejected() {
        assert!(apply(&StoreConfig::default(), "chain.depth", "5").is_err());
        assert!(apply(&StoreConfig::default(), "chain", "5").is_err());
        assert!(apply(&StoreConfig::default(), "trace_limit", "lots").is_err());
    }

    #[test]
    fn flatten_lists_leaves() {
        let tree = serde_json::to_value(StoreConfig::default()).unwrap();
        let mut rows = Vec::new();
        flatten("", &tree, &mut rows);
        let keys: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
        assert!(keys.contains(&"chain.item_chars"));
        assert!(keys.contains(&"lock_timeout_ms"));
    }
}
