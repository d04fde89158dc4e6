//! Per-branch metadata snapshot (`metadata.yaml`) and the workspace scanners
//! that refresh it.

use crate::fsio::{read_optional, write_atomic};
use crate::repository::Repository;
use globset::{Glob, GlobSet, GlobSetBuilder};
use mneme_core::{MemoryError, Result};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub const FILE_STRUCTURE: &str = "file_structure";
pub const DEPENDENCIES: &str = "dependencies";
pub const ENV_CONFIG: &str = "env_config";

/// Sections `refresh_metadata` knows how to compute.
pub const SCANNED_SECTIONS: [&str; 3] = [FILE_STRUCTURE, DEPENDENCIES, ENV_CONFIG];

const MAX_FILES: usize = 200;
const TRUNCATED: &str = "... (truncated)";

const IGNORE_DIRS: &[&str] = &[
    ".mneme", ".git", "node_modules", ".venv", "venv", "__pycache__", ".mypy_cache",
    ".pytest_cache", ".ruff_cache", "dist", "build", ".next", ".nuxt", "target", ".tox",
    "*.egg-info",
];

const IGNORE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "ico", "svg", "webp", "bmp", "tiff", "mp4", "mp3", "wav", "zip",
    "tar", "gz", "woff", "woff2", "ttf", "eot",
];

const ENV_TEMPLATES: &[&str] = &[".env.example", ".env.sample", ".env.template"];

impl Repository {
    /// The whole snapshot. An empty file reads as an empty mapping.
    pub fn metadata(&self, branch: &str) -> Result<Mapping> {
        let (_, bp) = self.registered_branch(branch)?;
        let path = &bp.metadata_yaml;
        let content = read_optional(path)?
            .ok_or_else(|| MemoryError::corrupt(path, "metadata snapshot is missing"))?;
        if content.trim().is_empty() {
            return Ok(Mapping::new());
        }
        match serde_yaml::from_str::<Value>(&content) {
            Ok(Value::Mapping(m)) => Ok(m),
            Ok(Value::Null) => Ok(Mapping::new()),
            Ok(_) => Err(MemoryError::corrupt(path, "metadata snapshot is not a mapping")),
            Err(e) => Err(MemoryError::corrupt(path, format!("invalid metadata: {e}"))),
        }
    }

    pub fn metadata_section(&self, branch: &str, section: &str) -> Result<Option<Value>> {
        Ok(self.metadata(branch)?.remove(section))
    }

    /// Replace one section with a caller-supplied value.
    pub fn set_metadata(&self, branch: &str, section: &str, value: Value) -> Result<()> {
        self.branch_record(branch)?;
        let _lock = self.lock_branch(branch)?;
        let mut meta = self.metadata(branch)?;
        meta.insert(Value::from(section), value);
        self.write_metadata(branch, &meta)?;
        info!(branch, section, "metadata section set");
        Ok(())
    }

    /// Rescan the workspace and replace `section`, or every scanned section
    /// when `None`. Returns the names of the sections written.
    pub fn refresh_metadata(&self, branch: &str, section: Option<&str>) -> Result<Vec<String>> {
        let sections: Vec<&str> = match section {
            Some(s) if SCANNED_SECTIONS.contains(&s) => vec![s],
            Some(s) => {
                return Err(MemoryError::NotFound(format!(
                    "no scanner for metadata section {s:?} (known: {})",
                    SCANNED_SECTIONS.join(", ")
                )))
            }
            None => SCANNED_SECTIONS.to_vec(),
        };
        self.branch_record(branch)?;

        let root = self.paths.root.clone();
        let mut computed = Vec::with_capacity(sections.len());
        for s in &sections {
            let value = match *s {
                FILE_STRUCTURE => scan_file_structure(&root)?,
                DEPENDENCIES => scan_dependencies(&root),
                _ => scan_env_config(&root),
            };
            computed.push((s.to_string(), value));
        }

        let _lock = self.lock_branch(branch)?;
        let mut meta = self.metadata(branch)?;
        for (name, value) in &computed {
            meta.insert(Value::from(name.as_str()), value.clone());
        }
        self.write_metadata(branch, &meta)?;
        info!(branch, sections = ?sections, "metadata refreshed");
        Ok(computed.into_iter().map(|(name, _)| name).collect())
    }

    fn write_metadata(&self, branch: &str, meta: &Mapping) -> Result<()> {
        let path = self.paths.branch(branch).metadata_yaml;
        let yaml = serde_yaml::to_string(meta)
            .map_err(|e| MemoryError::corrupt(&path, format!("cannot serialize metadata: {e}")))?;
        write_atomic(&path, yaml.as_bytes())
    }
}

fn glob_set(patterns: impl IntoIterator<Item = String>) -> Result<GlobSet> {
    let invalid = |e: globset::Error| {
        MemoryError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
    };
    let mut b = GlobSetBuilder::new();
    for p in patterns {
        b.add(Glob::new(&p).map_err(invalid)?);
    }
    b.build().map_err(invalid)
}

fn ignore_sets() -> Result<(GlobSet, GlobSet)> {
    let dirs = glob_set(IGNORE_DIRS.iter().map(|d| d.to_string()))?;
    let files = glob_set(IGNORE_EXTENSIONS.iter().map(|e| format!("*.{e}")))?;
    Ok((dirs, files))
}

/// Sorted workspace-relative file paths, `/`-separated, capped at
/// [`MAX_FILES`] with a truncation marker.
fn scan_file_structure(root: &Path) -> Result<Value> {
    let (ignore_dirs, ignore_files) = ignore_sets()?;
    let mut files = Vec::new();
    walk(root, root, &ignore_dirs, &ignore_files, &mut files)?;
    files.sort();
    let truncated = files.len() > MAX_FILES;
    files.truncate(MAX_FILES);
    let mut seq: Vec<Value> = files.into_iter().map(Value::from).collect();
    if truncated {
        seq.push(Value::from(TRUNCATED));
    }
    debug!(root = %root.display(), files = seq.len(), "scanned file structure");
    Ok(Value::Sequence(seq))
}

fn walk(
    root: &Path,
    dir: &Path,
    ignore_dirs: &GlobSet,
    ignore_files: &GlobSet,
    out: &mut Vec<String>,
) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if !ignore_dirs.is_match(&name) {
                walk(root, &entry.path(), ignore_dirs, ignore_files, out)?;
            }
        } else if file_type.is_file() {
            let lower = name.to_string_lossy().to_lowercase();
            if ignore_files.is_match(&lower) {
                continue;
            }
            let path = entry.path();
            if let Ok(rel) = path.strip_prefix(root) {
                let parts: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(parts.join("/"));
            }
        }
    }
    Ok(())
}

/// Declared dependencies from the manifests present at the workspace root.
/// Unparsable manifests are skipped.
fn scan_dependencies(root: &Path) -> Value {
    let mut deps = Mapping::new();

    if let Some(doc) = read_toml(&root.join("Cargo.toml")) {
        let mut rust = Mapping::new();
        for (key, label) in [("dependencies", "dependencies"), ("dev-dependencies", "dev")] {
            let names = toml_table_keys(doc.get(key))
                .or_else(|| {
                    doc.get("workspace")
                        .and_then(|w| toml_table_keys(w.get(key)))
                })
                .unwrap_or_default();
            rust.insert(Value::from(label), string_seq(names));
        }
        deps.insert(Value::from("rust"), Value::Mapping(rust));
    }

    if let Some(doc) = read_toml(&root.join("pyproject.toml")) {
        let project = doc.get("project");
        let requires = toml_string_array(project.and_then(|p| p.get("dependencies")));
        let dev = doc
            .get("tool")
            .and_then(|t| t.get("uv"))
            .and_then(|u| u.get("dev-dependencies"))
            .or_else(|| {
                project
                    .and_then(|p| p.get("optional-dependencies"))
                    .and_then(|o| o.get("dev"))
            });
        let mut python = Mapping::new();
        python.insert(Value::from("requires"), string_seq(requires));
        python.insert(Value::from("dev"), string_seq(toml_string_array(dev)));
        deps.insert(Value::from("python"), Value::Mapping(python));
    }

    if let Some(pkg) = fs::read_to_string(root.join("package.json"))
        .ok()
        .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
    {
        let mut node = Mapping::new();
        for key in ["dependencies", "devDependencies"] {
            let mut m = Mapping::new();
            if let Some(obj) = pkg.get(key).and_then(|v| v.as_object()) {
                for (name, version) in obj {
                    let version = version.as_str().unwrap_or_default();
                    m.insert(Value::from(name.as_str()), Value::from(version));
                }
            }
            node.insert(Value::from(key), Value::Mapping(m));
        }
        deps.insert(Value::from("node"), Value::Mapping(node));
    }

    Value::Mapping(deps)
}

fn string_seq(items: Vec<String>) -> Value {
    Value::Sequence(items.into_iter().map(Value::from).collect())
}

fn read_toml(path: &Path) -> Option<toml::Value> {
    let text = fs::read_to_string(path).ok()?;
    toml::from_str(&text).ok()
}

fn toml_table_keys(v: Option<&toml::Value>) -> Option<Vec<String>> {
    let table = v?.as_table()?;
    Some(table.keys().cloned().collect())
}

fn toml_string_array(v: Option<&toml::Value>) -> Vec<String> {
    v.and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|x| x.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Variable names from the first env template found.
fn scan_env_config(root: &Path) -> Value {
    for name in ENV_TEMPLATES {
        let Ok(text) = fs::read_to_string(root.join(name)) else {
            continue;
        };
        let vars: Vec<Value> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter_map(|l| l.split_once('='))
            .map(|(k, _)| Value::from(k.trim().trim_start_matches("export ").trim()))
            .collect();
        return Value::Sequence(vars);
    }
    Value::Sequence(Vec::new())
}
