// src/exec/env.rs

//! Environment resolution for rule commands.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::SystemTime;

use regex::Regex;
use tracing::debug;

use crate::config::placeholders;
use crate::config::EnvEntry;
use crate::errors::{Result, RulewatchError};
use crate::fs::FileSystem;
use crate::types::EnvKind;

static EXPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^export\s+").expect("export regex is valid"));

type EnvPairs = Arc<Vec<(String, String)>>;

#[derive(Debug)]
struct CachedEnvFile {
    modified: SystemTime,
    pairs: EnvPairs,
}

/// Builds the final `KEY=VALUE` list for a command.
///
/// Env files are parsed once and reused until their modification time
/// advances. Placeholders inside them are expanded on every resolution, since
/// they depend on the environment built so far.
pub struct EnvResolver {
    fs: Arc<dyn FileSystem>,
    cache: Mutex<HashMap<PathBuf, CachedEnvFile>>,
}

impl fmt::Debug for EnvResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvResolver")
            .field("fs", &self.fs)
            .finish_non_exhaustive()
    }
}

impl EnvResolver {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve on top of the live process environment.
    pub fn resolve(&self, global: &[EnvEntry], rule: &[EnvEntry]) -> Result<Vec<String>> {
        let base = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)));
        self.resolve_with_base(base, global, rule)
    }

    /// Resolve on top of an explicit base environment.
    ///
    /// Global entries are applied before rule entries; later keys win.
    pub fn resolve_with_base<I>(
        &self,
        base: I,
        global: &[EnvEntry],
        rule: &[EnvEntry],
    ) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut vars: BTreeMap<String, String> = base.into_iter().collect();

        for entry in global.iter().chain(rule.iter()) {
            match entry.kind {
                EnvKind::Literal => {
                    vars.insert(entry.name.trim().to_string(), clean_value(&entry.value));
                }
                EnvKind::File => {
                    let pairs = self.load_file(Path::new(entry.name.trim()))?;
                    for (key, raw) in pairs.iter() {
                        let value =
                            placeholders::expand(raw, |name| vars.get(name).cloned()).into_owned();
                        vars.insert(key.clone(), value);
                    }
                }
            }
        }

        Ok(vars.into_iter().map(|(k, v)| format!("{k}={v}")).collect())
    }

    fn load_file(&self, path: &Path) -> Result<EnvPairs> {
        let env_err = |err: anyhow::Error| RulewatchError::EnvFile {
            path: path.to_path_buf(),
            message: format!("{err:#}"),
        };

        let modified = self.fs.modified(path).map_err(env_err)?;

        if let Some(cached) = self.lock_cache().get(path) {
            if cached.modified >= modified {
                return Ok(Arc::clone(&cached.pairs));
            }
        }

        let contents = self.fs.read_to_string(path).map_err(env_err)?;
        let pairs: EnvPairs = Arc::new(parse_env_file(&contents));
        debug!(?path, vars = pairs.len(), "loaded env file");

        self.lock_cache().insert(
            path.to_path_buf(),
            CachedEnvFile {
                modified,
                pairs: Arc::clone(&pairs),
            },
        );
        Ok(pairs)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, CachedEnvFile>> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Parse shell-style `KEY=VALUE` lines.
///
/// Blank lines, `#` comments and lines without `=` are skipped; an
/// `export ` prefix is dropped; the value is everything after the first `=`.
pub fn parse_env_file(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = EXPORT_RE.replace(line, "");
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), clean_value(value)))
        })
        .collect()
}

/// Trim whitespace and one pair of matching surrounding quotes.
fn clean_value(raw: &str) -> String {
    let value = raw.trim();
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exports_comments_and_quotes() {
        let pairs = parse_env_file(
            "# comment\n\nexport FOO=bar\nQUOTED = \"a b\"\nSINGLE='x=y'\nnot a pair\nURL=http://h/?a=b\n",
        );
        assert_eq!(
            pairs,
            vec![
                ("FOO".to_string(), "bar".to_string()),
                ("QUOTED".to_string(), "a b".to_string()),
                ("SINGLE".to_string(), "x=y".to_string()),
                ("URL".to_string(), "http://h/?a=b".to_string()),
            ]
        );
    }

    #[test]
    fn mismatched_quotes_are_kept() {
        assert_eq!(clean_value("\"open"), "\"open");
        assert_eq!(clean_value("'a\""), "'a\"");
        assert_eq!(clean_value("\""), "\"");
    }
}
