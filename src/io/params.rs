//! Reader for colon-delimited `key: value1 value2 ...` parameter files

use crate::types::{StackError, StackResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Separator used by the toolkit's parameter files
pub const DEFAULT_SEPARATOR: char = ':';

/// Parsed parameter file.
///
/// Lines without the separator are ignored. Keys are matched exactly after
/// trimming, the value is everything after the first separator.
#[derive(Debug, Clone)]
pub struct ParamFile {
    source: Option<PathBuf>,
    entries: Vec<(String, String)>,
}

impl ParamFile {
    /// Read parameters from a file on disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> StackResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            StackError::Io(e).context(format!("failed to read parameter file '{}'", path.display()))
        })?;

        let mut params = Self::parse(&content, DEFAULT_SEPARATOR);
        params.source = Some(path.to_path_buf());
        Ok(params)
    }

    /// Parse parameters from command output or other in-memory text
    pub fn from_text(text: &str) -> Self {
        Self::parse(text, DEFAULT_SEPARATOR)
    }

    fn parse(text: &str, separator: char) -> Self {
        let entries = text
            .lines()
            .filter_map(|line| line.split_once(separator))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .filter(|(key, _)| !key.is_empty())
            .collect();

        Self { source: None, entries }
    }

    fn source_name(&self) -> String {
        match &self.source {
            Some(path) => format!("'{}'", path.display()),
            None => "parameters that were not read from a file".to_string(),
        }
    }

    /// Raw value string of a key
    pub fn param(&self, key: &str) -> StackResult<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| StackError::MissingParameter {
                key: key.to_string(),
                source_name: self.source_name(),
            })
    }

    /// Whether the key is present
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Whitespace-separated field `idx` of a key's value
    pub fn field(&self, key: &str, idx: usize) -> StackResult<&str> {
        let value = self.param(key)?;
        value.split_whitespace().nth(idx).ok_or_else(|| StackError::ParseValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: format!("no field at index {}", idx),
        })
    }

    /// Integer field of a key
    pub fn int(&self, key: &str, idx: usize) -> StackResult<i64> {
        self.parsed(key, idx)
    }

    /// Floating point field of a key
    pub fn float(&self, key: &str, idx: usize) -> StackResult<f64> {
        self.parsed(key, idx)
    }

    fn parsed<T>(&self, key: &str, idx: usize) -> StackResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let field = self.field(key, idx)?;
        field.parse::<T>().map_err(|e| StackError::ParseValue {
            key: key.to_string(),
            value: field.to_string(),
            reason: e.to_string(),
        })
    }
}
