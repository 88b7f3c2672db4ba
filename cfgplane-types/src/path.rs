//! gNMI-style configuration paths.
//!
//! A path is a `/`-separated list of elements. An element may carry list
//! keys: `/interfaces/interface[name=eth1]/config/mtu`. Key values may
//! contain `/`, so splitting is bracket-aware.

use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One element of a path, with any list keys it selects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathElem {
    pub name: String,
    pub keys: BTreeMap<String, String>,
}

impl PathElem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: BTreeMap::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.keys.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for PathElem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (k, v) in &self.keys {
            write!(f, "[{k}={v}]")?;
        }
        Ok(())
    }
}

/// A parsed configuration path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    elems: Vec<PathElem>,
}

impl Path {
    /// Parses a path string.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidPath {
            path: s.to_string(),
            reason: reason.to_string(),
        };

        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| invalid("path must start with '/'"))?;
        if rest.is_empty() {
            return Err(invalid("path has no elements"));
        }

        let mut elems = Vec::new();
        let mut current = String::new();
        let mut in_key = false;
        for c in rest.chars() {
            match c {
                '[' if !in_key => {
                    in_key = true;
                    current.push(c);
                }
                ']' if in_key => {
                    in_key = false;
                    current.push(c);
                }
                ']' => return Err(invalid("unbalanced ']'")),
                '/' if !in_key => {
                    elems.push(parse_elem(&current).map_err(|r| invalid(&r))?);
                    current.clear();
                }
                _ => current.push(c),
            }
        }
        if in_key {
            return Err(invalid("unterminated key"));
        }
        elems.push(parse_elem(&current).map_err(|r| invalid(&r))?);

        Ok(Self { elems })
    }

    #[must_use]
    pub fn elems(&self) -> &[PathElem] {
        &self.elems
    }
}

impl FromStr for Path {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for elem in &self.elems {
            write!(f, "/{elem}")?;
        }
        Ok(())
    }
}

fn parse_elem(s: &str) -> std::result::Result<PathElem, String> {
    let (name, mut keys_part) = match s.find('[') {
        Some(pos) => (&s[..pos], &s[pos..]),
        None => (s, ""),
    };
    if name.is_empty() {
        return Err("empty path element".to_string());
    }

    let mut elem = PathElem::new(name);
    while !keys_part.is_empty() {
        let body_end = keys_part
            .find(']')
            .ok_or_else(|| format!("unterminated key in '{s}'"))?;
        let body = keys_part
            .strip_prefix('[')
            .map(|b| &b[..body_end - 1])
            .ok_or_else(|| format!("unexpected characters after keys in '{s}'"))?;
        let (key, value) = body
            .split_once('=')
            .ok_or_else(|| format!("key '{body}' has no value"))?;
        if key.is_empty() {
            return Err(format!("empty key name in '{s}'"));
        }
        elem.keys.insert(key.to_string(), value.to_string());
        keys_part = &keys_part[body_end + 1..];
    }
    Ok(elem)
}
