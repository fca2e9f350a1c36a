//! Plugin version numbers
//!
//! Versions have the form `major[.minor[.patch]][_build]`. Missing
//! components compare as zero, so `1.0` and `1.0.0` are equal, but the
//! original spelling is kept for display and manifest output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

static VERSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]+)(?:\.([0-9]+))?(?:\.([0-9]+))?(?:_([0-9]+))?$")
        .expect("version pattern is valid")
});

/// A parsed plugin version
#[derive(Debug, Clone)]
pub struct PluginVersion {
    text: String,
    parts: [u32; 4],
}

impl PluginVersion {
    /// Parse a version string, returning `None` if it is malformed
    pub fn parse(text: &str) -> Option<Self> {
        let caps = VERSION_PATTERN.captures(text)?;
        let mut parts = [0_u32; 4];
        for (slot, part) in parts.iter_mut().enumerate() {
            if let Some(m) = caps.get(slot + 1) {
                *part = m.as_str().parse().ok()?;
            }
        }
        Some(Self {
            text: text.to_string(),
            parts,
        })
    }

    /// Check whether `text` is a well-formed version
    pub fn is_valid(text: &str) -> bool {
        Self::parse(text).is_some()
    }

    /// The version as written
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Major component
    pub fn major(&self) -> u32 {
        self.parts[0]
    }

    /// Minor component (0 if absent)
    pub fn minor(&self) -> u32 {
        self.parts[1]
    }

    /// Patch component (0 if absent)
    pub fn patch(&self) -> u32 {
        self.parts[2]
    }

    /// Build number (0 if absent)
    pub fn build(&self) -> u32 {
        self.parts[3]
    }
}

impl PartialEq for PluginVersion {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl Eq for PluginVersion {}

impl Hash for PluginVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts.hash(state);
    }
}

impl PartialOrd for PluginVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PluginVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts.cmp(&other.parts)
    }
}

impl fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for PluginVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}
