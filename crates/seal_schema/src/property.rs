//! Property model for catalogued resource types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A property of a resource type.
///
/// Carries the `x-seal-*` extension values relevant to compilation and
/// whether the property's schema permits additional properties (a "tag
/// map", indexable with `["key"]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    name: String,
    allows_additional: bool,
    extensions: BTreeMap<String, String>,
}

impl Property {
    /// Create a property
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            allows_additional: false,
            extensions: BTreeMap::new(),
        }
    }

    /// Mark the property as a tag map
    #[must_use]
    pub fn with_additional_properties(mut self, allows: bool) -> Self {
        self.allows_additional = allows;
        self
    }

    /// Attach an extension value
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Property name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the property's schema permits additional properties
    #[must_use]
    pub fn has_additional_properties(&self) -> bool {
        self.allows_additional
    }

    /// Look up an extension value, e.g. `x-seal-obligation`
    #[must_use]
    pub fn extension(&self, key: &str) -> Option<&str> {
        self.extensions.get(key).map(String::as_str)
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_builder() {
        let prop = Property::new("tags")
            .with_additional_properties(true)
            .with_extension("x-seal-obligation", "true");
        assert_eq!(prop.name(), "tags");
        assert!(prop.has_additional_properties());
        assert_eq!(prop.extension("x-seal-obligation"), Some("true"));
        assert_eq!(prop.extension("x-seal-type"), None);
    }
}
