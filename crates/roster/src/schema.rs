use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::RosterError;

/// How one attribute participates in identity resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeFlags {
    /// A value of this attribute names exactly one student once it has been linked.
    #[serde(default)]
    pub identifies_student: bool,
    /// A student holds exactly one value of this attribute across all sources.
    #[serde(default)]
    pub one_per_student: bool,
}

impl AttributeFlags {
    pub const PRIMARY: Self = Self { identifies_student: true, one_per_student: true };
    pub const SECONDARY: Self = Self { identifies_student: true, one_per_student: false };
    pub const SINGLETON: Self = Self { identifies_student: false, one_per_student: true };
    pub const MULTI: Self = Self { identifies_student: false, one_per_student: false };

    pub fn is_primary(&self) -> bool {
        self.identifies_student && self.one_per_student
    }
}

/// Ordered attribute declarations with exactly one primary identifier.
///
/// Immutable once built; the order is the order identifying attributes are
/// consulted during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSchema {
    attributes: Vec<(String, AttributeFlags)>,
    primary: usize,
}

impl AttributeSchema {
    pub fn new<I, S>(attributes: I) -> Result<Self, RosterError>
    where
        I: IntoIterator<Item = (S, AttributeFlags)>,
        S: Into<String>,
    {
        let attributes: Vec<(String, AttributeFlags)> =
            attributes.into_iter().map(|(name, flags)| (name.into(), flags)).collect();

        let mut seen = HashSet::new();
        for (name, _) in &attributes {
            if !seen.insert(name.as_str()) {
                return Err(RosterError::DuplicateAttribute(name.clone()));
            }
        }

        let primaries: Vec<usize> = attributes
            .iter()
            .enumerate()
            .filter(|(_, (_, flags))| flags.is_primary())
            .map(|(i, _)| i)
            .collect();

        match primaries.as_slice() {
            [] => Err(RosterError::NoPrimaryIdentifier),
            [primary] => Ok(Self { primary: *primary, attributes }),
            _ => Err(RosterError::MultiplePrimaryIdentifiers {
                attributes: primaries.iter().map(|&i| attributes[i].0.clone()).collect(),
            }),
        }
    }

    /// Name of the primary identifier; roster entries are keyed by its value.
    pub fn primary(&self) -> &str {
        &self.attributes[self.primary].0
    }

    pub fn flags(&self, name: &str) -> Option<AttributeFlags> {
        self.attributes.iter().find(|(n, _)| n == name).map(|(_, f)| *f)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.flags(name).is_some()
    }

    /// All attributes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, AttributeFlags)> {
        self.attributes.iter().map(|(n, f)| (n.as_str(), *f))
    }

    /// Identifying attributes other than the primary identifier, in declaration order.
    pub fn secondary_identifiers(&self) -> impl Iterator<Item = &str> {
        self.iter()
            .filter(|(_, flags)| flags.identifies_student && !flags.is_primary())
            .map(|(name, _)| name)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}
