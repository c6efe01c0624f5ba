//! Concept and concept name models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a concept name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConceptNameType {
    /// The name that identifies the concept in a locale
    FullySpecified,
    /// Abbreviated name
    Short,
    /// Alternative name without identity
    #[default]
    Synonym,
    /// Search-only term
    IndexTerm,
}

impl ConceptNameType {
    /// Stored column value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FullySpecified => "FULLY_SPECIFIED",
            Self::Short => "SHORT",
            Self::Synonym => "SYNONYM",
            Self::IndexTerm => "INDEX_TERM",
        }
    }
}

impl fmt::Display for ConceptNameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConceptNameType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FULLY_SPECIFIED" => Ok(Self::FullySpecified),
            "SHORT" => Ok(Self::Short),
            "SYNONYM" => Ok(Self::Synonym),
            "INDEX_TERM" => Ok(Self::IndexTerm),
            other => Err(format!("unknown concept name type '{other}'")),
        }
    }
}

/// A name attached to a concept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptName {
    /// Name text, compared exactly
    pub name: String,
    /// Locale tag, e.g. `en` or `vi`
    pub locale: String,
    /// Name kind
    #[serde(default)]
    pub name_type: ConceptNameType,
    /// Preferred name for its locale
    #[serde(default)]
    pub locale_preferred: bool,
}

impl ConceptName {
    pub fn new(
        name: impl Into<String>,
        locale: impl Into<String>,
        name_type: ConceptNameType,
    ) -> Self {
        Self {
            name: name.into(),
            locale: locale.into(),
            name_type,
            locale_preferred: false,
        }
    }

    pub fn fully_specified(name: impl Into<String>, locale: impl Into<String>) -> Self {
        Self::new(name, locale, ConceptNameType::FullySpecified)
    }

    #[must_use]
    pub const fn preferred(mut self) -> Self {
        self.locale_preferred = true;
        self
    }

    /// Whether this name identifies its concept within the locale.
    ///
    /// Fully-specified and locale-preferred names must be unique per locale
    /// across concepts.
    #[must_use]
    pub const fn is_identity_bearing(&self) -> bool {
        matches!(self.name_type, ConceptNameType::FullySpecified) || self.locale_preferred
    }

    /// Turn the name into an index term so it no longer claims identity
    pub fn demote_to_index_term(&mut self) {
        self.name_type = ConceptNameType::IndexTerm;
        self.locale_preferred = false;
    }
}

/// A concept as delivered by the remote source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedConcept {
    /// Identity shared between the remote source and the local store
    pub uuid: String,
    /// Names to attach locally
    pub names: Vec<ConceptName>,
    /// Retired concepts stay in the dictionary but are no longer in use
    #[serde(default)]
    pub retired: bool,
}

impl ImportedConcept {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            names: Vec::new(),
            retired: false,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: ConceptName) -> Self {
        self.names.push(name);
        self
    }
}

/// An incoming name that was demoted to an index term during import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemotedName {
    /// Concept the name was imported with
    pub concept_uuid: String,
    /// Name text
    pub name: String,
    /// Locale tag
    pub locale: String,
    /// Type the name carried before demotion
    pub previous_type: ConceptNameType,
}
