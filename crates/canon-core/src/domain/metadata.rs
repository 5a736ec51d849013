//! Descriptive metadata: classifications, people, licenses.

use serde::{Deserialize, Serialize};

/// A classification category, e.g. `cs.DL`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(pub String);

impl Category {
    pub fn new(value: impl Into<String>) -> Self {
        Category(value.into())
    }

    /// The archive part of the category (before the `.`).
    pub fn archive(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(value: &str) -> Self {
        Category(value.to_string())
    }
}

/// License under which the e-print was provided to arXiv.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub href: String,
}

impl License {
    pub fn new(href: impl Into<String>) -> Self {
        License { href: href.into() }
    }
}

/// An arXiv user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affiliation: Vec<String>,
}

impl Person {
    pub fn named(full_name: impl Into<String>) -> Self {
        Person {
            full_name: full_name.into(),
            ..Person::default()
        }
    }
}

/// Submitter-provided descriptive metadata for a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub primary_classification: Category,
    #[serde(default)]
    pub secondary_classification: Vec<Category>,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_: String,
    pub authors: String,
    pub license: License,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_num: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msc_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acm_class: Option<String>,
}

impl Metadata {
    /// All classification categories, primary first.
    pub fn all_categories(&self) -> Vec<&Category> {
        let mut all = vec![&self.primary_classification];
        all.extend(self.secondary_classification.iter());
        all
    }

    /// Add cross-list categories, ignoring ones already present.
    pub fn add_secondaries(&mut self, new_secondaries: impl IntoIterator<Item = Category>) {
        for category in new_secondaries {
            if category != self.primary_classification
                && !self.secondary_classification.contains(&category)
            {
                self.secondary_classification.push(category);
            }
        }
    }
}
