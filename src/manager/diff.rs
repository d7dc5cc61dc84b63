use serde::{Deserialize, Serialize};
use std::fmt;

use crate::package::PackageDescription;

/// How to reconcile one package with the desired state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Switch,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Switch => "switch",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pending change.
///
/// For `switch`, `description.version` is the target and `current_version`
/// the installed one. For `delete`, `description` is the installed package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageDiff {
    #[serde(flatten)]
    pub description: PackageDescription,
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<String>,
}

impl PackageDiff {
    pub fn add(description: PackageDescription) -> Self {
        Self {
            description,
            operation: Operation::Add,
            current_version: None,
        }
    }

    pub fn switch(description: PackageDescription, current_version: impl Into<String>) -> Self {
        Self {
            description,
            operation: Operation::Switch,
            current_version: Some(current_version.into()),
        }
    }

    pub fn delete(description: PackageDescription) -> Self {
        Self {
            description,
            operation: Operation::Delete,
            current_version: None,
        }
    }

    pub fn full_name(&self) -> &str {
        &self.description.full_name
    }
}

impl fmt::Display for PackageDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.current_version {
            Some(current) => write!(
                f,
                "{} {}@{} -> {}",
                self.operation, self.description.full_name, current, self.description.version
            ),
            None => write!(f, "{} {}", self.operation, self.description),
        }
    }
}
