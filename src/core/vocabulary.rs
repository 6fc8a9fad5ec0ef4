//! Accepted content and license type names.
//!
//! The built-in variants of [`ContentType`] and [`LicenseType`] are always
//! accepted. Extension names must be registered here before callers can use
//! them; unknown names are rejected at the registry boundary instead of
//! being stored.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::RegistryError;
use crate::domain::{ContentType, LicenseType};

/// Registered extension names for the open-ended enums
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    #[serde(default)]
    content_types: BTreeSet<String>,

    #[serde(default)]
    license_types: BTreeSet<String>,
}

impl Vocabulary {
    /// Only the built-in variants
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_type(mut self, name: impl AsRef<str>) -> Self {
        self.content_types.insert(normalize(name.as_ref()));
        self
    }

    pub fn with_license_type(mut self, name: impl AsRef<str>) -> Self {
        self.license_types.insert(normalize(name.as_ref()));
        self
    }

    pub fn with_content_types(self, names: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        names.into_iter().fold(self, |v, n| v.with_content_type(n))
    }

    pub fn with_license_types(self, names: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        names.into_iter().fold(self, |v, n| v.with_license_type(n))
    }

    pub fn check_content_type(&self, content_type: &ContentType) -> Result<(), RegistryError> {
        match content_type {
            ContentType::Extension(name) if !self.content_types.contains(name) => Err(
                RegistryError::Validation(format!("Unknown content type: {:?}", name)),
            ),
            _ => Ok(()),
        }
    }

    pub fn check_license_type(&self, license_type: &LicenseType) -> Result<(), RegistryError> {
        match license_type {
            LicenseType::Extension(name) if !self.license_types.contains(name) => Err(
                RegistryError::Validation(format!("Unknown license type: {:?}", name)),
            ),
            _ => Ok(()),
        }
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_always_accepted() {
        let vocab = Vocabulary::new();
        assert!(vocab.check_content_type(&ContentType::Performance).is_ok());
        assert!(vocab.check_license_type(&LicenseType::NonExclusive).is_ok());
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let vocab = Vocabulary::new();
        let result = vocab.check_content_type(&ContentType::from("hologram"));
        assert!(matches!(result, Err(RegistryError::Validation(_))));
    }

    #[test]
    fn test_registered_extension_accepted() {
        let vocab = Vocabulary::new()
            .with_content_type("Hologram")
            .with_license_types(["sync", "creative-commons"]);

        assert!(vocab.check_content_type(&ContentType::from("hologram")).is_ok());
        assert!(vocab.check_license_type(&LicenseType::from("sync")).is_ok());
        assert!(vocab
            .check_license_type(&LicenseType::from("creative-commons"))
            .is_ok());
        assert!(vocab.check_license_type(&LicenseType::from("perpetual")).is_err());
    }
}
