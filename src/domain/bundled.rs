//! Domains bundled into the binary via `include_str!`.

use super::{Domain, DomainResult};
use crate::error::DomainError;

const NDA_TOML: &str = include_str!("../../data/domains/nda.toml");

const BUNDLED: &[(&str, &str)] = &[("nda", NDA_TOML)];

impl Domain {
    /// Load a bundled domain by name.
    pub fn bundled(name: &str) -> DomainResult<Self> {
        let (_, toml_str) = BUNDLED
            .iter()
            .find(|(id, _)| *id == name)
            .ok_or_else(|| DomainError::NotBundled {
                name: name.to_string(),
            })?;
        Self::from_toml_str(toml_str)
    }

    /// Names of the bundled domains.
    pub fn bundled_names() -> impl Iterator<Item = &'static str> {
        BUNDLED.iter().map(|(id, _)| *id)
    }
}
