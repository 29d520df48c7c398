//! Document URL template

use crate::error::{PersistenceError, Result};

/// Placeholder replaced by the map id
pub const ID_PLACEHOLDER: &str = "{id}";

/// URL template with exactly one `{id}` placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUrl {
    template: String,
}

impl DocumentUrl {
    /// Validate a template
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if template.trim().is_empty() {
            return Err(PersistenceError::Config(
                "documentUrl can not be null".to_string(),
            ));
        }
        match template.matches(ID_PLACEHOLDER).count() {
            1 => Ok(Self { template }),
            0 => Err(PersistenceError::Config(format!(
                "documentUrl '{}' has no {} placeholder",
                template, ID_PLACEHOLDER
            ))),
            n => Err(PersistenceError::Config(format!(
                "documentUrl '{}' has {} {} placeholders, expected one",
                template, n, ID_PLACEHOLDER
            ))),
        }
    }

    /// Substitute the map id. The id is inserted as given.
    pub fn resolve(&self, map_id: &str) -> Result<String> {
        if map_id.is_empty() {
            return Err(PersistenceError::MissingMapId);
        }
        Ok(self.template.replacen(ID_PLACEHOLDER, map_id, 1))
    }
}
