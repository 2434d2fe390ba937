use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One brand to search for. `brand` doubles as the provider search keyword;
/// `sku` and `category` are copied onto every result and must be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandQuery {
    pub brand: String,
    pub sku: String,
    pub category: String,
}

impl BrandQuery {
    /// Case-insensitive substring test of the brand name against a place name.
    #[must_use]
    pub fn matches_name(&self, place_name: &str) -> bool {
        let needle = self.brand.trim().to_lowercase();
        !needle.is_empty() && place_name.to_lowercase().contains(&needle)
    }
}

#[derive(Debug, Deserialize)]
pub struct BrandsFile {
    pub brands: Vec<BrandQuery>,
}

/// Load and validate a brand list from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_brands(path: &Path) -> Result<BrandsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::BrandsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let brands_file: BrandsFile =
        serde_yaml::from_str(&content).map_err(ConfigError::BrandsFileParse)?;

    validate_brands(&brands_file.brands)?;

    Ok(brands_file)
}

/// Validate a brand list as supplied by a caller.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when the list is empty, a brand, sku
/// or category is blank, or the same brand/sku pair appears twice.
pub fn validate_brands(brands: &[BrandQuery]) -> Result<(), ConfigError> {
    if brands.is_empty() {
        return Err(ConfigError::Validation(
            "at least one brand is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();

    for brand in brands {
        if brand.brand.trim().is_empty() {
            return Err(ConfigError::Validation(
                "brand name must be non-empty".to_string(),
            ));
        }
        for (field, value) in [("sku", &brand.sku), ("category", &brand.category)] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "{field} must be non-empty for brand '{}'",
                    brand.brand
                )));
            }
        }

        let key = (brand.brand.trim().to_lowercase(), brand.sku.trim().to_lowercase());
        if !seen.insert(key) {
            return Err(ConfigError::Validation(format!(
                "duplicate brand entry: '{}' (sku '{}')",
                brand.brand, brand.sku
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "brands_test.rs"]
mod tests;
