use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::CatalogError;
use crate::handlers::{KnownVendor, MaterialFamily, SpoolRecord};

/// One material the catalog can name.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct MaterialDefinition {
    vendor_id: u16,
    material_id: u16,
    brand: String,
    material: String,
    colour_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    guid: Option<String>,
}

impl MaterialDefinition {
    #[must_use]
    pub fn new(
        vendor_id: u16,
        material_id: u16,
        brand: impl Into<String>,
        material: impl Into<String>,
        colour_name: impl Into<String>,
    ) -> Self {
        Self {
            vendor_id,
            material_id,
            brand: brand.into(),
            material: material.into(),
            colour_name: colour_name.into(),
            guid: None,
        }
    }

    /// Attaches a slicer material GUID.
    #[must_use]
    pub fn with_guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = Some(guid.into());
        self
    }

    #[must_use]
    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    #[must_use]
    pub fn material_id(&self) -> u16 {
        self.material_id
    }

    #[must_use]
    pub fn brand(&self) -> &str {
        &self.brand
    }

    #[must_use]
    pub fn material(&self) -> &str {
        &self.material
    }

    #[must_use]
    pub fn colour_name(&self) -> &str {
        &self.colour_name
    }

    #[must_use]
    pub fn guid(&self) -> Option<&str> {
        self.guid.as_deref()
    }

    fn key(&self) -> (u16, u16) {
        (self.vendor_id, self.material_id)
    }
}

impl fmt::Display for MaterialDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.brand, self.material, self.colour_name)
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct CatalogFile {
    materials: Vec<MaterialDefinition>,
}

/// Closed lookup table from `(vendor_id, material_id)` to material names.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MaterialCatalog {
    entries: Vec<MaterialDefinition>,
    index: HashMap<(u16, u16), usize>,
}

static BUILTIN: LazyLock<MaterialCatalog> = LazyLock::new(|| {
    let entries: Vec<MaterialDefinition> = BUILTIN_ENTRIES
        .iter()
        .map(|(vendor, family, brand, material, colour_name)| {
            MaterialDefinition::new(vendor.id(), family.id(), *brand, *material, *colour_name)
        })
        .collect();
    let index = entries
        .iter()
        .enumerate()
        .map(|(position, entry)| (entry.key(), position))
        .collect();
    MaterialCatalog { entries, index }
});

const BUILTIN_ENTRIES: &[(KnownVendor, MaterialFamily, &str, &str, &str)] = &[
    (KnownVendor::Ultimaker, MaterialFamily::Pla, "Ultimaker", "PLA", "Generic"),
    (KnownVendor::Ultimaker, MaterialFamily::Abs, "Ultimaker", "ABS", "Generic"),
    (KnownVendor::Ultimaker, MaterialFamily::Cpe, "Ultimaker", "CPE", "Generic"),
    (KnownVendor::Ultimaker, MaterialFamily::Nylon, "Ultimaker", "Nylon", "Transparent"),
    (KnownVendor::Ultimaker, MaterialFamily::Tpu, "Ultimaker", "TPU 95A", "Generic"),
    (KnownVendor::Ultimaker, MaterialFamily::Pva, "Ultimaker", "PVA", "Natural"),
    (KnownVendor::Ultimaker, MaterialFamily::Pc, "Ultimaker", "PC", "Transparent"),
    (KnownVendor::Prusament, MaterialFamily::Pla, "Prusament", "PLA", "Galaxy Black"),
    (KnownVendor::Prusament, MaterialFamily::Petg, "Prusament", "PETG", "Jet Black"),
    (KnownVendor::Prusament, MaterialFamily::Pc, "Prusament", "PC Blend", "Natural"),
    (KnownVendor::Polymaker, MaterialFamily::Pla, "Polymaker", "PolyLite PLA", "White"),
    (KnownVendor::Polymaker, MaterialFamily::Petg, "Polymaker", "PolyMax PETG", "Grey"),
    (KnownVendor::Polymaker, MaterialFamily::Abs, "Polymaker", "PolyLite ABS", "Black"),
    (KnownVendor::ColorFabb, MaterialFamily::Pla, "colorFabb", "PLA/PHA", "Standard Red"),
    (KnownVendor::ColorFabb, MaterialFamily::Cpe, "colorFabb", "nGen", "Natural"),
];

impl MaterialCatalog {
    /// Returns the built-in catalog.
    #[must_use]
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Builds a catalog from explicit entries.
    ///
    /// # Errors
    ///
    /// Returns an error when two entries share a vendor and material id.
    pub fn from_entries(entries: Vec<MaterialDefinition>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            match index.entry(entry.key()) {
                Entry::Occupied(_) => {
                    return Err(CatalogError::DuplicateEntry {
                        vendor_id: entry.vendor_id,
                        material_id: entry.material_id,
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(position);
                }
            }
        }
        Ok(Self { entries, index })
    }

    /// Parses a catalog from JSON of the form `{"materials": [...]}`.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON or duplicate entries.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::from_entries(file.materials)
    }

    /// Loads a catalog file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    #[instrument(skip_all, level = "debug", fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json_str(&json)?;
        debug!(entries = catalog.entries.len(), "loaded material catalog");
        Ok(catalog)
    }

    /// Looks up the material for a vendor and material id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] when the pair is not in the table.
    ///
    /// ```
    /// use spooltag::MaterialCatalog;
    ///
    /// let catalog = MaterialCatalog::builtin();
    /// let pla = catalog.lookup(0x0001, 0x0005)?;
    /// assert_eq!("Ultimaker:PLA (Generic)", pla.to_string());
    /// assert!(catalog.lookup(0x1A2B, 0x0005).is_err());
    /// # Ok::<(), spooltag::CatalogError>(())
    /// ```
    pub fn lookup(
        &self,
        vendor_id: u16,
        material_id: u16,
    ) -> Result<&MaterialDefinition, CatalogError> {
        self.index
            .get(&(vendor_id, material_id))
            .and_then(|position| self.entries.get(*position))
            .ok_or(CatalogError::NotFound {
                vendor_id,
                material_id,
            })
    }

    /// Looks up the material named by a record's identity fields.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] when the record's material is unknown.
    pub fn lookup_record(&self, record: &SpoolRecord) -> Result<&MaterialDefinition, CatalogError> {
        self.lookup(record.vendor_id(), record.material_id())
    }

    /// Returns all entries in table order.
    #[must_use]
    pub fn entries(&self) -> &[MaterialDefinition] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn builtin_table_has_unique_keys() {
        let builtin = MaterialCatalog::builtin();
        let rebuilt = MaterialCatalog::from_entries(builtin.entries().to_vec());
        assert_matches!(rebuilt, Ok(catalog) if catalog == builtin);
    }

    #[rstest]
    #[case(0x0002, 0x0002, "Prusament:PETG (Jet Black)")]
    #[case(0x0004, 0x0008, "colorFabb:nGen (Natural)")]
    fn builtin_lookup_names_material(
        #[case] vendor_id: u16,
        #[case] material_id: u16,
        #[case] expected: &str,
    ) {
        let catalog = MaterialCatalog::builtin();
        let definition = catalog
            .lookup(vendor_id, material_id)
            .expect("builtin entry should exist");
        assert_eq!(expected, definition.to_string());
    }

    #[test]
    fn unknown_pair_is_not_found() {
        let catalog = MaterialCatalog::builtin();
        assert_matches!(
            catalog.lookup(0xFFFF, 0x0001),
            Err(CatalogError::NotFound {
                vendor_id: 0xFFFF,
                material_id: 0x0001,
            })
        );
    }

    #[test]
    fn json_catalog_parses_optional_guid() {
        let catalog = MaterialCatalog::from_json_str(
            r#"{"materials": [
                {"vendor_id": 7, "material_id": 5, "brand": "Acme", "material": "PLA",
                 "colour_name": "Blue", "guid": "0e01be8c-e425-4fb1-b4a3-b79f255f1db9"}
            ]}"#,
        )
        .expect("catalog should parse");

        let definition = catalog.lookup(7, 5).expect("entry should exist");
        assert_eq!(Some("0e01be8c-e425-4fb1-b4a3-b79f255f1db9"), definition.guid());
        assert_eq!("Acme:PLA (Blue)", definition.to_string());
    }

    #[test]
    fn json_catalog_rejects_duplicates() {
        let entry = r#"{"vendor_id": 7, "material_id": 5, "brand": "Acme", "material": "PLA", "colour_name": "Blue"}"#;
        let json = format!(r#"{{"materials": [{entry}, {entry}]}}"#);

        assert_matches!(
            MaterialCatalog::from_json_str(&json),
            Err(CatalogError::DuplicateEntry {
                vendor_id: 7,
                material_id: 5,
            })
        );
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert_matches!(
            MaterialCatalog::from_json_str("{"),
            Err(CatalogError::Parse(_))
        );
    }
}
