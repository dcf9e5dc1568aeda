use std::fmt::{self, Display, Formatter};

use crate::catalog::MaterialCatalog;

use super::painter::Painter;
use super::table::Table;

/// Renders the material catalog as one row per entry.
pub(crate) struct CatalogView<'a> {
    catalog: &'a MaterialCatalog,
    painter: &'a Painter,
}

impl<'a> CatalogView<'a> {
    pub(crate) fn new(catalog: &'a MaterialCatalog, painter: &'a Painter) -> Self {
        Self { catalog, painter }
    }
}

impl Display for CatalogView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let rows = self
            .catalog
            .entries()
            .iter()
            .map(|entry| {
                vec![
                    self.painter.id(entry.vendor_id()),
                    self.painter.id(entry.material_id()),
                    self.painter.value(entry.brand()),
                    entry.material().to_string(),
                    entry.colour_name().to_string(),
                ]
            })
            .collect();
        let table = Table::grid(["vendor", "material", "brand", "name", "colour"], rows);
        writeln!(f, "{}", self.painter.title("Material catalog"))?;
        write!(f, "{table}")
    }
}
