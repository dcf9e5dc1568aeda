use std::fmt::{self, Display, Formatter};

use crate::catalog::MaterialDefinition;
use crate::handlers::SpoolRecord;

use super::painter::Painter;
use super::table::Table;

/// Renders a spool record, with its catalog match, as a key-value table.
pub(crate) struct SpoolRecordView<'a> {
    record: &'a SpoolRecord,
    material: Option<&'a MaterialDefinition>,
    painter: &'a Painter,
}

impl<'a> SpoolRecordView<'a> {
    pub(crate) fn new(
        record: &'a SpoolRecord,
        material: Option<&'a MaterialDefinition>,
        painter: &'a Painter,
    ) -> Self {
        Self {
            record,
            material,
            painter,
        }
    }

    fn material_family(&self) -> String {
        match self.record.material_family() {
            Some(family) => format!("{family} ({:#06X})", self.record.material_id()),
            None => format!("{:#06X}", self.record.material_id()),
        }
    }

    fn catalog_entry(&self) -> String {
        match self.material {
            Some(material) => self.painter.value(material.to_string()),
            None => self.painter.uncatalogued(),
        }
    }

    fn colour(&self) -> String {
        match self.record.rgb() {
            Some(rgb) => rgb.to_string(),
            None => format!("{:#010X}", self.record.colour()),
        }
    }

    fn diameter(&self) -> String {
        match self.record.diameter() {
            Some(diameter) => diameter.to_string(),
            None => format!("{} µm", self.record.diameter_microns()),
        }
    }

    fn manufactured(&self) -> String {
        match self.record.manufactured_at() {
            Some(at) if self.record.manufactured_at_unix() > 0 => at.date().to_string(),
            _ => self.painter.unset(),
        }
    }
}

impl Display for SpoolRecordView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let record = self.record;
        let usage_hours = record.usage_seconds() / 3600;

        let table = Table::key_value(
            self.painter,
            vec![
                (
                    "vendor",
                    self.painter
                        .value(format!("{} ({:#06X})", record.vendor(), record.vendor_id())),
                ),
                ("material", self.painter.value(self.material_family())),
                ("catalog", self.catalog_entry()),
                ("colour", self.painter.value(self.colour())),
                ("diameter", self.painter.value(self.diameter())),
                ("remaining", self.painter.remaining(record)),
                ("serial", self.painter.value(record.serial().to_string())),
                ("manufactured", self.manufactured()),
                ("usage", self.painter.value(format!("{usage_hours} h"))),
                ("station", self.painter.id(record.station_id())),
            ],
        );
        write!(f, "{table}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MaterialCatalog;

    fn record() -> SpoolRecord {
        SpoolRecord::builder()
            .vendor_id(0x0001)
            .material_id(0x0005)
            .colour(0x0000_FF00)
            .diameter_microns(2850)
            .total_length_mm(500_000)
            .remaining_length_mm(250_250)
            .usage_seconds(7_300)
            .build()
    }

    #[test]
    fn view_lists_identity_and_lengths() {
        let painter = Painter::new(false);
        let record = record();
        let catalog = MaterialCatalog::builtin();
        let material = catalog.lookup_record(&record).ok();

        let rendered = SpoolRecordView::new(&record, material, &painter).to_string();

        for expected in [
            "Ultimaker (0x0001)",
            "PLA (0x0005)",
            "Ultimaker:PLA (Generic)",
            "#00FF00",
            "2.85 mm",
            "250.250 m of 500.000 m",
            "2 h",
            "0xAFFE",
        ] {
            assert!(rendered.contains(expected), "missing {expected:?} in:\n{rendered}");
        }
    }

    #[test]
    fn view_flags_materials_missing_from_catalog() {
        let painter = Painter::new(false);
        let record = SpoolRecord::builder()
            .vendor_id(0x1A2B)
            .material_id(0x0042)
            .total_length_mm(1_000)
            .remaining_length_mm(1_000)
            .build();

        let rendered = SpoolRecordView::new(&record, None, &painter).to_string();

        assert!(rendered.contains("generic (0x1A2B)"));
        assert!(rendered.contains("not in catalog"));
        assert!(rendered.contains("unknown"));
    }
}
