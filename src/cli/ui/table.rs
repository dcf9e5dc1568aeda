use std::fmt::{self, Display, Formatter};

use tabled::{builder::Builder, settings::Style as TableStyle};

use super::painter::Painter;

/// A structured table that renders via `Display`.
#[derive(Debug)]
pub(crate) struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Creates a table with column headers and data rows.
    pub(crate) fn grid(
        headers: impl IntoIterator<Item = impl Into<String>>,
        rows: Vec<Vec<String>>,
    ) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows,
        }
    }

    /// Creates a two-column field/value table with dimmed field names.
    pub(crate) fn key_value(painter: &Painter, rows: Vec<(&str, String)>) -> Self {
        let records = rows
            .into_iter()
            .map(|(field, value)| vec![painter.label(field), value])
            .collect();
        Self::grid(["field", "value"], records)
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut builder = Builder::default();
        builder.push_record(&self.headers);
        for row in &self.rows {
            builder.push_record(row);
        }
        let mut table = builder.build();
        table.with(TableStyle::rounded());
        write!(f, "{table}")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn grid_table_renders_headers_before_rows() {
        let table = Table::grid(
            ["page", "bytes"],
            vec![
                vec!["04".into(), "01 01 1A 2B".into()],
                vec!["05".into(), "00 05 00 00".into()],
            ],
        )
        .to_string();

        let header = table.find("bytes").expect("header should render");
        let first = table.find("01 01 1A 2B").expect("first row should render");
        let second = table.find("00 05 00 00").expect("second row should render");
        assert!(header < first && first < second);
    }

    #[test]
    fn key_value_table_has_one_line_per_row_plus_frame() {
        let painter = Painter::new(false);
        let table = Table::key_value(
            &painter,
            vec![("vendor", "Ultimaker".into()), ("material", "PLA".into())],
        )
        .to_string();

        assert_eq!(6, table.lines().count());
        assert!(table.contains("Ultimaker"));
    }
}
