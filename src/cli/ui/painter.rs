use owo_colors::{OwoColorize, Style as OwoStyle};

use crate::handlers::{SpoolRecord, TagContents};

/// How much filament is left on a spool, relative to its total length.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum FillLevel {
    Empty,
    /// Less than a tenth of the spool remains.
    Low,
    Plenty,
}

impl FillLevel {
    fn of(record: &SpoolRecord) -> Self {
        let remaining = u64::from(record.remaining_length_mm());
        let total = u64::from(record.total_length_mm());
        if remaining == 0 {
            Self::Empty
        } else if remaining * 10 < total {
            Self::Low
        } else {
            Self::Plenty
        }
    }
}

/// Styles spool tag output for the terminal.
#[derive(Debug)]
pub(crate) struct Painter {
    use_colour: bool,
}

impl Painter {
    /// Creates a painter with explicit colour control.
    pub(crate) fn new(use_colour: bool) -> Self {
        Self { use_colour }
    }

    /// Headline naming what a tag or block file holds.
    pub(crate) fn contents(&self, contents: &TagContents) -> String {
        match contents {
            TagContents::Spool(_) => {
                self.paint("Valid spool tag", OwoStyle::new().bold().green())
            }
            TagContents::Blank => self.paint("Blank tag", OwoStyle::new().bold().yellow()),
            TagContents::Foreign => self.paint("Unknown data", OwoStyle::new().bold().red()),
        }
    }

    /// A finished tag, image, or file operation.
    pub(crate) fn done<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().green())
    }

    pub(crate) fn title<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().cyan())
    }

    /// Record field names.
    pub(crate) fn label<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().dimmed())
    }

    pub(crate) fn value<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold())
    }

    /// A vendor, material, or station id as `0x1A2B`.
    pub(crate) fn id(&self, id: u16) -> String {
        self.paint(&format!("{id:#06X}"), OwoStyle::new().dimmed())
    }

    /// Marks a record whose vendor and material have no catalog entry.
    pub(crate) fn uncatalogued(&self) -> String {
        self.paint("not in catalog", OwoStyle::new().yellow())
    }

    /// Marks a field the record leaves unset.
    pub(crate) fn unset(&self) -> String {
        self.paint("unknown", OwoStyle::new().dimmed())
    }

    /// Remaining and total length in metres, coloured by fill level.
    pub(crate) fn remaining(&self, record: &SpoolRecord) -> String {
        let text = format!(
            "{:.3} m of {:.3} m",
            record.remaining_length_meters(),
            record.total_length_meters()
        );
        let style = match FillLevel::of(record) {
            FillLevel::Empty => OwoStyle::new().bold().red(),
            FillLevel::Low => OwoStyle::new().bold().yellow(),
            FillLevel::Plenty => OwoStyle::new().bold(),
        };
        self.paint(&text, style)
    }

    fn paint(&self, text: &str, style: OwoStyle) -> String {
        if self.use_colour {
            format!("{}", text.style(style))
        } else {
            text.to_string()
        }
    }
}
