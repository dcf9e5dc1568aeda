mod catalog_view;
mod painter;
mod record_view;
mod table;

pub(crate) use self::catalog_view::CatalogView;
pub(crate) use self::painter::Painter;
pub(crate) use self::record_view::SpoolRecordView;
