//! Turning a record and its layout into display-ready data

pub mod format;
pub mod lookup;
pub mod view;

pub use format::format_value;
pub use lookup::{
    default_display_fields, default_routes, resolve_lookup, DisplayKey, LookupSource, NoLookups,
    RelatedRecords, ResolvedLookup,
};
pub use view::{RenderMode, RenderedField, RenderedSection, RenderedTab, RenderedView, Renderer};
