pub mod catalog_types;
pub mod classify_types;
pub mod layout_types;
