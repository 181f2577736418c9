//! Fixed catalog data: instrument families, WhatsApp message templates and
//! the region/city choices offered by the search filters.

pub mod instruments;
pub mod locations;
pub mod whatsapp;

pub use instruments::instrument_family;
pub use whatsapp::{compose_message, templates_for, MessageTemplate};
