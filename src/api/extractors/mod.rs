//! Custom request extractors.

mod client_meta;
mod validated_json;

pub use client_meta::ClientMeta;
pub use validated_json::ValidatedJson;
