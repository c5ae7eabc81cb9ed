//! Concrete [`crate::GraphBackend`] implementations.

mod compressed;
mod web_api;

pub use compressed::CompressedGraphBackend;
pub use web_api::WebApiGraphBackend;
