//! Concrete [`crate::ContentBackend`] implementations.

mod objstorage;
mod web_api;

pub use objstorage::ObjStorageBackend;
pub use web_api::WebApiContentBackend;
