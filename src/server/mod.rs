//! HTTP surface for the translation chain

pub mod api;
pub mod docs;
