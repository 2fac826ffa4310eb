//! Token models: the raw grant response, the cached slot value, and the redacting secret wrapper.

pub mod access;
pub mod cached;
pub mod secret;
