//! Credential and token models shared by the authorization pipeline.

pub mod credential;
pub mod token;

pub use credential::*;
pub use token::{access::*, cached::*, secret::*};
