//! Carrier Connectors
//!
//! Concrete implementations of the `CarrierProvider` port, one module
//! per carrier. Connectors own the wire formats, authentication, and
//! error classification for their carrier; the rest of the system only
//! sees `ProviderError` categories.

#![warn(clippy::all)]

mod credentials;
mod delhivery_rest;

pub use credentials::DelhiveryCredentials;
pub use delhivery_rest::{DelhiveryClient, DelhiveryRestError};
