pub mod client;
pub mod error;
pub mod response;
pub mod service;

pub use client::MetadataClient;
pub use error::FetchError;
pub use response::{ServiceFields, ServiceResponse};
pub use service::{MetadataService, versioned_endpoint};
