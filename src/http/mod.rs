pub mod client;

pub use client::{FhirClient, FhirError, FhirGateway};

#[cfg(any(test, feature = "testing"))]
pub use client::MockFhirGateway;
