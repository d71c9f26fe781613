//! Provider implementations.

pub mod azure;
pub use azure::AzureProvider;

pub mod mock;
pub use mock::MockProvider;
