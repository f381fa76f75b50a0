//! Registry and issuer implementations.

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "aws")]
pub mod aws;
