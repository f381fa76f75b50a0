//! Keysweep - Gap-free rotation for usage-plan-bound API credentials.
//!
//! Keysweep tracks the age of API keys recorded in a durable registry,
//! rotates the ones past a staleness threshold, and keeps each registry
//! record pointing at a credential that is bound to its usage plan and not
//! revoked. Callers never see a stale-beyond-one-cycle, revoked, or absent
//! credential.
//!
//! # Features
//!
//! - **Gap-free protocol**: create, bind, persist, then revoke - the record
//!   never points at a dead key
//! - **Conflict-safe**: the registry's conditional write arbitrates
//!   overlapping sweeps and retried jobs; no external locking
//! - **Batch isolation**: one entry's failure never aborts the sweep
//! - **Async/Await**: built on tokio for non-blocking I/O
//! - **Dependency Injection**: registry and issuer are capability traits,
//!   substitutable with the bundled mocks
//! - **Feature Flags**: optional backend compilation to minimize dependencies
//!
//! # Quick Start
//!
//! ```
//! use keysweep::{factory, BackendType, Config};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> keysweep::Result<()> {
//!     // Configure a backend and assemble the pipeline
//!     let config = Config::new(BackendType::Mock)
//!         .with_table("api-key-registry")
//!         .with_sweep_concurrency(4);
//!
//!     let sweeper = factory::sweeper(&config).await?;
//!
//!     // One scan-filter-dispatch cycle
//!     let report = sweeper.sweep(config.stale_threshold).await?;
//!     println!("sweep: {}", report);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Rotation Protocol
//!
//! Each stale entry is rotated in four steps, in an order that guarantees
//! continuous validity:
//!
//! 1. Create a replacement key at the issuer
//! 2. Bind it to the entry's usage plan
//! 3. Conditionally update the registry record (expected key id must still
//!    be current - a conflict means another rotation won, and the fresh key
//!    is revoked instead of leaked)
//! 4. Revoke the superseded key (failure here is logged, not fatal: no
//!    record points at it anymore)
//!
//! Every step is retried with bounded backoff on transient errors, and the
//! whole protocol is idempotent under redelivery.
//!
//! # Supported Backends
//!
//! | Backend | Feature Flag | Registry | Issuer |
//! |---------|--------------|----------|--------|
//! | Mock | `mock` (default) | In-memory | In-memory with lifecycle tracking |
//! | AWS | `aws` | DynamoDB | API Gateway API keys |
//!
//! # Feature Flags
//!
//! Enable backends by adding feature flags to `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! keysweep = { version = "0.1", features = ["aws"] }
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod factory;
pub mod issuer;
pub mod record;
pub mod registry;
pub mod retry;
pub mod rotator;
pub mod sweeper;
pub mod validation;

pub use config::{BackendType, Config};
pub use error::{KeysweepError, Result};
pub use issuer::{IssuedKey, Issuer, Revocation};
pub use record::{KeyRecord, RotationRequest};
pub use registry::{RecordUpdate, Registry, UpdateOutcome};
pub use retry::RetryPolicy;
pub use rotator::{RotationOutcome, Rotator, SkipReason};
pub use sweeper::{SweepReport, Sweeper};
