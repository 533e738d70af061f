//! Custodian integrations.
//!
//! Each provider module defines a client trait covering the remote calls
//! reconciliation needs, the provider's wire DTOs, and a
//! [`ReconciliationAdapter`](crate::sync::ReconciliationAdapter) that diffs
//! remote state against the canonical store. The HTTP transport behind a
//! client is swappable; tests use the in-crate mocks.

pub mod anchorage;
mod batch;
pub mod fireblocks;
mod snapshot;

pub(crate) use batch::fetch_in_batches;
pub(crate) use snapshot::ScopeSnapshot;
