//! Scoped sync: typed operations, the run record, adapter dispatch and the
//! engine that applies adapter output to the canonical store.

pub mod adapter;
pub mod engine;
pub mod handler;
pub mod operation;
pub mod run;

pub use adapter::{AdapterRegistry, ReconciliationAdapter};
pub use engine::{ScopedSyncEngine, StartedSync};
pub use handler::ScopedSyncHandler;
pub use operation::{
    FailedOperation, KnownDestinationOperation, Operation, OperationBatch, OperationLog,
    OperationRecord, OperationStatus, SkippedOperation,
};
pub use run::{SyncRun, SyncRunError, SyncStatus};
