//! Typed reconciliation operations and the persisted operation log.
//!
//! Adapters emit an [`OperationBatch`]; the engine partitions each kind into
//! creates/updates/skips/failures, applies them, and records an
//! [`OperationLog`] on the run.

use std::convert::Infallible;

use serde::{Deserialize, Serialize};

use crate::store::{AccountUpdate, KnownDestinationUpdate, WalletUpdate};
use crate::types::{Account, Address, KnownDestination, Wallet};

// ==============================================================================
// Operations
// ==============================================================================

/// A remote record that could not be mapped onto the canonical catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedOperation {
    pub external_id: String,
    pub message: String,
    #[serde(default)]
    pub context: serde_json::Value,
}

/// A requested record that was benignly absent on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedOperation {
    pub external_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation<C, U> {
    Create(C),
    Update(U),
    Skip(SkippedOperation),
    Failed(FailedOperation),
}

/// Addresses are additive-only, so their update type is uninhabited.
pub type AddressOperation = Operation<Address, Infallible>;
pub type WalletOperation = Operation<Wallet, WalletUpdate>;
pub type AccountOperation = Operation<Account, AccountUpdate>;

#[derive(Debug, Clone, PartialEq)]
pub enum KnownDestinationOperation {
    Create(KnownDestination),
    Update(KnownDestinationUpdate),
    Delete { id: String, external_id: String },
    Failed(FailedOperation),
}

/// Operations grouped by kind, as produced by one adapter invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationBatch {
    pub wallets: Vec<WalletOperation>,
    pub accounts: Vec<AccountOperation>,
    pub addresses: Vec<AddressOperation>,
    pub known_destinations: Vec<KnownDestinationOperation>,
}

impl OperationBatch {
    /// `true` when applying the batch would not change the store and no
    /// record failed to map. Skips do not count as changes.
    pub fn is_noop(&self) -> bool {
        fn quiet<C, U>(ops: &[Operation<C, U>]) -> bool {
            ops.iter().all(|op| matches!(op, Operation::Skip(_)))
        }

        quiet(&self.wallets)
            && quiet(&self.accounts)
            && quiet(&self.addresses)
            && self.known_destinations.is_empty()
    }
}

// ==============================================================================
// Partitioning
// ==============================================================================

#[derive(Debug)]
pub struct Partitioned<C, U> {
    pub creates: Vec<C>,
    pub updates: Vec<U>,
    pub skipped: Vec<SkippedOperation>,
    pub failed: Vec<FailedOperation>,
}

impl<C, U> Default for Partitioned<C, U> {
    fn default() -> Self {
        Self {
            creates: Vec::new(),
            updates: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }
}

pub fn partition<C, U>(ops: Vec<Operation<C, U>>) -> Partitioned<C, U> {
    let mut out = Partitioned::default();
    for op in ops {
        match op {
            Operation::Create(c) => out.creates.push(c),
            Operation::Update(u) => out.updates.push(u),
            Operation::Skip(s) => out.skipped.push(s),
            Operation::Failed(f) => out.failed.push(f),
        }
    }
    out
}

#[derive(Debug, Default)]
pub struct PartitionedDestinations {
    pub creates: Vec<KnownDestination>,
    pub updates: Vec<KnownDestinationUpdate>,
    pub deletes: Vec<String>,
    pub failed: Vec<FailedOperation>,
}

pub fn partition_destinations(ops: Vec<KnownDestinationOperation>) -> PartitionedDestinations {
    let mut out = PartitionedDestinations::default();
    for op in ops {
        match op {
            KnownDestinationOperation::Create(c) => out.creates.push(c),
            KnownDestinationOperation::Update(u) => out.updates.push(u),
            KnownDestinationOperation::Delete { id, .. } => out.deletes.push(id),
            KnownDestinationOperation::Failed(f) => out.failed.push(f),
        }
    }
    out
}

// ==============================================================================
// Operation Log
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Create,
    Update,
    Delete,
    Skip,
    Failed,
}

/// One line of a run's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub status: OperationStatus,
    pub entity_id: Option<String>,
    pub external_id: Option<String>,
    pub message: Option<String>,
    /// Remote values behind a `failed` record; null otherwise.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub context: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationLog {
    pub wallets: Vec<OperationRecord>,
    pub accounts: Vec<OperationRecord>,
    pub addresses: Vec<OperationRecord>,
    pub known_destinations: Vec<OperationRecord>,
}

/// Identity of an operation's payload, for the log.
pub trait OperationSubject {
    fn entity_id(&self) -> &str;
    fn external_id(&self) -> Option<&str>;
}

macro_rules! created_subject {
    ($($ty:ty),*) => {$(
        impl OperationSubject for $ty {
            fn entity_id(&self) -> &str {
                &self.id
            }
            fn external_id(&self) -> Option<&str> {
                Some(&self.external_id)
            }
        }
    )*};
}

macro_rules! updated_subject {
    ($($ty:ty),*) => {$(
        impl OperationSubject for $ty {
            fn entity_id(&self) -> &str {
                &self.id
            }
            fn external_id(&self) -> Option<&str> {
                None
            }
        }
    )*};
}

created_subject!(Wallet, Account, Address, KnownDestination);
updated_subject!(WalletUpdate, AccountUpdate, KnownDestinationUpdate);

impl OperationSubject for Infallible {
    fn entity_id(&self) -> &str {
        match *self {}
    }
    fn external_id(&self) -> Option<&str> {
        match *self {}
    }
}

fn subject_record(status: OperationStatus, subject: &impl OperationSubject) -> OperationRecord {
    OperationRecord {
        status,
        entity_id: Some(subject.entity_id().to_owned()),
        external_id: subject.external_id().map(str::to_owned),
        message: None,
        context: serde_json::Value::Null,
    }
}

fn failed_record(failed: &FailedOperation) -> OperationRecord {
    OperationRecord {
        status: OperationStatus::Failed,
        entity_id: None,
        external_id: Some(failed.external_id.clone()),
        message: Some(failed.message.clone()),
        context: failed.context.clone(),
    }
}

fn records<C, U>(ops: &[Operation<C, U>]) -> Vec<OperationRecord>
where
    C: OperationSubject,
    U: OperationSubject,
{
    ops.iter()
        .map(|op| match op {
            Operation::Create(c) => subject_record(OperationStatus::Create, c),
            Operation::Update(u) => subject_record(OperationStatus::Update, u),
            Operation::Skip(s) => OperationRecord {
                status: OperationStatus::Skip,
                entity_id: None,
                external_id: Some(s.external_id.clone()),
                message: Some(s.reason.clone()),
                context: serde_json::Value::Null,
            },
            Operation::Failed(f) => failed_record(f),
        })
        .collect()
}

impl OperationLog {
    pub fn from_batch(batch: &OperationBatch) -> Self {
        let known_destinations = batch
            .known_destinations
            .iter()
            .map(|op| match op {
                KnownDestinationOperation::Create(c) => subject_record(OperationStatus::Create, c),
                KnownDestinationOperation::Update(u) => subject_record(OperationStatus::Update, u),
                KnownDestinationOperation::Delete { id, external_id } => OperationRecord {
                    status: OperationStatus::Delete,
                    entity_id: Some(id.clone()),
                    external_id: Some(external_id.clone()),
                    message: None,
                    context: serde_json::Value::Null,
                },
                KnownDestinationOperation::Failed(f) => failed_record(f),
            })
            .collect();

        Self {
            wallets: records(&batch.wallets),
            accounts: records(&batch.accounts),
            addresses: records(&batch.addresses),
            known_destinations,
        }
    }

    pub fn count(&self, status: OperationStatus) -> usize {
        self.wallets
            .iter()
            .chain(&self.accounts)
            .chain(&self.addresses)
            .chain(&self.known_destinations)
            .filter(|r| r.status == status)
            .count()
    }
}
