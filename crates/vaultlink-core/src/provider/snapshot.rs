use std::collections::{HashMap, HashSet};

use time::OffsetDateTime;
use uuid::Uuid;

use crate::connection::ValidConnection;
use crate::error::CoreError;
use crate::store::{AccountUpdate, Repositories, WalletUpdate};
use crate::sync::operation::{AccountOperation, AddressOperation, OperationBatch, WalletOperation};
use crate::types::{Account, Address, Wallet};

/// Canonical custody state already stored for one connection, keyed by
/// external id, with the diff rules every adapter shares.
///
/// Each `diff_*` call compares one remote grouping against the snapshot,
/// pushes at most one operation, and returns the canonical id children
/// should point at (fresh for creates).
pub(crate) struct ScopeSnapshot {
    wallets: HashMap<String, Wallet>,
    accounts: HashMap<String, Account>,
    /// `(account id, address external id)`, extended as creates are emitted.
    addresses: HashSet<(String, String)>,
}

impl ScopeSnapshot {
    pub async fn load(
        repos: &Repositories,
        connection: &ValidConnection,
    ) -> Result<Self, CoreError> {
        let (client_id, connection_id) = (&connection.client_id, &connection.id);
        let wallets = repos.wallets.find_all_by_scope(client_id, connection_id).await?;
        let accounts = repos.accounts.find_all_by_scope(client_id, connection_id).await?;
        let addresses = repos.addresses.find_all_by_scope(client_id, connection_id).await?;

        Ok(Self {
            wallets: wallets
                .into_iter()
                .map(|w| (w.external_id.clone(), w))
                .collect(),
            accounts: accounts
                .into_iter()
                .map(|a| (a.external_id.clone(), a))
                .collect(),
            addresses: addresses
                .into_iter()
                .map(|a| (a.account_id, a.external_id))
                .collect(),
        })
    }

    /// Label is the only tracked wallet field.
    pub fn diff_wallet(
        &self,
        connection: &ValidConnection,
        external_id: &str,
        label: Option<String>,
        now: OffsetDateTime,
        batch: &mut OperationBatch,
    ) -> String {
        if let Some(wallet) = self.wallets.get(external_id) {
            if wallet.label != label {
                batch.wallets.push(WalletOperation::Update(WalletUpdate {
                    id: wallet.id.clone(),
                    label,
                    updated_at: now,
                }));
            }
            return wallet.id.clone();
        }

        let wallet = Wallet {
            id: Uuid::new_v4().to_string(),
            client_id: connection.client_id.clone(),
            connection_id: connection.id.clone(),
            provider: connection.provider,
            external_id: external_id.to_owned(),
            label,
            created_at: now,
            updated_at: now,
        };
        let id = wallet.id.clone();
        batch.wallets.push(WalletOperation::Create(wallet));
        id
    }

    /// Tracked account fields are label and owning wallet (membership).
    #[allow(clippy::too_many_arguments)]
    pub fn diff_account(
        &self,
        connection: &ValidConnection,
        external_id: &str,
        wallet_id: &str,
        network_id: &str,
        label: Option<String>,
        now: OffsetDateTime,
        batch: &mut OperationBatch,
    ) -> String {
        if let Some(account) = self.accounts.get(external_id) {
            let moved = account.wallet_id.as_deref() != Some(wallet_id);
            if account.label != label || moved {
                batch.accounts.push(AccountOperation::Update(AccountUpdate {
                    id: account.id.clone(),
                    label,
                    wallet_id: Some(wallet_id.to_owned()),
                    updated_at: now,
                }));
            }
            return account.id.clone();
        }

        let account = Account {
            id: Uuid::new_v4().to_string(),
            client_id: connection.client_id.clone(),
            connection_id: connection.id.clone(),
            provider: connection.provider,
            external_id: external_id.to_owned(),
            wallet_id: Some(wallet_id.to_owned()),
            network_id: network_id.to_owned(),
            label,
            created_at: now,
            updated_at: now,
        };
        let id = account.id.clone();
        batch.accounts.push(AccountOperation::Create(account));
        id
    }

    /// Additive only: nothing is emitted if the account already owns an
    /// address with this external id, including one created earlier in the
    /// same batch.
    pub fn add_address(
        &mut self,
        connection: &ValidConnection,
        account_id: &str,
        external_id: String,
        address: String,
        now: OffsetDateTime,
        batch: &mut OperationBatch,
    ) {
        if !self
            .addresses
            .insert((account_id.to_owned(), external_id.clone()))
        {
            return;
        }
        batch.addresses.push(AddressOperation::Create(Address {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_owned(),
            client_id: connection.client_id.clone(),
            connection_id: connection.id.clone(),
            provider: connection.provider,
            external_id,
            address,
            created_at: now,
            updated_at: now,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AccountRepository, MemoryStore, WalletRepository};
    use crate::test_util::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn unchanged_grouping_emits_nothing() {
        let store = Arc::new(MemoryStore::new());
        WalletRepository::bulk_create(store.as_ref(), vec![make_wallet("w-1", "V1", Some("A"))])
            .await
            .unwrap();
        let mut account = make_account("a-1", Some("w-1"), "W1", "BITCOIN");
        account.label = Some("Savings".into());
        AccountRepository::bulk_create(store.as_ref(), vec![account])
            .await
            .unwrap();

        let connection = anchorage_connection();
        let snapshot = ScopeSnapshot::load(&Repositories::from_memory(store), &connection)
            .await
            .unwrap();
        let now = OffsetDateTime::now_utc();
        let mut batch = OperationBatch::default();

        let wallet_id = snapshot.diff_wallet(&connection, "V1", Some("A".into()), now, &mut batch);
        let account_id = snapshot.diff_account(
            &connection,
            "W1",
            &wallet_id,
            "BITCOIN",
            Some("Savings".into()),
            now,
            &mut batch,
        );
        assert_eq!((wallet_id.as_str(), account_id.as_str()), ("w-1", "a-1"));
        assert!(batch.is_noop());
    }

    #[tokio::test]
    async fn moved_account_is_updated() {
        let store = Arc::new(MemoryStore::new());
        let connection = anchorage_connection();
        AccountRepository::bulk_create(
            store.as_ref(),
            vec![make_account("a-1", None, "W1", "BITCOIN")],
        )
        .await
        .unwrap();
        let snapshot = ScopeSnapshot::load(&Repositories::from_memory(store), &connection)
            .await
            .unwrap();
        let mut batch = OperationBatch::default();
        let label = snapshot.accounts["W1"].label.clone();

        snapshot.diff_account(
            &connection,
            "W1",
            "w-new",
            "BITCOIN",
            label,
            OffsetDateTime::now_utc(),
            &mut batch,
        );
        assert!(matches!(
            &batch.accounts[..],
            [AccountOperation::Update(AccountUpdate { wallet_id: Some(w), .. })] if w == "w-new"
        ));
    }

    #[tokio::test]
    async fn duplicate_address_in_one_batch_is_created_once() {
        let store = Arc::new(MemoryStore::new());
        let connection = anchorage_connection();
        let mut snapshot = ScopeSnapshot::load(&Repositories::from_memory(store), &connection)
            .await
            .unwrap();
        let now = OffsetDateTime::now_utc();
        let mut batch = OperationBatch::default();
        for _ in 0..2 {
            snapshot.add_address(
                &connection,
                "a-1",
                "V1-ETHEREUM-0xabc".into(),
                "0xabc".into(),
                now,
                &mut batch,
            );
        }
        assert_eq!(batch.addresses.len(), 1);
    }
}
