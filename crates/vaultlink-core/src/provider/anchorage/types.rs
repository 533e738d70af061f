//! Anchorage REST response shapes (`/v2`).

use serde::Deserialize;

// ==============================================================================
// Envelopes
// ==============================================================================

#[derive(Debug, Deserialize)]
pub(super) struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub page: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PageInfo {
    /// Relative path of the next page, absent on the last page.
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Single<T> {
    pub data: T,
}

// ==============================================================================
// Resources
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorageVault {
    pub vault_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorageDepositAddress {
    pub address: String,
    pub address_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorageWallet {
    pub wallet_id: String,
    pub wallet_name: String,
    pub vault_id: String,
    #[serde(default)]
    pub vault_name: Option<String>,
    pub network_id: String,
    #[serde(default)]
    pub deposit_address: Option<AnchorageDepositAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoDestination {
    pub address: String,
    pub network_id: String,
    #[serde(default)]
    pub asset_type: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorageTrustedDestination {
    pub id: String,
    #[serde(rename = "type")]
    pub destination_type: String,
    /// Present for `type == "crypto"`; other destination kinds are ignored.
    #[serde(default)]
    pub crypto: Option<CryptoDestination>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorageAssetType {
    pub asset_type: String,
    pub network_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub decimals: Option<u32>,
    #[serde(default)]
    pub onchain_identifier: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_page_parses_with_next_cursor() {
        let page: Page<AnchorageWallet> = serde_json::from_str(
            r#"{
                "data": [{
                    "walletId": "wallet-1",
                    "walletName": "Treasury BTC",
                    "vaultId": "vault-1",
                    "vaultName": "Treasury",
                    "networkId": "BTC",
                    "depositAddress": {"address": "bc1qxyz", "addressId": "addr-1"},
                    "isArchived": false
                }],
                "page": {"next": "/v2/wallets?afterId=wallet-1"}
            }"#,
        )
        .expect("wallet page must parse");

        assert_eq!(page.data[0].network_id, "BTC");
        assert_eq!(
            page.data[0].deposit_address.as_ref().map(|d| d.address_id.as_str()),
            Some("addr-1")
        );
        assert_eq!(
            page.page.and_then(|p| p.next).as_deref(),
            Some("/v2/wallets?afterId=wallet-1")
        );
    }

    #[test]
    fn non_crypto_destination_parses_without_payload() {
        let td: AnchorageTrustedDestination =
            serde_json::from_str(r#"{"id":"td-9","type":"fiat"}"#).expect("fiat td must parse");
        assert!(td.crypto.is_none());
    }
}
