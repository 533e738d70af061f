use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FireblocksVaultAsset {
    /// Fireblocks asset id, e.g. `ETH` or `USDC`.
    pub id: String,
    #[serde(default)]
    pub total: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FireblocksVault {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "hiddenOnUI")]
    pub hidden_on_ui: bool,
    #[serde(default)]
    pub assets: Vec<FireblocksVaultAsset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FireblocksVaultAddress {
    pub asset_id: String,
    pub address: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub address_type: Option<String>,
}
