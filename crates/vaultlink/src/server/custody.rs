use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use vaultlink_core::types::{Account, Address};

use super::auth::check_auth;
use super::error::AppError;
use super::SharedState;

#[derive(Serialize)]
pub(super) struct AccountsResponse {
    accounts: Vec<Account>,
}

#[derive(Serialize)]
pub(super) struct AddressesResponse {
    addresses: Vec<Address>,
}

pub(super) async fn list_wallet_accounts(
    State(state): State<SharedState>,
    Path((client_id, wallet_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<AccountsResponse>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let accounts = state
        .repos
        .accounts_of_wallet(&client_id, &wallet_id)
        .await?;
    Ok(Json(AccountsResponse { accounts }))
}

pub(super) async fn list_account_addresses(
    State(state): State<SharedState>,
    Path((client_id, account_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<AddressesResponse>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let addresses = state
        .repos
        .addresses_of_account(&client_id, &account_id)
        .await?;
    Ok(Json(AddressesResponse { addresses }))
}
