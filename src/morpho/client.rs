//! Morpho Blue API client (raw GraphQL over HTTP)

use super::{rank_by_net_apy, Position, Vault, VaultData, DEFAULT_TOP_VAULTS};
use crate::console::types::exact_u256;
use crate::{Error, Result};
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const VAULTS_QUERY: &str = r#"
    query GetVaults($asset: [String!], $chainId: [Int!], $first: Int!, $vaults: [String!]) {
        vaults(
            where: { assetAddress_in: $asset, chainId_in: $chainId, whitelisted: true, address_in: $vaults }
            orderBy: NetApy
            orderDirection: Desc
            first: $first
        ) {
            items {
                id
                address
                symbol
                state {
                    apy
                    netApy
                }
            }
        }
    }
"#;

const POSITIONS_QUERY: &str = r#"
    query GetUserPositions($address: [String!]) {
        users(where: { address_in: $address }) {
            items {
                vaultPositions {
                    id
                    vault {
                        address
                        symbol
                    }
                    shares
                }
            }
        }
    }
"#;

#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQLError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Items<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct VaultsData {
    vaults: Items<RawVault>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVault {
    id: String,
    address: Address,
    symbol: String,
    state: Option<RawVaultState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVaultState {
    net_apy: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct UsersData {
    users: Items<RawUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUser {
    #[serde(default)]
    vault_positions: Vec<RawPosition>,
}

#[derive(Debug, Deserialize)]
struct RawPosition {
    id: String,
    vault: RawPositionVault,
    #[serde(deserialize_with = "exact_u256::deserialize")]
    shares: U256,
}

#[derive(Debug, Deserialize)]
struct RawPositionVault {
    address: Address,
    symbol: String,
}

impl From<RawVault> for Vault {
    fn from(raw: RawVault) -> Self {
        Self {
            id: raw.id,
            address: raw.address,
            symbol: raw.symbol,
            net_apy: raw.state.and_then(|s| s.net_apy).unwrap_or(f64::NAN),
        }
    }
}

impl From<RawPosition> for Position {
    fn from(raw: RawPosition) -> Self {
        Self {
            id: raw.id,
            vault_address: raw.vault.address,
            vault_symbol: raw.vault.symbol,
            shares: raw.shares,
        }
    }
}

/// Client for the Morpho GraphQL API
pub struct MorphoClient {
    client: Client,
    endpoint: String,
}

impl MorphoClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn query<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "query": query,
                "variables": variables
            }))
            .send()
            .await
            .map_err(|e| Error::GraphQL(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::GraphQL(format!("Failed to read response: {}", e)))?;
        if !status.is_success() {
            return Err(Error::GraphQL(format!("HTTP {}: {}", status, body)));
        }

        parse_response(&body)
    }
}

fn parse_response<T: DeserializeOwned>(body: &str) -> Result<T> {
    let result: GraphQLResponse<T> = serde_json::from_str(body)
        .map_err(|e| Error::GraphQL(format!("Failed to parse response: {}", e)))?;

    if let Some(errors) = result.errors.filter(|e| !e.is_empty()) {
        let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
        return Err(Error::GraphQL(messages.join(", ")));
    }

    result
        .data
        .ok_or_else(|| Error::GraphQL("No data in response".to_string()))
}

fn vaults_variables(asset: Address, chain_id: u64, preferred: &[Address]) -> Value {
    let first = if preferred.is_empty() {
        DEFAULT_TOP_VAULTS
    } else {
        preferred.len()
    };
    let vaults = if preferred.is_empty() {
        Value::Null
    } else {
        json!(preferred.iter().map(|a| a.to_string()).collect::<Vec<_>>())
    };

    json!({
        "asset": [asset.to_string()],
        "chainId": [chain_id],
        "first": first,
        "vaults": vaults
    })
}

fn into_positions(data: UsersData) -> Vec<Position> {
    data.users
        .items
        .into_iter()
        .next()
        .map(|user| user.vault_positions.into_iter().map(Position::from).collect())
        .unwrap_or_default()
}

#[async_trait]
impl VaultData for MorphoClient {
    async fn get_vaults(
        &self,
        asset: Address,
        chain_id: u64,
        preferred: &[Address],
    ) -> Result<Vec<Vault>> {
        let data: VaultsData = self
            .query(VAULTS_QUERY, vaults_variables(asset, chain_id, preferred))
            .await?;

        let mut vaults: Vec<Vault> = data.vaults.items.into_iter().map(Vault::from).collect();
        rank_by_net_apy(&mut vaults);

        tracing::debug!(
            asset = %asset,
            chain_id,
            count = vaults.len(),
            "Fetched Morpho vaults"
        );
        Ok(vaults)
    }

    async fn get_user_positions(&self, user: Address) -> Result<Vec<Position>> {
        let data: UsersData = self
            .query(POSITIONS_QUERY, json!({ "address": [user.to_string()] }))
            .await?;
        Ok(into_positions(data))
    }
}
