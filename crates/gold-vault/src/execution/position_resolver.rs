//! Vault resolver reads: risk configuration and a user's positions.

use std::sync::Arc;

use alloy::primitives::Address;
use bigdecimal::BigDecimal;
use tracing::{debug, info, warn};

use crate::abi::{decode_values, encode_call, AbiType, AbiValue, ContractSelectors};
use crate::core::risk::RiskPolicy;
use crate::errors::VaultError;
use crate::rpc::{eth, RpcClient};
use crate::types::amount::{from_base_units, percent_from_scaled};
use crate::types::{BorrowPosition, PositionId, RawPosition, TokenPair, VaultConfig};

/// `(maxLtv, liquidationThreshold, liquidationPenalty)`, two implied decimals each.
fn vault_config_layout() -> Vec<AbiType> {
    vec![AbiType::Uint256, AbiType::Uint256, AbiType::Uint256]
}

/// One resolver position entry.
fn position_layout() -> AbiType {
    AbiType::Tuple(vec![
        AbiType::Uint256, // nftId
        AbiType::Address, // owner
        AbiType::Bool,    // isLiquidated
        AbiType::Bool,    // isSupplyPosition
        AbiType::Int256,  // tick
        AbiType::Uint256, // tickId
        AbiType::Uint256, // beforeSupply
        AbiType::Uint256, // beforeBorrow
        AbiType::Uint256, // beforeDustBorrow
        AbiType::Uint256, // supply
        AbiType::Uint256, // borrow
        AbiType::Uint256, // dustBorrow
    ])
}

fn raw_position(value: &AbiValue) -> Result<RawPosition, VaultError> {
    let fields = value.as_tuple()?;
    if fields.len() != 12 {
        return Err(VaultError::decoding(format!(
            "position tuple has {} fields, expected 12",
            fields.len()
        )));
    }
    Ok(RawPosition {
        id: PositionId(fields[0].as_uint()?.clone()),
        owner: fields[1].as_address()?,
        is_liquidated: fields[2].as_bool()?,
        is_supply_position: fields[3].as_bool()?,
        supply: fields[9].as_uint()?.clone(),
        borrow: fields[10].as_uint()?.clone(),
    })
}

pub struct PositionResolver {
    rpc: Arc<dyn RpcClient>,
    selectors: Arc<ContractSelectors>,
    resolver: Address,
}

impl PositionResolver {
    pub fn new(rpc: Arc<dyn RpcClient>, selectors: Arc<ContractSelectors>, resolver: Address) -> Self {
        Self {
            rpc,
            selectors,
            resolver,
        }
    }

    pub async fn get_vault_config(&self, vault: Address) -> Result<VaultConfig, VaultError> {
        let data = encode_call(self.selectors.get_vault_config, &[AbiValue::Address(vault)])?;
        let out = eth::eth_call(self.rpc.as_ref(), self.resolver, &data).await?;
        let values = decode_values(&out, &vault_config_layout())?;

        let config = VaultConfig {
            max_ltv_percent: percent_from_scaled(values[0].as_uint()?),
            liquidation_threshold_percent: percent_from_scaled(values[1].as_uint()?),
            liquidation_penalty_percent: percent_from_scaled(values[2].as_uint()?),
        };
        info!(
            %vault,
            max_ltv = %config.max_ltv_percent,
            liquidation_threshold = %config.liquidation_threshold_percent,
            "vault config loaded"
        );
        Ok(config)
    }

    /// Undecorated positions. A resolver revert reads as "no positions".
    pub async fn get_raw_positions(
        &self,
        vault: Address,
        user: Address,
    ) -> Result<Vec<RawPosition>, VaultError> {
        let data = encode_call(
            self.selectors.get_positions_by_user,
            &[AbiValue::Address(vault), AbiValue::Address(user)],
        )?;
        let out = match eth::eth_call(self.rpc.as_ref(), self.resolver, &data).await {
            Ok(out) => out,
            Err(VaultError::ContractReverted { reason, .. }) => {
                warn!(%vault, %user, %reason, "positions query reverted, treating as empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let values = decode_values(&out, &[AbiType::Array(Box::new(position_layout()))])?;
        let positions = values[0]
            .as_array()?
            .iter()
            .map(raw_position)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(%vault, %user, count = positions.len(), "positions decoded");
        Ok(positions)
    }

    /// Positions in token units with metrics at `price`.
    pub async fn get_positions_by_user(
        &self,
        vault: Address,
        user: Address,
        pair: &TokenPair,
        config: &VaultConfig,
        price: &BigDecimal,
        policy: &RiskPolicy,
    ) -> Result<Vec<BorrowPosition>, VaultError> {
        let raw = self.get_raw_positions(vault, user).await?;
        Ok(raw
            .into_iter()
            .map(|p| enrich(p, pair, config, price, policy))
            .collect())
    }
}

/// Lift raw amounts into token units and attach metrics.
pub fn enrich(
    raw: RawPosition,
    pair: &TokenPair,
    config: &VaultConfig,
    price: &BigDecimal,
    policy: &RiskPolicy,
) -> BorrowPosition {
    let collateral_amount = from_base_units(&raw.supply, pair.collateral.decimals);
    let debt_amount = from_base_units(&raw.borrow, pair.debt.decimals);
    let metrics = policy.metrics(&collateral_amount, &debt_amount, price, config);
    BorrowPosition {
        id: raw.id,
        owner: raw.owner,
        collateral_amount,
        debt_amount,
        is_liquidated: raw.is_liquidated,
        metrics,
    }
}
