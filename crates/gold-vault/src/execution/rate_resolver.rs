use std::sync::Arc;

use alloy::primitives::Address;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::abi::{decode_values, encode_call, AbiType, AbiValue, ContractSelectors};
use crate::errors::VaultError;
use crate::rpc::{eth, RpcClient};
use crate::types::amount::ray_to_apr_percent;

/// Current vault rates as APR percentages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BorrowRates {
    pub supply_apr: Decimal,
    pub borrow_apr: Decimal,
}

pub struct RateResolver {
    rpc: Arc<dyn RpcClient>,
    selectors: Arc<ContractSelectors>,
    resolver: Address,
}

impl RateResolver {
    pub fn new(rpc: Arc<dyn RpcClient>, selectors: Arc<ContractSelectors>, resolver: Address) -> Self {
        Self {
            rpc,
            selectors,
            resolver,
        }
    }

    /// `getRate(vault) -> (supplyRate, borrowRate)`, both RAY-scaled.
    pub async fn get_rates(&self, vault: Address) -> Result<BorrowRates, VaultError> {
        let data = encode_call(self.selectors.get_rate, &[AbiValue::Address(vault)])?;
        let out = eth::eth_call(self.rpc.as_ref(), self.resolver, &data).await?;
        let values = decode_values(&out, &[AbiType::Uint256, AbiType::Uint256])?;

        let rates = BorrowRates {
            supply_apr: ray_to_apr_percent(values[0].as_uint()?)?,
            borrow_apr: ray_to_apr_percent(values[1].as_uint()?)?,
        };
        debug!(%vault, supply_apr = %rates.supply_apr, borrow_apr = %rates.borrow_apr, "rates");
        Ok(rates)
    }
}
