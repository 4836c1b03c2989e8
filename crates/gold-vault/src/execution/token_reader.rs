//! ERC-20 reads and approval encoding.
//!
//! Reads go straight through `eth_call`; amounts are lifted into token
//! units with the token's configured decimals.

use std::sync::Arc;

use alloy::primitives::Address;
use bigdecimal::BigDecimal;
use tracing::debug;

use crate::abi::{decode_values, encode_call, AbiType, AbiValue, ContractSelectors};
use crate::errors::VaultError;
use crate::rpc::{eth, RpcClient};
use crate::types::amount::{from_base_units, max_uint256, to_base_units};
use crate::types::{TokenInfo, TransactionRequest};

/// How much to approve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalAmount {
    Exact(BigDecimal),
    /// `2^256 - 1`.
    Infinite,
}

pub struct TokenReader {
    rpc: Arc<dyn RpcClient>,
    selectors: Arc<ContractSelectors>,
    chain_id: u64,
}

impl TokenReader {
    pub fn new(rpc: Arc<dyn RpcClient>, selectors: Arc<ContractSelectors>, chain_id: u64) -> Self {
        Self {
            rpc,
            selectors,
            chain_id,
        }
    }

    pub async fn balance_of(&self, token: &TokenInfo, owner: Address) -> Result<BigDecimal, VaultError> {
        let data = encode_call(self.selectors.balance_of, &[AbiValue::Address(owner)])?;
        let raw = self.read_uint(token.address, &data).await?;
        let balance = from_base_units(&raw, token.decimals);
        debug!(token = %token.symbol, %owner, %balance, "balanceOf");
        Ok(balance)
    }

    pub async fn allowance(
        &self,
        token: &TokenInfo,
        owner: Address,
        spender: Address,
    ) -> Result<BigDecimal, VaultError> {
        let data = encode_call(
            self.selectors.allowance,
            &[AbiValue::Address(owner), AbiValue::Address(spender)],
        )?;
        let raw = self.read_uint(token.address, &data).await?;
        let allowance = from_base_units(&raw, token.decimals);
        debug!(token = %token.symbol, %owner, %spender, %allowance, "allowance");
        Ok(allowance)
    }

    /// Unsigned `approve(spender, amount)` from `owner`.
    pub fn build_approve(
        &self,
        token: &TokenInfo,
        owner: Address,
        spender: Address,
        amount: &ApprovalAmount,
    ) -> Result<TransactionRequest, VaultError> {
        let raw = match amount {
            ApprovalAmount::Exact(v) => to_base_units(v, token.decimals)?,
            ApprovalAmount::Infinite => max_uint256(),
        };
        let data = encode_call(
            self.selectors.approve,
            &[AbiValue::Address(spender), AbiValue::Uint(raw)],
        )?;
        Ok(TransactionRequest::call(owner, token.address, data, self.chain_id))
    }

    async fn read_uint(&self, to: Address, data: &[u8]) -> Result<num_bigint::BigUint, VaultError> {
        let out = eth::eth_call(self.rpc.as_ref(), to, data).await?;
        let mut values = decode_values(&out, &[AbiType::Uint256])?;
        match values.pop() {
            Some(AbiValue::Uint(v)) => Ok(v),
            _ => Err(VaultError::decoding("expected a single uint256")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{paxg, usdc, uint_word, MockRpc};
    use num_bigint::BigUint;
    use std::str::FromStr;

    fn reader(rpc: Arc<MockRpc>) -> TokenReader {
        TokenReader::new(rpc, Arc::new(ContractSelectors::default()), 1)
    }

    #[tokio::test]
    async fn test_balance_of_scales_by_decimals() {
        let rpc = Arc::new(MockRpc::new(1));
        let owner = Address::repeat_byte(0xb0);
        let selectors = ContractSelectors::default();
        rpc.on_call(
            usdc().address,
            selectors.balance_of,
            uint_word(&BigUint::from(1_234_500_000u64)),
        );

        let balance = reader(rpc).balance_of(&usdc(), owner).await.unwrap();
        assert_eq!(balance, BigDecimal::from_str("1234.5").unwrap());
    }

    #[tokio::test]
    async fn test_allowance_max_uint() {
        let rpc = Arc::new(MockRpc::new(1));
        let selectors = ContractSelectors::default();
        rpc.on_call(paxg().address, selectors.allowance, uint_word(&max_uint256()));

        let allowance = reader(rpc)
            .allowance(&paxg(), Address::repeat_byte(1), Address::repeat_byte(2))
            .await
            .unwrap();
        assert_eq!(to_base_units(&allowance, 18).unwrap(), max_uint256());
    }

    #[tokio::test]
    async fn test_short_return_data_is_decoding_error() {
        let rpc = Arc::new(MockRpc::new(1));
        let selectors = ContractSelectors::default();
        rpc.on_call(usdc().address, selectors.balance_of, vec![0u8; 4]);

        let err = reader(rpc)
            .balance_of(&usdc(), Address::repeat_byte(1))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::DecodingError { .. }));
    }

    #[test]
    fn test_build_approve_exact_and_infinite() {
        let rpc = Arc::new(MockRpc::new(1));
        let r = reader(rpc);
        let spender = Address::repeat_byte(0x77);

        let exact = r
            .build_approve(
                &usdc(),
                Address::repeat_byte(1),
                spender,
                &ApprovalAmount::Exact(BigDecimal::from(100)),
            )
            .unwrap();
        assert_eq!(exact.to, usdc().address);
        assert_eq!(
            BigUint::from_bytes_be(&exact.data[36..68]),
            BigUint::from(100_000_000u64)
        );

        let infinite = r
            .build_approve(&usdc(), Address::repeat_byte(1), spender, &ApprovalAmount::Infinite)
            .unwrap();
        assert!(infinite.data[36..68].iter().all(|b| *b == 0xff));
    }
}
