//! Asset descriptors and their wire encoding.
//!
//! An asset is identified on the exchange by an opaque byte string whose
//! leading four bytes (the proxy id) select the asset proxy that knows how to
//! move it. The remainder is the ABI encoding of the asset's fields.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

sol! {
	/// Fungible token asset data layout.
	function ERC20Token(address tokenContract) external;

	/// Non-fungible token asset data layout.
	function ERC721Token(address tokenContract, uint256 tokenId, bytes receiverData) external;
}

/// Errors raised while decoding asset data. All of them are fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssetDataError {
	#[error("Asset data too short: {0} bytes")]
	TooShort(usize),
	#[error("Unknown asset proxy id: 0x{0}")]
	UnknownProxyId(String),
	#[error("Malformed {proxy_id} asset data: {reason}")]
	Malformed { proxy_id: ProxyId, reason: String },
	#[error("Non-canonical {proxy_id} asset data: expected {expected} bytes, got {actual}")]
	NonCanonical {
		proxy_id: ProxyId,
		expected: usize,
		actual: usize,
	},
}

/// Tag embedded at the front of asset data naming the proxy that handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProxyId {
	Erc20,
	Erc721,
}

impl ProxyId {
	pub fn selector(&self) -> [u8; 4] {
		match self {
			ProxyId::Erc20 => ERC20TokenCall::SELECTOR,
			ProxyId::Erc721 => ERC721TokenCall::SELECTOR,
		}
	}

	pub fn from_selector(tag: [u8; 4]) -> Option<Self> {
		[ProxyId::Erc20, ProxyId::Erc721]
			.into_iter()
			.find(|id| id.selector() == tag)
	}
}

impl fmt::Display for ProxyId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ProxyId::Erc20 => write!(f, "ERC20"),
			ProxyId::Erc721 => write!(f, "ERC721"),
		}
	}
}

/// Decoded asset descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetData {
	/// A fungible token; amounts are scalar.
	Erc20 { token: Address },
	/// One unit of a non-fungible token.
	Erc721 {
		token: Address,
		token_id: U256,
		extra_data: Bytes,
	},
}

impl AssetData {
	pub fn erc20(token: Address) -> Self {
		AssetData::Erc20 { token }
	}

	pub fn erc721(token: Address, token_id: U256) -> Self {
		AssetData::Erc721 {
			token,
			token_id,
			extra_data: Bytes::new(),
		}
	}

	pub fn proxy_id(&self) -> ProxyId {
		match self {
			AssetData::Erc20 { .. } => ProxyId::Erc20,
			AssetData::Erc721 { .. } => ProxyId::Erc721,
		}
	}

	/// Address of the token contract backing this asset.
	pub fn token(&self) -> Address {
		match self {
			AssetData::Erc20 { token } | AssetData::Erc721 { token, .. } => *token,
		}
	}

	pub fn is_fungible(&self) -> bool {
		matches!(self, AssetData::Erc20 { .. })
	}

	/// Encodes as proxy id followed by the ABI-encoded fields.
	pub fn encode(&self) -> Bytes {
		match self {
			AssetData::Erc20 { token } => ERC20TokenCall {
				tokenContract: *token,
			}
			.abi_encode()
			.into(),
			AssetData::Erc721 {
				token,
				token_id,
				extra_data,
			} => ERC721TokenCall {
				tokenContract: *token,
				tokenId: *token_id,
				receiverData: extra_data.clone(),
			}
			.abi_encode()
			.into(),
		}
	}

	/// Decodes asset data, rejecting unknown tags and any byte string that
	/// does not re-encode to exactly itself.
	pub fn decode(data: &[u8]) -> Result<Self, AssetDataError> {
		let tag = data
			.first_chunk::<4>()
			.ok_or(AssetDataError::TooShort(data.len()))?;
		let proxy_id = ProxyId::from_selector(*tag)
			.ok_or_else(|| AssetDataError::UnknownProxyId(hex::encode(tag)))?;

		let malformed = |e: alloy_sol_types::Error| AssetDataError::Malformed {
			proxy_id,
			reason: e.to_string(),
		};

		let decoded = match proxy_id {
			ProxyId::Erc20 => {
				let call = ERC20TokenCall::abi_decode(data, true).map_err(malformed)?;
				AssetData::Erc20 {
					token: call.tokenContract,
				}
			}
			ProxyId::Erc721 => {
				let call = ERC721TokenCall::abi_decode(data, true).map_err(malformed)?;
				AssetData::Erc721 {
					token: call.tokenContract,
					token_id: call.tokenId,
					extra_data: call.receiverData,
				}
			}
		};

		let canonical = decoded.encode();
		if canonical.as_ref() != data {
			return Err(AssetDataError::NonCanonical {
				proxy_id,
				expected: canonical.len(),
				actual: data.len(),
			});
		}

		Ok(decoded)
	}
}

impl fmt::Display for AssetData {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AssetData::Erc20 { token } => write!(f, "erc20({})", token),
			AssetData::Erc721 { token, token_id, .. } => {
				write!(f, "erc721({}#{})", token, token_id)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_round_trip_boundary_addresses() {
		for token in [Address::ZERO, Address::repeat_byte(0xff)] {
			let erc20 = AssetData::erc20(token);
			assert_eq!(AssetData::decode(&erc20.encode()).unwrap(), erc20);

			let erc721 = AssetData::Erc721 {
				token,
				token_id: U256::MAX,
				extra_data: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
			};
			assert_eq!(AssetData::decode(&erc721.encode()).unwrap(), erc721);
		}
	}

	#[test]
	fn test_encoding_layout() {
		let erc20 = AssetData::erc20(Address::repeat_byte(0x11)).encode();
		assert_eq!(erc20.len(), 36);
		assert_eq!(&erc20[..4], &ProxyId::Erc20.selector());

		let erc721 = AssetData::erc721(Address::repeat_byte(0x22), U256::from(7)).encode();
		assert_eq!(&erc721[..4], &ProxyId::Erc721.selector());
		// tag + address + id + offset + empty length
		assert_eq!(erc721.len(), 4 + 4 * 32);
	}

	#[test]
	fn test_unknown_tag_rejected() {
		let mut data = AssetData::erc20(Address::ZERO).encode().to_vec();
		data[0] ^= 0xff;
		assert!(matches!(
			AssetData::decode(&data),
			Err(AssetDataError::UnknownProxyId(_))
		));
		assert_eq!(AssetData::decode(&[0x01]), Err(AssetDataError::TooShort(1)));
	}

	#[test]
	fn test_length_and_tag_must_agree() {
		// ERC20 tag followed by trailing garbage
		let mut data = AssetData::erc20(Address::repeat_byte(1)).encode().to_vec();
		data.extend_from_slice(&[0u8; 32]);
		assert!(AssetData::decode(&data).is_err());

		// ERC721 tag in front of an ERC20-sized payload
		let mut data = AssetData::erc20(Address::repeat_byte(1)).encode().to_vec();
		data[..4].copy_from_slice(&ProxyId::Erc721.selector());
		assert!(AssetData::decode(&data).is_err());
	}

	#[test]
	fn test_dirty_address_padding_rejected() {
		let mut data = AssetData::erc20(Address::repeat_byte(1)).encode().to_vec();
		data[4] = 0x01;
		assert!(AssetData::decode(&data).is_err());
	}
}
