//! Point-in-time snapshot of balances and allowances.

use alloy_primitives::{Address, Bytes, U256};
use oracle_assets::{AssetError, AssetRouter};
use oracle_types::AssetData;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
	Balance,
	/// Allowance towards the asset's proxy.
	Allowance,
}

/// One balance or allowance of one account in one asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
	pub asset_data: Bytes,
	pub account: Address,
	pub kind: StateKind,
}

impl StateKey {
	pub fn balance(asset_data: &Bytes, account: Address) -> Self {
		Self {
			asset_data: asset_data.clone(),
			account,
			kind: StateKind::Balance,
		}
	}

	pub fn allowance(asset_data: &Bytes, account: Address) -> Self {
		Self {
			asset_data: asset_data.clone(),
			account,
			kind: StateKind::Allowance,
		}
	}
}

impl fmt::Display for StateKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let kind = match self.kind {
			StateKind::Balance => "balance",
			StateKind::Allowance => "allowance",
		};
		match AssetData::decode(&self.asset_data) {
			Ok(asset) => write!(f, "{} of {} in {}", kind, self.account, asset),
			Err(_) => write!(f, "{} of {} in {:?}", kind, self.account, self.asset_data),
		}
	}
}

/// Values are fetched through the router on first access and never
/// refreshed afterwards; later changes to live state are not observed.
#[derive(Clone)]
pub struct LazyStateStore<'a> {
	router: &'a AssetRouter,
	cache: HashMap<StateKey, U256>,
}

impl<'a> LazyStateStore<'a> {
	pub fn new(router: &'a AssetRouter) -> Self {
		Self {
			router,
			cache: HashMap::new(),
		}
	}

	pub async fn get(&mut self, key: &StateKey) -> Result<U256, AssetError> {
		if let Some(value) = self.cache.get(key) {
			return Ok(*value);
		}
		let value = match key.kind {
			StateKind::Balance => self.router.balance(key.account, &key.asset_data).await?,
			StateKind::Allowance => self.router.allowance(key.account, &key.asset_data).await?,
		};
		self.cache.insert(key.clone(), value);
		Ok(value)
	}

	pub async fn get_balance(
		&mut self,
		asset_data: &Bytes,
		account: Address,
	) -> Result<U256, AssetError> {
		self.get(&StateKey::balance(asset_data, account)).await
	}

	pub async fn get_allowance(
		&mut self,
		asset_data: &Bytes,
		account: Address,
	) -> Result<U256, AssetError> {
		self.get(&StateKey::allowance(asset_data, account)).await
	}

	/// Cached value without touching the router.
	pub fn cached(&self, key: &StateKey) -> Option<U256> {
		self.cache.get(key).copied()
	}

	/// Overwrites a cached entry.
	pub fn set(&mut self, key: StateKey, value: U256) {
		self.cache.insert(key, value);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use oracle_assets::AssetAdapter;
	use oracle_types::ProxyId;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	/// Adapter whose balance grows on every read.
	struct CountingAdapter {
		proxy_id: ProxyId,
		reads: Arc<AtomicUsize>,
	}

	#[async_trait]
	impl AssetAdapter for CountingAdapter {
		fn proxy_id(&self) -> ProxyId {
			self.proxy_id
		}

		async fn balance(&self, _owner: Address, _asset: &AssetData) -> Result<U256, AssetError> {
			let reads = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
			Ok(U256::from(reads * 100))
		}

		async fn set_balance(&self, _: Address, _: &AssetData, _: U256) -> Result<(), AssetError> {
			Ok(())
		}

		async fn allowance(&self, _owner: Address, _asset: &AssetData) -> Result<U256, AssetError> {
			self.reads.fetch_add(1, Ordering::SeqCst);
			Ok(U256::from(7))
		}

		async fn set_allowance(
			&self,
			_: Address,
			_: &AssetData,
			_: U256,
		) -> Result<(), AssetError> {
			Ok(())
		}
	}

	fn router(reads: &Arc<AtomicUsize>) -> AssetRouter {
		AssetRouter::new(
			Box::new(CountingAdapter {
				proxy_id: ProxyId::Erc20,
				reads: reads.clone(),
			}),
			Box::new(CountingAdapter {
				proxy_id: ProxyId::Erc721,
				reads: reads.clone(),
			}),
		)
		.unwrap()
	}

	#[tokio::test]
	async fn test_second_read_served_from_cache() {
		let reads = Arc::new(AtomicUsize::new(0));
		let router = router(&reads);
		let mut store = LazyStateStore::new(&router);
		let asset = AssetData::erc20(Address::repeat_byte(0x20)).encode();
		let owner = Address::repeat_byte(1);

		let first = store.get_balance(&asset, owner).await.unwrap();
		let second = store.get_balance(&asset, owner).await.unwrap();
		assert_eq!(first, U256::from(100));
		assert_eq!(first, second);
		assert_eq!(reads.load(Ordering::SeqCst), 1);

		// live state has moved on, the snapshot has not
		assert_eq!(router.balance(owner, &asset).await.unwrap(), U256::from(200));
		assert_eq!(store.get_balance(&asset, owner).await.unwrap(), first);
	}

	#[tokio::test]
	async fn test_balance_and_allowance_cached_separately() {
		let reads = Arc::new(AtomicUsize::new(0));
		let router = router(&reads);
		let mut store = LazyStateStore::new(&router);
		let asset = AssetData::erc20(Address::repeat_byte(0x20)).encode();
		let owner = Address::repeat_byte(1);

		store.get_balance(&asset, owner).await.unwrap();
		assert_eq!(
			store.get_allowance(&asset, owner).await.unwrap(),
			U256::from(7)
		);
		store
			.get_balance(&asset, Address::repeat_byte(2))
			.await
			.unwrap();
		assert_eq!(reads.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn test_set_overrides_without_query() {
		let reads = Arc::new(AtomicUsize::new(0));
		let router = router(&reads);
		let mut store = LazyStateStore::new(&router);
		let asset = AssetData::erc20(Address::repeat_byte(0x20)).encode();
		let key = StateKey::balance(&asset, Address::repeat_byte(1));

		store.set(key.clone(), U256::from(5));
		assert_eq!(store.get(&key).await.unwrap(), U256::from(5));
		assert_eq!(reads.load(Ordering::SeqCst), 0);

		// copies diverge independently
		let mut copy = store.clone();
		copy.set(key.clone(), U256::from(6));
		assert_eq!(store.cached(&key), Some(U256::from(5)));
	}
}
