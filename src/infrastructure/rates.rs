use crate::domain::ports::RateSource;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Rate configuration held in memory, seeded from the config file and
/// adjustable at runtime.
#[derive(Default, Clone)]
pub struct StaticRates {
    rates: Arc<RwLock<HashMap<String, String>>>,
}

impl StaticRates {
    pub fn new(rates: HashMap<String, String>) -> Self {
        Self {
            rates: Arc::new(RwLock::new(rates)),
        }
    }

    pub async fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.rates.write().await.insert(key.into(), value.into());
    }
}

#[async_trait]
impl RateSource for StaticRates {
    async fn rate(&self, key: &str) -> Option<String> {
        self.rates.read().await.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fees::{RateCard, SEND_MONEY_FEE};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_runtime_update_is_seen_by_next_fetch() {
        let rates = StaticRates::default();
        assert_eq!(RateCard::fetch(&rates).await.send_money_fee(), dec!(5.00));

        rates.set(SEND_MONEY_FEE, "2.25").await;
        assert_eq!(RateCard::fetch(&rates).await.send_money_fee(), dec!(2.25));
    }
}
