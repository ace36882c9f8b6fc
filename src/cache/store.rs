use async_trait::async_trait;
use fred::pool::RedisPool;
use fred::prelude::*;

use crate::prelude::*;

/// Key/value blob storage behind the freshness layer.
#[async_trait]
pub trait Store: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn write(&self, key: &str, value: Vec<u8>) -> Result;

    async fn remove(&self, key: &str) -> Result;
}

#[async_trait]
impl Store for RedisPool {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.get::<Option<Vec<u8>>, _>(key).await?)
    }

    async fn write(&self, key: &str, value: Vec<u8>) -> Result {
        let _: () = self.set(key, value.as_slice(), None, None, false).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result {
        let _: u64 = self.del(key).await?;
        Ok(())
    }
}

#[cfg(test)]
pub use self::tests::MemoryStore;
