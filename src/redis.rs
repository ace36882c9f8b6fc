use fred::pool::RedisPool;
use fred::prelude::*;

use crate::prelude::*;

pub async fn open(uri: &str) -> Result<RedisPool> {
    let config = RedisConfig::from_url(uri).context("failed to parse the Redis URI")?;
    let pool = RedisPool::new(config, 5)?;
    let _ = pool.connect(Some(ReconnectPolicy::default()));
    pool.wait_for_connect()
        .await
        .context("failed to connect to Redis")?;
    Ok(pool)
}
