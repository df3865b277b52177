use anyhow::{anyhow, Result};
use redis::aio::MultiplexedConnection;
use std::future::Future;
use std::time::Duration;

/// 建立 Redis 多路复用连接，会话存储与限流器可共享同一连接
pub async fn connect(redis_url: &str) -> Result<MultiplexedConnection> {
    let client = redis::Client::open(redis_url)?;
    let conn = client.get_multiplexed_async_connection().await?;
    Ok(conn)
}

pub(crate) async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = redis::RedisResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(anyhow!("redis operation timed out after {:?}", timeout)),
    }
}
