use redis::aio::ConnectionManager;
use redis::{Client, RedisResult};

use crate::config::Config;

#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
    prefix: String,
}

impl Cache {
    pub async fn new(config: &Config) -> RedisResult<Self> {
        let client = Client::open(config.redis_url())?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            prefix: config.redis.key_prefix.clone(),
        })
    }

    fn key(&self, k: &str) -> String {
        format!("{}{}", self.prefix, k)
    }

    /// Counts one hit against a fixed window and returns the hit count so far.
    ///
    /// The window key is created with its expiry and incremented inside one
    /// MULTI/EXEC, so concurrent callers never lose an increment and the
    /// expiry is only set when the window opens.
    pub async fn hit_window(&self, key: &str, window_secs: u64) -> RedisResult<u64> {
        let mut conn = self.conn.clone();
        let k = self.key(key);
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(&k)
            .arg(0)
            .arg("EX")
            .arg(window_secs)
            .arg("NX")
            .ignore()
            .cmd("INCR")
            .arg(&k)
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    pub async fn health_check(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .is_ok()
    }
}
