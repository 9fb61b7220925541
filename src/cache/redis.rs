//! External Redis store, connected per operation

use redis::aio::MultiplexedConnection;
use redis::{Cmd, ErrorKind, FromRedisValue, RedisError, RedisResult};
use std::time::Duration;
use url::Url;

/// Connection parameters for the external store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    /// Connect with TLS (`rediss://`), e.g. for ElastiCache in-transit encryption
    pub ssl: bool,
    /// Recognized but unsupported; treated as unavailable
    pub cluster_mode: bool,
    pub db: i64,
    /// Bound on the connection handshake
    pub connect_timeout: Duration,
    /// Bound on each command, `PING` included
    pub command_timeout: Duration,
}

impl RedisSettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            password: None,
            ssl: false,
            cluster_mode: false,
            db: 0,
            connect_timeout: Duration::from_secs(2),
            command_timeout: Duration::from_secs(2),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connection URL; the password is percent-encoded
    pub fn connection_url(&self) -> RedisResult<Url> {
        let scheme = if self.ssl { "rediss" } else { "redis" };
        let mut url = Url::parse(&format!("{scheme}://{}/{}", self.address(), self.db))
            .map_err(|e| invalid(format!("invalid redis address {}: {e}", self.address())))?;

        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            url.set_password(Some(password))
                .map_err(|_| invalid("cannot set redis password".to_string()))?;
        }

        Ok(url)
    }
}

fn invalid(detail: String) -> RedisError {
    RedisError::from((ErrorKind::InvalidClientConfig, "invalid redis settings", detail))
}

/// Thin async wrapper over one Redis instance.
///
/// No pooled handle is kept: every call opens a connection, so a store that
/// comes and goes is picked up again without restarting the process.
#[derive(Debug, Clone)]
pub struct RedisStore {
    settings: RedisSettings,
}

impl RedisStore {
    pub fn new(settings: RedisSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RedisSettings {
        &self.settings
    }

    async fn connect(&self) -> RedisResult<MultiplexedConnection> {
        if self.settings.cluster_mode {
            return Err(RedisError::from((
                ErrorKind::InvalidClientConfig,
                "cluster mode is not supported",
            )));
        }

        let client = redis::Client::open(self.settings.connection_url()?.as_str())?;
        let mut conn = tokio::time::timeout(
            self.settings.connect_timeout,
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| RedisError::from((ErrorKind::IoError, "redis connect timed out")))??;

        let _: String = self.run(&redis::cmd("PING"), &mut conn).await?;
        tracing::trace!(address = %self.settings.address(), "Connected to redis");
        Ok(conn)
    }

    async fn run<T: FromRedisValue>(&self, cmd: &Cmd, conn: &mut MultiplexedConnection) -> RedisResult<T> {
        tokio::time::timeout(self.settings.command_timeout, cmd.query_async(conn))
            .await
            .map_err(|_| RedisError::from((ErrorKind::IoError, "redis command timed out")))?
    }

    pub async fn get(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.connect().await?;
        self.run(redis::cmd("GET").arg(key), &mut conn).await
    }

    /// `ttl = None` stores without expiry
    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> RedisResult<()> {
        let mut conn = self.connect().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        self.run(&cmd, &mut conn).await
    }

    pub async fn delete(&self, key: &str) -> RedisResult<()> {
        let mut conn = self.connect().await?;
        self.run(redis::cmd("DEL").arg(key), &mut conn).await
    }
}
