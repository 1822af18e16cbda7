use std::net::SocketAddr;

use serde::Serialize;

use crate::{
    error::{Error, Result},
    news_db::NewsDb,
};

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const BIND_ENV_VAR: &str = "NEWSPORTAL_BIND";
/// Settings key under which `config set-bind` persists the address.
pub const BIND_ADDR_SETTING: &str = "bind_addr";

/// Where the resolved bind address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BindSource {
    Flag,
    Env,
    Stored,
    Default,
}

impl std::fmt::Display for BindSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Flag => "--bind",
            Self::Env => BIND_ENV_VAR,
            Self::Stored => "stored setting",
            Self::Default => "default",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub source: BindSource,
}

impl ServerConfig {
    /// Resolve the bind address from, in order of priority:
    /// 1. An explicit address (from --bind)
    /// 2. The NEWSPORTAL_BIND environment variable
    /// 3. The `bind_addr` setting stored in the news database
    /// 4. 127.0.0.1:3000
    pub fn resolve(explicit: Option<&str>, db: &NewsDb) -> Result<Self> {
        let env = std::env::var(BIND_ENV_VAR).ok();
        let stored = db.get_setting(BIND_ADDR_SETTING)?;
        Self::from_layers(explicit, env.as_deref(), stored.as_deref())
    }

    fn from_layers(
        explicit: Option<&str>,
        env: Option<&str>,
        stored: Option<&str>,
    ) -> Result<Self> {
        let (raw, source) = if let Some(addr) = explicit {
            (addr, BindSource::Flag)
        } else if let Some(addr) = env.filter(|a| !a.trim().is_empty()) {
            (addr, BindSource::Env)
        } else if let Some(addr) = stored {
            (addr, BindSource::Stored)
        } else {
            (DEFAULT_BIND, BindSource::Default)
        };

        Ok(Self {
            bind: parse_bind(raw)?,
            source,
        })
    }
}

/// Parse a `host:port` socket address.
pub fn parse_bind(raw: &str) -> Result<SocketAddr> {
    raw.trim().parse().map_err(|e| {
        Error::Config(format!("invalid bind address '{raw}': {e}"))
    })
}
