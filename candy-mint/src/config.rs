//! Configuration for the minter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::address::Address;
use crate::confirmation::PollPolicy;
use crate::orchestrator::OrchestratorSettings;
use crate::transaction::parse_amount;

/// Minter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintConfig {
    /// Sale program (candy machine) id
    pub program_id: Address,

    /// Sale config account
    pub config: Address,

    /// Treasury receiving mint payments
    pub treasury: Address,

    /// RPC endpoints to connect to (with failover support)
    #[serde(default = "default_rpc_endpoints")]
    pub rpc_endpoints: Vec<String>,

    /// Overrides the program's go-live date (quoted RFC 3339)
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,

    /// Confirmation window per transaction in milliseconds
    #[serde(default = "default_tx_timeout")]
    pub tx_timeout_ms: u64,

    /// First status poll interval in milliseconds
    #[serde(default = "default_poll_initial_interval")]
    pub poll_initial_interval_ms: u64,

    /// Status poll interval ceiling in milliseconds
    #[serde(default = "default_poll_max_interval")]
    pub poll_max_interval_ms: u64,

    /// Balance poll interval after a batch, in milliseconds
    #[serde(default = "default_balance_poll_interval")]
    pub balance_poll_interval_ms: u64,

    /// How long to wait for the balance to settle after a batch
    #[serde(default = "default_balance_settle_timeout")]
    pub balance_settle_timeout_ms: u64,

    /// HTTP timeout per RPC request in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Expected spend per mint in SOL (e.g. "0.1"); defaults to the sale price
    pub estimated_cost_per_item: Option<String>,

    /// Supply cap of the current sale phase
    pub phase_cap: Option<u64>,

    /// Keypair file (JSON array of bytes)
    pub keypair_path: Option<PathBuf>,
}

fn default_rpc_endpoints() -> Vec<String> {
    vec!["https://api.devnet.solana.com".to_string()]
}

fn default_tx_timeout() -> u64 {
    30_000
}

fn default_poll_initial_interval() -> u64 {
    500
}

fn default_poll_max_interval() -> u64 {
    2_000
}

fn default_balance_poll_interval() -> u64 {
    1_000
}

fn default_balance_settle_timeout() -> u64 {
    60_000
}

fn default_request_timeout() -> u64 {
    30
}

impl MintConfig {
    /// Config for a sale with every other field at its default
    pub fn new(program_id: Address, config: Address, treasury: Address) -> Self {
        Self {
            program_id,
            config,
            treasury,
            rpc_endpoints: default_rpc_endpoints(),
            start_time: None,
            tx_timeout_ms: default_tx_timeout(),
            poll_initial_interval_ms: default_poll_initial_interval(),
            poll_max_interval_ms: default_poll_max_interval(),
            balance_poll_interval_ms: default_balance_poll_interval(),
            balance_settle_timeout_ms: default_balance_settle_timeout(),
            request_timeout_secs: default_request_timeout(),
            estimated_cost_per_item: None,
            phase_cap: None,
            keypair_path: None,
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MintConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rpc_endpoints.is_empty() {
            anyhow::bail!("At least one RPC endpoint must be specified");
        }
        for endpoint in &self.rpc_endpoints {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                anyhow::bail!("RPC endpoint must be an http(s) URL: {}", endpoint);
            }
        }

        if self.tx_timeout_ms == 0 {
            anyhow::bail!("tx_timeout_ms must be greater than zero");
        }
        if self.poll_initial_interval_ms == 0 {
            anyhow::bail!("poll_initial_interval_ms must be greater than zero");
        }
        if self.poll_max_interval_ms < self.poll_initial_interval_ms {
            anyhow::bail!("poll_max_interval_ms must be >= poll_initial_interval_ms");
        }
        if self.balance_poll_interval_ms == 0 {
            anyhow::bail!("balance_poll_interval_ms must be greater than zero");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than zero");
        }

        if let Some(cost) = &self.estimated_cost_per_item {
            parse_amount(cost)
                .map_err(|e| anyhow::anyhow!("estimated_cost_per_item is invalid: {}", e))?;
        }

        if self.phase_cap == Some(0) {
            anyhow::bail!("phase_cap must be greater than zero");
        }

        if self.tx_timeout_ms < self.poll_initial_interval_ms {
            tracing::warn!(
                "tx_timeout_ms ({}) is shorter than one poll interval; mints will rarely confirm",
                self.tx_timeout_ms
            );
        }

        Ok(())
    }

    /// Keypair file, falling back to `~/.config/solana/id.json`
    pub fn keypair_path(&self) -> Option<PathBuf> {
        self.keypair_path.clone().or_else(|| {
            dirs::home_dir().map(|home| home.join(".config").join("solana").join("id.json"))
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Typed settings for the orchestrator
    pub fn orchestrator_settings(&self) -> anyhow::Result<OrchestratorSettings> {
        let estimated_cost_per_item = self
            .estimated_cost_per_item
            .as_deref()
            .map(parse_amount)
            .transpose()?;

        Ok(OrchestratorSettings {
            program_id: self.program_id,
            config: self.config,
            treasury: self.treasury,
            start_time_override: self.start_time,
            tx_timeout: Duration::from_millis(self.tx_timeout_ms),
            poll_policy: PollPolicy {
                initial_interval: Duration::from_millis(self.poll_initial_interval_ms),
                max_interval: Duration::from_millis(self.poll_max_interval_ms),
                backoff_factor: 2,
            },
            balance_poll_interval: Duration::from_millis(self.balance_poll_interval_ms),
            balance_settle_timeout: Duration::from_millis(self.balance_settle_timeout_ms),
            estimated_cost_per_item,
        })
    }
}
