use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, ValueEnum};
use reqwest::Url;

use crate::render::Layout;

pub const DEFAULT_BASE_URL: &str = "https://api.monkeytype.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Public profile, addressed by handle or by UID.
    Profile { user: String, is_uid: bool },
    /// Raw result list of the account owning the api key.
    Results { limit: Option<u32> },
    /// Per-day counts of the account owning the api key.
    TestActivity,
}

impl Endpoint {
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Profile { .. } => "profile",
            Endpoint::Results { .. } => "results",
            Endpoint::TestActivity => "activity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EndpointKind {
    Profile,
    Results,
    Activity,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: Url,
    pub api_key: Option<String>,
    pub endpoint: Endpoint,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Args)]
pub struct ApiArgs {
    /// Base url of the Monkeytype api
    #[arg(long, env = "MONKEYTYPE_API_URL", default_value = DEFAULT_BASE_URL)]
    pub api_url: String,
    /// ApeKey used for the Authorization header
    #[arg(long, env = "MONKEYTYPE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    /// Which api endpoint to read activity from
    #[arg(long, value_enum, default_value_t = EndpointKind::Profile)]
    pub endpoint: EndpointKind,
    /// Handle (or UID with --uid) for the profile endpoint
    #[arg(long, env = "MONKEYTYPE_USER")]
    pub user: Option<String>,
    /// Treat --user as a UID instead of a handle
    #[arg(long)]
    pub uid: bool,
    /// Maximum number of results for the results endpoint
    #[arg(long)]
    pub limit: Option<u32>,
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,
}

impl ApiArgs {
    pub fn into_config(self) -> anyhow::Result<FetchConfig> {
        let base_url = Url::parse(&self.api_url)
            .with_context(|| format!("invalid api url {:?}", self.api_url))?;
        if base_url.cannot_be_a_base() {
            bail!("api url {} cannot carry a path", base_url);
        }

        let endpoint = match self.endpoint {
            EndpointKind::Profile => {
                let user = self
                    .user
                    .filter(|user| !user.trim().is_empty())
                    .context("the profile endpoint needs --user or MONKEYTYPE_USER")?;
                Endpoint::Profile {
                    user: user.trim().to_string(),
                    is_uid: self.uid,
                }
            }
            EndpointKind::Results => Endpoint::Results { limit: self.limit },
            EndpointKind::Activity => Endpoint::TestActivity,
        };

        let api_key = self
            .api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Ok(FetchConfig {
            base_url,
            api_key,
            endpoint,
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
        })
    }
}

#[derive(Debug, Clone, Args)]
pub struct RenderArgs {
    #[arg(long, default_value = "monkeytype-heatmap.svg")]
    pub out: PathBuf,
    /// Number of week columns to draw
    #[arg(long, default_value_t = 52, value_parser = clap::value_parser!(u32).range(1..=520))]
    pub weeks: u32,
    #[arg(long, default_value_t = 12, value_parser = clap::value_parser!(u32).range(1..=64))]
    pub cell_size: u32,
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(0..=32))]
    pub gap: u32,
}

impl RenderArgs {
    pub fn layout(&self) -> Layout {
        Layout {
            weeks: self.weeks,
            cell_size: self.cell_size,
            gap: self.gap,
        }
    }
}
