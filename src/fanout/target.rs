use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use thiserror::Error;

/// One place where the bot's own nickname can be set.
#[async_trait]
pub trait NicknameTarget: Sync + Send {
    fn name(&self) -> String;

    /// Whether the bot currently has a membership record here.
    async fn resolve_member(&self) -> Result<bool, TargetError>;

    async fn set_nickname(&self, label: &str) -> Result<(), TargetError>;
}

/// Hands out the current targets. Called once per fanout; membership can
/// change between ticks so nothing is cached.
#[async_trait]
pub trait TargetDirectory: Sync + Send {
    async fn targets(&self) -> Result<Vec<Box<dyn NicknameTarget>>>;
}

#[async_trait]
impl<T: TargetDirectory + ?Sized> TargetDirectory for Arc<T> {
    async fn targets(&self) -> Result<Vec<Box<dyn NicknameTarget>>> {
        (**self).targets().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("bot is not a member")]
    MemberMissing,
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("transient platform error: {0}")]
    Transient(String),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug)]
pub struct TargetReport {
    pub target: String,
    pub result: Result<(), TargetError>,
}

#[derive(Debug, Default)]
pub struct FanoutReport {
    pub targets: Vec<TargetReport>,
}

impl FanoutReport {
    pub fn updated(&self) -> usize {
        self.targets.iter().filter(|t| t.result.is_ok()).count()
    }

    pub fn total(&self) -> usize {
        self.targets.len()
    }

    pub fn all_failed(&self) -> bool {
        self.total() > 0 && self.updated() == 0
    }

    /// Names of the targets whose nickname was left unchanged.
    pub fn failed_targets(&self) -> Vec<&str> {
        self.targets
            .iter()
            .filter(|t| t.result.is_err())
            .map(|t| t.target.as_str())
            .collect()
    }
}

/// Sets `label` on every target in turn. A failing target is logged and
/// recorded; it never stops the remaining ones.
pub async fn apply(label: &str, targets: &[Box<dyn NicknameTarget>]) -> FanoutReport {
    let mut report = FanoutReport {
        targets: Vec::with_capacity(targets.len()),
    };
    for target in targets {
        let name = target.name();
        let result = match target.resolve_member().await {
            Ok(true) => target.set_nickname(label).await,
            Ok(false) => Err(TargetError::MemberMissing),
            Err(e) => Err(e),
        };
        match &result {
            Ok(()) => debug!("Updated nickname in guild: {}", name),
            Err(TargetError::MemberMissing) => {
                warn!("Bot not found as member in guild: {}", name)
            }
            Err(TargetError::PermissionDenied(_)) => {
                warn!("No permission to change nickname in guild: {}", name)
            }
            Err(TargetError::Transient(e)) => {
                error!("HTTP error updating nickname in guild {}: {}", name, e)
            }
            Err(TargetError::Other(e)) => {
                error!("Unexpected error updating nickname in guild {}: {}", name, e)
            }
        }
        report.targets.push(TargetReport {
            target: name,
            result,
        });
    }
    info!(
        "Updated nickname in {}/{} guilds",
        report.updated(),
        report.total()
    );
    let failed = report.failed_targets();
    if !failed.is_empty() {
        info!("Nickname unchanged in: {}", failed.join(", "));
    }
    report
}
