mod discord;
mod target;

pub use discord::DiscordGuilds;
pub use target::{apply, FanoutReport, NicknameTarget, TargetDirectory, TargetError, TargetReport};

#[cfg(test)]
pub(crate) use target::testing;
