//! # Command Grammar
//!
//! Parses the comma-prefixed command lines (`,add coolname`) understood by the
//! frontends. Parsing only; execution goes through `core::requests`.

/// Prefix every command line starts with.
pub const COMMAND_PREFIX: char = ',';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add { name: String },
    Remove { name: String },
    List,
    AutoClaim { name: String, target_scope_id: String },
    RemoveAutoClaim { name: String },
    ListAutoClaims,
    Help,
}

/// A known command with missing arguments. The `Display` text is the usage line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("Usage: `,add <vanity_url>`")]
    Add,
    #[error("Usage: `,remove <vanity_url>`")]
    Remove,
    #[error("Usage: `,autoswap <vanity_url> <target_guild_id>`\nExample: `,autoswap cool-server 123456789012345678`")]
    AutoClaim,
    #[error("Usage: `,removeautoswap <vanity_url>`")]
    RemoveAutoClaim,
}

impl Command {
    /// Parses one line.
    ///
    /// Returns `None` for lines without the prefix and for unknown commands,
    /// which frontends ignore.
    pub fn parse(line: &str) -> Option<Result<Self, UsageError>> {
        let rest = line.trim_start().strip_prefix(COMMAND_PREFIX)?;
        let mut args = rest.split_whitespace();
        let command = args.next()?.to_lowercase();
        let mut arg = || args.next().map(str::to_string);

        let parsed = match command.as_str() {
            "add" => arg().map(|name| Self::Add { name }).ok_or(UsageError::Add),
            "remove" => arg().map(|name| Self::Remove { name }).ok_or(UsageError::Remove),
            "list" => Ok(Self::List),
            "autoswap" => match (arg(), arg()) {
                (Some(name), Some(target_scope_id)) => Ok(Self::AutoClaim { name, target_scope_id }),
                _ => Err(UsageError::AutoClaim),
            },
            "removeautoswap" => arg().map(|name| Self::RemoveAutoClaim { name }).ok_or(UsageError::RemoveAutoClaim),
            "listautoswap" => Ok(Self::ListAutoClaims),
            "help" => Ok(Self::Help),
            _ => return None,
        };
        Some(parsed)
    }
}

/// Help text listing every command.
pub const HELP_TEXT: &str = "\
,add <vanity_url> - Monitor a vanity URL
,remove <vanity_url> - Stop monitoring a vanity URL
,list - List your monitored vanities
,autoswap <vanity_url> <guild_id> - Auto-claim a vanity for a server
,removeautoswap <vanity_url> - Remove an auto swap
,listautoswap - List your auto swaps
,help - Show this help message";
