//! Local operator console: executes `,command` lines against the registries
//! and renders plain-text replies.

use lib_vanity::core::commands::{Command, HELP_TEXT};
use lib_vanity::core::requests::{self, RequestContext, RequestHandler, RequestRejection};
use lib_vanity::core::scheduler::Registries;
use lib_vanity::remote::availability::AvailabilityCheck;
use lib_vanity::remote::scopes::ScopeDirectory;

pub struct Console<A, S> {
    handler: RequestHandler<A, S>,
    ctx: RequestContext,
}

impl<A, S> Console<A, S>
where
    A: AvailabilityCheck,
    S: ScopeDirectory,
{
    pub fn new(handler: RequestHandler<A, S>, ctx: RequestContext) -> Self {
        Self { handler, ctx }
    }

    /// Runs one input line. `None` means the line was not a command.
    pub async fn execute(&self, registries: &mut Registries, line: &str) -> Option<String> {
        let command = match Command::parse(line)? {
            Ok(command) => command,
            Err(usage) => return Some(usage.to_string()),
        };
        log::debug!("Console command from {}: {:?}", self.ctx.requester_id, command);

        let reply = match command {
            Command::Add { name } => match self.handler.add_watch(&mut registries.watches, &self.ctx, &name).await {
                Ok(entry) => format!("Now monitoring **{}** for availability", entry.resource_name),
                Err(rejection) => rejection.to_string(),
            },
            Command::Remove { name } => match requests::remove_watch(&mut registries.watches, &self.ctx, &name) {
                Ok(entry) => format!("Stopped monitoring **{}**", entry.resource_name),
                Err(rejection) => rejection.to_string(),
            },
            Command::List => {
                let entries = requests::list_watches(&registries.watches, &self.ctx);
                if entries.is_empty() {
                    "You don't have any vanities monitored in this server. Use `,add <vanity>` to add one.".to_string()
                } else {
                    let lines: Vec<String> = entries.iter().map(|e| format!("• **{}**", e.resource_name)).collect();
                    format!("Your Monitored Vanities\n{}\nTotal: {} in this server", lines.join("\n"), entries.len())
                }
            }
            Command::AutoClaim { name, target_scope_id } => {
                match self
                    .handler
                    .add_autoclaim(&mut registries.autoclaims, &self.ctx, &name, &target_scope_id)
                    .await
                {
                    Ok(entry) => format!(
                        "Auto swap configured for **{name}** (discord.gg/{name} -> {label}). Will automatically claim when available.",
                        name = entry.watch.resource_name,
                        label = entry.target_scope_label
                    ),
                    Err(RequestRejection::AlreadyWatching(name)) => {
                        format!("You already have auto swap enabled for vanity: **{name}**")
                    }
                    Err(rejection) => rejection.to_string(),
                }
            }
            Command::RemoveAutoClaim { name } => {
                match requests::remove_autoclaim(&mut registries.autoclaims, &self.ctx, &name) {
                    Ok(entry) => format!("Stopped auto swap for **{}**", entry.watch.resource_name),
                    Err(RequestRejection::NotWatching(name)) => {
                        format!("You don't have auto swap enabled for: **{name}**")
                    }
                    Err(rejection) => rejection.to_string(),
                }
            }
            Command::ListAutoClaims => {
                let entries = requests::list_autoclaims(&registries.autoclaims, &self.ctx);
                if entries.is_empty() {
                    "You don't have any auto swaps configured in this server. Use `,autoswap <vanity> <guild_id>` to set one up."
                        .to_string()
                } else {
                    let lines: Vec<String> = entries
                        .iter()
                        .map(|e| format!("• **{}** → {}", e.watch.resource_name, e.target_scope_label))
                        .collect();
                    let plural = if entries.len() == 1 { "" } else { "s" };
                    format!(
                        "Your Auto Swap Configuration\n{}\nTotal: {} auto swap{} in this server",
                        lines.join("\n"),
                        entries.len(),
                        plural
                    )
                }
            }
            Command::Help => format!("Vanity Monitor Bot Commands\n{HELP_TEXT}"),
        };
        Some(reply)
    }
}
