// Text commands.
// Every command is one `CommandSpec` in the table below; handlers live in the
// per-tier files.

pub mod admin;
pub mod general;
pub mod owner;

use crate::bot::Data;
use crate::core::authorization::Role;
use crate::core::messaging::{InboundMessage, MessagingError};
use crate::core::state::PolicyFlag;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Wrong arguments")]
    Usage,

    #[error("{0}")]
    Invalid(String),

    #[error("Gateway error: {0}")]
    Messaging(#[from] MessagingError),
}

pub type CommandResult = Result<(), CommandError>;
pub type CommandFuture<'a> = Pin<Box<dyn Future<Output = CommandResult> + Send + 'a>>;
pub type CommandHandler = for<'a> fn(&'a Data, &'a Invocation) -> CommandFuture<'a>;

pub struct CommandSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub tier: Role,
    pub group_only: bool,
    /// Arguments part of the usage line, e.g. `@user [reason]`.
    pub usage: &'static str,
    pub summary: &'static str,
    pub needs_args: bool,
    pub handler: CommandHandler,
}

impl CommandSpec {
    pub fn matches(&self, name: &str) -> bool {
        self.name == name || self.aliases.contains(&name)
    }

    pub fn usage_line(&self, prefix: &str) -> String {
        if self.usage.is_empty() {
            format!("{}{}", prefix, self.name)
        } else {
            format!("{}{} {}", prefix, self.name, self.usage)
        }
    }
}

/// A command after prefix stripping and authorization.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub message: InboundMessage,
    pub role: Role,
    pub name: String,
    pub args: String,
    pub prefix: String,
}

impl Invocation {
    pub fn chat(&self) -> &str {
        &self.message.chat_id
    }

    pub fn sender(&self) -> &str {
        &self.message.sender
    }

    pub fn target(&self) -> Option<&str> {
        self.message.target()
    }

    /// Argument text with `@mention` tokens dropped.
    pub fn text_without_mentions(&self) -> String {
        self.args
            .split_whitespace()
            .filter(|token| !token.starts_with('@'))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: String,
}

/// Split `<prefix><name> <args...>`. The name is lowercased; args are re-joined with
/// single spaces.
pub fn parse_command(text: &str, prefix: &str) -> Option<ParsedCommand> {
    let rest = text.trim_start().strip_prefix(prefix)?;
    let mut tokens = rest.split_whitespace();
    let name = tokens.next()?.to_lowercase();
    let args = tokens.collect::<Vec<_>>().join(" ");
    Some(ParsedCommand { name, args })
}

// ============================================================================
// REGISTRY
// ============================================================================

pub static COMMANDS: &[CommandSpec] = &[
    // --- owner ---
    CommandSpec {
        name: "rent",
        aliases: &["aluguel", "add_contrat"],
        tier: Role::Owner,
        group_only: false,
        usage: "group_id|group name|owner number|plan|value[|owner name]",
        summary: "Register a group rental",
        needs_args: true,
        handler: |d, i| Box::pin(owner::rent(d, i)),
    },
    CommandSpec {
        name: "rentals",
        aliases: &["verificar_aluguel"],
        tier: Role::Owner,
        group_only: false,
        usage: "",
        summary: "List rentals",
        needs_args: false,
        handler: |d, i| Box::pin(owner::rentals(d, i)),
    },
    CommandSpec {
        name: "rentbroadcast",
        aliases: &["bcaluguel"],
        tier: Role::Owner,
        group_only: false,
        usage: "<text>",
        summary: "Message every rented group",
        needs_args: true,
        handler: |d, i| Box::pin(owner::rent_broadcast(d, i)),
    },
    CommandSpec {
        name: "rentcancel",
        aliases: &["cancelar_aluguel"],
        tier: Role::Owner,
        group_only: false,
        usage: "<number>",
        summary: "Deactivate a rental",
        needs_args: true,
        handler: |d, i| Box::pin(owner::rent_cancel(d, i)),
    },
    CommandSpec {
        name: "blacklist",
        aliases: &["listanegra"],
        tier: Role::Owner,
        group_only: false,
        usage: "[number]",
        summary: "Show the blacklist or add a number",
        needs_args: false,
        handler: |d, i| Box::pin(owner::blacklist(d, i)),
    },
    CommandSpec {
        name: "unblacklist",
        aliases: &["tirardalista"],
        tier: Role::Owner,
        group_only: false,
        usage: "<number>",
        summary: "Remove a number from the blacklist",
        needs_args: false,
        handler: |d, i| Box::pin(owner::unblacklist(d, i)),
    },
    CommandSpec {
        name: "role",
        aliases: &["cargo"],
        tier: Role::Owner,
        group_only: true,
        usage: "@user admin|moderator|assistant|member",
        summary: "Assign a group role",
        needs_args: true,
        handler: |d, i| Box::pin(owner::set_role(d, i)),
    },
    // --- admin: warnings and members ---
    CommandSpec {
        name: "warn",
        aliases: &["advertir", "adverter"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "@user [reason]",
        summary: "Warn a member",
        needs_args: false,
        handler: |d, i| Box::pin(admin::warn(d, i)),
    },
    CommandSpec {
        name: "warnings",
        aliases: &["ver_adv", "checkwarnings"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "@user",
        summary: "Show a member's warnings",
        needs_args: false,
        handler: |d, i| Box::pin(admin::warnings(d, i)),
    },
    CommandSpec {
        name: "unwarn",
        aliases: &["rm_adv", "removewarnings"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "@user",
        summary: "Remove a member's latest warning",
        needs_args: false,
        handler: |d, i| Box::pin(admin::unwarn(d, i)),
    },
    CommandSpec {
        name: "clearwarns",
        aliases: &["limpar_adv", "clearwarnings"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "",
        summary: "Clear every warning in the group",
        needs_args: false,
        handler: |d, i| Box::pin(admin::clear_warnings(d, i)),
    },
    CommandSpec {
        name: "warned",
        aliases: &["lista_adv", "advertidos"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "",
        summary: "List warned members",
        needs_args: false,
        handler: |d, i| Box::pin(admin::warned(d, i)),
    },
    CommandSpec {
        name: "ban",
        aliases: &["banir"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "@user",
        summary: "Remove a member",
        needs_args: false,
        handler: |d, i| Box::pin(admin::ban(d, i)),
    },
    CommandSpec {
        name: "banfakes",
        aliases: &["banfake"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "",
        summary: "Remove every foreign number",
        needs_args: false,
        handler: |d, i| Box::pin(admin::ban_foreign(d, i)),
    },
    CommandSpec {
        name: "mute",
        aliases: &["mutar"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "@user",
        summary: "Ignore a member's commands",
        needs_args: false,
        handler: |d, i| Box::pin(admin::mute(d, i, true)),
    },
    CommandSpec {
        name: "unmute",
        aliases: &["desmute"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "@user",
        summary: "Undo mute",
        needs_args: false,
        handler: |d, i| Box::pin(admin::mute(d, i, false)),
    },
    CommandSpec {
        name: "promote",
        aliases: &["promover"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "@user",
        summary: "Make a member admin",
        needs_args: false,
        handler: |d, i| Box::pin(admin::promote(d, i, true)),
    },
    CommandSpec {
        name: "demote",
        aliases: &["rebaixar"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "@user",
        summary: "Take admin away",
        needs_args: false,
        handler: |d, i| Box::pin(admin::promote(d, i, false)),
    },
    // --- admin: toggles ---
    CommandSpec {
        name: "welcome",
        aliases: &["bemvindo"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "",
        summary: "Toggle welcome messages",
        needs_args: false,
        handler: |d, i| Box::pin(admin::toggle(d, i, PolicyFlag::Welcome)),
    },
    CommandSpec {
        name: "goodbye",
        aliases: &["despedida"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "",
        summary: "Toggle goodbye messages",
        needs_args: false,
        handler: |d, i| Box::pin(admin::toggle(d, i, PolicyFlag::Goodbye)),
    },
    CommandSpec {
        name: "antilink",
        aliases: &[],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "",
        summary: "Toggle the link filter",
        needs_args: false,
        handler: |d, i| Box::pin(admin::toggle(d, i, PolicyFlag::LinkFilter)),
    },
    CommandSpec {
        name: "antifake",
        aliases: &[],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "",
        summary: "Toggle the foreign-number filter",
        needs_args: false,
        handler: |d, i| Box::pin(admin::toggle(d, i, PolicyFlag::ForeignNumberFilter)),
    },
    CommandSpec {
        name: "antiword",
        aliases: &["antipalavra"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "",
        summary: "Toggle the banned-word filter",
        needs_args: false,
        handler: |d, i| Box::pin(admin::toggle(d, i, PolicyFlag::BannedWordFilter)),
    },
    CommandSpec {
        name: "autosticker",
        aliases: &[],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "",
        summary: "Toggle auto-sticker",
        needs_args: false,
        handler: |d, i| Box::pin(admin::toggle(d, i, PolicyFlag::AutoSticker)),
    },
    CommandSpec {
        name: "autodl",
        aliases: &[],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "",
        summary: "Toggle auto-download",
        needs_args: false,
        handler: |d, i| Box::pin(admin::toggle(d, i, PolicyFlag::AutoDownload)),
    },
    CommandSpec {
        name: "nsfw",
        aliases: &[],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "",
        summary: "Toggle NSFW",
        needs_args: false,
        handler: |d, i| Box::pin(admin::toggle(d, i, PolicyFlag::Nsfw)),
    },
    CommandSpec {
        name: "adminonly",
        aliases: &["so_adm"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "",
        summary: "Toggle admin-only mode",
        needs_args: false,
        handler: |d, i| Box::pin(admin::toggle(d, i, PolicyFlag::AdminOnly)),
    },
    // --- admin: group settings ---
    CommandSpec {
        name: "setwelcome",
        aliases: &["setbemvindo"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "<text with {name} {group} {number}>",
        summary: "Set the welcome template",
        needs_args: true,
        handler: |d, i| Box::pin(admin::set_template(d, i, true)),
    },
    CommandSpec {
        name: "setgoodbye",
        aliases: &["setdespedida"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "<text with {name} {group}>",
        summary: "Set the goodbye template",
        needs_args: true,
        handler: |d, i| Box::pin(admin::set_template(d, i, false)),
    },
    CommandSpec {
        name: "setprefix",
        aliases: &["prefixo"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "<prefix>",
        summary: "Change the command prefix",
        needs_args: true,
        handler: |d, i| Box::pin(admin::set_prefix(d, i)),
    },
    CommandSpec {
        name: "close",
        aliases: &["fechargp"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "",
        summary: "Only admins can send messages",
        needs_args: false,
        handler: |d, i| Box::pin(admin::announce_mode(d, i, true)),
    },
    CommandSpec {
        name: "open",
        aliases: &["abrirgp"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "",
        summary: "Everyone can send messages",
        needs_args: false,
        handler: |d, i| Box::pin(admin::announce_mode(d, i, false)),
    },
    CommandSpec {
        name: "setname",
        aliases: &["nomegp"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "<name>",
        summary: "Rename the group",
        needs_args: true,
        handler: |d, i| Box::pin(admin::set_name(d, i)),
    },
    CommandSpec {
        name: "setdesc",
        aliases: &["descgp"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "<description>",
        summary: "Change the group description",
        needs_args: true,
        handler: |d, i| Box::pin(admin::set_description(d, i)),
    },
    CommandSpec {
        name: "link",
        aliases: &["linkgp"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "",
        summary: "Show the invite link",
        needs_args: false,
        handler: |d, i| Box::pin(admin::invite_link(d, i)),
    },
    CommandSpec {
        name: "tagall",
        aliases: &["marcar"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "[text]",
        summary: "Mention everyone",
        needs_args: false,
        handler: |d, i| Box::pin(admin::tag_all(d, i, false)),
    },
    CommandSpec {
        name: "hidetag",
        aliases: &["totag"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "[text]",
        summary: "Mention everyone silently",
        needs_args: false,
        handler: |d, i| Box::pin(admin::tag_all(d, i, true)),
    },
    CommandSpec {
        name: "status",
        aliases: &["ativacoes"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "",
        summary: "Show group settings",
        needs_args: false,
        handler: |d, i| Box::pin(admin::status(d, i)),
    },
    CommandSpec {
        name: "addword",
        aliases: &["addpalavra", "add_palavra"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "<word>",
        summary: "Ban a word",
        needs_args: true,
        handler: |d, i| Box::pin(admin::add_word(d, i)),
    },
    CommandSpec {
        name: "delword",
        aliases: &["delpalavra", "rm_palavra"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "<word>",
        summary: "Unban a word",
        needs_args: true,
        handler: |d, i| Box::pin(admin::remove_word(d, i)),
    },
    CommandSpec {
        name: "words",
        aliases: &["listapalavrao"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "",
        summary: "List banned words",
        needs_args: false,
        handler: |d, i| Box::pin(admin::list_words(d, i)),
    },
    CommandSpec {
        name: "note",
        aliases: &["anotar"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "<text>",
        summary: "Add a group note",
        needs_args: true,
        handler: |d, i| Box::pin(admin::add_note(d, i)),
    },
    CommandSpec {
        name: "notes",
        aliases: &["anotacoes", "anotacao"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "",
        summary: "Show group notes",
        needs_args: false,
        handler: |d, i| Box::pin(admin::list_notes(d, i)),
    },
    CommandSpec {
        name: "delnote",
        aliases: &["rmnota", "tirar_nota"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "<number>",
        summary: "Delete a group note",
        needs_args: true,
        handler: |d, i| Box::pin(admin::remove_note(d, i)),
    },
    CommandSpec {
        name: "groupinfo",
        aliases: &["grupoinfo", "gpinfo"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "",
        summary: "Group details",
        needs_args: false,
        handler: |d, i| Box::pin(admin::group_info(d, i)),
    },
    CommandSpec {
        name: "raffle",
        aliases: &["sorteio"],
        tier: Role::GroupAdmin,
        group_only: true,
        usage: "",
        summary: "Pick a random member",
        needs_args: false,
        handler: |d, i| Box::pin(admin::raffle(d, i)),
    },
    // --- everyone ---
    CommandSpec {
        name: "menu",
        aliases: &["help", "ajuda"],
        tier: Role::Member,
        group_only: false,
        usage: "",
        summary: "This menu",
        needs_args: false,
        handler: |d, i| Box::pin(general::menu(d, i)),
    },
    CommandSpec {
        name: "ping",
        aliases: &[],
        tier: Role::Member,
        group_only: false,
        usage: "",
        summary: "Check the bot is alive",
        needs_args: false,
        handler: |d, i| Box::pin(general::ping(d, i)),
    },
    CommandSpec {
        name: "admins",
        aliases: &[],
        tier: Role::Member,
        group_only: true,
        usage: "",
        summary: "List group admins",
        needs_args: false,
        handler: |d, i| Box::pin(general::admins(d, i)),
    },
    CommandSpec {
        name: "afk",
        aliases: &["ausente"],
        tier: Role::Member,
        group_only: false,
        usage: "[reason]",
        summary: "Go away for a while",
        needs_args: false,
        handler: |d, i| Box::pin(general::afk(d, i)),
    },
    CommandSpec {
        name: "back",
        aliases: &["ativo"],
        tier: Role::Member,
        group_only: false,
        usage: "",
        summary: "Come back from AFK",
        needs_args: false,
        handler: |d, i| Box::pin(general::back(d, i)),
    },
    CommandSpec {
        name: "afklist",
        aliases: &["listarafk", "statusafk"],
        tier: Role::Member,
        group_only: false,
        usage: "",
        summary: "Who is AFK",
        needs_args: false,
        handler: |d, i| Box::pin(general::afk_list(d, i)),
    },
    CommandSpec {
        name: "rules",
        aliases: &["regras"],
        tier: Role::Member,
        group_only: false,
        usage: "",
        summary: "Group rules",
        needs_args: false,
        handler: |d, i| Box::pin(general::rules(d, i)),
    },
    CommandSpec {
        name: "rent-info",
        aliases: &["alugar"],
        tier: Role::Member,
        group_only: false,
        usage: "",
        summary: "How to rent the bot",
        needs_args: false,
        handler: |d, i| Box::pin(general::rent_info(d, i)),
    },
    CommandSpec {
        name: "myrole",
        aliases: &["meucargo"],
        tier: Role::Member,
        group_only: true,
        usage: "",
        summary: "Your role in this group",
        needs_args: false,
        handler: |d, i| Box::pin(general::my_role(d, i)),
    },
];

/// Case-insensitive lookup by name or alias.
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    let name = name.to_lowercase();
    COMMANDS.iter().find(|spec| spec.matches(&name))
}

// ============================================================================
// DISPATCH
// ============================================================================

/// Run the command in `message`, if any. Returns `true` when the text was a known
/// command, whether or not it succeeded.
pub async fn dispatch(data: &Data, message: &InboundMessage, prefix: &str) -> bool {
    let Some(parsed) = parse_command(&message.text, prefix) else {
        return false;
    };
    let Some(spec) = find(&parsed.name) else {
        tracing::debug!(command = %parsed.name, chat = %message.chat_id, "Unknown command");
        return false;
    };

    let chat_id = message.chat_id.as_str();
    if spec.group_only && !message.is_group {
        data.outbound
            .say(chat_id, "This command only works in groups.")
            .await;
        return true;
    }

    let role = data
        .auth
        .resolve_role(chat_id, &message.sender, message.is_group)
        .await;
    if !role.satisfies(spec.tier) {
        let notice = match spec.tier {
            Role::Owner => "This command is for the bot owner only.",
            _ => "This command is for group admins only.",
        };
        data.outbound.say(chat_id, notice).await;
        return true;
    }

    if spec.needs_args && parsed.args.is_empty() {
        data.outbound
            .say(chat_id, &format!("Usage: {}", spec.usage_line(prefix)))
            .await;
        return true;
    }

    let invocation = Invocation {
        message: message.clone(),
        role,
        name: spec.name.to_string(),
        args: parsed.args,
        prefix: prefix.to_string(),
    };
    tracing::info!(
        command = spec.name,
        chat = %chat_id,
        sender = %message.sender,
        role = ?role,
        "Running command"
    );

    match (spec.handler)(data, &invocation).await {
        Ok(()) => {}
        Err(CommandError::Usage) => {
            data.outbound
                .say(chat_id, &format!("Usage: {}", spec.usage_line(prefix)))
                .await;
        }
        Err(CommandError::Invalid(reason)) => {
            data.outbound.say(chat_id, &reason).await;
        }
        Err(CommandError::Messaging(e)) => {
            tracing::warn!(command = spec.name, chat = %chat_id, error = %e, "Command failed");
            data.outbound
                .say(chat_id, "Could not complete that right now, try again later.")
                .await;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::testing::{message, test_data, ADMIN, GROUP, MEMBER, OWNER};
    use std::collections::HashSet;

    #[test]
    fn parses_prefix_name_and_args() {
        assert_eq!(
            parse_command("#WARN  @5511   be   nice", "#"),
            Some(ParsedCommand {
                name: "warn".into(),
                args: "@5511 be nice".into()
            })
        );
        assert_eq!(parse_command("hello #warn", "#"), None);
        assert_eq!(parse_command("#", "#"), None);
        assert_eq!(parse_command("!ping", "!").unwrap().args, "");
    }

    #[test]
    fn names_and_aliases_are_unique() {
        let mut seen = HashSet::new();
        for spec in COMMANDS {
            assert!(seen.insert(spec.name), "duplicate {}", spec.name);
            for alias in spec.aliases {
                assert!(seen.insert(alias), "duplicate alias {}", alias);
            }
        }
    }

    #[test]
    fn lookup_accepts_aliases_in_any_case() {
        assert_eq!(find("ADVERTIR").unwrap().name, "warn");
        assert_eq!(find("aluguel").unwrap().tier, Role::Owner);
        assert!(find("horoscope").is_none());
    }

    #[tokio::test]
    async fn members_cannot_run_admin_commands() {
        let (data, messenger) = test_data();
        let mut msg = message(MEMBER, "#warn");
        msg.mentions = vec![ADMIN.to_string()];

        assert!(dispatch(&data, &msg, "#").await);
        assert_eq!(data.escalation.count(GROUP, ADMIN).await, 0);
        assert!(messenger.texts()[0].contains("admins only"));
    }

    #[tokio::test]
    async fn admins_cannot_run_owner_commands() {
        let (data, messenger) = test_data();
        let msg = message(ADMIN, "#rent g|G|1|mensal|10");

        assert!(dispatch(&data, &msg, "#").await);
        assert!(data.rentals.list().await.is_empty());
        assert!(messenger.texts()[0].contains("owner only"));
    }

    #[tokio::test]
    async fn missing_arguments_get_a_usage_hint() {
        let (data, messenger) = test_data();
        let msg = message(OWNER, "#rent");

        assert!(dispatch(&data, &msg, "#").await);
        assert!(messenger.texts()[0].contains("Usage: #rent group_id|"));
    }

    #[tokio::test]
    async fn group_commands_are_refused_in_private_chats() {
        let (data, messenger) = test_data();
        let mut msg = message(OWNER, "#status");
        msg.is_group = false;
        msg.chat_id = OWNER.to_string();

        assert!(dispatch(&data, &msg, "#").await);
        assert!(messenger.texts()[0].contains("only works in groups"));
    }

    #[tokio::test]
    async fn unknown_commands_are_ignored() {
        let (data, messenger) = test_data();
        assert!(!dispatch(&data, &message(MEMBER, "#dice"), "#").await);
        assert!(!dispatch(&data, &message(MEMBER, "no prefix"), "#").await);
        assert!(messenger.actions().is_empty());
    }
}
