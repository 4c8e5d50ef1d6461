// Inbound event handling - blacklist, AFK, policy filters, then command dispatch.

use crate::bot::commands::dispatch;
use crate::bot::{Data, Error};
use crate::core::authorization::Role;
use crate::core::messaging::{mention_tag, user_number, InboundEvent, InboundMessage, MembershipChange};
use crate::core::policy::{JoinDecision, PolicyDecision, BANNED_WORD_REASON};
use crate::core::state::{WarningTally, SYSTEM_ISSUER};
use chrono::Utc;

pub async fn handle_event(data: &Data, event: InboundEvent) -> Result<(), Error> {
    match event {
        InboundEvent::Message(message) => handle_message(data, &message).await,
        InboundEvent::MembershipChanged(change) => handle_membership(data, &change).await,
        InboundEvent::BotJoined { chat_id } => handle_bot_joined(data, &chat_id).await,
    }
}

/// One authored message, in this order: blacklist, AFK return, policy filters
/// (non-admins only), mute, commands.
pub async fn handle_message(data: &Data, message: &InboundMessage) -> Result<(), Error> {
    if message.is_from_me {
        return Ok(());
    }
    let chat = message.chat_id.as_str();
    let sender = message.sender.as_str();

    if message.is_group {
        data.store.group_config(chat).await;
    }

    if data.blacklist.is_blacklisted(sender).await {
        if message.is_group && data.outbound.remove(chat, &[sender.to_string()]).await {
            data.outbound
                .mention(
                    chat,
                    &format!("{} is blacklisted and was removed.", mention_tag(sender)),
                    &[sender.to_string()],
                )
                .await;
        }
        return Ok(());
    }

    if let Some(reason) = data.auth.consume_afk(chat, sender).await {
        data.outbound
            .mention(
                chat,
                &format!("{} is back! (was AFK: {})", mention_tag(sender), reason),
                &[sender.to_string()],
            )
            .await;
    }

    if message.text.trim().is_empty() {
        return Ok(());
    }

    if message.is_group && !apply_policy(data, message).await {
        return Ok(());
    }

    let muted = data.store.read(|state| state.is_muted(chat, sender)).await;
    if muted {
        tracing::debug!(chat = %chat, sender = %sender, "Ignoring muted sender");
        return Ok(());
    }

    let prefix = data.store.prefix_for(chat).await;
    dispatch(data, message, &prefix).await;
    Ok(())
}

/// Run the group filters. Returns `false` when the message was handled and must not
/// reach the command router.
async fn apply_policy(data: &Data, message: &InboundMessage) -> bool {
    let chat = message.chat_id.as_str();
    let sender = message.sender.as_str();

    let decision = data.policy.check_message(chat, &message.text).await;
    if decision == PolicyDecision::Allow {
        return true;
    }
    // Filters only apply to plain members. The role lookup is skipped for clean messages.
    let role = data.auth.resolve_role(chat, sender, true).await;
    if role != Role::Member {
        return true;
    }

    match decision {
        PolicyDecision::Allow => true,
        PolicyDecision::RemoveForLink => {
            tracing::info!(chat = %chat, sender = %sender, "Link filter hit");
            if data.outbound.remove(chat, &[sender.to_string()]).await {
                data.outbound
                    .mention(
                        chat,
                        &format!("{} was removed for sending a link.", mention_tag(sender)),
                        &[sender.to_string()],
                    )
                    .await;
            }
            false
        }
        PolicyDecision::WarnForBannedWord { word } => {
            tracing::info!(chat = %chat, sender = %sender, word = %word, "Banned word hit");
            let tally = data
                .escalation
                .issue_warning(chat, sender, BANNED_WORD_REASON, SYSTEM_ISSUER, Utc::now())
                .await;
            data.outbound
                .mention(
                    chat,
                    &format!(
                        "{} watch your language! Warning applied ({}/{}).",
                        mention_tag(sender),
                        tally.count,
                        data.escalation.threshold()
                    ),
                    &[sender.to_string()],
                )
                .await;
            enforce_warning_limit(data, chat, sender, tally).await;
            false
        }
        PolicyDecision::SilentDrop => false,
    }
}

/// Remove a user whose warnings in this group reached the threshold.
pub async fn enforce_warning_limit(data: &Data, chat_id: &str, user_id: &str, tally: WarningTally) {
    if !tally.reached_limit {
        return;
    }
    tracing::info!(
        chat = %chat_id,
        user = %user_id,
        count = tally.count,
        promoted = tally.promoted,
        "Warning limit reached"
    );
    if data.outbound.remove(chat_id, &[user_id.to_string()]).await {
        let outcome = if tally.promoted {
            "was removed and blacklisted"
        } else {
            "was removed"
        };
        data.outbound
            .mention(
                chat_id,
                &format!(
                    "{} reached {} warnings and {}.",
                    mention_tag(user_id),
                    tally.count,
                    outcome
                ),
                &[user_id.to_string()],
            )
            .await;
    }
}

// ============================================================================
// MEMBERSHIP
// ============================================================================

/// Fill `{name}`, `{group}` and `{number}` in a welcome or goodbye template.
pub fn render_template(template: &str, user_id: &str, group_name: &str) -> String {
    template
        .replace("{name}", &mention_tag(user_id))
        .replace("{group}", group_name)
        .replace("{number}", user_number(user_id))
}

pub async fn handle_membership(data: &Data, change: &MembershipChange) -> Result<(), Error> {
    let chat = change.chat_id.as_str();
    data.outbound.messenger().invalidate_group(chat);
    let config = data.store.group_config(chat).await;
    let bot_id = data.outbound.messenger().self_id();
    let is_bot = |user: &str| bot_id.as_deref() == Some(user);

    let mut group_name = config.name.clone();
    if group_name.is_empty() && (!change.joined.is_empty() || !change.left.is_empty()) {
        group_name = data
            .outbound
            .run("group_info", chat, data.outbound.messenger().group_info(chat))
            .await
            .map(|info| info.name)
            .unwrap_or_default();
    }

    for user in change.joined.iter().filter(|u| !is_bot(u.as_str())) {
        let decision = data.policy.check_join(chat, user).await;
        tracing::debug!(chat = %chat, user = %user, decision = ?decision, "Member joined");
        match decision {
            JoinDecision::RemoveBlacklisted => {
                if data.outbound.remove(chat, &[user.clone()]).await {
                    data.outbound
                        .mention(
                            chat,
                            &format!("{} is blacklisted and was removed.", mention_tag(user)),
                            &[user.clone()],
                        )
                        .await;
                }
            }
            JoinDecision::RemoveForeign => {
                if data.outbound.remove(chat, &[user.clone()]).await {
                    data.outbound
                        .mention(
                            chat,
                            &format!(
                                "{} was removed: foreign numbers are not allowed here.",
                                mention_tag(user)
                            ),
                            &[user.clone()],
                        )
                        .await;
                }
            }
            JoinDecision::Welcome => {
                let text = render_template(&config.welcome_msg, user, &group_name);
                data.outbound.mention_raw(chat, &text, &[user.clone()]).await;
            }
            JoinDecision::Ignore => {}
        }
    }

    if config.goodbye_enabled {
        for user in change.left.iter().filter(|u| !is_bot(u.as_str())) {
            let text = render_template(&config.goodbye_msg, user, &group_name);
            data.outbound.mention_raw(chat, &text, &[user.clone()]).await;
        }
    }
    Ok(())
}

pub async fn handle_bot_joined(data: &Data, chat_id: &str) -> Result<(), Error> {
    let config = data.store.group_config(chat_id).await;
    tracing::info!(chat = %chat_id, "Bot added to group");

    let bot = &data.config.bot_name;
    let owner = &data.config.owner_name;
    let text = format!(
        "*{bot} connected!*\n\nHi! I'm {bot}, {owner}'s bot.\n\
         Use {prefix}menu to see what I can do.\n\nOwner: {owner}",
        bot = bot,
        owner = owner,
        prefix = config.prefix
    );
    data.outbound.say(chat_id, &text).await;
    Ok(())
}
