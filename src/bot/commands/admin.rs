// Group admin commands: warnings, member actions, policy toggles and group settings.

use super::{CommandError, CommandResult, Invocation};
use crate::bot::events::enforce_warning_limit;
use crate::bot::Data;
use crate::core::messaging::{mention_tag, GroupInfo};
use crate::core::policy::is_foreign_number;
use crate::core::state::PolicyFlag;
use chrono::Utc;
use rand::seq::SliceRandom;

const DEFAULT_WARN_REASON: &str = "No reason given";
const MAX_PREFIX_LEN: usize = 3;

fn on_off(value: bool) -> &'static str {
    if value {
        "ON"
    } else {
        "OFF"
    }
}

fn required_target(inv: &Invocation) -> Result<String, CommandError> {
    inv.target().map(str::to_string).ok_or(CommandError::Usage)
}

async fn fetch_group(data: &Data, inv: &Invocation) -> Result<GroupInfo, CommandError> {
    let info = data
        .outbound
        .try_run(
            "group_info",
            inv.chat(),
            data.outbound.messenger().group_info(inv.chat()),
        )
        .await?;
    Ok(info)
}

// ============================================================================
// WARNINGS
// ============================================================================

pub async fn warn(data: &Data, inv: &Invocation) -> CommandResult {
    let target = required_target(inv)?;
    if data.auth.is_owner(&target) {
        return Err(CommandError::Invalid("I can't warn the bot owner!".into()));
    }
    let reason = match inv.text_without_mentions() {
        r if r.is_empty() => DEFAULT_WARN_REASON.to_string(),
        r => r,
    };

    let tally = data
        .escalation
        .issue_warning(inv.chat(), &target, &reason, inv.sender(), Utc::now())
        .await;
    data.outbound
        .mention(
            inv.chat(),
            &format!(
                "{} warned! ({}/{})\nReason: {}",
                mention_tag(&target),
                tally.count,
                data.escalation.threshold(),
                reason
            ),
            &[target.clone()],
        )
        .await;

    enforce_warning_limit(data, inv.chat(), &target, tally).await;
    Ok(())
}

pub async fn warnings(data: &Data, inv: &Invocation) -> CommandResult {
    let target = required_target(inv)?;
    let history = data.escalation.history(inv.chat(), &target).await;

    let text = if history.is_empty() {
        format!("{} has no warnings.", mention_tag(&target))
    } else {
        let tz = data.config.timezone;
        let details: Vec<String> = history
            .iter()
            .enumerate()
            .map(|(i, w)| {
                format!(
                    "  {}. {} - {}",
                    i + 1,
                    w.reason,
                    w.issued_at.with_timezone(&tz).format("%Y-%m-%d %H:%M")
                )
            })
            .collect();
        format!(
            "{} has {} warning(s):\n{}",
            mention_tag(&target),
            history.len(),
            details.join("\n")
        )
    };
    data.outbound.mention(inv.chat(), &text, &[target]).await;
    Ok(())
}

pub async fn unwarn(data: &Data, inv: &Invocation) -> CommandResult {
    let target = required_target(inv)?;
    let text = match data.escalation.remove_latest(inv.chat(), &target).await {
        Some(left) => format!(
            "One warning removed from {} ({} left).",
            mention_tag(&target),
            left
        ),
        None => format!("{} has no warnings.", mention_tag(&target)),
    };
    data.outbound.mention(inv.chat(), &text, &[target]).await;
    Ok(())
}

pub async fn clear_warnings(data: &Data, inv: &Invocation) -> CommandResult {
    let cleared = data.escalation.clear_group(inv.chat()).await;
    data.outbound
        .say(
            inv.chat(),
            &format!("All warnings in this group were cleared ({}).", cleared),
        )
        .await;
    Ok(())
}

pub async fn warned(data: &Data, inv: &Invocation) -> CommandResult {
    let summary = data.escalation.summary(inv.chat()).await;
    if summary.is_empty() {
        data.outbound
            .say(inv.chat(), "No warnings in this group.")
            .await;
        return Ok(());
    }

    let mut text = String::from("*Warned members:*\n");
    for (user, count) in &summary {
        text.push_str(&format!("\n- {}: {} warning(s)", mention_tag(user), count));
    }
    let mentions: Vec<String> = summary.into_iter().map(|(user, _)| user).collect();
    data.outbound.mention(inv.chat(), &text, &mentions).await;
    Ok(())
}

// ============================================================================
// MEMBERS
// ============================================================================

pub async fn ban(data: &Data, inv: &Invocation) -> CommandResult {
    let target = required_target(inv)?;
    if data.auth.is_owner(&target) {
        return Err(CommandError::Invalid("I can't ban the bot owner!".into()));
    }
    if data.outbound.messenger().self_id().as_deref() == Some(target.as_str()) {
        return Err(CommandError::Invalid("I can't ban myself.".into()));
    }

    if data.outbound.remove(inv.chat(), &[target.clone()]).await {
        data.outbound
            .mention(
                inv.chat(),
                &format!("{} was banned!", mention_tag(&target)),
                &[target],
            )
            .await;
    }
    Ok(())
}

/// Remove every non-admin participant outside the home country code. The owner and
/// the bot are never touched.
pub async fn ban_foreign(data: &Data, inv: &Invocation) -> CommandResult {
    let info = fetch_group(data, inv).await?;
    let bot_id = data.outbound.messenger().self_id();
    let targets: Vec<String> = info
        .participants
        .iter()
        .filter(|p| !p.has_admin_bit())
        .filter(|p| !data.auth.is_owner(&p.user_id))
        .filter(|p| bot_id.as_deref() != Some(p.user_id.as_str()))
        .filter(|p| is_foreign_number(&p.user_id, &data.config.home_country_code))
        .map(|p| p.user_id.clone())
        .collect();

    if targets.is_empty() {
        data.outbound.say(inv.chat(), "No foreign numbers found.").await;
        return Ok(());
    }

    tracing::info!(chat = %inv.chat(), count = targets.len(), "Removing foreign numbers");
    if data.outbound.remove(inv.chat(), &targets).await {
        data.outbound
            .say(
                inv.chat(),
                &format!("Removed {} foreign number(s).", targets.len()),
            )
            .await;
    }
    Ok(())
}

pub async fn mute(data: &Data, inv: &Invocation, muted: bool) -> CommandResult {
    let target = required_target(inv)?;
    let group = inv.chat().to_string();
    let user = target.clone();
    data.store
        .write(move |state| state.set_muted(&group, &user, muted))
        .await;

    let verb = if muted { "muted" } else { "unmuted" };
    data.outbound
        .mention(
            inv.chat(),
            &format!("{} was {}.", mention_tag(&target), verb),
            &[target],
        )
        .await;
    Ok(())
}

pub async fn promote(data: &Data, inv: &Invocation, promote: bool) -> CommandResult {
    let target = required_target(inv)?;
    if !data.outbound.require_bot_admin(inv.chat()).await {
        return Ok(());
    }

    let messenger = data.outbound.messenger();
    let text = if promote {
        data.outbound
            .try_run("promote", inv.chat(), messenger.promote(inv.chat(), &target))
            .await?;
        format!("{} is now an admin!", mention_tag(&target))
    } else {
        data.outbound
            .try_run("demote", inv.chat(), messenger.demote(inv.chat(), &target))
            .await?;
        format!("{} is no longer an admin.", mention_tag(&target))
    };
    data.outbound.mention(inv.chat(), &text, &[target]).await;
    Ok(())
}

// ============================================================================
// POLICY TOGGLES
// ============================================================================

pub async fn toggle(data: &Data, inv: &Invocation, flag: PolicyFlag) -> CommandResult {
    data.store.group_config(inv.chat()).await;
    let enabled = data
        .store
        .write(|state| state.toggle_flag(inv.chat(), flag))
        .await
        .unwrap_or(false);

    tracing::info!(chat = %inv.chat(), flag = flag.label(), enabled, "Policy flag toggled");
    data.outbound
        .say(
            inv.chat(),
            &format!("{}: {}", flag.label(), on_off(enabled)),
        )
        .await;
    Ok(())
}

// ============================================================================
// GROUP SETTINGS
// ============================================================================

pub async fn set_template(data: &Data, inv: &Invocation, welcome: bool) -> CommandResult {
    data.store.group_config(inv.chat()).await;
    let template = inv.args.clone();
    data.store
        .write(|state| {
            if let Some(config) = state.groups.get_mut(inv.chat()) {
                if welcome {
                    config.welcome_msg = template;
                } else {
                    config.goodbye_msg = template;
                }
            }
        })
        .await;

    let which = if welcome { "Welcome" } else { "Goodbye" };
    data.outbound
        .say(inv.chat(), &format!("{} message updated.", which))
        .await;
    Ok(())
}

pub async fn set_prefix(data: &Data, inv: &Invocation) -> CommandResult {
    let prefix = inv
        .args
        .split_whitespace()
        .next()
        .ok_or(CommandError::Usage)?
        .to_string();
    if prefix.chars().count() > MAX_PREFIX_LEN {
        return Err(CommandError::Invalid(format!(
            "The prefix can have at most {} characters.",
            MAX_PREFIX_LEN
        )));
    }

    data.store.group_config(inv.chat()).await;
    let stored = prefix.clone();
    data.store
        .write(|state| {
            if let Some(config) = state.groups.get_mut(inv.chat()) {
                config.prefix = stored;
            }
        })
        .await;
    data.outbound
        .say(inv.chat(), &format!("Prefix changed to {}", prefix))
        .await;
    Ok(())
}

pub async fn announce_mode(data: &Data, inv: &Invocation, admins_only: bool) -> CommandResult {
    if !data.outbound.require_bot_admin(inv.chat()).await {
        return Ok(());
    }
    data.outbound
        .try_run(
            "set_announce",
            inv.chat(),
            data.outbound
                .messenger()
                .set_announce_mode(inv.chat(), admins_only),
        )
        .await?;

    let text = if admins_only {
        "Group closed! Only admins can send messages."
    } else {
        "Group opened! Everyone can send messages."
    };
    data.outbound.say(inv.chat(), text).await;
    Ok(())
}

pub async fn set_name(data: &Data, inv: &Invocation) -> CommandResult {
    data.outbound
        .try_run(
            "set_name",
            inv.chat(),
            data.outbound.messenger().set_group_name(inv.chat(), &inv.args),
        )
        .await?;

    data.store.group_config(inv.chat()).await;
    let name = inv.args.clone();
    data.store
        .write(|state| {
            if let Some(config) = state.groups.get_mut(inv.chat()) {
                config.name = name;
            }
        })
        .await;
    data.outbound
        .say(inv.chat(), &format!("Group name changed to: {}", inv.args))
        .await;
    Ok(())
}

pub async fn set_description(data: &Data, inv: &Invocation) -> CommandResult {
    data.outbound
        .try_run(
            "set_topic",
            inv.chat(),
            data.outbound.messenger().set_group_topic(inv.chat(), &inv.args),
        )
        .await?;
    data.outbound
        .say(inv.chat(), "Group description updated!")
        .await;
    Ok(())
}

pub async fn invite_link(data: &Data, inv: &Invocation) -> CommandResult {
    let link = data
        .outbound
        .try_run(
            "invite_link",
            inv.chat(),
            data.outbound.messenger().invite_link(inv.chat()),
        )
        .await?;
    data.outbound
        .say(inv.chat(), &format!("Group link:\n{}", link))
        .await;
    Ok(())
}

pub async fn tag_all(data: &Data, inv: &Invocation, hidden: bool) -> CommandResult {
    let info = fetch_group(data, inv).await?;
    let mentions: Vec<String> = info.participants.iter().map(|p| p.user_id.clone()).collect();

    if hidden {
        let text = if inv.args.is_empty() { "." } else { inv.args.as_str() };
        data.outbound.mention_raw(inv.chat(), text, &mentions).await;
        return Ok(());
    }

    let headline = if inv.args.is_empty() {
        "Attention everyone!"
    } else {
        inv.args.as_str()
    };
    let tags: Vec<String> = mentions.iter().map(|id| mention_tag(id)).collect();
    data.outbound
        .mention(
            inv.chat(),
            &format!("*{}*\n\n{}", headline, tags.join("\n")),
            &mentions,
        )
        .await;
    Ok(())
}

pub async fn status(data: &Data, inv: &Invocation) -> CommandResult {
    let config = data.store.group_config(inv.chat()).await;
    let text = format!(
        "*Group status:*\n\
         - Welcome: {}\n\
         - Goodbye: {}\n\
         - Anti-link: {}\n\
         - Anti-fake: {}\n\
         - Banned-word filter: {}\n\
         - Auto-sticker: {}\n\
         - Auto-download: {}\n\
         - Admin-only: {}\n\
         - NSFW: {}\n\
         - Prefix: {}\n\
         - Active: {}",
        on_off(config.welcome_enabled),
        on_off(config.goodbye_enabled),
        on_off(config.link_filter),
        on_off(config.foreign_number_filter),
        on_off(config.banned_word_filter),
        on_off(config.auto_sticker),
        on_off(config.auto_download),
        on_off(config.admin_only),
        on_off(config.nsfw),
        config.prefix,
        on_off(config.active),
    );
    data.outbound.say(inv.chat(), &text).await;
    Ok(())
}

pub async fn add_word(data: &Data, inv: &Invocation) -> CommandResult {
    let word = inv.args.to_lowercase();
    let added = data
        .store
        .write(|state| state.add_bad_word(inv.chat(), &word))
        .await;
    let text = if added {
        format!("'{}' added to the banned words.", word)
    } else {
        format!("'{}' is already banned.", word)
    };
    data.outbound.say(inv.chat(), &text).await;
    Ok(())
}

pub async fn remove_word(data: &Data, inv: &Invocation) -> CommandResult {
    let removed = data
        .store
        .write(|state| state.remove_bad_word(inv.chat(), &inv.args))
        .await;
    let text = if removed {
        format!("'{}' removed from the banned words.", inv.args)
    } else {
        format!("'{}' is not on the list.", inv.args)
    };
    data.outbound.say(inv.chat(), &text).await;
    Ok(())
}

pub async fn list_words(data: &Data, inv: &Invocation) -> CommandResult {
    let words = data
        .store
        .read(|state| state.bad_words.get(inv.chat()).cloned().unwrap_or_default())
        .await;
    if words.is_empty() {
        data.outbound
            .say(inv.chat(), "The banned word list is empty.")
            .await;
        return Ok(());
    }
    let lines: Vec<String> = words
        .iter()
        .enumerate()
        .map(|(i, w)| format!("{}. {}", i + 1, w))
        .collect();
    data.outbound
        .say(inv.chat(), &format!("*Banned words:*\n\n{}", lines.join("\n")))
        .await;
    Ok(())
}

pub async fn add_note(data: &Data, inv: &Invocation) -> CommandResult {
    let note = inv.args.clone();
    let count = data
        .store
        .write(|state| {
            let notes = state.notes.entry(inv.chat().to_string()).or_default();
            notes.push(note);
            notes.len()
        })
        .await;
    data.outbound
        .say(inv.chat(), &format!("Note #{} added!", count))
        .await;
    Ok(())
}

pub async fn list_notes(data: &Data, inv: &Invocation) -> CommandResult {
    let notes = data
        .store
        .read(|state| state.notes.get(inv.chat()).cloned().unwrap_or_default())
        .await;
    if notes.is_empty() {
        data.outbound.say(inv.chat(), "No notes yet.").await;
        return Ok(());
    }
    let lines: Vec<String> = notes
        .iter()
        .enumerate()
        .map(|(i, n)| format!("{}. {}", i + 1, n))
        .collect();
    data.outbound
        .say(inv.chat(), &format!("*Notes:*\n\n{}", lines.join("\n")))
        .await;
    Ok(())
}

pub async fn remove_note(data: &Data, inv: &Invocation) -> CommandResult {
    let position: usize = inv.args.trim().parse().map_err(|_| CommandError::Usage)?;
    let removed = data
        .store
        .write(|state| state.remove_note(inv.chat(), position))
        .await;
    match removed {
        Some(_) => {
            data.outbound.say(inv.chat(), "Note removed!").await;
            Ok(())
        }
        None => Err(CommandError::Invalid("Invalid note number.".into())),
    }
}

pub async fn group_info(data: &Data, inv: &Invocation) -> CommandResult {
    let info = fetch_group(data, inv).await?;
    let admins = info.participants.iter().filter(|p| p.has_admin_bit()).count();
    let text = format!(
        "*Group info:*\n- Name: {}\n- Members: {}\n- Admins: {}\n- Description: {}",
        info.name,
        info.participants.len(),
        admins,
        info.topic
    );
    data.outbound.say(inv.chat(), &text).await;
    Ok(())
}

pub async fn raffle(data: &Data, inv: &Invocation) -> CommandResult {
    let info = fetch_group(data, inv).await?;
    let bot_id = data.outbound.messenger().self_id();
    let candidates: Vec<&str> = info
        .participants
        .iter()
        .map(|p| p.user_id.as_str())
        .filter(|id| bot_id.as_deref() != Some(*id))
        .collect();

    let winner = candidates
        .choose(&mut rand::thread_rng())
        .map(|id| id.to_string());
    let Some(winner) = winner else {
        data.outbound
            .say(inv.chat(), "Nobody to draw from.")
            .await;
        return Ok(());
    };

    data.outbound
        .mention(
            inv.chat(),
            &format!(
                "*RAFFLE!*\n\nThe winner is {}! Congratulations!",
                mention_tag(&winner)
            ),
            &[winner],
        )
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::commands::dispatch;
    use crate::bot::outbound::NEED_ADMIN_NOTICE;
    use crate::bot::testing::{
        message, test_config, test_data, test_data_with, ADMIN, GROUP, MEMBER, OWNER,
    };
    use crate::core::messaging::testing::{RecordingMessenger, SentAction};
    use crate::core::messaging::InboundMessage;
    use crate::core::state::state_store::testing::memory_store;
    use std::sync::Arc;

    fn at(sender: &str, text: &str, target: &str) -> InboundMessage {
        let mut msg = message(sender, text);
        msg.mentions = vec![target.to_string()];
        msg
    }

    #[tokio::test]
    async fn three_warnings_blacklist_and_remove_once() {
        let (data, messenger) = test_data();
        for _ in 0..3 {
            dispatch(&data, &at(ADMIN, "#warn @m spam", MEMBER), "#").await;
        }

        assert!(data.blacklist.is_blacklisted(MEMBER).await);
        assert_eq!(messenger.removals(), vec![MEMBER.to_string()]);
        let texts = messenger.texts();
        assert!(texts[0].contains("(1/3)"));
        assert!(texts[0].contains("Reason: spam"));
        assert!(texts.iter().any(|t| t.contains("blacklisted")));
    }

    #[tokio::test]
    async fn banfakes_removes_only_foreign_regular_members() {
        const FOREIGN_OWNER: &str = "12025550100";
        let messenger = Arc::new(RecordingMessenger::new().with_group(
            GROUP,
            &[ADMIN, "447700900001"],
            &[MEMBER, "12025550199", "351912345678", FOREIGN_OWNER],
            true,
        ));
        let mut config = test_config();
        config.owner_id = FOREIGN_OWNER.to_string();
        let data = Data::new(config, memory_store().0, messenger.clone());

        dispatch(&data, &message(ADMIN, "#banfakes"), "#").await;

        assert_eq!(
            messenger.removals(),
            vec!["12025550199".to_string(), "351912345678".to_string()]
        );
        assert!(messenger.texts()[0].contains("Removed 2 foreign number(s)."));
    }

    #[tokio::test]
    async fn banfakes_with_nothing_to_remove_says_so() {
        let (data, messenger) = test_data();
        dispatch(&data, &message(ADMIN, "#banfakes"), "#").await;

        assert!(messenger.removals().is_empty());
        assert!(messenger.texts()[0].contains("No foreign numbers found."));
    }

    #[tokio::test]
    async fn banfakes_needs_the_bot_to_be_admin() {
        let (data, messenger) = test_data_with(RecordingMessenger::new().with_group(
            GROUP,
            &[ADMIN],
            &["12025550199"],
            false,
        ));
        dispatch(&data, &message(ADMIN, "#banfakes"), "#").await;

        assert!(messenger.removals().is_empty());
        assert!(messenger.texts()[0].contains(NEED_ADMIN_NOTICE));
    }

    #[tokio::test]
    async fn two_warnings_do_not_remove() {
        let (data, messenger) = test_data();
        for _ in 0..2 {
            dispatch(&data, &at(ADMIN, "#advertir @m", MEMBER), "#").await;
        }
        assert!(!data.blacklist.is_blacklisted(MEMBER).await);
        assert!(messenger.removals().is_empty());
        assert!(messenger.texts()[0].contains(DEFAULT_WARN_REASON));
    }

    #[tokio::test]
    async fn clearing_resets_to_one_of_three() {
        let (data, messenger) = test_data();
        dispatch(&data, &at(ADMIN, "#warn @m", MEMBER), "#").await;
        dispatch(&data, &at(ADMIN, "#warn @m", MEMBER), "#").await;
        dispatch(&data, &message(ADMIN, "#limpar_adv"), "#").await;
        dispatch(&data, &at(ADMIN, "#warn @m", MEMBER), "#").await;

        assert!(messenger.texts().last().unwrap().contains("(1/3)"));
    }

    #[tokio::test]
    async fn owner_cannot_be_warned_or_banned() {
        let (data, messenger) = test_data();
        dispatch(&data, &at(ADMIN, "#warn @o", OWNER), "#").await;
        dispatch(&data, &at(ADMIN, "#ban @o", OWNER), "#").await;

        assert_eq!(data.escalation.count(GROUP, OWNER).await, 0);
        assert!(messenger.removals().is_empty());
        assert!(messenger.texts()[0].contains("can't warn"));
    }

    #[tokio::test]
    async fn warn_without_target_shows_usage() {
        let (data, messenger) = test_data();
        dispatch(&data, &message(ADMIN, "#warn"), "#").await;
        assert!(messenger.texts()[0].contains("Usage: #warn @user [reason]"));
    }

    #[tokio::test]
    async fn ban_needs_bot_admin_rights() {
        let (data, messenger) =
            test_data_with(RecordingMessenger::new().with_group(GROUP, &[ADMIN], &[MEMBER], false));
        dispatch(&data, &at(ADMIN, "#ban @m", MEMBER), "#").await;

        assert!(messenger.removals().is_empty());
        assert!(messenger.texts()[0].contains("I need to be an admin"));
    }

    #[tokio::test]
    async fn toggles_flip_group_flags() {
        let (data, messenger) = test_data();
        dispatch(&data, &message(ADMIN, "#antilink"), "#").await;
        assert!(data.store.group_config(GROUP).await.link_filter);
        assert!(messenger.texts()[0].ends_with("Anti-link: ON"));

        dispatch(&data, &message(ADMIN, "#ANTILINK"), "#").await;
        assert!(!data.store.group_config(GROUP).await.link_filter);
    }

    #[tokio::test]
    async fn close_group_sets_announce_mode() {
        let (data, messenger) = test_data();
        dispatch(&data, &message(ADMIN, "#fechargp"), "#").await;
        assert!(messenger.actions().contains(&SentAction::Announce {
            chat: GROUP.into(),
            admins_only: true
        }));
    }

    #[tokio::test]
    async fn prefix_change_applies_to_next_command() {
        let (data, _) = test_data();
        dispatch(&data, &message(ADMIN, "#setprefix !"), "#").await;
        assert_eq!(data.store.prefix_for(GROUP).await, "!");

        dispatch(&data, &message(ADMIN, "#setprefix toolong"), "#").await;
        assert_eq!(data.store.prefix_for(GROUP).await, "!");
    }

    #[tokio::test]
    async fn words_and_notes_round_trip() {
        let (data, messenger) = test_data();
        dispatch(&data, &message(ADMIN, "#addword Heck"), "#").await;
        dispatch(&data, &message(ADMIN, "#note be kind"), "#").await;
        dispatch(&data, &message(ADMIN, "#words"), "#").await;
        dispatch(&data, &message(ADMIN, "#delnote 1"), "#").await;
        dispatch(&data, &message(ADMIN, "#delnote 1"), "#").await;

        let texts = messenger.texts();
        assert!(texts[2].contains("1. heck"));
        assert!(texts[3].contains("Note removed"));
        assert!(texts[4].contains("Invalid note number"));
    }

    #[tokio::test]
    async fn tagall_mentions_every_participant() {
        let (data, messenger) = test_data();
        dispatch(&data, &message(ADMIN, "#tagall meeting"), "#").await;

        match &messenger.actions()[0] {
            SentAction::Mentions { text, mentions, .. } => {
                assert!(text.contains("*meeting*"));
                assert_eq!(mentions.len(), 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn raffle_never_picks_the_bot() {
        let (data, messenger) = test_data();
        for _ in 0..10 {
            dispatch(&data, &message(ADMIN, "#sorteio"), "#").await;
        }
        for action in messenger.actions() {
            if let SentAction::Mentions { mentions, .. } = action {
                assert_ne!(mentions[0], crate::core::messaging::testing::BOT_ID);
            }
        }
    }
}
