// Commands anyone can run.

use super::{CommandResult, Invocation, COMMANDS};
use crate::bot::Data;
use crate::core::authorization::Role;
use crate::core::messaging::{mention_tag, user_number};
use std::time::Instant;

const DEFAULT_AFK_REASON: &str = "No reason given";

/// Menu built from the registry, showing only what the caller may run here.
pub fn render_menu(data: &Data, role: Role, is_group: bool, prefix: &str) -> String {
    let mut menu = format!(
        "*{} - MENU*\nOwner: {}\nPrefix: {}\n",
        data.config.bot_name, data.config.owner_name, prefix
    );

    let sections = [
        (Role::Member, "GENERAL"),
        (Role::GroupAdmin, "ADMIN"),
        (Role::Owner, "OWNER"),
    ];
    for (tier, title) in sections {
        if !role.satisfies(tier) {
            continue;
        }
        let lines: Vec<String> = COMMANDS
            .iter()
            .filter(|spec| spec.tier == tier && (is_group || !spec.group_only))
            .map(|spec| format!("{}{} - {}", prefix, spec.name, spec.summary))
            .collect();
        if lines.is_empty() {
            continue;
        }
        menu.push_str(&format!("\n*--- {} ---*\n{}\n", title, lines.join("\n")));
    }
    menu
}

pub async fn menu(data: &Data, inv: &Invocation) -> CommandResult {
    let text = render_menu(data, inv.role, inv.message.is_group, &inv.prefix);
    data.outbound.say(inv.chat(), &text).await;
    Ok(())
}

pub async fn ping(data: &Data, inv: &Invocation) -> CommandResult {
    let start = Instant::now();
    let reachable = data.outbound.say(inv.chat(), "Pong!").await;
    tracing::debug!(
        latency_ms = start.elapsed().as_millis() as u64,
        reachable,
        "Ping"
    );
    Ok(())
}

pub async fn admins(data: &Data, inv: &Invocation) -> CommandResult {
    let info = data
        .outbound
        .try_run(
            "group_info",
            inv.chat(),
            data.outbound.messenger().group_info(inv.chat()),
        )
        .await?;

    let admins: Vec<_> = info.participants.iter().filter(|p| p.has_admin_bit()).collect();
    let mut text = String::from("*Admins:*\n");
    for p in &admins {
        let kind = if p.is_super_admin { "Super Admin" } else { "Admin" };
        text.push_str(&format!("\n- {} ({})", mention_tag(&p.user_id), kind));
    }
    let mentions: Vec<String> = admins.iter().map(|p| p.user_id.clone()).collect();
    data.outbound.mention(inv.chat(), &text, &mentions).await;
    Ok(())
}

pub async fn afk(data: &Data, inv: &Invocation) -> CommandResult {
    let reason = if inv.args.is_empty() {
        DEFAULT_AFK_REASON.to_string()
    } else {
        inv.args.clone()
    };
    let user = inv.sender().to_string();
    let stored = reason.clone();
    data.store
        .write(move |state| state.afk_users.insert(user, stored))
        .await;

    data.outbound
        .mention(
            inv.chat(),
            &format!("{} is now AFK: {}", mention_tag(inv.sender()), reason),
            &[inv.sender().to_string()],
        )
        .await;
    Ok(())
}

/// The AFK entry is normally consumed before dispatch; this only clears leftovers.
pub async fn back(data: &Data, inv: &Invocation) -> CommandResult {
    data.auth.consume_afk(inv.chat(), inv.sender()).await;
    data.outbound
        .mention(
            inv.chat(),
            &format!("{} is back!", mention_tag(inv.sender())),
            &[inv.sender().to_string()],
        )
        .await;
    Ok(())
}

pub async fn afk_list(data: &Data, inv: &Invocation) -> CommandResult {
    let mut entries: Vec<(String, String)> = data
        .store
        .read(|state| {
            state
                .afk_users
                .iter()
                .map(|(user, reason)| (user.clone(), reason.clone()))
                .collect()
        })
        .await;
    if entries.is_empty() {
        data.outbound.say(inv.chat(), "Nobody is AFK.").await;
        return Ok(());
    }
    entries.sort();

    let mut text = String::from("*AFK users:*\n");
    for (user, reason) in &entries {
        text.push_str(&format!("\n- {}: {}", mention_tag(user), reason));
    }
    let mentions: Vec<String> = entries.into_iter().map(|(user, _)| user).collect();
    data.outbound.mention(inv.chat(), &text, &mentions).await;
    Ok(())
}

pub async fn rules(data: &Data, inv: &Invocation) -> CommandResult {
    let text = format!(
        "*Group rules:*\n\
         1. Respect every member\n\
         2. No links without permission\n\
         3. No NSFW content unless enabled\n\
         4. No spam or flooding\n\
         5. No fake numbers\n\
         6. Offensive language earns warnings\n\
         7. {} warnings = automatic ban\n\
         8. The owner has the final word",
        data.escalation.threshold()
    );
    data.outbound.say(inv.chat(), &text).await;
    Ok(())
}

pub async fn rent_info(data: &Data, inv: &Invocation) -> CommandResult {
    let text = format!(
        "*Rent the bot:*\nWant {} in your group?\nTalk to the owner: {}\nwa.me/{}\n\n\
         Plans: weekly, biweekly, monthly, quarterly, semiannual, annual, lifetime",
        data.config.bot_name,
        data.config.owner_name,
        user_number(&data.config.owner_id)
    );
    data.outbound.say(inv.chat(), &text).await;
    Ok(())
}

pub async fn my_role(data: &Data, inv: &Invocation) -> CommandResult {
    let role = data
        .store
        .read(|state| state.role_of(inv.chat(), inv.sender()).map(str::to_string))
        .await
        .unwrap_or_else(|| "member".to_string());
    data.outbound
        .mention(
            inv.chat(),
            &format!("{} your role here is: {}", mention_tag(inv.sender()), role),
            &[inv.sender().to_string()],
        )
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::commands::dispatch;
    use crate::bot::events::handle_message;
    use crate::bot::testing::{message, test_data, ADMIN, GROUP, MEMBER, OWNER};

    #[tokio::test]
    async fn afk_round_trip_yields_exactly_one_notice() {
        let (data, messenger) = test_data();

        handle_message(&data, &message(MEMBER, "#afk lunch")).await.unwrap();
        assert_eq!(
            data.store.read(|s| s.afk_users.get(MEMBER).cloned()).await.as_deref(),
            Some("lunch")
        );
        let after_set = messenger.texts().len();

        handle_message(&data, &message(MEMBER, "I'm here")).await.unwrap();
        let notices: Vec<String> = messenger.texts()[after_set..].to_vec();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("lunch"));

        handle_message(&data, &message(MEMBER, "still here")).await.unwrap();
        assert_eq!(messenger.texts().len(), after_set + 1);
    }

    #[tokio::test]
    async fn menu_hides_sections_above_the_callers_role() {
        let (data, _) = test_data();

        let member = render_menu(&data, Role::Member, true, "#");
        assert!(member.contains("#ping"));
        assert!(!member.contains("ADMIN"));
        assert!(!member.contains("#rent "));

        let admin = render_menu(&data, Role::GroupAdmin, true, "#");
        assert!(admin.contains("#warn - "));
        assert!(!admin.contains("OWNER"));

        let owner_dm = render_menu(&data, Role::Owner, false, "!");
        assert!(owner_dm.contains("!rent - "));
        assert!(!owner_dm.contains("!warn - "));
    }

    #[tokio::test]
    async fn afk_list_mentions_everyone_away() {
        let (data, messenger) = test_data();
        dispatch(&data, &message(MEMBER, "#afk"), "#").await;
        dispatch(&data, &message(ADMIN, "#afklist"), "#").await;

        let texts = messenger.texts();
        assert!(texts[1].contains(DEFAULT_AFK_REASON));
    }

    #[tokio::test]
    async fn my_role_defaults_to_member() {
        let (data, messenger) = test_data();
        dispatch(&data, &message(MEMBER, "#myrole"), "#").await;
        assert!(messenger.texts()[0].ends_with("member"));

        data.store
            .write(|s| {
                s.roles
                    .entry(GROUP.into())
                    .or_default()
                    .insert(OWNER.into(), "admin".into())
            })
            .await;
        dispatch(&data, &message(OWNER, "#myrole"), "#").await;
        assert!(messenger.texts()[1].ends_with("admin"));
    }
}
