// Commands reserved for the bot owner: rentals, the global blacklist and roles.

use super::{CommandError, CommandResult, Invocation};
use crate::bot::Data;
use crate::core::messaging::{mention_tag, user_number};
use crate::core::rentals::{RentalError, RentalRequest};
use chrono::Utc;

const MANUAL_BLACKLIST_REASON: &str = "Added manually";

/// Advisory role labels, with the Portuguese names mapped onto them.
fn normalize_role(raw: &str) -> Option<&'static str> {
    match raw.to_lowercase().as_str() {
        "admin" | "administrador" => Some("admin"),
        "moderator" | "moderador" => Some("moderator"),
        "assistant" | "auxiliar" => Some("assistant"),
        "member" | "membro" => Some("member"),
        _ => None,
    }
}

pub async fn rent(data: &Data, inv: &Invocation) -> CommandResult {
    let request = match RentalRequest::parse(&inv.args) {
        Ok(request) => request,
        Err(RentalError::WrongFieldCount(_)) => return Err(CommandError::Usage),
        Err(e) => return Err(CommandError::Invalid(e.to_string())),
    };

    let rental = data.rentals.register(request, Utc::now()).await;
    let text = format!(
        "Rental registered!\nGroup: {}\nPlan: {}\nValue: R${:.2}\nExpires: {}",
        rental.group_name, rental.plan, rental.value, rental.end_date
    );
    data.outbound.say(inv.chat(), &text).await;
    Ok(())
}

pub async fn rentals(data: &Data, inv: &Invocation) -> CommandResult {
    let rentals = data.rentals.list().await;
    if rentals.is_empty() {
        data.outbound.say(inv.chat(), "No rentals registered.").await;
        return Ok(());
    }

    let mut text = String::from("*Rentals:*\n");
    for (i, r) in rentals.iter().enumerate() {
        let status = if r.active { "Active" } else { "Expired" };
        text.push_str(&format!(
            "\n{}. {}\n   Owner: {} | Plan: {} | R${:.2}\n   Expires: {} | Status: {}\n",
            i + 1,
            r.group_name,
            r.renter_id,
            r.plan,
            r.value,
            r.end_date,
            status
        ));
    }
    data.outbound.say(inv.chat(), &text).await;
    Ok(())
}

pub async fn rent_broadcast(data: &Data, inv: &Invocation) -> CommandResult {
    let groups = data.rentals.active_groups().await;
    let text = format!("*Rental notice*\n\n{}", inv.args);

    let mut delivered = 0;
    for group in &groups {
        if data.outbound.say(group, &text).await {
            delivered += 1;
        }
    }
    tracing::info!(groups = groups.len(), delivered, "Rental broadcast sent");
    data.outbound
        .say(
            inv.chat(),
            &format!("Broadcast sent to {} rented group(s).", delivered),
        )
        .await;
    Ok(())
}

pub async fn rent_cancel(data: &Data, inv: &Invocation) -> CommandResult {
    let position: usize = inv.args.trim().parse().map_err(|_| CommandError::Usage)?;
    match data.rentals.deactivate(position).await {
        Some(rental) => {
            data.outbound
                .say(
                    inv.chat(),
                    &format!("Rental for {} deactivated.", rental.group_name),
                )
                .await;
            Ok(())
        }
        None => Err(CommandError::Invalid(format!(
            "There is no rental number {}.",
            position
        ))),
    }
}

/// With a number (or mention) adds it; without, lists the blacklist.
pub async fn blacklist(data: &Data, inv: &Invocation) -> CommandResult {
    let number = inv
        .target()
        .map(str::to_string)
        .or_else(|| inv.args.split_whitespace().next().map(str::to_string));

    let Some(number) = number else {
        let entries = data.blacklist.entries().await;
        if entries.is_empty() {
            data.outbound.say(inv.chat(), "The blacklist is empty.").await;
            return Ok(());
        }
        let mut text = String::from("*Blacklist:*\n");
        for (i, entry) in entries.iter().enumerate() {
            text.push_str(&format!(
                "\n{}. {} - {} ({})",
                i + 1,
                user_number(&entry.number),
                entry.reason,
                entry.date
            ));
        }
        data.outbound.say(inv.chat(), &text).await;
        return Ok(());
    };

    let today = data.rentals.today(Utc::now());
    data.blacklist
        .add(&number, MANUAL_BLACKLIST_REASON, inv.sender(), today)
        .await;
    data.outbound
        .say(
            inv.chat(),
            &format!("{} added to the blacklist.", user_number(&number)),
        )
        .await;
    Ok(())
}

pub async fn unblacklist(data: &Data, inv: &Invocation) -> CommandResult {
    let number = inv
        .target()
        .map(str::to_string)
        .or_else(|| inv.args.split_whitespace().next().map(str::to_string))
        .ok_or(CommandError::Usage)?;

    let text = if data.blacklist.remove(&number).await {
        format!("{} removed from the blacklist.", user_number(&number))
    } else {
        format!("{} is not on the blacklist.", user_number(&number))
    };
    data.outbound.say(inv.chat(), &text).await;
    Ok(())
}

pub async fn set_role(data: &Data, inv: &Invocation) -> CommandResult {
    let target = inv.target().ok_or(CommandError::Usage)?.to_string();
    let raw = inv
        .text_without_mentions()
        .split_whitespace()
        .last()
        .map(str::to_string)
        .ok_or(CommandError::Usage)?;
    let role = normalize_role(&raw).ok_or_else(|| {
        CommandError::Invalid("Valid roles: admin, moderator, assistant, member".to_string())
    })?;

    let group = inv.chat().to_string();
    let user = target.clone();
    data.store
        .write(move |state| {
            state
                .roles
                .entry(group)
                .or_default()
                .insert(user, role.to_string())
        })
        .await;

    data.outbound
        .mention(
            inv.chat(),
            &format!("{} is now {}!", mention_tag(&target), role),
            &[target.clone()],
        )
        .await;
    Ok(())
}
