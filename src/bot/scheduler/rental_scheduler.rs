// Background rental checker. Sweeps on a fixed interval and tells each affected group.

use crate::bot::Data;
use crate::core::messaging::user_number;
use crate::core::rentals::RentalNotice;
use chrono::{DateTime, Utc};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub struct RentalScheduler {
    data: Data,
}

impl RentalScheduler {
    pub fn new(data: Data) -> Self {
        Self { data }
    }

    /// Tick until `token` is cancelled. The first sweep runs one interval after start.
    pub async fn run(self, token: CancellationToken) {
        let period = self.data.config.rental_check_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval_secs = period.as_secs(), "Rental checker started");

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let sent = self.tick(Utc::now()).await;
                    tracing::debug!(sent, "Rental sweep finished");
                }
            }
        }
        tracing::info!("Rental checker stopped");
    }

    /// One sweep. Returns how many notices were delivered.
    pub async fn tick(&self, now: DateTime<Utc>) -> usize {
        let notices = self.data.rentals.sweep(now).await;

        let mut delivered = 0;
        for notice in &notices {
            let text = self.render(notice);
            if self.data.outbound.say(notice.group_id(), &text).await {
                delivered += 1;
            }
        }
        delivered
    }

    fn render(&self, notice: &RentalNotice) -> String {
        let owner = &self.data.config.owner_name;
        match notice {
            RentalNotice::Expired { end_date, .. } => format!(
                "This group's rental expired on {}.\nContact {} to renew: wa.me/{}",
                end_date,
                owner,
                user_number(&self.data.config.owner_id)
            ),
            RentalNotice::ExpiringSoon { days_left, .. } => format!(
                "Notice: this group's rental expires in {} day(s)!\nContact {} to renew.",
                days_left, owner
            ),
        }
    }
}
