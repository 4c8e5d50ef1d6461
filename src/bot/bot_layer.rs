// Bot layer - turns inbound gateway events into core calls and outbound actions.

#[path = "bot_config.rs"]
pub mod config;

#[path = "outbound.rs"]
pub mod outbound;

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "events/event_handler.rs"]
pub mod events;

#[path = "scheduler/rental_scheduler.rs"]
pub mod scheduler;

use crate::core::authorization::{AuthorizationService, BlacklistGuard};
use crate::core::escalation::EscalationService;
use crate::core::messaging::Messenger;
use crate::core::policy::PolicyService;
use crate::core::rentals::RentalService;
use crate::core::state::StateStore;
use config::BotConfig;
use outbound::Outbound;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// Shared by every event task and the scheduler.
#[derive(Clone)]
pub struct Data {
    pub config: Arc<BotConfig>,
    pub store: Arc<StateStore>,
    pub auth: Arc<AuthorizationService>,
    pub blacklist: Arc<BlacklistGuard>,
    pub policy: Arc<PolicyService>,
    pub escalation: Arc<EscalationService>,
    pub rentals: Arc<RentalService>,
    pub outbound: Arc<Outbound>,
}

impl Data {
    /// Wire every service around one store and one messenger.
    pub fn new(config: BotConfig, store: Arc<StateStore>, messenger: Arc<dyn Messenger>) -> Self {
        let auth = Arc::new(AuthorizationService::new(
            Arc::clone(&store),
            Arc::clone(&messenger),
            config.owner_id.clone(),
            config.action_timeout,
        ));
        let outbound = Arc::new(Outbound::new(
            messenger,
            Arc::clone(&auth),
            config.action_timeout,
            config.bot_name.clone(),
        ));

        Self {
            blacklist: Arc::new(BlacklistGuard::new(Arc::clone(&store))),
            policy: Arc::new(PolicyService::new(
                Arc::clone(&store),
                config.home_country_code.clone(),
            )),
            escalation: Arc::new(EscalationService::new(
                Arc::clone(&store),
                config.max_warnings,
            )),
            rentals: Arc::new(RentalService::new(
                Arc::clone(&store),
                config.timezone,
                config.rental_warning_window,
                config.rental_remind_once,
            )),
            auth,
            outbound,
            store,
            config: Arc::new(config),
        }
    }
}
