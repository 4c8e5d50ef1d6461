// Rentals - time-bounded group subscriptions and the expiry sweep.
//
// The sweep is pure domain logic: it flips expired rentals inactive and reports which
// groups need a notice. Sending the notices is the scheduler's job.

use crate::core::state::{Rental, StateStore};
use chrono::{DateTime, Duration, Months, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RentalError {
    #[error("Expected at least 5 fields separated by '|', got {0}")]
    WrongFieldCount(usize),

    #[error("Invalid rental value: {0}")]
    InvalidValue(String),

    #[error("Field '{0}' must not be empty")]
    EmptyField(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RentalPlan {
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Semiannual,
    Annual,
    Lifetime,
}

impl RentalPlan {
    /// Accepts the Portuguese plan names the bot has always used plus English ones.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "semanal" | "weekly" => Some(Self::Weekly),
            "quinzenal" | "biweekly" => Some(Self::Biweekly),
            "mensal" | "monthly" => Some(Self::Monthly),
            "trimestral" | "quarterly" => Some(Self::Quarterly),
            "semestral" | "semiannual" => Some(Self::Semiannual),
            "anual" | "annual" | "yearly" => Some(Self::Annual),
            "vitalicio" | "vitalício" | "lifetime" => Some(Self::Lifetime),
            _ => None,
        }
    }

    pub fn end_date(self, start: NaiveDate) -> NaiveDate {
        let end = match self {
            Self::Weekly => start.checked_add_signed(Duration::days(7)),
            Self::Biweekly => start.checked_add_signed(Duration::days(15)),
            Self::Monthly => start.checked_add_months(Months::new(1)),
            Self::Quarterly => start.checked_add_months(Months::new(3)),
            Self::Semiannual => start.checked_add_months(Months::new(6)),
            Self::Annual => start.checked_add_months(Months::new(12)),
            Self::Lifetime => start.checked_add_months(Months::new(99 * 12)),
        };
        end.unwrap_or(NaiveDate::MAX)
    }
}

/// End date for a plan name; unknown plans get the monthly rule.
pub fn end_date(start: NaiveDate, plan: &str) -> NaiveDate {
    RentalPlan::parse(plan)
        .unwrap_or(RentalPlan::Monthly)
        .end_date(start)
}

/// Parsed `group id | group name | owner number | plan | value [| owner name]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RentalRequest {
    pub group_id: String,
    pub group_name: String,
    pub renter_id: String,
    pub plan: String,
    pub value: f64,
    pub renter_name: String,
}

impl RentalRequest {
    pub fn parse(args: &str) -> Result<Self, RentalError> {
        let fields: Vec<&str> = args.split('|').map(str::trim).collect();
        if fields.len() < 5 {
            return Err(RentalError::WrongFieldCount(fields.len()));
        }

        let required = [
            ("group id", fields[0]),
            ("group name", fields[1]),
            ("owner number", fields[2]),
            ("plan", fields[3]),
        ];
        for (name, value) in required {
            if value.is_empty() {
                return Err(RentalError::EmptyField(name));
            }
        }

        let value: f64 = fields[4]
            .replace(',', ".")
            .parse()
            .map_err(|_| RentalError::InvalidValue(fields[4].to_string()))?;
        if !value.is_finite() || value < 0.0 {
            return Err(RentalError::InvalidValue(fields[4].to_string()));
        }

        Ok(Self {
            group_id: fields[0].to_string(),
            group_name: fields[1].to_string(),
            renter_id: fields[2].to_string(),
            plan: fields[3].to_string(),
            value,
            renter_name: fields.get(5).map(|s| s.to_string()).unwrap_or_default(),
        })
    }
}

/// What the sweep found for one rental.
#[derive(Debug, Clone, PartialEq)]
pub enum RentalNotice {
    Expired {
        group_id: String,
        group_name: String,
        end_date: NaiveDate,
    },
    ExpiringSoon {
        group_id: String,
        group_name: String,
        end_date: NaiveDate,
        days_left: i64,
    },
}

impl RentalNotice {
    pub fn group_id(&self) -> &str {
        match self {
            RentalNotice::Expired { group_id, .. } | RentalNotice::ExpiringSoon { group_id, .. } => {
                group_id
            }
        }
    }
}

pub struct RentalService {
    store: Arc<StateStore>,
    timezone: Tz,
    warning_window: Duration,
    remind_once: bool,
}

impl RentalService {
    pub fn new(store: Arc<StateStore>, timezone: Tz, warning_window: Duration, remind_once: bool) -> Self {
        Self {
            store,
            timezone,
            warning_window,
            remind_once,
        }
    }

    /// Calendar date "today" in the bot's timezone.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone).date_naive()
    }

    /// Moment a rental stops being valid: midnight at the start of its end date.
    fn expires_at(&self, end_date: NaiveDate) -> DateTime<Utc> {
        let midnight = end_date.and_time(chrono::NaiveTime::MIN);
        self.timezone
            .from_local_datetime(&midnight)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
    }

    /// Record a new rental starting today. Older rentals for the same group are left as-is.
    pub async fn register(&self, request: RentalRequest, now: DateTime<Utc>) -> Rental {
        let start_date = self.today(now);
        let rental = Rental {
            group_id: request.group_id,
            group_name: request.group_name,
            renter_id: request.renter_id,
            renter_name: request.renter_name,
            end_date: end_date(start_date, &request.plan),
            plan: request.plan,
            start_date,
            value: request.value,
            active: true,
            notes: String::new(),
            last_reminded_at: None,
        };

        let stored = rental.clone();
        self.store.write(move |state| state.rentals.push(stored)).await;
        tracing::info!(
            group = %rental.group_id,
            plan = %rental.plan,
            end_date = %rental.end_date,
            "Rental registered"
        );
        rental
    }

    pub async fn list(&self) -> Vec<Rental> {
        self.store.read(|state| state.rentals.clone()).await
    }

    /// Deactivate a rental by its 1-based position in the list.
    pub async fn deactivate(&self, position: usize) -> Option<Rental> {
        self.store
            .write(|state| {
                let rental = state.rentals.get_mut(position.checked_sub(1)?)?;
                rental.active = false;
                Some(rental.clone())
            })
            .await
    }

    /// Group ids with at least one active rental, deduplicated.
    pub async fn active_groups(&self) -> Vec<String> {
        self.store
            .read(|state| {
                let mut groups: Vec<String> = state
                    .rentals
                    .iter()
                    .filter(|r| r.active)
                    .map(|r| r.group_id.clone())
                    .collect();
                groups.sort();
                groups.dedup();
                groups
            })
            .await
    }

    /// One scheduler tick: expire overdue rentals and collect reminders. Runs under a
    /// single write acquisition and persists once.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Vec<RentalNotice> {
        let notices = self
            .store
            .write(|state| {
                let mut notices = Vec::new();
                for rental in state.rentals.iter_mut().filter(|r| r.active) {
                    let expires_at = self.expires_at(rental.end_date);
                    if now > expires_at {
                        rental.active = false;
                        notices.push(RentalNotice::Expired {
                            group_id: rental.group_id.clone(),
                            group_name: rental.group_name.clone(),
                            end_date: rental.end_date,
                        });
                        continue;
                    }

                    let remaining = expires_at - now;
                    if remaining >= self.warning_window {
                        continue;
                    }
                    if self.remind_once && rental.last_reminded_at.is_some() {
                        continue;
                    }
                    rental.last_reminded_at = Some(now);
                    notices.push(RentalNotice::ExpiringSoon {
                        group_id: rental.group_id.clone(),
                        group_name: rental.group_name.clone(),
                        end_date: rental.end_date,
                        days_left: remaining.num_days(),
                    });
                }
                notices
            })
            .await;

        if !notices.is_empty() {
            tracing::info!(notices = notices.len(), "Rental sweep produced notices");
        }
        notices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::state_store::testing::memory_store;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn service(remind_once: bool) -> (RentalService, Arc<StateStore>) {
        let (store, _) = memory_store();
        (
            RentalService::new(Arc::clone(&store), chrono_tz::UTC, Duration::hours(72), remind_once),
            store,
        )
    }

    #[test]
    fn end_dates_follow_the_plan() {
        let start = date(2025, 1, 1);
        assert_eq!(end_date(start, "mensal"), date(2025, 2, 1));
        assert_eq!(end_date(start, "anual"), date(2026, 1, 1));
        assert_eq!(end_date(start, "semanal"), date(2025, 1, 8));
        assert_eq!(end_date(start, "quinzenal"), date(2025, 1, 16));
        assert_eq!(end_date(start, "Trimestral"), date(2025, 4, 1));
        assert_eq!(end_date(start, "semestral"), date(2025, 7, 1));
        assert_eq!(end_date(start, "vitalicio"), date(2124, 1, 1));
        assert_eq!(end_date(start, "weekly"), date(2025, 1, 8));
    }

    #[test]
    fn unknown_plan_falls_back_to_monthly() {
        assert_eq!(end_date(date(2025, 1, 1), "platinum"), date(2025, 2, 1));
    }

    #[test]
    fn parses_rental_requests() {
        let req = RentalRequest::parse("123@g.us | My Group | 5511999 | Mensal | 50,5 | Ana").unwrap();
        assert_eq!(req.group_id, "123@g.us");
        assert_eq!(req.value, 50.5);
        assert_eq!(req.renter_name, "Ana");

        let no_name = RentalRequest::parse("123@g.us|G|5511|mensal|30").unwrap();
        assert_eq!(no_name.renter_name, "");
    }

    #[test]
    fn rejects_malformed_requests() {
        assert_eq!(
            RentalRequest::parse("a|b|c"),
            Err(RentalError::WrongFieldCount(3))
        );
        assert_eq!(
            RentalRequest::parse("a|b|c|mensal|lots"),
            Err(RentalError::InvalidValue("lots".into()))
        );
        assert_eq!(
            RentalRequest::parse("|b|c|mensal|10"),
            Err(RentalError::EmptyField("group id"))
        );
    }

    #[tokio::test]
    async fn register_computes_dates_from_today() {
        let (rentals, store) = service(false);
        let req = RentalRequest::parse("g|G|5511|mensal|30").unwrap();

        let rental = rentals.register(req, utc(2025, 1, 1, 12)).await;
        assert_eq!(rental.start_date, date(2025, 1, 1));
        assert_eq!(rental.end_date, date(2025, 2, 1));
        assert!(rental.active);
        assert_eq!(store.read(|s| s.rentals.len()).await, 1);
    }

    #[tokio::test]
    async fn sweep_expires_and_reminds() {
        let (rentals, store) = service(false);
        rentals
            .register(RentalRequest::parse("old|Old|1|semanal|10").unwrap(), utc(2025, 1, 1, 0))
            .await;
        rentals
            .register(RentalRequest::parse("soon|Soon|1|semanal|10").unwrap(), utc(2025, 1, 7, 0))
            .await;
        rentals
            .register(RentalRequest::parse("fine|Fine|1|anual|10").unwrap(), utc(2025, 1, 7, 0))
            .await;

        // "old" ends 2025-01-08, "soon" ends 2025-01-14.
        let notices = rentals.sweep(utc(2025, 1, 12, 0)).await;
        assert_eq!(notices.len(), 2);
        assert!(matches!(&notices[0], RentalNotice::Expired { group_id, .. } if group_id == "old"));
        assert!(matches!(
            &notices[1],
            RentalNotice::ExpiringSoon { group_id, days_left: 2, .. } if group_id == "soon"
        ));

        let active: Vec<bool> = store.read(|s| s.rentals.iter().map(|r| r.active).collect()).await;
        assert_eq!(active, vec![false, true, true]);

        // Expired rentals stay inactive and are not reported again.
        let again = rentals.sweep(utc(2025, 1, 12, 1)).await;
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].group_id(), "soon");
    }

    #[tokio::test]
    async fn remind_once_suppresses_repeats() {
        let (rentals, _) = service(true);
        rentals
            .register(RentalRequest::parse("soon|Soon|1|semanal|10").unwrap(), utc(2025, 1, 7, 0))
            .await;

        assert_eq!(rentals.sweep(utc(2025, 1, 12, 0)).await.len(), 1);
        assert!(rentals.sweep(utc(2025, 1, 12, 1)).await.is_empty());
    }

    #[tokio::test]
    async fn deactivate_and_active_groups() {
        let (rentals, _) = service(false);
        let now = utc(2025, 1, 1, 0);
        rentals.register(RentalRequest::parse("a|A|1|mensal|1").unwrap(), now).await;
        rentals.register(RentalRequest::parse("a|A|1|anual|1").unwrap(), now).await;
        rentals.register(RentalRequest::parse("b|B|1|mensal|1").unwrap(), now).await;

        assert_eq!(rentals.active_groups().await, vec!["a".to_string(), "b".to_string()]);
        assert!(rentals.deactivate(3).await.is_some());
        assert!(rentals.deactivate(0).await.is_none());
        assert!(rentals.deactivate(9).await.is_none());
        assert_eq!(rentals.active_groups().await, vec!["a".to_string()]);
    }
}
