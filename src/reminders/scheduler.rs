//! Background cadence: settle closed listings and deliver due reminders.
//!
//! One timer for the whole process, owned by an explicit [`SchedulerHandle`]
//! whose `cancel()` is the only teardown path. Delivery is at-least-once:
//! `sent` flips only after the mailer reports success, so a failed dispatch
//! stays eligible and is retried on the next tick.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::mailer::{self, Mailer};
use crate::meals::repo as meals_repo;
use crate::reminders::repo::{self, ReminderRow};
use crate::state::AppState;

pub const POLL_INTERVAL_SECS: u64 = 60;

pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the polling loop. An in-flight tick is allowed to finish before
    /// the task exits.
    pub async fn cancel(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "scheduler task panicked");
        }
    }
}

pub fn start(state: AppState) -> SchedulerHandle {
    let (shutdown, mut watch_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(POLL_INTERVAL_SECS));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = tick.tick() => run_once(&state).await,
                _ = watch_rx.changed() => {
                    info!("reminder scheduler stopped");
                    break;
                }
            }
        }
    });
    SchedulerHandle { shutdown, task }
}

async fn run_once(state: &AppState) {
    match meals_repo::settle_due(&state.db, None).await {
        Ok(settled) if !settled.is_empty() => {
            info!(count = settled.len(), "listings settled");
        }
        Ok(_) => {}
        Err(e) => error!(error = %e, "settlement sweep failed"),
    }

    let due = match repo::due(&state.db).await {
        Ok(due) => due,
        Err(e) => {
            error!(error = %e, "reminder poll failed");
            return;
        }
    };
    if due.is_empty() {
        return;
    }
    debug!(count = due.len(), "reminders due");

    let delivered = dispatch_batch(
        state.mailer.clone(),
        &state.config.email.reminder_template_id,
        &due,
    )
    .await;
    for id in delivered {
        if let Err(e) = repo::mark_sent(&state.db, id).await {
            // Left unsent; the next tick will retry and the recipient may
            // get the reminder twice. At-least-once is the contract.
            error!(reminder_id = %id, error = %e, "could not mark reminder sent");
        }
    }
}

/// Dispatch each due reminder, returning the ids that were actually
/// delivered. Failures are logged and skipped so one bad address cannot
/// starve the rest of the batch.
pub async fn dispatch_batch(
    mailer: Arc<dyn Mailer>,
    template_id: &str,
    due: &[ReminderRow],
) -> Vec<Uuid> {
    let mut delivered = Vec::with_capacity(due.len());
    for reminder in due {
        let params = mailer::reminder_params(
            &reminder.recipient_email,
            &reminder.meal_title,
            reminder.pickup_time,
            &reminder.food_items.0,
        );
        match mailer.send(template_id, &params).await {
            Ok(()) => {
                info!(reminder_id = %reminder.id, recipient = %reminder.recipient_email, "reminder sent");
                delivered.push(reminder.id);
            }
            Err(e) => {
                warn!(reminder_id = %reminder.id, error = %e, "reminder dispatch failed, will retry");
            }
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::async_trait;
    use sqlx::types::Json;
    use std::sync::Mutex;
    use time::OffsetDateTime;

    struct FlakyMailer {
        reject: &'static str,
        sent_to: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Mailer for FlakyMailer {
        async fn send(&self, _template_id: &str, params: &serde_json::Value) -> anyhow::Result<()> {
            let to = params["to_email"].as_str().unwrap_or_default().to_string();
            if to == self.reject {
                anyhow::bail!("mailbox unavailable");
            }
            self.sent_to.lock().unwrap().push(to);
            Ok(())
        }
    }

    fn reminder(recipient: &str) -> ReminderRow {
        let now = OffsetDateTime::now_utc();
        ReminderRow {
            id: Uuid::new_v4(),
            recipient_email: recipient.into(),
            meal_title: "Veg Thali".into(),
            pickup_time: now,
            food_items: Json(vec!["rice".into()]),
            reminder_time: now,
            sent: false,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn failed_dispatch_is_excluded_from_the_delivered_set() {
        let mailer = Arc::new(FlakyMailer {
            reject: "down@x.edu",
            sent_to: Mutex::new(vec![]),
        });
        let ok = reminder("up@x.edu");
        let bad = reminder("down@x.edu");
        let due = vec![ok.clone(), bad.clone()];

        let delivered = dispatch_batch(mailer.clone(), "template_reminder", &due).await;

        // The failed reminder stays unsent and eligible for the next poll;
        // the rest of the batch still goes out.
        assert_eq!(delivered, vec![ok.id]);
        assert_eq!(*mailer.sent_to.lock().unwrap(), vec!["up@x.edu".to_string()]);
    }

    #[tokio::test]
    async fn all_successes_are_delivered_in_order() {
        let mailer = Arc::new(FlakyMailer {
            reject: "",
            sent_to: Mutex::new(vec![]),
        });
        let a = reminder("a@x.edu");
        let b = reminder("b@x.edu");
        let delivered = dispatch_batch(mailer, "template_reminder", &[a.clone(), b.clone()]).await;
        assert_eq!(delivered, vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn cancel_stops_the_loop_and_joins_the_task() {
        let state = AppState::fake();
        let handle = start(state);
        // Cancellation must complete even though the lazy pool never
        // connects; the select loop exits on the watch signal.
        tokio::time::timeout(std::time::Duration::from_secs(5), handle.cancel())
            .await
            .expect("cancel should not hang");
    }
}
