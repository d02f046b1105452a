use std::sync::Arc;

use chrono::{DateTime, Utc};
use rocket::{
    fairing::{Fairing, Info, Kind},
    tokio::{sync::Mutex, time::Duration},
    Build, Orbit, Rocket,
};
use serde::Serialize;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::id::ApiId,
    common::election::ElectionStatus,
    db::election::{ElectionQuery, Mutation, Precondition},
    mongodb::Id,
};
use crate::scheduled_task::RecurringTask;

use super::{Publisher, Voting};

/// An election the reconciler could not publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileFailure {
    pub election_id: ApiId,
    pub error: String,
}

/// What one reconciliation run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub started_at: DateTime<Utc>,
    /// Elections examined, whether or not they could be published.
    pub processed: usize,
    pub published: Vec<ApiId>,
    pub failed: Vec<ReconcileFailure>,
    /// Set when the run stopped before examining every election.
    pub aborted: Option<String>,
}

impl ReconciliationReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            processed: 0,
            published: Vec::new(),
            failed: Vec::new(),
            aborted: None,
        }
    }

    fn fail(&mut self, id: Id, err: &Error) {
        self.failed.push(ReconcileFailure {
            election_id: id.into(),
            error: err.to_string(),
        });
    }
}

/// Publish every election whose voting window closed before `now` but whose
/// results are still unpublished.
///
/// Failures on one election do not stop the others, with one exception: an
/// invariant violation means stored data is corrupt, so the run stops there.
pub async fn run_once(voting: &Voting, now: DateTime<Utc>) -> ReconciliationReport {
    let mut report = ReconciliationReport::new(now);

    let due = match voting
        .retrying(|| voting.store.find(ElectionQuery::Unreconciled(now)))
        .await
    {
        Ok(due) => due,
        Err(err) => {
            warn!("Reconciliation could not list closed elections: {err}");
            report.aborted = Some(err.to_string());
            return report;
        }
    };

    for election in due {
        report.processed += 1;
        match voting
            .publish_results(election.id, Publisher::Reconciler, now)
            .await
        {
            Ok(_) => report.published.push(election.id.into()),
            Err(Error::AlreadyPublished(id)) => {
                debug!("Election {id} was published by someone else");
            }
            Err(err @ Error::NoNominees(_)) => {
                warn!("Cannot publish election {}: {err}", election.id);
                if let Err(mark_err) = voting.mark_ended(election.id).await {
                    warn!("Could not mark election {} ended: {mark_err}", election.id);
                }
                report.fail(election.id, &err);
            }
            Err(err @ Error::InvariantViolation(_)) => {
                error!("Election {} is corrupt, stopping reconciliation: {err}", election.id);
                report.fail(election.id, &err);
                report.aborted = Some(err.to_string());
                break;
            }
            Err(err) => {
                warn!("Failed to publish election {}: {err}", election.id);
                report.fail(election.id, &err);
            }
        }
    }

    info!(
        "Reconciliation processed {} elections: {} published, {} failed",
        report.processed,
        report.published.len(),
        report.failed.len()
    );
    report
}

impl Voting {
    /// Close out an election that cannot be published. Only moves forward.
    async fn mark_ended(&self, id: Id) -> Result<bool> {
        let preconditions = [
            Precondition::Unpublished,
            Precondition::StatusIn(vec![ElectionStatus::Pending, ElectionStatus::Active]),
        ];
        let mutation = Mutation::MarkEnded;
        let updated = self
            .store
            .find_one_and_update(id, &preconditions, &mutation)
            .await?;
        Ok(updated.is_some())
    }
}

/// Owner of the background reconciliation task.
pub struct Reconciler {
    task: Mutex<Option<RecurringTask>>,
    last_report: Arc<Mutex<Option<ReconciliationReport>>>,
    interval: Duration,
}

/// Reconciler state, as reported to administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcilerStatus {
    pub running: bool,
    pub interval_secs: u64,
    pub last_report: Option<ReconciliationReport>,
}

impl Reconciler {
    /// Start reconciling now and then every `interval`.
    pub fn start(voting: Voting, interval: Duration) -> Self {
        let last_report: Arc<Mutex<Option<ReconciliationReport>>> = Default::default();
        let job_report = last_report.clone();
        let task = RecurringTask::spawn(interval, move || {
            let voting = voting.clone();
            let last_report = job_report.clone();
            async move {
                let report = run_once(&voting, Utc::now()).await;
                *last_report.lock().await = Some(report);
            }
        });
        info!("Reconciler started, running every {interval:?}");

        Self {
            task: Mutex::new(Some(task)),
            last_report,
            interval,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .map_or(false, RecurringTask::is_running)
    }

    /// Ask the background task to run now rather than at the next interval.
    pub async fn trigger_now(&self) {
        if let Some(task) = self.task.lock().await.as_ref() {
            task.trigger_now();
        }
    }

    /// Run once in the foreground and return the report.
    pub async fn run_now(&self, voting: &Voting) -> ReconciliationReport {
        let report = run_once(voting, Utc::now()).await;
        *self.last_report.lock().await = Some(report.clone());
        report
    }

    pub async fn last_report(&self) -> Option<ReconciliationReport> {
        self.last_report.lock().await.clone()
    }

    pub async fn status(&self) -> ReconcilerStatus {
        ReconcilerStatus {
            running: self.is_running().await,
            interval_secs: self.interval.as_secs(),
            last_report: self.last_report().await,
        }
    }

    /// Stop the background task. Idempotent.
    pub async fn stop(&self) {
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            task.cancel().await;
            info!("Reconciler stopped");
        }
    }
}

/// A fairing that starts the [`Reconciler`] once the service is configured and
/// stops it on shutdown.
pub struct ReconcilerFairing;

#[rocket::async_trait]
impl Fairing for ReconcilerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Reconciler",
            kind: Kind::Ignite | Kind::Shutdown,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let (Some(voting), Some(config)) = (rocket.state::<Voting>(), rocket.state::<Config>())
        else {
            error!("Cannot start reconciler: voting service or config unavailable");
            return Err(rocket);
        };
        let reconciler = Reconciler::start(voting.clone(), config.reconcile_interval());
        Ok(rocket.manage(reconciler))
    }

    async fn on_shutdown(&self, rocket: &Rocket<Orbit>) {
        if let Some(reconciler) = rocket.state::<Reconciler>() {
            reconciler.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::db::election::{BallotStore, ElectionCore};
    use crate::voting::examples::TestVoting;

    use super::*;

    #[rocket::async_test]
    async fn publishes_closed_elections_only() {
        let x = Id::new();
        let test = TestVoting::new(&[]);
        let closed = test
            .store
            .insert(ElectionCore::closed_example(&[x]).with_votes(&[3]))
            .await
            .unwrap();
        let open = test
            .store
            .insert(ElectionCore::example(&[x]).with_votes(&[1]))
            .await
            .unwrap();

        let report = run_once(&test.voting, Utc::now()).await;
        assert_eq!(report.processed, 1);
        assert_eq!(report.published, vec![ApiId::from(closed.id)]);
        assert!(report.failed.is_empty());
        assert!(report.aborted.is_none());

        let open = test.store.find_by_id(open.id).await.unwrap().unwrap();
        assert!(!open.result_published);
    }

    #[rocket::async_test]
    async fn running_twice_publishes_once() {
        let x = Id::new();
        let test = TestVoting::new(&[]);
        let closed = test
            .store
            .insert(ElectionCore::closed_example(&[x]).with_votes(&[1]))
            .await
            .unwrap();

        let first = run_once(&test.voting, Utc::now()).await;
        assert_eq!(first.published.len(), 1);
        let after_first = test.store.find_by_id(closed.id).await.unwrap().unwrap();

        let second = run_once(&test.voting, Utc::now()).await;
        assert_eq!(second.processed, 0);
        assert!(second.published.is_empty());
        let after_second = test.store.find_by_id(closed.id).await.unwrap().unwrap();
        assert_eq!(after_first, after_second);
    }

    #[rocket::async_test]
    async fn zero_nominees_is_marked_ended_and_reported() {
        let test = TestVoting::new(&[]);
        let empty = test
            .store
            .insert(ElectionCore::closed_example(&[]))
            .await
            .unwrap();

        let report = run_once(&test.voting, Utc::now()).await;
        assert_eq!(report.processed, 1);
        assert!(report.published.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].election_id, ApiId::from(empty.id));
        assert!(report.aborted.is_none());

        let stored = test.store.find_by_id(empty.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ElectionStatus::Ended);
        assert!(stored.winner.is_none());
        assert!(!stored.result_published);
    }

    #[rocket::async_test]
    async fn failures_do_not_stop_the_batch() {
        let x = Id::new();
        let test = TestVoting::new(&[]);
        let mut empty = ElectionCore::closed_example(&[]);
        empty.created_at += chrono::Duration::hours(1);
        test.store.insert(empty).await.unwrap();
        let good = test
            .store
            .insert(ElectionCore::closed_example(&[x]).with_votes(&[1]))
            .await
            .unwrap();

        let report = run_once(&test.voting, Utc::now()).await;
        assert_eq!(report.processed, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.published, vec![ApiId::from(good.id)]);
    }

    #[rocket::async_test]
    async fn invariant_violation_aborts_the_batch() {
        let x = Id::new();
        let test = TestVoting::new(&[]);
        let good = test
            .store
            .insert(ElectionCore::closed_example(&[x]).with_votes(&[1]))
            .await
            .unwrap();
        let mut corrupt = ElectionCore::closed_example(&[x]).with_votes(&[1]);
        corrupt.nominees[0].vote_count = 5;
        corrupt.created_at = good.created_at + chrono::Duration::hours(1);
        let corrupt = test.store.insert(corrupt).await.unwrap();

        let report = run_once(&test.voting, Utc::now()).await;
        assert_eq!(report.processed, 1);
        assert_eq!(report.failed[0].election_id, ApiId::from(corrupt.id));
        assert!(report.aborted.is_some());
        assert!(report.published.is_empty());

        let good = test.store.find_by_id(good.id).await.unwrap().unwrap();
        assert!(!good.result_published);
    }

    #[rocket::async_test]
    async fn unavailable_store_is_reported_not_raised() {
        let test = TestVoting::new(&[]);
        test.store.inject_failures(10);

        let report = run_once(&test.voting, Utc::now()).await;
        assert_eq!(report.processed, 0);
        assert!(report.aborted.is_some());
    }

    #[rocket::async_test]
    async fn handle_runs_triggers_and_stops() {
        let x = Id::new();
        let test = TestVoting::new(&[]);
        let reconciler = Reconciler::start(test.voting.clone(), Duration::from_secs(3600));
        assert!(reconciler.is_running().await);

        // The first run happens straight away.
        for _ in 0..200 {
            if reconciler.last_report().await.is_some() {
                break;
            }
            rocket::tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(reconciler.last_report().await.unwrap().processed, 0);

        // An election closing afterwards is picked up by a triggered run.
        let closed = test
            .store
            .insert(ElectionCore::closed_example(&[x]).with_votes(&[1]))
            .await
            .unwrap();
        reconciler.trigger_now().await;
        for _ in 0..200 {
            let stored = test.store.find_by_id(closed.id).await.unwrap().unwrap();
            if stored.result_published {
                break;
            }
            rocket::tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let stored = test.store.find_by_id(closed.id).await.unwrap().unwrap();
        assert!(stored.result_published);

        reconciler.stop().await;
        assert!(!reconciler.is_running().await);
        reconciler.stop().await;
    }
}
