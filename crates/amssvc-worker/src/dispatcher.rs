//! Job dispatcher.
//!
//! One iteration claims at most one job, makes the two provider calls for it
//! and records the outcome. Shutdown is only observed between iterations, so
//! a claimed job is never left in `running` by a stop request.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn, Instrument};

use amssvc_media::{AmsJobRequest, CredentialReader, MediaError, MediaResult, MediaServicesApi, SourceMedia};
use amssvc_models::{Job, JobId, JobStatus, StatusUpdate};
use amssvc_store::JobStore;

use crate::config::{CompletionPolicy, DispatcherConfig};
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::metrics::{record_job_claimed, record_job_failed, record_job_finished};

/// Result of a single dispatch iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing was claimed.
    Idle,
    /// A job was claimed and its final status recorded.
    Processed { job_id: JobId, status: JobStatus },
}

/// Moves dispatchable jobs from the store to the media services provider.
pub struct Dispatcher {
    store: Arc<JobStore>,
    media: Arc<dyn MediaServicesApi>,
    credentials: CredentialReader,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        store: Arc<JobStore>,
        media: Arc<dyn MediaServicesApi>,
        credentials: CredentialReader,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            store,
            media,
            credentials,
            config,
        }
    }

    /// Claim and dispatch at most one job.
    ///
    /// No job is claimed while no credential has been published.
    pub async fn run_once(&self) -> WorkerResult<DispatchOutcome> {
        if !self.credentials.is_available() {
            debug!("No credential available yet, not claiming");
            return Ok(DispatchOutcome::Idle);
        }

        let job = match self.store.get_next().await {
            Ok(job) => job,
            Err(e) if e.is_not_found() => {
                debug!("No dispatchable job, polling again");
                return Ok(DispatchOutcome::Idle);
            }
            Err(e) => return Err(e.into()),
        };

        record_job_claimed();
        let logger = JobLogger::new(&job.id, &job.source_url);
        logger.log_claimed();

        let update = self
            .dispatch(&job, &logger)
            .instrument(logger.create_span())
            .await;
        let status = update.status();

        match status {
            JobStatus::Failed => {
                record_job_failed();
                logger.log_error(update.error_message());
            }
            _ => {
                record_job_finished();
                logger.log_completion("submitted to media services");
            }
        }

        if let Err(e) = self.store.set_status(&job.id, &update).await {
            // Deleted while in flight; the provider calls already happened.
            logger.log_warning(&format!("could not record status {}: {}", status, e));
        }

        Ok(DispatchOutcome::Processed {
            job_id: job.id,
            status,
        })
    }

    /// Make both provider calls and decide the status to record.
    async fn dispatch(&self, job: &Job, logger: &JobLogger) -> StatusUpdate {
        let media = match SourceMedia::parse(&job.source_url) {
            Ok(media) => media,
            Err(e) => return StatusUpdate::failed(e.to_string()),
        };

        let asset_name = media.asset_name();
        match self.create_asset(&asset_name).await {
            Ok(()) => logger.log_progress(&format!("created asset {}", asset_name)),
            Err(e) => match self.config.completion {
                CompletionPolicy::Strict => return StatusUpdate::failed(e.to_string()),
                CompletionPolicy::Optimistic => logger.log_warning(&e.to_string()),
            },
        }

        let request = media.job_request(&self.config.sas_token);
        match self.submit_job(&job.id, &request).await {
            Ok(()) => StatusUpdate::finished(),
            Err(e) => match self.config.completion {
                CompletionPolicy::Strict => StatusUpdate::failed(e.to_string()),
                CompletionPolicy::Optimistic => {
                    logger.log_warning(&e.to_string());
                    StatusUpdate::finished()
                }
            },
        }
    }

    async fn create_asset(&self, asset_name: &str) -> MediaResult<()> {
        let token = self.bearer_token()?;
        self.media.create_asset(asset_name, &token).await
    }

    async fn submit_job(&self, job_id: &JobId, request: &AmsJobRequest) -> MediaResult<()> {
        let token = self.bearer_token()?;
        self.media.submit_job(job_id, request, &token).await
    }

    /// The latest published credential, read fresh for every call.
    fn bearer_token(&self) -> MediaResult<String> {
        self.credentials
            .current()
            .ok_or_else(|| MediaError::credential_failure("no credential published"))
    }

    /// Dispatch until the shutdown signal flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            completion = %self.config.completion,
            "Starting dispatcher"
        );

        tokio::select! {
            token = self.credentials.wait_for_credential() => {
                if token.is_none() {
                    warn!("Credential publisher dropped before publishing, stopping dispatcher");
                    return;
                }
                debug!("Credential available, dispatching");
            }
            _ = wait_for_shutdown(&mut shutdown) => {
                info!("Dispatcher stopped");
                return;
            }
        }

        loop {
            if *shutdown.borrow() {
                break;
            }

            let delay = match self.run_once().await {
                Ok(DispatchOutcome::Processed { .. }) => Duration::ZERO,
                Ok(DispatchOutcome::Idle) => self.config.poll_interval,
                Err(e) => {
                    error!("Error dispatching job: {}", e);
                    self.config.poll_interval
                }
            };

            if delay.is_zero() {
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }

        info!("Dispatcher stopped");
    }
}

/// Resolves once shutdown has been requested or the sender is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, OnceLock};

    use async_trait::async_trait;

    use amssvc_media::{credential_channel, CredentialPublisher};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Asset { name: String, token: String },
        Job { id: JobId, base_uri: String, token: String },
    }

    /// Provider double recording every call.
    #[derive(Default)]
    struct RecordingApi {
        calls: Mutex<Vec<Call>>,
        fail_asset: bool,
        fail_job: bool,
        /// Store to delete the job from while it is being submitted.
        delete_on_submit: OnceLock<Arc<JobStore>>,
    }

    impl RecordingApi {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MediaServicesApi for RecordingApi {
        async fn create_asset(&self, asset_name: &str, token: &str) -> MediaResult<()> {
            self.calls.lock().unwrap().push(Call::Asset {
                name: asset_name.to_string(),
                token: token.to_string(),
            });
            if self.fail_asset {
                Err(MediaError::external_call("create_asset", Some(500), "status 500"))
            } else {
                Ok(())
            }
        }

        async fn submit_job(&self, job_id: &JobId, request: &AmsJobRequest, token: &str) -> MediaResult<()> {
            self.calls.lock().unwrap().push(Call::Job {
                id: job_id.clone(),
                base_uri: request.properties.input.base_uri.clone(),
                token: token.to_string(),
            });
            if let Some(store) = self.delete_on_submit.get() {
                store.delete_by_id(job_id).await.unwrap();
            }
            if self.fail_job {
                Err(MediaError::external_call("submit_job", Some(400), "status 400"))
            } else {
                Ok(())
            }
        }
    }

    struct Fixture {
        store: Arc<JobStore>,
        api: Arc<RecordingApi>,
        publisher: CredentialPublisher,
        dispatcher: Dispatcher,
    }

    fn fixture(api: RecordingApi, completion: CompletionPolicy) -> Fixture {
        let store = Arc::new(JobStore::new());
        let api = Arc::new(api);
        let (publisher, reader) = credential_channel();
        let dispatcher = Dispatcher::new(
            Arc::clone(&store),
            api.clone(),
            reader,
            DispatcherConfig {
                poll_interval: Duration::from_millis(10),
                completion,
                sas_token: "?sig=abc".to_string(),
            },
        );
        Fixture {
            store,
            api,
            publisher,
            dispatcher,
        }
    }

    async fn add_job(store: &JobStore, source_url: &str) -> Job {
        store
            .save(Job::create("clip", source_url).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_makes_both_calls_and_finishes() {
        let f = fixture(RecordingApi::default(), CompletionPolicy::Strict);
        f.publisher.publish("tok");
        let job = add_job(&f.store, "https://host/path/clip.mp4").await;

        let outcome = f.dispatcher.run_once().await.unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Processed {
                job_id: job.id.clone(),
                status: JobStatus::Finished
            }
        );
        assert_eq!(
            f.api.calls(),
            vec![
                Call::Asset {
                    name: "clip_proxy".to_string(),
                    token: "tok".to_string()
                },
                Call::Job {
                    id: job.id.clone(),
                    base_uri: "https://host/path/?sig=abc".to_string(),
                    token: "tok".to_string()
                },
            ]
        );
        assert_eq!(f.store.find_by_id(&job.id).await.unwrap().status, JobStatus::Finished);
    }

    #[tokio::test]
    async fn test_empty_queue_is_idle() {
        let f = fixture(RecordingApi::default(), CompletionPolicy::Strict);
        f.publisher.publish("tok");

        assert_eq!(f.dispatcher.run_once().await.unwrap(), DispatchOutcome::Idle);
        assert!(f.api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_claim_without_credential() {
        let f = fixture(RecordingApi::default(), CompletionPolicy::Strict);
        let job = add_job(&f.store, "https://host/path/clip.mp4").await;

        assert_eq!(f.dispatcher.run_once().await.unwrap(), DispatchOutcome::Idle);
        assert_eq!(f.store.find_by_id(&job.id).await.unwrap().status, JobStatus::Created);
        assert!(f.api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_strict_asset_failure_skips_submission() {
        let api = RecordingApi {
            fail_asset: true,
            ..Default::default()
        };
        let f = fixture(api, CompletionPolicy::Strict);
        f.publisher.publish("tok");
        let job = add_job(&f.store, "https://host/path/clip.mp4").await;

        f.dispatcher.run_once().await.unwrap();

        let stored = f.store.find_by_id(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(stored.error_message.contains("create_asset"));
        assert_eq!(f.api.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_strict_submission_failure_marks_failed() {
        let api = RecordingApi {
            fail_job: true,
            ..Default::default()
        };
        let f = fixture(api, CompletionPolicy::Strict);
        f.publisher.publish("tok");
        let job = add_job(&f.store, "https://host/path/clip.mp4").await;

        f.dispatcher.run_once().await.unwrap();

        let stored = f.store.find_by_id(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(stored.error_message.contains("submit_job"));
    }

    #[tokio::test]
    async fn test_optimistic_policy_finishes_despite_failures() {
        let api = RecordingApi {
            fail_asset: true,
            fail_job: true,
            ..Default::default()
        };
        let f = fixture(api, CompletionPolicy::Optimistic);
        f.publisher.publish("tok");
        let job = add_job(&f.store, "https://host/path/clip.mp4").await;

        f.dispatcher.run_once().await.unwrap();

        let stored = f.store.find_by_id(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Finished);
        assert_eq!(stored.error_message, "");
        assert_eq!(f.api.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_job_deleted_in_flight_is_skipped() {
        let f = fixture(RecordingApi::default(), CompletionPolicy::Strict);
        f.api.delete_on_submit.set(Arc::clone(&f.store)).unwrap();
        f.publisher.publish("tok");
        let job = add_job(&f.store, "https://host/path/clip.mp4").await;

        let outcome = f.dispatcher.run_once().await.unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Processed {
                job_id: job.id.clone(),
                status: JobStatus::Finished
            }
        );
        assert!(f.store.is_empty().await);
        assert_eq!(f.dispatcher.run_once().await.unwrap(), DispatchOutcome::Idle);
    }

    #[tokio::test]
    async fn test_invalid_source_fails_without_calls() {
        let f = fixture(RecordingApi::default(), CompletionPolicy::Optimistic);
        f.publisher.publish("tok");
        let job = add_job(&f.store, "not a url").await;

        f.dispatcher.run_once().await.unwrap();

        let stored = f.store.find_by_id(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(f.api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_latest_credential_is_used() {
        let f = fixture(RecordingApi::default(), CompletionPolicy::Strict);
        f.publisher.publish("old");
        f.publisher.publish("new");
        add_job(&f.store, "https://host/path/clip.mp4").await;

        f.dispatcher.run_once().await.unwrap();

        for call in f.api.calls() {
            match call {
                Call::Asset { token, .. } | Call::Job { token, .. } => assert_eq!(token, "new"),
            }
        }
    }

    #[tokio::test]
    async fn test_jobs_dispatched_oldest_first() {
        let f = fixture(RecordingApi::default(), CompletionPolicy::Strict);
        f.publisher.publish("tok");
        let first = add_job(&f.store, "https://host/a/first.mp4").await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        let second = add_job(&f.store, "https://host/a/second.mp4").await;

        let outcomes = [
            f.dispatcher.run_once().await.unwrap(),
            f.dispatcher.run_once().await.unwrap(),
            f.dispatcher.run_once().await.unwrap(),
        ];

        assert!(matches!(&outcomes[0], DispatchOutcome::Processed { job_id, .. } if *job_id == first.id));
        assert!(matches!(&outcomes[1], DispatchOutcome::Processed { job_id, .. } if *job_id == second.id));
        assert_eq!(outcomes[2], DispatchOutcome::Idle);
    }

    #[tokio::test]
    async fn test_run_waits_for_credential_and_stops_on_shutdown() {
        let f = fixture(RecordingApi::default(), CompletionPolicy::Strict);
        let job = add_job(&f.store, "https://host/path/clip.mp4").await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let dispatcher = Arc::new(f.dispatcher);

        let handle = {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move { dispatcher.run(shutdown_rx).await })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(f.store.find_by_id(&job.id).await.unwrap().status, JobStatus::Created);

        f.publisher.publish("tok");
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if f.store.find_by_id(&job.id).await.unwrap().status == JobStatus::Finished {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("job should be dispatched once a credential exists");

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("dispatcher should stop on shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_before_first_credential() {
        let f = fixture(RecordingApi::default(), CompletionPolicy::Strict);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let dispatcher = f.dispatcher;

        let handle = tokio::spawn(async move { dispatcher.run(shutdown_rx).await });
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("dispatcher should stop while waiting for a credential")
            .unwrap();
        drop(f.publisher);
    }
}
