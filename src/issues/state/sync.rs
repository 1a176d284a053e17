//! Repository selection and the label/milestone/issue refresh protocol

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use super::{Collection, Inner, IssueRepositoryState, StateEvent};
use crate::issues::error::IssueError;
use crate::issues::filter::{LabelFilter, MilestoneFilter};
use crate::issues::gateway::RemoteGitHubGateway;
use crate::issues::models::{IssueRequest, RepositoryRef};

const NO_EVENTS: &[StateEvent] = &[];

impl IssueRepositoryState {
    /// Selects the repository to browse
    ///
    /// Selecting the repository that is already selected (same id) does
    /// nothing and returns `None`. Otherwise the selection is persisted, the
    /// repository-scoped collections are cleared before this returns, and a
    /// refresh of labels, milestones and issues is spawned on the current
    /// tokio runtime. The returned handle completes once all three fetches
    /// have landed (or failed).
    pub fn set_repository(&self, repository: Option<RepositoryRef>) -> Option<JoinHandle<()>> {
        let generation = {
            let mut inner = self.lock();
            if inner.repository == repository {
                return None;
            }
            inner.repository = repository.clone();
            inner.generation += 1;
            inner.clear_repository_data();
            inner.generation
        };

        match &repository {
            Some(repository) => tracing::info!("Selected repository {}", repository.full_name()),
            None => tracing::info!("Cleared repository selection"),
        }

        if let Err(e) = self
            .shared
            .store
            .set_selected_repository_id(repository.as_ref().map(|repository| repository.id))
        {
            self.report_failure("Failed to save the selected repository", &e);
        }

        self.emit(&[
            StateEvent::RepositoryChanged,
            StateEvent::LabelsChanged,
            StateEvent::MilestonesChanged,
            StateEvent::FilterChanged,
            StateEvent::SelectedIssueChanged,
            StateEvent::IssueMarkdownChanged,
            StateEvent::IssuesChanged,
        ]);

        if repository.is_none() {
            return None;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                let err = IssueError::Configuration(format!(
                    "No tokio runtime to refresh the repository on: {}",
                    e
                ));
                self.report_failure("Failed to refresh repository", &err);
                return None;
            }
        };

        let state = self.clone();
        Some(runtime.spawn(async move { state.refresh_generation(generation).await }))
    }

    /// Re-fetches labels, milestones and issues for the selected repository
    pub async fn refresh(&self) {
        let generation = self.generation();
        self.refresh_generation(generation).await;
    }

    pub async fn refresh_labels(&self) {
        let generation = self.generation();
        self.fetch_labels(generation).await;
    }

    pub async fn refresh_milestones(&self) {
        let generation = self.generation();
        self.fetch_milestones(generation).await;
    }

    pub async fn refresh_issues(&self) {
        let generation = self.generation();
        self.fetch_issues(generation).await;
    }

    /// Issued in order labels, milestones, issues; completes in any order
    async fn refresh_generation(&self, generation: u64) {
        tokio::join!(
            self.fetch_labels(generation),
            self.fetch_milestones(generation),
            self.fetch_issues(generation),
        );
    }

    async fn fetch_labels(&self, generation: u64) {
        self.fetch_collection(
            Collection::Labels,
            generation,
            |gateway, repository| async move {
                gateway
                    .fetch_labels(&repository.owner, &repository.name)
                    .await
            },
            |inner, labels| {
                inner.labels = labels;
                inner.filter.label = LabelFilter::All;
                &[
                    StateEvent::LabelsChanged,
                    StateEvent::FilterChanged,
                    StateEvent::IssuesChanged,
                ]
            },
        )
        .await;
    }

    async fn fetch_milestones(&self, generation: u64) {
        self.fetch_collection(
            Collection::Milestones,
            generation,
            |gateway, repository| async move {
                gateway
                    .fetch_milestones(&repository.owner, &repository.name)
                    .await
            },
            |inner, milestones| {
                inner.milestones = milestones;
                inner.filter.milestone = MilestoneFilter::All;
                &[
                    StateEvent::MilestonesChanged,
                    StateEvent::FilterChanged,
                    StateEvent::IssuesChanged,
                ]
            },
        )
        .await;
    }

    async fn fetch_issues(&self, generation: u64) {
        self.fetch_collection(
            Collection::Issues,
            generation,
            |gateway, repository| async move {
                gateway
                    .fetch_issues(&repository.owner, &repository.name, IssueRequest::Open)
                    .await
            },
            |inner, issues| {
                inner.all_issues = issues.into_iter().map(Arc::new).collect();
                &[StateEvent::IssuesChanged]
            },
        )
        .await;
    }

    /// Claims the in-flight guard for `collection`
    ///
    /// Returns the repository to fetch for, or `None` if the generation is
    /// stale, no repository is selected, or a fetch is already outstanding.
    fn begin_fetch(&self, collection: Collection, generation: u64) -> Option<RepositoryRef> {
        let mut inner = self.lock();
        if inner.generation != generation {
            tracing::debug!("Skipping {} fetch for a superseded selection", collection);
            return None;
        }
        let repository = inner.repository.clone()?;
        if !inner.in_flight.try_begin(collection, generation) {
            tracing::debug!("A {} fetch is already in flight, dropping request", collection);
            return None;
        }
        Some(repository)
    }

    async fn fetch_collection<T, F, Fut, A>(
        &self,
        collection: Collection,
        generation: u64,
        fetch: F,
        apply: A,
    ) where
        F: FnOnce(Arc<dyn RemoteGitHubGateway>, RepositoryRef) -> Fut,
        Fut: Future<Output = Result<Vec<T>, IssueError>>,
        A: FnOnce(&mut Inner, Vec<T>) -> &'static [StateEvent],
    {
        let Some(repository) = self.begin_fetch(collection, generation) else {
            return;
        };

        tracing::info!("Fetching {} for {}", collection, repository.full_name());
        let full_name = repository.full_name();
        let result = fetch(Arc::clone(&self.shared.gateway), repository).await;

        let outcome = {
            let mut inner = self.lock();
            inner.in_flight.finish(collection, generation);
            match result {
                Ok(items) if inner.generation == generation => {
                    tracing::debug!(
                        "Fetched {} {} for {}",
                        items.len(),
                        collection,
                        full_name
                    );
                    Ok(apply(&mut *inner, items))
                }
                Ok(_) => {
                    tracing::debug!(
                        "Discarding {} for {}: the selection changed",
                        collection,
                        full_name
                    );
                    Ok(NO_EVENTS)
                }
                Err(e) if inner.generation == generation => Err(e),
                Err(e) => {
                    tracing::debug!(
                        "Ignoring failed {} fetch for {}: the selection changed: {}",
                        collection,
                        full_name,
                        e
                    );
                    Ok(NO_EVENTS)
                }
            }
        };

        match outcome {
            Ok(events) => self.emit(events),
            Err(e) => {
                self.report_failure(&format!("Failed to fetch {} for {}", collection, full_name), &e)
            }
        }
    }
}
