// Console data loader - Joins the properties and items requests of a console
use crate::application::console_api::{ConsoleApi, Resource};
use crate::domain::console::{ConsoleData, Payload};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// A request to one of the two console resources failed.
#[derive(Debug, Error)]
#[error("{resource} request failed: {source}")]
pub struct LoadError {
    pub resource: Resource,
    #[source]
    pub source: anyhow::Error,
}

/// Result delivered to the completion callback of a load.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(ConsoleData),
    Failed(LoadError),
    /// The load was cancelled explicitly; not an error.
    Aborted,
}

impl LoadOutcome {
    pub fn is_aborted(&self) -> bool {
        matches!(self, LoadOutcome::Aborted)
    }
}

/// Lifecycle phase of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestPhase {
    Unsent = 0,
    Pending = 1,
    Done = 2,
}

impl RequestPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RequestPhase::Unsent,
            1 => RequestPhase::Pending,
            _ => RequestPhase::Done,
        }
    }
}

#[derive(Debug)]
enum Failure {
    Aborted,
    Failed(LoadError),
}

#[derive(Debug, Clone)]
struct SubRequest {
    resource: Resource,
    phase: Arc<AtomicU8>,
    token: CancellationToken,
}

impl SubRequest {
    fn new(resource: Resource) -> Self {
        Self {
            resource,
            phase: Arc::new(AtomicU8::new(RequestPhase::Unsent as u8)),
            token: CancellationToken::new(),
        }
    }

    fn phase(&self) -> RequestPhase {
        RequestPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: RequestPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    /// Abort the request if it is in flight. Unsent and finished requests
    /// are left alone.
    fn cancel(&self) -> bool {
        if self.phase() != RequestPhase::Pending {
            return false;
        }
        self.token.cancel();
        true
    }

    async fn run(&self, api: &dyn ConsoleApi, console_id: u64) -> Result<Payload, Failure> {
        let result = tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Failure::Aborted),
            result = api.fetch(self.resource, console_id) => result.map_err(|source| {
                Failure::Failed(LoadError {
                    resource: self.resource,
                    source,
                })
            }),
        };
        self.set_phase(RequestPhase::Done);
        result
    }

    /// Issue the request on its own task so it goes out regardless of how
    /// its sibling fares.
    fn spawn(
        &self,
        api: Arc<dyn ConsoleApi>,
        console_id: u64,
    ) -> impl Future<Output = Result<Payload, Failure>> + Send + 'static {
        let request = self.clone();
        let resource = self.resource;
        let task = tokio::spawn(async move { request.run(api.as_ref(), console_id).await });

        async move {
            task.await.unwrap_or_else(|e| {
                Err(Failure::Failed(LoadError {
                    resource,
                    source: anyhow::Error::new(e),
                }))
            })
        }
    }
}

/// Cancellation handle of an in-flight load.
#[derive(Debug, Clone)]
pub struct LoadHandle {
    console_id: u64,
    properties: SubRequest,
    items: SubRequest,
}

impl LoadHandle {
    fn new(console_id: u64) -> Self {
        Self {
            console_id,
            properties: SubRequest::new(Resource::Properties),
            items: SubRequest::new(Resource::Items),
        }
    }

    pub fn console_id(&self) -> u64 {
        self.console_id
    }

    pub fn phase(&self, resource: Resource) -> RequestPhase {
        match resource {
            Resource::Properties => self.properties.phase(),
            Resource::Items => self.items.phase(),
        }
    }

    /// Cancel both requests. Returns whether any request was still pending;
    /// cancelling a finished load is a no-op.
    pub fn cancel(&self) -> bool {
        let properties = self.properties.cancel();
        let items = self.items.cancel();
        properties || items
    }

    pub fn is_finished(&self) -> bool {
        self.properties.phase() == RequestPhase::Done && self.items.phase() == RequestPhase::Done
    }

    async fn join(&self, api: Arc<dyn ConsoleApi>) -> LoadOutcome {
        let properties = self.properties.spawn(api.clone(), self.console_id);
        let items = self.items.spawn(api, self.console_id);

        let outcome = match futures::future::try_join(properties, items).await {
            Ok((properties, items)) => LoadOutcome::Loaded(ConsoleData::new(properties, items)),
            Err(failure) => {
                // The sibling task keeps running until its token fires
                self.cancel();
                match failure {
                    Failure::Aborted => LoadOutcome::Aborted,
                    Failure::Failed(err) => LoadOutcome::Failed(err),
                }
            }
        };

        self.properties.set_phase(RequestPhase::Done);
        self.items.set_phase(RequestPhase::Done);
        outcome
    }
}

/// Fetch the properties and items of a console concurrently.
///
/// `callback` runs exactly once: with the joined data once both requests
/// succeed, with the first failure, or with [`LoadOutcome::Aborted`] when the
/// load was cancelled before anything failed.
pub fn load<F>(api: Arc<dyn ConsoleApi>, console_id: u64, callback: F) -> LoadHandle
where
    F: FnOnce(LoadOutcome) + Send + 'static,
{
    let handle = LoadHandle::new(console_id);
    handle.properties.set_phase(RequestPhase::Pending);
    handle.items.set_phase(RequestPhase::Pending);

    let task = handle.clone();
    tokio::spawn(async move {
        let outcome = task.join(api).await;
        callback(outcome);
    });

    handle
}

/// Run a single load to completion.
pub async fn fetch_console_data(api: Arc<dyn ConsoleApi>, console_id: u64) -> LoadOutcome {
    let (tx, rx) = tokio::sync::oneshot::channel();
    load(api, console_id, move |outcome| {
        let _ = tx.send(outcome);
    });
    rx.await.unwrap_or(LoadOutcome::Aborted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::FakeConsoleApi;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn start(api: &Arc<FakeConsoleApi>, id: u64) -> (LoadHandle, mpsc::UnboundedReceiver<LoadOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = load(api.clone(), id, move |outcome| {
            let _ = tx.send(outcome);
        });
        (handle, rx)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    /// Receive the single outcome and check nothing else follows it.
    async fn single_outcome(rx: &mut mpsc::UnboundedReceiver<LoadOutcome>) -> LoadOutcome {
        let outcome = rx.recv().await.expect("callback never fired");
        settle().await;
        assert!(rx.try_recv().is_err(), "callback fired more than once");
        outcome
    }

    #[tokio::test]
    async fn test_joins_both_payloads() {
        let api = Arc::new(FakeConsoleApi::new());
        api.push_payload(Resource::Properties, Payload::Structured(json!({"id": 5})));
        api.push_payload(Resource::Items, Payload::Encoded("[]".to_string()));

        let (handle, mut rx) = start(&api, 5);

        match single_outcome(&mut rx).await {
            LoadOutcome::Loaded(data) => {
                assert_eq!(data.properties, Payload::Structured(json!({"id": 5})));
                assert_eq!(data.items, Payload::Encoded("[]".to_string()));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(handle.is_finished());
        assert_eq!(api.calls(), vec![(Resource::Properties, 5), (Resource::Items, 5)]);
    }

    #[tokio::test]
    async fn test_failure_cancels_sibling() {
        let api = Arc::new(FakeConsoleApi::new());
        api.push_failure(Resource::Properties, "500 Internal Server Error");
        api.push_hang(Resource::Items);

        let (handle, mut rx) = start(&api, 2);

        match single_outcome(&mut rx).await {
            LoadOutcome::Failed(err) => {
                assert_eq!(err.resource, Resource::Properties);
                assert!(err.to_string().contains("500"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(api.calls().len(), 2);
        assert_eq!(api.abandoned(), 1);
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_both_requests_issued_when_one_fails_at_once() {
        let api = Arc::new(FakeConsoleApi::new());
        api.push_failure(Resource::Properties, "relative URL without a base");
        api.push_failure(Resource::Items, "relative URL without a base");

        let (_handle, mut rx) = start(&api, 6);

        assert!(matches!(single_outcome(&mut rx).await, LoadOutcome::Failed(_)));
        assert_eq!(
            api.calls(),
            vec![(Resource::Properties, 6), (Resource::Items, 6)]
        );
    }

    #[tokio::test]
    async fn test_cancel_pending_load_reports_abort() {
        let api = Arc::new(FakeConsoleApi::new());
        api.push_hang(Resource::Properties);
        api.push_hang(Resource::Items);

        let (handle, mut rx) = start(&api, 2);
        settle().await;
        assert_eq!(handle.phase(Resource::Properties), RequestPhase::Pending);

        assert!(handle.cancel());
        assert!(single_outcome(&mut rx).await.is_aborted());
        assert_eq!(api.abandoned(), 2);

        // Finished requests are not aborted again
        assert!(!handle.cancel());
    }

    #[tokio::test]
    async fn test_cancel_after_completion_is_noop() {
        let api = Arc::new(FakeConsoleApi::new());
        api.push_payload(Resource::Properties, Payload::Structured(json!({"id": 1})));
        api.push_payload(Resource::Items, Payload::Structured(json!([])));

        let (handle, mut rx) = start(&api, 1);
        let outcome = single_outcome(&mut rx).await;

        assert!(matches!(outcome, LoadOutcome::Loaded(_)));
        assert!(!handle.cancel());
        assert_eq!(api.abandoned(), 0);
    }

    #[tokio::test]
    async fn test_cancel_after_one_role_arrived() {
        let api = Arc::new(FakeConsoleApi::new());
        api.push_payload(Resource::Properties, Payload::Structured(json!({"id": 1})));
        api.push_hang(Resource::Items);

        let (handle, mut rx) = start(&api, 1);
        settle().await;
        assert_eq!(handle.phase(Resource::Properties), RequestPhase::Done);
        assert_eq!(handle.phase(Resource::Items), RequestPhase::Pending);

        assert!(handle.cancel());
        assert!(single_outcome(&mut rx).await.is_aborted());
    }

    #[tokio::test]
    async fn test_error_before_cancel_wins() {
        let api = Arc::new(FakeConsoleApi::new());
        let items_gate = api.push_gate(Resource::Items);
        api.push_hang(Resource::Properties);

        let (handle, mut rx) = start(&api, 3);
        settle().await;

        let _ = items_gate.send(Err(anyhow::anyhow!("connection reset")));
        settle().await;
        handle.cancel();

        match single_outcome(&mut rx).await {
            LoadOutcome::Failed(err) => assert_eq!(err.resource, Resource::Items),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_before_error_wins() {
        let api = Arc::new(FakeConsoleApi::new());
        let properties_gate = api.push_gate(Resource::Properties);
        api.push_hang(Resource::Items);

        let (handle, mut rx) = start(&api, 3);
        settle().await;

        handle.cancel();
        let _ = properties_gate.send(Err(anyhow::anyhow!("connection reset")));

        assert!(single_outcome(&mut rx).await.is_aborted());
    }

    #[tokio::test]
    async fn test_every_outcome_combination_fires_once() {
        #[derive(Debug, Clone, Copy)]
        enum Step {
            Succeed,
            Fail,
            Cancel,
        }
        let steps = [Step::Succeed, Step::Fail, Step::Cancel];

        for first in steps {
            for second in steps {
                let api = Arc::new(FakeConsoleApi::new());
                let properties_gate = api.push_gate(Resource::Properties);
                let items_gate = api.push_gate(Resource::Items);
                let (handle, mut rx) = start(&api, 9);
                settle().await;

                let mut gates = vec![Some(properties_gate), Some(items_gate)];
                let mut cancelled_first = false;
                let mut failed_first = false;
                for (index, step) in [first, second].into_iter().enumerate() {
                    let gate = gates[index].take().unwrap();
                    match step {
                        Step::Succeed => {
                            let _ = gate.send(Ok(Payload::Structured(json!({}))));
                        }
                        Step::Fail => {
                            failed_first |= !cancelled_first;
                            let _ = gate.send(Err(anyhow::anyhow!("boom")));
                        }
                        Step::Cancel => {
                            cancelled_first |= !failed_first;
                            handle.cancel();
                        }
                    }
                    settle().await;
                }

                let outcome = single_outcome(&mut rx).await;
                match (first, second) {
                    (Step::Succeed, Step::Succeed) => {
                        assert!(matches!(outcome, LoadOutcome::Loaded(_)))
                    }
                    _ if cancelled_first => {
                        assert!(outcome.is_aborted(), "{:?}/{:?}", first, second)
                    }
                    _ => assert!(
                        matches!(outcome, LoadOutcome::Failed(_)),
                        "{:?}/{:?}",
                        first,
                        second
                    ),
                }
            }
        }
    }

    #[tokio::test]
    async fn test_fetch_console_data() {
        let api = Arc::new(FakeConsoleApi::new());
        api.push_payload(Resource::Properties, Payload::Structured(json!({"id": 8})));
        api.push_payload(Resource::Items, Payload::Structured(json!([{"id": 1}])));

        let outcome = fetch_console_data(api, 8).await;
        assert!(matches!(outcome, LoadOutcome::Loaded(_)));
    }
}
