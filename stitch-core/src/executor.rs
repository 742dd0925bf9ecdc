use crate::credentials::{CredentialResolver, Credentials, ResolveError};
use crate::error::CoreError;
use crate::recorder::Recorder;
use crate::registry::Registry;
use crate::step::{StepInput, StepOutcome};
use std::sync::Arc;
use std::time::Instant;

/// The single choke point every action invocation passes through.
///
/// Regardless of which plugin authored the handler, an invocation gets the
/// same treatment: credential resolution, required-field validation, a
/// redacted start event, fault-to-result normalization, and a completion
/// event with duration on every exit path.
pub struct StepExecutor {
    registry: Arc<Registry>,
    resolver: Arc<dyn CredentialResolver>,
    recorder: Arc<dyn Recorder>,
}

impl StepExecutor {
    pub fn new(
        registry: Arc<Registry>,
        resolver: Arc<dyn CredentialResolver>,
        recorder: Arc<dyn Recorder>,
    ) -> Self {
        Self { registry, resolver, recorder }
    }

    /// Invokes `(type, slug)` with the given envelope.
    ///
    /// `Ok` carries the handler's discriminated result, passed through
    /// unchanged when the handler returns one, or synthesized from the
    /// fault when it errors out. `Err` is reserved for the invocation
    /// machinery itself: unknown action identity, or a credential store
    /// that could not be reached (retryable by the engine). A deleted or
    /// unknown integration id is not an `Err`: the handler runs with empty
    /// credentials and phrases the business failure itself.
    pub async fn invoke(
        &self,
        r#type: &str,
        slug: &str,
        input: StepInput,
    ) -> Result<StepOutcome, CoreError> {
        let (_plugin, action) = self.registry.action(r#type, slug)?;

        let credentials = match input.integration_id {
            None => Credentials::new(),
            Some(id) => match self.resolver.resolve(id).await {
                Ok(credentials) => credentials,
                Err(ResolveError::NotFound(_)) => Credentials::new(),
                Err(ResolveError::Unavailable(source)) => {
                    return Err(CoreError::StoreUnavailable(source));
                }
            },
        };

        // Configuration errors are structured failures, never faults.
        for field in &action.config_fields {
            if !field.required {
                continue;
            }
            let missing = match input.fields.get(&field.key) {
                None | Some(serde_json::Value::Null) => true,
                Some(value) => value.as_str().is_some_and(str::is_empty),
            };
            if missing {
                return Ok(StepOutcome::failure(format!("{} is required", field.label)));
            }
        }

        self.recorder.record_step_started(r#type, slug, &input.redacted());
        let mut completion = CompletionGuard {
            recorder: self.recorder.clone(),
            plugin: r#type.to_owned(),
            slug: slug.to_owned(),
            started: Instant::now(),
            fired: false,
        };

        // The one place a raised fault becomes a structured result.
        let outcome = match action.handler.execute(&input, &credentials).await {
            Ok(outcome) => outcome,
            Err(fault) => StepOutcome::failure(fault.to_string()),
        };

        completion.fire(outcome.is_success());
        Ok(outcome)
    }
}

/// Scoped-acquisition guard for the completion event: fires exactly once,
/// on drop if the invocation unwinds before reporting an outcome.
struct CompletionGuard {
    recorder: Arc<dyn Recorder>,
    plugin: String,
    slug: String,
    started: Instant,
    fired: bool,
}

impl CompletionGuard {
    fn fire(&mut self, success: bool) {
        if !self.fired {
            self.fired = true;
            self.recorder
                .record_step_finished(&self.plugin, &self.slug, success, self.started.elapsed());
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.fire(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ActionDescriptor, ConfigField, ConfigFieldKind, PluginDescriptor};
    use crate::step::{HandlerError, RedactedInput, StepHandler};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use uuid::Uuid;

    #[derive(Default)]
    struct CountingRecorder {
        started: AtomicUsize,
        finished: AtomicUsize,
        last_input: Mutex<Option<RedactedInput>>,
    }

    impl Recorder for CountingRecorder {
        fn record_step_started(&self, _type: &str, _slug: &str, input: &RedactedInput) {
            self.started.fetch_add(1, Ordering::SeqCst);
            *self.last_input.lock().unwrap() = Some(input.clone());
        }

        fn record_step_finished(&self, _type: &str, _slug: &str, _success: bool, _elapsed: Duration) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct EchoCredentialsHandler;

    #[async_trait]
    impl StepHandler for EchoCredentialsHandler {
        async fn execute(
            &self,
            _input: &StepInput,
            credentials: &Credentials,
        ) -> Result<StepOutcome, HandlerError> {
            match credentials.get("TOKEN") {
                Some(token) => {
                    StepOutcome::success_from(&json!({ "token_seen": token })).map_err(Into::into)
                }
                None => Ok(StepOutcome::failure("logs is not configured")),
            }
        }
    }

    struct FaultyHandler;

    #[async_trait]
    impl StepHandler for FaultyHandler {
        async fn execute(
            &self,
            _input: &StepInput,
            _credentials: &Credentials,
        ) -> Result<StepOutcome, HandlerError> {
            Err("connection reset by peer".into())
        }
    }

    struct StaticResolver {
        id: Uuid,
        credentials: Credentials,
    }

    #[async_trait]
    impl CredentialResolver for StaticResolver {
        async fn resolve(&self, integration_id: Uuid) -> Result<Credentials, ResolveError> {
            if integration_id == self.id {
                Ok(self.credentials.clone())
            } else {
                Err(ResolveError::NotFound(integration_id))
            }
        }
    }

    struct DownResolver;

    #[async_trait]
    impl CredentialResolver for DownResolver {
        async fn resolve(&self, _integration_id: Uuid) -> Result<Credentials, ResolveError> {
            Err(ResolveError::Unavailable("store unreachable".into()))
        }
    }

    fn logs_registry(handler: Arc<dyn StepHandler>, config_fields: Vec<ConfigField>) -> Registry {
        let mut registry = Registry::new();
        registry
            .register(PluginDescriptor {
                r#type: "logs".into(),
                label: "Logs".into(),
                description: "A logging service".into(),
                form_fields: vec![],
                test: None,
                actions: vec![ActionDescriptor {
                    slug: "query".into(),
                    label: "Query".into(),
                    description: String::new(),
                    category: "Logs".into(),
                    handler,
                    config_fields,
                    output_fields: vec![],
                }],
            })
            .unwrap();
        registry
    }

    fn executor(
        registry: Registry,
        resolver: Arc<dyn CredentialResolver>,
    ) -> (StepExecutor, Arc<CountingRecorder>) {
        let recorder = Arc::new(CountingRecorder::default());
        (
            StepExecutor::new(Arc::new(registry), resolver, recorder.clone()),
            recorder,
        )
    }

    #[tokio::test]
    async fn resolved_credentials_reach_the_handler() {
        let id = Uuid::now_v7();
        let mut credentials = Credentials::new();
        credentials.insert("TOKEN", "abc");

        let registry = logs_registry(Arc::new(EchoCredentialsHandler), vec![]);
        let (executor, recorder) =
            executor(registry, Arc::new(StaticResolver { id, credentials }));

        let outcome = executor
            .invoke("logs", "query", StepInput::default().with_integration(id))
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"success": true, "token_seen": "abc"})
        );
        assert_eq!(recorder.started.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn deleted_integration_surfaces_business_failure() {
        let registry = logs_registry(Arc::new(EchoCredentialsHandler), vec![]);
        let (executor, recorder) = executor(
            registry,
            Arc::new(StaticResolver { id: Uuid::now_v7(), credentials: Credentials::new() }),
        );

        // Points at an id the resolver no longer knows.
        let outcome = executor
            .invoke("logs", "query", StepInput::default().with_integration(Uuid::now_v7()))
            .await
            .unwrap();

        assert_eq!(outcome, StepOutcome::failure("logs is not configured"));
        assert_eq!(recorder.started.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn absent_integration_id_means_empty_credentials() {
        let registry = logs_registry(Arc::new(EchoCredentialsHandler), vec![]);
        let (executor, _) = executor(registry, Arc::new(DownResolver));

        // Resolver is never consulted without an id, even a broken one.
        let outcome = executor.invoke("logs", "query", StepInput::default()).await.unwrap();
        assert_eq!(outcome, StepOutcome::failure("logs is not configured"));
    }

    #[tokio::test]
    async fn handler_fault_becomes_structured_failure() {
        let registry = logs_registry(Arc::new(FaultyHandler), vec![]);
        let (executor, recorder) = executor(
            registry,
            Arc::new(StaticResolver { id: Uuid::now_v7(), credentials: Credentials::new() }),
        );

        let outcome = executor.invoke("logs", "query", StepInput::default()).await.unwrap();

        assert_eq!(outcome, StepOutcome::failure("connection reset by peer"));
        // The completion event still fires on the fault path.
        assert_eq!(recorder.started.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_store_is_a_wrapper_level_error() {
        let registry = logs_registry(Arc::new(EchoCredentialsHandler), vec![]);
        let (executor, recorder) = executor(registry, Arc::new(DownResolver));

        let err = executor
            .invoke("logs", "query", StepInput::default().with_integration(Uuid::now_v7()))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::StoreUnavailable(_)));
        // The invocation never started, so no event pair was emitted.
        assert_eq!(recorder.started.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_required_field_is_a_configuration_failure() {
        let registry = logs_registry(
            Arc::new(EchoCredentialsHandler),
            vec![ConfigField::new("apl", "APL Query", ConfigFieldKind::Template).required()],
        );
        let (executor, recorder) = executor(
            registry,
            Arc::new(StaticResolver { id: Uuid::now_v7(), credentials: Credentials::new() }),
        );

        let outcome = executor.invoke("logs", "query", StepInput::default()).await.unwrap();
        assert_eq!(outcome, StepOutcome::failure("APL Query is required"));

        // An empty template value counts as missing too.
        let input = StepInput::new(json!({"apl": ""}).as_object().unwrap().clone());
        let outcome = executor.invoke("logs", "query", input).await.unwrap();
        assert_eq!(outcome, StepOutcome::failure("APL Query is required"));

        assert_eq!(recorder.started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_action_identity_fails_loudly() {
        let registry = logs_registry(Arc::new(EchoCredentialsHandler), vec![]);
        let (executor, _) = executor(
            registry,
            Arc::new(StaticResolver { id: Uuid::now_v7(), credentials: Credentials::new() }),
        );

        assert!(matches!(
            executor.invoke("nope", "query", StepInput::default()).await.unwrap_err(),
            CoreError::PluginNotFound(_)
        ));
        assert!(matches!(
            executor.invoke("logs", "nope", StepInput::default()).await.unwrap_err(),
            CoreError::ActionNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn lifecycle_store_feeds_the_executor() {
        use crate::lifecycle::{IntegrationLifecycle, MemoryIntegrationStore};

        let registry = Arc::new(logs_registry(Arc::new(EchoCredentialsHandler), vec![]));
        let store = Arc::new(MemoryIntegrationStore::new());
        let lifecycle = IntegrationLifecycle::new(registry.clone(), store.clone());

        let mut credentials = Credentials::new();
        credentials.insert("TOKEN", "abc");
        let instance = lifecycle.create("logs", Some("Prod".into()), credentials).await.unwrap();

        let recorder = Arc::new(CountingRecorder::default());
        let executor = StepExecutor::new(registry, store.clone(), recorder.clone());

        let outcome = executor
            .invoke("logs", "query", StepInput::default().with_integration(instance.id))
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"success": true, "token_seen": "abc"})
        );

        // After deletion the same invocation degrades to a business failure.
        lifecycle.delete(instance.id).await.unwrap();
        let outcome = executor
            .invoke("logs", "query", StepInput::default().with_integration(instance.id))
            .await
            .unwrap();
        assert_eq!(outcome, StepOutcome::failure("logs is not configured"));

        assert_eq!(recorder.started.load(Ordering::SeqCst), 2);
        assert_eq!(recorder.finished.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn start_event_carries_redacted_input_only() {
        let id = Uuid::now_v7();
        let mut credentials = Credentials::new();
        credentials.insert("TOKEN", "abc");

        let registry = logs_registry(Arc::new(EchoCredentialsHandler), vec![]);
        let (executor, recorder) =
            executor(registry, Arc::new(StaticResolver { id, credentials }));

        let input = StepInput::new(json!({"apl": "secret-payload"}).as_object().unwrap().clone())
            .with_integration(id);
        executor.invoke("logs", "query", input).await.unwrap();

        let seen = recorder.last_input.lock().unwrap().clone().unwrap();
        assert_eq!(seen.field_keys, vec!["apl"]);
        assert!(!seen.to_string().contains("secret-payload"));
        assert!(!seen.to_string().contains("abc"));
    }
}
