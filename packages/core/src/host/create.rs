//! Host creation workflow
//!
//! [`Provisioner::create_host`] drives one request through
//! validate → build options → resolve driver → check existence →
//! configure driver → create → persist, stopping at the first failure.
//! A failed create produces a [`CrashReport`]; nothing is written to the
//! store unless the driver's create call succeeded. Once it has, the save
//! always runs to completion, even if the request is cancelled.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::crash::{CrashReport, backend_log_path};
use super::error::ProvisionError;
use super::options::{HostRequest, OptionDefaults, build_host_options};
use super::schema::Host;
use super::storage::{FilesystemStore, Store};
use super::validate::{validate_host_name, validate_swarm_discovery};
use crate::config::Config;
use crate::driver::{BaseDriver, DriverContext, DriverRegistry};

/// Wait before looking for backend logs after a failed create
pub const DEFAULT_LOG_FLUSH_GRACE: Duration = Duration::from_secs(2);

/// Predicate deciding whether a host name is acceptable
pub type NameValidator = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Steps of the creation workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationState {
    Validating,
    BuildingOptions,
    ResolvingDriver,
    CheckingExistence,
    ConfiguringDriver,
    Creating,
    ReportingFailure,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for CreationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CreationState::Validating => "validating the request",
            CreationState::BuildingOptions => "building host options",
            CreationState::ResolvingDriver => "resolving the driver",
            CreationState::CheckingExistence => "checking if the host exists",
            CreationState::ConfiguringDriver => "configuring the driver",
            CreationState::Creating => "creating the host",
            CreationState::ReportingFailure => "collecting crash diagnostics",
            CreationState::Persisting => "saving the host",
            CreationState::Done => "done",
            CreationState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Tunables for the creation workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionerSettings {
    pub defaults: OptionDefaults,
    pub log_flush_grace: Duration,
    pub create_timeout: Option<Duration>,
}

impl ProvisionerSettings {
    pub fn new(defaults: OptionDefaults) -> Self {
        Self {
            defaults,
            log_flush_grace: DEFAULT_LOG_FLUSH_GRACE,
            create_timeout: None,
        }
    }

    /// Derive settings from the loaded config file
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let base = config
            .storage_base()
            .ok_or_else(|| anyhow::anyhow!("Could not determine storage directory"))?;

        Ok(Self {
            defaults: OptionDefaults::from_base(&base),
            log_flush_grace: config.log_flush_grace(),
            create_timeout: config.create_timeout(),
        })
    }

    /// Builder pattern: set log flush grace period
    pub fn with_log_flush_grace(mut self, grace: Duration) -> Self {
        self.log_flush_grace = grace;
        self
    }

    /// Builder pattern: bound every request by a deadline
    pub fn with_create_timeout(mut self, timeout: Duration) -> Self {
        self.create_timeout = Some(timeout);
        self
    }
}

/// Runs host creation requests against a driver registry and a store
pub struct Provisioner {
    registry: DriverRegistry,
    store: Arc<dyn Store>,
    settings: ProvisionerSettings,
    validate_name: NameValidator,
}

impl Provisioner {
    pub fn new(registry: DriverRegistry, store: Arc<dyn Store>, settings: ProvisionerSettings) -> Self {
        Self {
            registry,
            store,
            settings,
            validate_name: Arc::new(validate_host_name),
        }
    }

    /// Provisioner with the built-in drivers and a filesystem store
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let settings = ProvisionerSettings::from_config(config)?;
        let store = FilesystemStore::new(settings.defaults.machines_dir.clone());
        let registry = DriverRegistry::with_builtin(DriverContext {
            ssh_client: config.ssh_client_type,
        });

        Ok(Self::new(registry, Arc::new(store), settings))
    }

    /// Builder pattern: replace the host name predicate
    pub fn with_name_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.validate_name = Arc::new(validator);
        self
    }

    /// Builder pattern: override the configured per-request deadline
    pub fn with_create_timeout(mut self, timeout: Duration) -> Self {
        self.settings = self.settings.with_create_timeout(timeout);
        self
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Mutable access for registering additional backends
    pub fn registry_mut(&mut self) -> &mut DriverRegistry {
        &mut self.registry
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn settings(&self) -> &ProvisionerSettings {
        &self.settings
    }

    /// Create one host
    ///
    /// Cancelling `cancel` (or hitting the configured deadline) stops the
    /// workflow at the current step with [`ProvisionError::Cancelled`].
    #[tracing::instrument(
        name = "create_host",
        skip_all,
        fields(host = %request.name, driver = %request.driver_name)
    )]
    pub async fn create_host(
        &self,
        request: &HostRequest,
        cancel: &CancellationToken,
    ) -> Result<Host, ProvisionError> {
        let token = cancel.child_token();
        if let Some(timeout) = self.settings.create_timeout {
            spawn_deadline(token.clone(), timeout);
        }

        let result = self.run(request, &token).await;
        // Stops the deadline timer
        token.cancel();

        match &result {
            Ok(host) => {
                enter(CreationState::Done);
                tracing::info!(machines_dir = %self.store.machines_dir().display(), "Created host {}", host.name);
            }
            Err(e) => {
                enter(CreationState::Failed);
                tracing::warn!(
                    kind = %e.kind(),
                    orphan_risk = e.may_have_orphaned_resource(),
                    "Host creation failed: {}",
                    e
                );
            }
        }
        result
    }

    async fn run(
        &self,
        request: &HostRequest,
        cancel: &CancellationToken,
    ) -> Result<Host, ProvisionError> {
        enter(CreationState::Validating);
        if !(self.validate_name)(&request.name) {
            return Err(ProvisionError::InvalidIdentity {
                name: request.name.clone(),
            });
        }
        if !validate_swarm_discovery(&request.swarm.discovery) {
            return Err(ProvisionError::InvalidSwarmDiscovery(
                request.swarm.discovery.clone(),
            ));
        }

        enter(CreationState::BuildingOptions);
        let options = build_host_options(request, &self.settings.defaults);

        enter(CreationState::ResolvingDriver);
        let base = BaseDriver::new(&request.name, options.auth.store_path.to_string_lossy());
        let raw_driver =
            serde_json::to_vec(&base).map_err(|e| ProvisionError::MalformedConfig(e.to_string()))?;
        let mut host = self.registry.resolve(&request.driver_name, &raw_driver)?;
        host.host_options = options;

        enter(CreationState::CheckingExistence);
        let exists = guard(cancel, CreationState::CheckingExistence, self.store.exists(&host.name))
            .await?
            .map_err(ProvisionError::StoreUnavailable)?;
        if exists {
            return Err(ProvisionError::HostAlreadyExists { name: host.name });
        }

        enter(CreationState::ConfiguringDriver);
        guard(
            cancel,
            CreationState::ConfiguringDriver,
            host.driver.set_config_from_flags(&request.driver_options),
        )
        .await?
        .map_err(|source| ProvisionError::ConfigRejected {
            driver: host.driver_name.clone(),
            source,
        })?;

        enter(CreationState::Creating);
        if let Err(cause) = guard(cancel, CreationState::Creating, host.driver.create()).await? {
            enter(CreationState::ReportingFailure);
            self.wait_for_backend_logs(cancel).await;

            let candidate = backend_log_path(&host.driver_name, self.store.machines_dir(), &host.name);
            let report = CrashReport::build(
                &cause,
                "Create",
                "create_host",
                &host.driver_name,
                candidate.as_deref(),
            )
            .await;
            return Err(ProvisionError::CreationFailed(Box::new(report)));
        }

        // Never raced against `cancel`: the result must match what the store holds
        enter(CreationState::Persisting);
        if cancel.is_cancelled() {
            tracing::debug!("Request cancelled after create, saving the host anyway");
        }
        self.store
            .save(&host)
            .await
            .map_err(|source| ProvisionError::PersistFailed {
                name: host.name.clone(),
                source,
            })?;

        Ok(host)
    }

    /// Single bounded wait for the backend to flush its logs
    async fn wait_for_backend_logs(&self, cancel: &CancellationToken) {
        let grace = self.settings.log_flush_grace;
        if grace.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(grace) => {}
            _ = cancel.cancelled() => {
                tracing::debug!("Skipping log flush wait, request cancelled");
            }
        }
    }

    /// Per-machine directory in the store
    pub fn machine_dir(&self, name: &str) -> PathBuf {
        self.store.machines_dir().join(name)
    }
}

fn enter(state: CreationState) {
    tracing::debug!(state = ?state, "{}", state);
}

/// Run `fut` unless `cancel` fires first
async fn guard<F: Future>(
    cancel: &CancellationToken,
    state: CreationState,
    fut: F,
) -> Result<F::Output, ProvisionError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProvisionError::Cancelled { state }),
        output = fut => Ok(output),
    }
}

fn spawn_deadline(token: CancellationToken, timeout: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                tracing::debug!("Creation deadline of {:?} reached", timeout);
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Driver, DriverError, DriverFlags};
    use crate::host::error::ErrorKind;
    use crate::host::schema::HostOptions;
    use crate::host::storage::StoreError;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct DriverCalls {
        set_config: AtomicUsize,
        create: AtomicUsize,
    }

    #[derive(Debug, Clone, Default)]
    struct Behavior {
        reject_config: Option<&'static str>,
        fail_create: Option<&'static str>,
        create_delay: Option<Duration>,
    }

    #[derive(Debug)]
    struct MockDriver {
        base: BaseDriver,
        calls: Arc<DriverCalls>,
        behavior: Behavior,
    }

    #[async_trait]
    impl Driver for MockDriver {
        fn driver_name(&self) -> &str {
            "virtualbox"
        }

        fn base(&self) -> &BaseDriver {
            &self.base
        }

        async fn set_config_from_flags(&mut self, _flags: &DriverFlags) -> Result<(), DriverError> {
            self.calls.set_config.fetch_add(1, Ordering::SeqCst);
            match self.behavior.reject_config {
                Some(msg) => Err(DriverError::InvalidFlag {
                    key: "virtualbox-memory".to_string(),
                    reason: msg.to_string(),
                }),
                None => Ok(()),
            }
        }

        async fn create(&mut self) -> Result<(), DriverError> {
            self.calls.create.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.behavior.create_delay {
                tokio::time::sleep(delay).await;
            }
            match self.behavior.fail_create {
                Some(msg) => Err(DriverError::backend(msg)),
                None => Ok(()),
            }
        }

        fn to_json(&self) -> serde_json::Result<serde_json::Value> {
            serde_json::to_value(&self.base)
        }
    }

    #[derive(Default)]
    struct MockStore {
        machines_dir: PathBuf,
        exists: bool,
        exists_error: bool,
        save_error: Option<&'static str>,
        exists_calls: AtomicUsize,
        save_calls: AtomicUsize,
        saved: Mutex<Vec<(String, HostOptions)>>,
    }

    #[async_trait]
    impl Store for MockStore {
        async fn exists(&self, _name: &str) -> Result<bool, StoreError> {
            self.exists_calls.fetch_add(1, Ordering::SeqCst);
            if self.exists_error {
                return Err(StoreError::Io {
                    path: self.machines_dir.clone(),
                    source: std::io::Error::other("permission denied"),
                });
            }
            Ok(self.exists)
        }

        async fn save(&self, host: &Host) -> Result<(), StoreError> {
            self.save_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(msg) = self.save_error {
                return Err(StoreError::Io {
                    path: self.machines_dir.join(&host.name),
                    source: std::io::Error::other(msg),
                });
            }
            self.saved
                .lock()
                .unwrap()
                .push((host.name.clone(), host.host_options.clone()));
            Ok(())
        }

        fn machines_dir(&self) -> &Path {
            &self.machines_dir
        }
    }

    impl MockStore {
        fn exists_calls(&self) -> usize {
            self.exists_calls.load(Ordering::SeqCst)
        }

        fn save_calls(&self) -> usize {
            self.save_calls.load(Ordering::SeqCst)
        }
    }

    fn defaults() -> OptionDefaults {
        OptionDefaults::from_base(Path::new("/var/lib/hostforge"))
    }

    fn registry(calls: &Arc<DriverCalls>, behavior: Behavior) -> DriverRegistry {
        let calls = Arc::clone(calls);
        let mut registry = DriverRegistry::new(DriverContext::default());
        registry.register("virtualbox", move |base, _ctx| {
            Box::new(MockDriver {
                base,
                calls: Arc::clone(&calls),
                behavior: behavior.clone(),
            })
        });
        registry
    }

    fn provisioner(store: &Arc<MockStore>, calls: &Arc<DriverCalls>, behavior: Behavior) -> Provisioner {
        let settings = ProvisionerSettings::new(defaults()).with_log_flush_grace(Duration::ZERO);
        Provisioner::new(registry(calls, behavior), store.clone(), settings)
    }

    fn provisioner_with_grace(
        store: &Arc<MockStore>,
        calls: &Arc<DriverCalls>,
        behavior: Behavior,
        grace: Duration,
    ) -> Provisioner {
        let settings = ProvisionerSettings::new(defaults()).with_log_flush_grace(grace);
        Provisioner::new(registry(calls, behavior), store.clone(), settings)
    }

    /// Filesystem store whose save cancels the request before writing
    struct CancelOnSave {
        inner: FilesystemStore,
        cancel: CancellationToken,
    }

    #[async_trait]
    impl Store for CancelOnSave {
        async fn exists(&self, name: &str) -> Result<bool, StoreError> {
            self.inner.exists(name).await
        }

        async fn save(&self, host: &Host) -> Result<(), StoreError> {
            self.cancel.cancel();
            tokio::task::yield_now().await;
            self.inner.save(host).await
        }

        fn machines_dir(&self) -> &Path {
            self.inner.machines_dir()
        }
    }

    fn request() -> HostRequest {
        HostRequest::new("dev1", "virtualbox").with_store_path("/store/dev1")
    }

    #[tokio::test]
    async fn test_invalid_name_touches_nothing() {
        let store = Arc::new(MockStore::default());
        let calls = Arc::new(DriverCalls::default());
        let provisioner = provisioner(&store, &calls, Behavior::default());

        for name in ["", "-dev1", "dev_1", "dev 1"] {
            let req = HostRequest::new(name, "virtualbox");
            let err = provisioner
                .create_host(&req, &CancellationToken::new())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidIdentity);
        }

        assert_eq!(store.exists_calls(), 0);
        assert_eq!(store.save_calls(), 0);
        assert_eq!(calls.set_config.load(Ordering::SeqCst), 0);
        assert_eq!(calls.create.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_custom_name_validator() {
        let store = Arc::new(MockStore::default());
        let calls = Arc::new(DriverCalls::default());
        let provisioner = provisioner(&store, &calls, Behavior::default())
            .with_name_validator(|name| !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));

        let req = HostRequest::new("dev_1", "virtualbox");
        assert!(provisioner.create_host(&req, &CancellationToken::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_bad_swarm_discovery_rejected_early() {
        let store = Arc::new(MockStore::default());
        let calls = Arc::new(DriverCalls::default());
        let provisioner = provisioner(&store, &calls, Behavior::default());

        let mut req = request();
        req.swarm.discovery = "10.0.0.2:8500".to_string();
        let err = provisioner
            .create_host(&req, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidSwarmDiscovery);
        assert_eq!(store.exists_calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_driver_skips_store() {
        let store = Arc::new(MockStore::default());
        let calls = Arc::new(DriverCalls::default());
        let provisioner = provisioner(&store, &calls, Behavior::default());

        let req = HostRequest::new("dev1", "hyperv");
        let err = provisioner
            .create_host(&req, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::UnknownDriver(ref d) if d == "hyperv"));
        assert_eq!(store.exists_calls(), 0);
    }

    #[tokio::test]
    async fn test_existing_host_is_not_recreated() {
        let store = Arc::new(MockStore {
            exists: true,
            ..Default::default()
        });
        let calls = Arc::new(DriverCalls::default());
        let provisioner = provisioner(&store, &calls, Behavior::default());

        let err = provisioner
            .create_host(&request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::HostAlreadyExists { ref name } if name == "dev1"));
        assert_eq!(calls.set_config.load(Ordering::SeqCst), 0);
        assert_eq!(calls.create.load(Ordering::SeqCst), 0);
        assert_eq!(store.save_calls(), 0);
    }

    #[tokio::test]
    async fn test_store_error_is_store_unavailable() {
        let store = Arc::new(MockStore {
            exists_error: true,
            ..Default::default()
        });
        let calls = Arc::new(DriverCalls::default());
        let provisioner = provisioner(&store, &calls, Behavior::default());

        let err = provisioner
            .create_host(&request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        assert!(err.kind().is_retryable());
        assert_eq!(calls.create.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_config_stops_before_create() {
        let store = Arc::new(MockStore::default());
        let calls = Arc::new(DriverCalls::default());
        let behavior = Behavior {
            reject_config: Some("must be at least 512"),
            ..Default::default()
        };
        let provisioner = provisioner(&store, &calls, behavior);

        let err = provisioner
            .create_host(&request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigRejected);
        assert!(err.to_string().contains("must be at least 512"));
        assert_eq!(calls.create.load(Ordering::SeqCst), 0);
        assert_eq!(store.save_calls(), 0);
    }

    #[tokio::test]
    async fn test_success_saves_built_options_once() {
        let store = Arc::new(MockStore::default());
        let calls = Arc::new(DriverCalls::default());
        let provisioner = provisioner(&store, &calls, Behavior::default());

        let mut req = request();
        req.server_cert_sans = vec!["dev1.internal".to_string()];
        req.engine.labels = vec!["env=dev".to_string()];

        let host = provisioner
            .create_host(&req, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(host.name, "dev1");
        assert_eq!(host.driver.base().store_path, "/store/dev1");
        assert_eq!(store.save_calls(), 1);

        let saved = store.saved.lock().unwrap();
        assert_eq!(saved[0].0, "dev1");
        assert_eq!(saved[0].1, build_host_options(&req, &defaults()));
    }

    #[tokio::test]
    async fn test_scenario_a_persists_to_filesystem_store() {
        let dir = tempfile::tempdir().unwrap();
        let fs_store = Arc::new(FilesystemStore::new(dir.path().join("machines")));
        let calls = Arc::new(DriverCalls::default());
        let settings = ProvisionerSettings::new(OptionDefaults::from_base(dir.path()))
            .with_log_flush_grace(Duration::ZERO);
        let provisioner = Provisioner::new(
            registry(&calls, Behavior::default()),
            fs_store.clone(),
            settings,
        );

        provisioner
            .create_host(&request(), &CancellationToken::new())
            .await
            .unwrap();

        let record = fs_store.load("dev1").await.unwrap();
        assert_eq!(record.name, "dev1");
        assert_eq!(record.driver_name, "virtualbox");

        // A second request for the same name now hits the existence check
        let err = provisioner
            .create_host(&request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HostAlreadyExists);
        assert_eq!(calls.create.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scenario_c_crash_report_with_backend_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("dev1").join("dev1").join("Logs").join("VBox.log");
        std::fs::create_dir_all(log.parent().unwrap()).unwrap();
        std::fs::write(&log, "VBoxHeadless: error: disk full").unwrap();

        let store = Arc::new(MockStore {
            machines_dir: dir.path().to_path_buf(),
            ..Default::default()
        });
        let calls = Arc::new(DriverCalls::default());
        let behavior = Behavior {
            fail_create: Some("disk full"),
            ..Default::default()
        };
        let provisioner = provisioner(&store, &calls, behavior);

        let err = provisioner
            .create_host(&request(), &CancellationToken::new())
            .await
            .unwrap_err();

        let report = err.crash_report().expect("creation failure carries a report");
        assert_eq!(report.cause, "disk full");
        assert_eq!(report.driver_name, "virtualbox");
        assert_eq!(report.command, "Create");
        assert_eq!(report.log_file_path.as_deref(), Some(log.as_path()));
        assert_eq!(store.save_calls(), 0);
        assert!(!err.may_have_orphaned_resource());
    }

    #[tokio::test]
    async fn test_crash_report_without_backend_log() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MockStore {
            machines_dir: dir.path().to_path_buf(),
            ..Default::default()
        });
        let calls = Arc::new(DriverCalls::default());
        let behavior = Behavior {
            fail_create: Some("VERR_VMX_NO_VMX"),
            ..Default::default()
        };
        let provisioner = provisioner(&store, &calls, behavior);

        let err = provisioner
            .create_host(&request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CreationFailed);
        assert!(err.crash_report().unwrap().log_file_path.is_none());
    }

    #[tokio::test]
    async fn test_scenario_d_save_failure_is_persist_failed() {
        let store = Arc::new(MockStore {
            save_error: Some("disk full"),
            ..Default::default()
        });
        let calls = Arc::new(DriverCalls::default());
        let provisioner = provisioner(&store, &calls, Behavior::default());

        let err = provisioner
            .create_host(&request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PersistFailed);
        assert_ne!(err.kind(), ErrorKind::CreationFailed);
        assert!(err.may_have_orphaned_resource());
        assert_eq!(calls.create.load(Ordering::SeqCst), 1);
        assert_eq!(store.save_calls(), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_create() {
        let store = Arc::new(MockStore::default());
        let calls = Arc::new(DriverCalls::default());
        let behavior = Behavior {
            create_delay: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        let provisioner = provisioner(&store, &calls, behavior);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = provisioner.create_host(&request(), &cancel).await.unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::Cancelled {
                state: CreationState::Creating
            }
        ));
        assert!(err.may_have_orphaned_resource());
        assert_eq!(store.save_calls(), 0);
    }

    #[tokio::test]
    async fn test_already_cancelled_request_skips_store() {
        let store = Arc::new(MockStore::default());
        let calls = Arc::new(DriverCalls::default());
        let provisioner = provisioner(&store, &calls, Behavior::default());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = provisioner.create_host(&request(), &cancel).await.unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::Cancelled {
                state: CreationState::CheckingExistence
            }
        ));
        assert_eq!(store.exists_calls(), 0);
    }

    #[tokio::test]
    async fn test_deadline_cancels_slow_create() {
        let store = Arc::new(MockStore::default());
        let calls = Arc::new(DriverCalls::default());
        let settings = ProvisionerSettings::new(defaults())
            .with_log_flush_grace(Duration::ZERO)
            .with_create_timeout(Duration::from_millis(20));
        let behavior = Behavior {
            create_delay: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        let provisioner = Provisioner::new(registry(&calls, behavior), store.clone(), settings);

        let cancel = CancellationToken::new();
        let err = provisioner.create_host(&request(), &cancel).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        // The caller's own token is untouched by the deadline
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_while_saving_still_records_host() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let store = Arc::new(CancelOnSave {
            inner: FilesystemStore::new(dir.path().join("machines")),
            cancel: cancel.clone(),
        });
        let calls = Arc::new(DriverCalls::default());
        let settings = ProvisionerSettings::new(OptionDefaults::from_base(dir.path()))
            .with_log_flush_grace(Duration::ZERO);
        let provisioner = Provisioner::new(registry(&calls, Behavior::default()), store, settings);

        let host = provisioner.create_host(&request(), &cancel).await.unwrap();

        assert!(cancel.is_cancelled());
        assert_eq!(host.name, "dev1");
        let record = FilesystemStore::new(dir.path().join("machines"))
            .load("dev1")
            .await
            .unwrap();
        assert_eq!(record.name, "dev1");
    }

    #[tokio::test]
    async fn test_backend_log_written_during_grace_is_found() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("dev1").join("dev1").join("Logs").join("VBox.log");
        let store = Arc::new(MockStore {
            machines_dir: dir.path().to_path_buf(),
            ..Default::default()
        });
        let calls = Arc::new(DriverCalls::default());
        let behavior = Behavior {
            fail_create: Some("disk full"),
            ..Default::default()
        };
        let provisioner =
            provisioner_with_grace(&store, &calls, behavior, Duration::from_millis(300));

        // The backend flushes its log shortly after create returns
        let late_log = log.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tokio::fs::create_dir_all(late_log.parent().unwrap()).await.unwrap();
            tokio::fs::write(&late_log, "VBoxHeadless: error: disk full").await.unwrap();
        });

        let err = provisioner
            .create_host(&request(), &CancellationToken::new())
            .await
            .unwrap_err();

        let report = err.crash_report().expect("creation failure carries a report");
        assert_eq!(report.log_file_path.as_deref(), Some(log.as_path()));
    }

    #[tokio::test]
    async fn test_cancel_cuts_log_grace_short() {
        let store = Arc::new(MockStore::default());
        let calls = Arc::new(DriverCalls::default());
        let behavior = Behavior {
            fail_create: Some("disk full"),
            ..Default::default()
        };
        let provisioner = provisioner_with_grace(&store, &calls, behavior, Duration::from_secs(60));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = tokio::time::timeout(
            Duration::from_secs(10),
            provisioner.create_host(&request(), &cancel),
        )
        .await
        .expect("grace wait ends on cancel")
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CreationFailed);
        assert_eq!(err.crash_report().unwrap().cause, "disk full");
    }

    #[tokio::test]
    async fn test_sub_second_deadline_override() {
        let store = Arc::new(MockStore::default());
        let calls = Arc::new(DriverCalls::default());
        let behavior = Behavior {
            create_delay: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        let provisioner = provisioner(&store, &calls, behavior)
            .with_create_timeout(Duration::from_millis(1500));
        assert_eq!(
            provisioner.settings().create_timeout,
            Some(Duration::from_millis(1500))
        );

        let err = tokio::time::timeout(
            Duration::from_secs(10),
            provisioner.create_host(&request(), &CancellationToken::new()),
        )
        .await
        .expect("deadline fires")
        .unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::Cancelled {
                state: CreationState::Creating
            }
        ));
    }
}
