//! Credentials, the services that produce them, and the process-wide
//! registry of interactive logins that survive a client reconnecting.

use crate::{error::AuthError, identity::offline_uuid, protocol::packet::server::login::EncryptionRequest};
use dashmap::{mapref::entry::Entry, DashMap};
use futures::future::BoxFuture;
use std::{
    collections::BTreeMap,
    fmt,
    future::Future,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};
use tokio::sync::watch;
use uuid::Uuid;

/// What the backend login is performed with.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub name: String,
    /// Profile id, when the credential service knows it.
    pub uuid: Option<Uuid>,
    pub access_token: Option<String>,
    /// Long-lived token to skip the interactive flow next time.
    pub refresh_token: Option<String>,
}

impl Credentials {
    /// Name-only credentials for backends that do not verify accounts.
    pub fn offline(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: None,
            access_token: None,
            refresh_token: None,
        }
    }

    pub fn uuid_or_offline(&self) -> Uuid {
        self.uuid.unwrap_or_else(|| offline_uuid(&self.name))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("name", &self.name)
            .field("uuid", &self.uuid)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Code the player enters on another device to sign in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCode {
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: Duration,
}

/// A started device-code login: the code to show, and a future that
/// resolves once the player finished signing in.
pub struct DeviceCodeFlow {
    pub code: DeviceCode,
    pub completion: BoxFuture<'static, Result<Credentials, AuthError>>,
}

/// Answer to a backend encryption request.
#[derive(Debug, Clone)]
pub struct EncryptionAnswer {
    pub shared_secret: [u8; 16],
    pub encrypted_shared_secret: Vec<u8>,
    pub encrypted_verify_token: Vec<u8>,
}

/// External account service.
pub trait CredentialProvider: Send + Sync {
    fn refresh(&self, refresh_token: &str) -> BoxFuture<'static, Result<Credentials, AuthError>>;

    fn start_device_code(&self) -> BoxFuture<'static, Result<DeviceCodeFlow, AuthError>>;

    /// Joins the session server and encrypts the shared secret for the
    /// backend. Only needed when the backend verifies accounts.
    fn answer_encryption(
        &self,
        _credentials: &Credentials,
        _request: &EncryptionRequest,
    ) -> BoxFuture<'static, Result<EncryptionAnswer, AuthError>> {
        Box::pin(async {
            Err(AuthError::Service(
                "encryption is not supported by this credential provider".to_owned(),
            ))
        })
    }
}

/// Provider for deployments without an account service. Every
/// interactive flow fails.
pub struct NoCredentialService;

impl CredentialProvider for NoCredentialService {
    fn refresh(&self, _refresh_token: &str) -> BoxFuture<'static, Result<Credentials, AuthError>> {
        Box::pin(async { Err(AuthError::Service("no account service configured".to_owned())) })
    }

    fn start_device_code(&self) -> BoxFuture<'static, Result<DeviceCodeFlow, AuthError>> {
        Box::pin(async { Err(AuthError::Service("no account service configured".to_owned())) })
    }
}

/// Where refresh tokens are kept between logins, keyed by Xbox user id.
pub trait RefreshTokenStore: Send + Sync {
    fn get(&self, xuid: &str) -> Option<String>;
    fn store(&self, xuid: &str, token: String);
    fn remove(&self, xuid: &str);
}

#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: DashMap<String, String>,
}

impl RefreshTokenStore for MemoryTokenStore {
    fn get(&self, xuid: &str) -> Option<String> {
        self.tokens.get(xuid).map(|token| token.clone())
    }

    fn store(&self, xuid: &str, token: String) {
        self.tokens.insert(xuid.to_owned(), token);
    }

    fn remove(&self, xuid: &str) {
        self.tokens.remove(xuid);
    }
}

/// Token store persisted as a JSON object next to the config.
pub struct FileTokenStore {
    path: PathBuf,
    tokens: Mutex<BTreeMap<String, String>>,
}

impl FileTokenStore {
    /// Loads the store, starting empty if the file does not exist yet.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let tokens = if path.exists() {
            serde_json::from_str(&fs_err::read_to_string(path)?)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_owned(),
            tokens: Mutex::new(tokens),
        })
    }

    fn save(&self, tokens: &BTreeMap<String, String>) {
        let result = serde_json::to_string_pretty(tokens)
            .map_err(anyhow::Error::from)
            .and_then(|json| fs_err::write(&self.path, json).map_err(anyhow::Error::from));
        if let Err(e) = result {
            tracing::warn!("Failed to save refresh tokens: {e:#}");
        }
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut tokens);
        self.save(&tokens);
    }
}

impl RefreshTokenStore for FileTokenStore {
    fn get(&self, xuid: &str) -> Option<String> {
        self.tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(xuid)
            .cloned()
    }

    fn store(&self, xuid: &str, token: String) {
        self.update(|tokens| {
            tokens.insert(xuid.to_owned(), token);
        });
    }

    fn remove(&self, xuid: &str) {
        self.update(|tokens| {
            tokens.remove(xuid);
        });
    }
}

type Slot<T> = Option<Result<T, AuthError>>;

/// One interactive login, shared by every connection of the same
/// player until it resolves or times out.
pub struct AuthenticationTask {
    xuid: String,
    last_reset: Mutex<Instant>,
    /// Whether a client is currently waiting on this task.
    online: AtomicBool,
    started: AtomicBool,
    code: watch::Sender<Slot<DeviceCode>>,
    result: watch::Sender<Slot<Credentials>>,
}

impl AuthenticationTask {
    fn new(xuid: String, now: Instant) -> Self {
        Self {
            xuid,
            last_reset: Mutex::new(now),
            online: AtomicBool::new(false),
            started: AtomicBool::new(false),
            code: watch::Sender::new(None),
            result: watch::Sender::new(None),
        }
    }

    pub fn xuid(&self) -> &str {
        &self.xuid
    }

    pub fn reset_timer(&self, now: Instant) {
        *self.last_reset.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        let last_reset = *self.last_reset.lock().unwrap_or_else(|e| e.into_inner());
        now.saturating_duration_since(last_reset) >= timeout
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Claims the right to drive the flow. True for the first caller only.
    pub fn begin(&self) -> bool {
        !self.started.swap(true, Ordering::AcqRel)
    }

    pub fn publish_code(&self, code: Result<DeviceCode, AuthError>) {
        self.code.send_if_modified(|slot| fill(slot, code));
    }

    /// Records the outcome. Later outcomes are ignored.
    pub fn publish_result(&self, result: Result<Credentials, AuthError>) {
        if self.result.send_if_modified(|slot| fill(slot, result)) {
            // Nobody publishes a code once the flow has ended.
            self.code
                .send_if_modified(|slot| fill(slot, Err(AuthError::Abandoned)));
        }
    }

    pub fn result(&self) -> Slot<Credentials> {
        self.result.borrow().clone()
    }

    pub fn is_done(&self) -> bool {
        self.result.borrow().is_some()
    }

    pub fn wait_for_code(&self) -> impl Future<Output = Result<DeviceCode, AuthError>> + Send + 'static {
        wait_slot(self.code.subscribe())
    }

    pub fn wait_for_result(
        &self,
    ) -> impl Future<Output = Result<Credentials, AuthError>> + Send + 'static {
        wait_slot(self.result.subscribe())
    }

    /// Runs a device-code flow to completion, publishing the code and
    /// then the result. Stops early once a result is recorded elsewhere,
    /// such as a timeout, dropping the provider's futures.
    pub async fn drive(self: Arc<Self>, provider: Arc<dyn CredentialProvider>) {
        let flow = tokio::select! {
            flow = provider.start_device_code() => flow,
            () = self.resolved() => return,
        };
        let flow = match flow {
            Ok(flow) => flow,
            Err(e) => {
                self.publish_code(Err(e.clone()));
                self.publish_result(Err(e));
                return;
            }
        };
        self.publish_code(Ok(flow.code));
        tokio::select! {
            result = flow.completion => self.publish_result(result),
            () = self.resolved() => {
                tracing::debug!("Abandoning device code login for {}", self.xuid);
            }
        }
    }

    async fn resolved(&self) {
        let mut receiver = self.result.subscribe();
        let _ = receiver.wait_for(Option::is_some).await;
    }
}

fn fill<T>(slot: &mut Slot<T>, value: Result<T, AuthError>) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value);
    true
}

async fn wait_slot<T: Clone>(mut receiver: watch::Receiver<Slot<T>>) -> Result<T, AuthError> {
    match receiver.wait_for(Option::is_some).await {
        Ok(value) => value.clone().unwrap_or(Err(AuthError::Abandoned)),
        Err(_) => Err(AuthError::Abandoned),
    }
}

/// Process-wide registry of interactive logins, keyed by Xbox user id.
pub struct PendingAuthentications {
    tasks: DashMap<String, Arc<AuthenticationTask>>,
    timeout: Duration,
}

impl PendingAuthentications {
    pub fn new(timeout: Duration) -> Self {
        Self {
            tasks: DashMap::new(),
            timeout,
        }
    }

    /// Returns the task for `xuid`, creating it if needed. An existing
    /// task has its timer reset. The flag is true if the task is new.
    pub fn get_or_create(&self, xuid: &str, now: Instant) -> (Arc<AuthenticationTask>, bool) {
        match self.tasks.entry(xuid.to_owned()) {
            Entry::Occupied(entry) => {
                let task = Arc::clone(entry.get());
                task.reset_timer(now);
                (task, false)
            }
            Entry::Vacant(entry) => {
                let task = Arc::new(AuthenticationTask::new(xuid.to_owned(), now));
                entry.insert(Arc::clone(&task));
                (task, true)
            }
        }
    }

    pub fn get(&self, xuid: &str) -> Option<Arc<AuthenticationTask>> {
        self.tasks.get(xuid).map(|task| Arc::clone(&task))
    }

    /// Removes `task` if it is still the registered one. Idempotent.
    pub fn cleanup(&self, task: &Arc<AuthenticationTask>) -> bool {
        self.tasks
            .remove_if(task.xuid(), |_, registered| Arc::ptr_eq(registered, task))
            .is_some()
    }

    /// Times out every task whose timer ran out and removes it.
    /// Returns how many were removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let expired: Vec<Arc<AuthenticationTask>> = self
            .tasks
            .iter()
            .filter(|entry| entry.value().is_expired(now, self.timeout))
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut removed = 0;
        for task in expired {
            task.publish_result(Err(AuthError::TimedOut));
            if self.cleanup(&task) {
                tracing::debug!("Pending login for {} timed out", task.xuid());
                removed += 1;
            }
        }
        removed
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
