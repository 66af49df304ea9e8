//! The wired-up core as the boundary sees it.
//!
//! [`Bridge`] owns the tokio runtime and every core component, and exposes
//! one method per boundary operation with boundary-shaped arguments
//! (context pointers, `extern "C"` completions).  The `#[no_mangle]`
//! functions in [`crate::ffi`] only decode C strings and forward here, so
//! everything below can be exercised from plain Rust tests.
//!
//! # Completions
//!
//! Each asynchronous operation registers its `ctx` in the
//! [`ContextRegistry`] and invokes the completion exactly once, from a
//! runtime worker thread, unless the context was released in the meantime.

use std::ffi::{c_char, c_void};
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context as _;
use spacenet_core::{
    AdapterContext, AdapterHandle, Authenticator, ConfigStatusController, DialogBroker, FsKeyStore,
    IdleLock, RequestId, SessionManager, SettingsStore, StatusHandler, TomlSettingsRepository,
};
use spacenet_core::{Key, SettingsRepository};
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, info, warn};

use crate::adapter::{DismissDialogFn, FfiDismisser, FfiPresenter, ShowDialogFn};
use crate::context::ContextRegistry;
use crate::strings::to_cstring;

// ── Completion signatures ─────────────────────────────────────────────────────

pub type StatusChangeFn = extern "C" fn(ctx: *mut c_void, status: u8);
pub type DoneFn = extern "C" fn(ctx: *mut c_void, ok: u8);
pub type SettingsInitFn = extern "C" fn(
    ctx: *mut c_void,
    ok: u8,
    initialized: u8,
    user: *const c_char,
    name: *const c_char,
    passphrase: *const c_char,
    unlocked_timeout: i32,
);
pub type OwnerLoggedInFn =
    extern "C" fn(ctx: *mut c_void, user: *const c_char, name: *const c_char, needs_key: u8);
pub type KeyLoadedFn = extern "C" fn(ctx: *mut c_void, ok: u8, key_file: *const c_char);

// ── Configuration ─────────────────────────────────────────────────────────────

/// How the host wants the core assembled.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Settings file; the platform default location when `None`.
    pub settings_path: Option<PathBuf>,
    /// Worker threads of the core runtime.
    pub worker_threads: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            settings_path: None,
            worker_threads: 2,
        }
    }
}

impl BridgeConfig {
    pub fn settings_repository(&self) -> anyhow::Result<TomlSettingsRepository> {
        match &self.settings_path {
            Some(path) => Ok(TomlSettingsRepository::at(path)),
            None => TomlSettingsRepository::platform_default()
                .context("locating the settings file"),
        }
    }

    /// `[client] log_level` of the settings file, if readable.
    pub fn configured_log_level(&self) -> Option<String> {
        let repo = self.settings_repository().ok()?;
        repo.load().ok().map(|doc| doc.client.log_level)
    }
}

// ── Bridge ────────────────────────────────────────────────────────────────────

/// Every core component plus the runtime driving them.
pub struct Bridge {
    runtime: Runtime,
    status: Arc<ConfigStatusController>,
    broker: Arc<DialogBroker>,
    settings: Arc<SettingsStore>,
    session: Arc<SessionManager>,
    contexts: Arc<ContextRegistry>,
    status_key: Mutex<Option<Key>>,
}

impl Bridge {
    /// Builds the runtime and wires the core together.
    pub fn new(config: &BridgeConfig, authenticator: Arc<dyn Authenticator>) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name("spacenet-core")
            .enable_all()
            .build()
            .context("building the core runtime")?;
        let repo = config.settings_repository()?;
        info!("settings file: {}", repo.path().display());

        let handle = runtime.handle().clone();
        let status = Arc::new(ConfigStatusController::new());
        let broker = Arc::new(DialogBroker::new());
        let idle = Arc::new(IdleLock::new(Arc::clone(&status), handle.clone()));
        let settings = Arc::new(SettingsStore::new(
            Arc::new(repo),
            Arc::new(FsKeyStore::new()),
            Arc::clone(&broker),
            Arc::clone(&authenticator),
            Arc::clone(&idle),
            handle.clone(),
        ));
        let session = Arc::new(SessionManager::new(
            Arc::clone(&status),
            Arc::clone(&broker),
            Arc::clone(&settings),
            authenticator,
            idle,
            handle,
        ));

        Ok(Self {
            runtime,
            status,
            broker,
            settings,
            session,
            contexts: Arc::new(ContextRegistry::new()),
            status_key: Mutex::new(None),
        })
    }

    pub fn status(&self) -> &Arc<ConfigStatusController> {
        &self.status
    }

    pub fn broker(&self) -> &Arc<DialogBroker> {
        &self.broker
    }

    pub fn handle(&self) -> &Handle {
        self.runtime.handle()
    }

    /// Runs `future` to completion for a synchronous boundary call.
    ///
    /// A caller that is itself a runtime thread (a completion calling back
    /// into the boundary) is moved to a scoped helper thread, since blocking
    /// a runtime thread on the runtime would panic.
    fn block_on<F>(&self, future: F) -> F::Output
    where
        F: Future + Send,
        F::Output: Send,
    {
        if Handle::try_current().is_err() {
            return self.runtime.block_on(future);
        }
        std::thread::scope(|scope| {
            scope
                .spawn(|| self.runtime.block_on(future))
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
        })
    }

    // ── Status ────────────────────────────────────────────────────────────────

    /// Subscribes `handler`; it is called at once with the current status.
    ///
    /// Concurrent registrations are serialized on `status_key`, so the
    /// installed callback always belongs to the last registered context.  The
    /// previous context is only forgotten once the controller has switched,
    /// letting a notification already in flight reach the old subscriber.
    ///
    /// `handler` runs under the controller's lock on the thread that changed
    /// the status; calling back into a status-changing entry point from it
    /// deadlocks.
    pub fn register_status_handler(&self, ctx: *mut c_void, handler: StatusChangeFn) {
        let mut current = self
            .status_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let key = self.contexts.register(ctx);
        let contexts = Arc::clone(&self.contexts);
        let callback: StatusHandler = Arc::new(move |status| match contexts.get(key) {
            Some(ctx) => handler(ctx, status.as_u8()),
            None => debug!("status subscriber released; {status} not delivered"),
        });
        self.status.register_status_handler(callback);

        if let Some(previous) = current.replace(key) {
            self.contexts.take(previous);
        }
    }

    // ── Session ───────────────────────────────────────────────────────────────

    pub fn initialize(&self, passphrase: Option<String>) -> bool {
        self.block_on(self.session.initialize(passphrase))
    }

    pub fn login(&self, ctx: *mut c_void, on_done: DoneFn) {
        let key = self.contexts.register(ctx);
        let contexts = Arc::clone(&self.contexts);
        self.session.login(move |ok| {
            if let Some(ctx) = contexts.take(key) {
                on_done(ctx, u8::from(ok));
            }
        });
    }

    pub fn logout(&self) -> bool {
        self.block_on(self.session.logout())
    }

    pub fn logged_in_user(&self) -> Option<String> {
        self.session.logged_in_user()
    }

    pub fn is_logged_in_user_owner(&self) -> bool {
        self.session.is_logged_in_user_owner()
    }

    pub fn eula_accepted(&self) -> bool {
        self.session.eula_accepted()
    }

    pub fn set_eula_accepted(&self) -> bool {
        self.block_on(self.session.set_eula_accepted())
    }

    pub fn unlock(&self, passphrase: &str) -> bool {
        self.session.unlock(passphrase)
    }

    pub fn touch(&self) {
        self.session.touch();
    }

    // ── Settings ──────────────────────────────────────────────────────────────

    pub fn settings_init(&self, ctx: *mut c_void, on_init: SettingsInitFn) {
        let key = self.contexts.register(ctx);
        let contexts = Arc::clone(&self.contexts);
        self.settings.spawn_init(move |result| {
            let Some(ctx) = contexts.take(key) else { return };
            match result {
                Ok(s) => {
                    let user = to_cstring(&s.device_user);
                    let name = to_cstring(&s.device_name);
                    let pass = to_cstring(&s.lock_passphrase);
                    let timeout = i32::try_from(s.unlocked_timeout_seconds).unwrap_or(i32::MAX);
                    on_init(
                        ctx,
                        1,
                        u8::from(s.initialized),
                        user.as_ptr(),
                        name.as_ptr(),
                        pass.as_ptr(),
                        timeout,
                    );
                }
                Err(e) => {
                    warn!("settings init failed: {e}");
                    let empty = to_cstring("");
                    on_init(ctx, 0, 0, empty.as_ptr(), empty.as_ptr(), empty.as_ptr(), 0);
                }
            }
        });
    }

    /// Re-binds the device owner.  On failure the completion still runs,
    /// with an empty username.
    pub fn reset_device_owner(&self, ctx: *mut c_void, on_owner: OwnerLoggedInFn) {
        let key = self.contexts.register(ctx);
        let contexts = Arc::clone(&self.contexts);
        self.settings.spawn_reset_device_owner(move |result| {
            let Some(ctx) = contexts.take(key) else { return };
            let owner = result.unwrap_or_default();
            let user = to_cstring(&owner.username);
            let name = to_cstring(&owner.device_name);
            on_owner(ctx, user.as_ptr(), name.as_ptr(), u8::from(owner.needs_key));
        });
    }

    pub fn load_user_key(&self, ctx: *mut c_void, key_file: String, create: bool, on_loaded: KeyLoadedFn) {
        let key = self.contexts.register(ctx);
        let contexts = Arc::clone(&self.contexts);
        let requested = key_file.clone();
        self.settings
            .spawn_load_user_key(PathBuf::from(key_file), create, move |result| {
                let Some(ctx) = contexts.take(key) else { return };
                match result {
                    Ok(path) => {
                        let path = to_cstring(&path.to_string_lossy());
                        on_loaded(ctx, 1, path.as_ptr());
                    }
                    Err(_) => {
                        let path = to_cstring(&requested);
                        on_loaded(ctx, 0, path.as_ptr());
                    }
                }
            });
    }

    /// Persists device settings.  A negative timeout is treated as `0`
    /// (never lock).
    pub fn save(
        &self,
        ctx: *mut c_void,
        device_name: String,
        lock_passphrase: String,
        unlocked_timeout: i32,
        on_done: DoneFn,
    ) {
        let key = self.contexts.register(ctx);
        let contexts = Arc::clone(&self.contexts);
        let timeout = u32::try_from(unlocked_timeout).unwrap_or(0);
        self.settings
            .spawn_save(device_name, lock_passphrase, timeout, move |result| {
                if let Some(ctx) = contexts.take(key) {
                    on_done(ctx, u8::from(result.is_ok()));
                }
            });
    }

    /// Reports a settings call whose arguments could not be decoded.
    pub fn reject(&self, ctx: *mut c_void, on_done: DoneFn) {
        warn!("boundary call rejected: invalid string argument");
        on_done(ctx, 0);
    }

    // ── Dialogs ───────────────────────────────────────────────────────────────

    pub fn register_show_dialog(&self, ctx: *mut c_void, show: ShowDialogFn) {
        self.broker.register_adapter(
            AdapterContext(ctx as u64),
            Arc::new(FfiPresenter::new(ctx, show)),
            None,
        );
    }

    pub fn set_dismiss_handler(&self, ctx: *mut c_void, dismiss: DismissDialogFn) -> bool {
        self.broker
            .set_dismiss_handler(
                AdapterContext(ctx as u64),
                Arc::new(FfiDismisser::new(ctx, dismiss)),
            )
            .is_ok()
    }

    pub fn unregister_show_dialog(&self, ctx: *mut c_void) -> bool {
        self.broker.unregister_adapter(AdapterContext(ctx as u64))
    }

    pub fn handle_dialog_input(&self, id: u64, ok: bool, result: &str) -> bool {
        self.broker.deliver_input(RequestId(id), ok, result)
    }

    pub fn associate_dialog_input(&self, id: u64, handle: u64) -> bool {
        if handle == 0 {
            return false;
        }
        self.broker
            .associate_handle(RequestId(id), AdapterHandle(handle))
    }

    // ── Teardown ──────────────────────────────────────────────────────────────

    /// Forgets `ctx`: pending completions for it are dropped, and an adapter
    /// registered with it is unregistered.
    pub fn release_context(&self, ctx: *mut c_void) {
        let released = self.contexts.release(ctx);
        let adapter = self.unregister_show_dialog(ctx);
        debug!("context released ({released} completion(s), adapter: {adapter})");
    }

    pub fn pending_completions(&self) -> usize {
        self.contexts.len()
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.broker.teardown();
        self.status.unregister_status_handler();
    }
}
