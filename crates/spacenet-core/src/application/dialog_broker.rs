//! DialogBroker: hands dialogs to the registered UI adapter and correlates
//! input requests with the answers the adapter delivers later.
//!
//! # Request/answer flow
//!
//! ```text
//! core task                    DialogBroker                      adapter (UI thread)
//! ─────────                    ────────────                      ───────────────────
//! get_input(content) ───────►  id = 7, pending[7] = tx
//!                              presenter.show(req{id: 7}) ─────► renders dialog
//!   ◄── (7, receiver)                                            ...user types...
//! receiver.await               deliver_input(7, ok, text) ◄───── answer (any thread)
//!   ◄── Submitted(text)        pending.remove(7) -> tx.send
//!                              deliver_input(7, ..) again  ◄──── ignored
//! ```
//!
//! # Invariants
//!
//! - A pending entry is removed exactly once: by a delivery, by a scope
//!   cancellation, or by adapter replacement/teardown.  Whoever removes it
//!   resolves its continuation; everyone else misses in the map.
//! - Replacing or unregistering the adapter resolves every pending input with
//!   [`InputOutcome::Cancelled`] *before* the new adapter is installed, and
//!   force-dismisses every dialog the old adapter still has open.
//! - Adapter callbacks (`show`, `dismiss`) are never invoked while the broker
//!   lock is held, so an adapter may call back into the broker (for example
//!   deliver an answer synchronously from inside `show`).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::recover;
use crate::domain::dialog::{
    AdapterContext, AdapterHandle, DialogContent, DialogHandle, DialogRequest, InputOutcome,
    InputScope, RequestId,
};
use crate::registry::handle_table::HandleTable;
use crate::registry::sequence::RequestIdAllocator;

/// Error type for dialog operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DialogError {
    #[error("no dialog adapter is registered")]
    NoAdapter,
    #[error("the dialog adapter could not present the dialog")]
    PresentationFailed,
    #[error("the dialog adapter was replaced while the dialog was being shown")]
    AdapterChanged,
    #[error("adapter context does not match the registered adapter")]
    ContextMismatch,
}

/// Front-end side of dialog presentation.
///
/// `show` returns the adapter's own handle for the rendered dialog, or `None`
/// when nothing was shown.  When `request.dispatch_to_main` is set the
/// implementation must render on its UI thread before returning.
pub trait DialogPresenter: Send + Sync {
    fn show(&self, request: &DialogRequest) -> Option<AdapterHandle>;
}

/// Closes a dialog previously returned by [`DialogPresenter::show`].
pub trait DialogDismisser: Send + Sync {
    fn dismiss(&self, handle: AdapterHandle);
}

impl<F> DialogPresenter for F
where
    F: Fn(&DialogRequest) -> Option<AdapterHandle> + Send + Sync,
{
    fn show(&self, request: &DialogRequest) -> Option<AdapterHandle> {
        self(request)
    }
}

impl<F> DialogDismisser for F
where
    F: Fn(AdapterHandle) + Send + Sync,
{
    fn dismiss(&self, handle: AdapterHandle) {
        self(handle)
    }
}

// ── Broker state ──────────────────────────────────────────────────────────────

struct Adapter {
    context: AdapterContext,
    presenter: Arc<dyn DialogPresenter>,
    dismisser: Option<Arc<dyn DialogDismisser>>,
    /// Registration number; distinguishes two registrations of one context.
    epoch: u64,
}

struct PendingInput {
    reply: oneshot::Sender<InputOutcome>,
    scope: InputScope,
    handle: Option<AdapterHandle>,
    /// Password-style accessory; the answer is never logged.
    secret: bool,
}

/// The answer text as it may appear in a log line.
fn loggable_answer(secret: bool, result: &str) -> &str {
    if secret {
        "<redacted>"
    } else {
        result
    }
}

struct OpenDialog {
    handle: AdapterHandle,
}

#[derive(Default)]
struct BrokerState {
    adapter: Option<Adapter>,
    epochs: u64,
    pending: HashMap<RequestId, PendingInput>,
    open: HandleTable<OpenDialog>,
}

impl BrokerState {
    /// Removes the pending inputs matching `filter`, resolves them as
    /// cancelled and returns the adapter handles that need dismissing.
    fn cancel_pending(&mut self, filter: impl Fn(&PendingInput) -> bool) -> Vec<AdapterHandle> {
        let ids: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, p)| filter(p))
            .map(|(id, _)| *id)
            .collect();

        let mut handles = Vec::new();
        for id in ids {
            if let Some(pending) = self.pending.remove(&id) {
                debug!("cancelling input request {id}");
                // The waiter may have given up already; nothing to resolve then.
                let _ = pending.reply.send(InputOutcome::Cancelled);
                handles.extend(pending.handle);
            }
        }
        handles
    }

    /// Cancels everything tied to the current adapter and removes it.
    fn detach(&mut self) -> Option<Detached> {
        let adapter = self.adapter.take()?;
        let mut handles = self.cancel_pending(|_| true);
        handles.extend(self.open.drain().into_iter().map(|d| d.handle));
        handles.sort_unstable_by_key(|h| h.0);
        handles.dedup();
        Some(Detached { adapter, handles })
    }
}

/// An adapter that was removed plus the dialogs it still has on screen.
struct Detached {
    adapter: Adapter,
    handles: Vec<AdapterHandle>,
}

impl Detached {
    fn dismiss_all(self) {
        let Detached { adapter, handles } = self;
        if handles.is_empty() {
            return;
        }
        match adapter.dismisser {
            Some(dismisser) => {
                debug!(
                    "force-dismissing {} dialog(s) of adapter {:?}",
                    handles.len(),
                    adapter.context
                );
                for handle in handles {
                    dismisser.dismiss(handle);
                }
            }
            None => debug!(
                "adapter {:?} has no dismiss handler; {} dialog(s) left to the front-end",
                adapter.context,
                handles.len()
            ),
        }
    }
}

// ── DialogBroker ──────────────────────────────────────────────────────────────

/// Correlation engine between core logic and the registered UI adapter.
///
/// Shared as `Arc<DialogBroker>`; every method takes `&self` and may be
/// called from any thread.
pub struct DialogBroker {
    state: Mutex<BrokerState>,
    ids: RequestIdAllocator,
}

impl DialogBroker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BrokerState::default()),
            ids: RequestIdAllocator::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        recover(self.state.lock())
    }

    /// Installs `presenter` as the active UI target, replacing any previous
    /// adapter.
    ///
    /// Every input pending on the previous adapter is resolved as cancelled
    /// before the new adapter becomes visible to other callers; its open
    /// dialogs are then dismissed through its own dismiss handler.
    pub fn register_adapter(
        &self,
        context: AdapterContext,
        presenter: Arc<dyn DialogPresenter>,
        dismisser: Option<Arc<dyn DialogDismisser>>,
    ) {
        let detached = {
            let mut state = self.lock();
            let detached = state.detach();
            state.epochs += 1;
            let epoch = state.epochs;
            state.adapter = Some(Adapter {
                context,
                presenter,
                dismisser,
                epoch,
            });
            detached
        };

        match &detached {
            Some(old) => info!(
                "dialog adapter {:?} replaced by {:?}",
                old.adapter.context, context
            ),
            None => info!("dialog adapter {context:?} registered"),
        }
        if let Some(old) = detached {
            old.dismiss_all();
        }
    }

    /// Installs the dismiss handler of the registered adapter.
    ///
    /// # Errors
    ///
    /// [`DialogError::NoAdapter`] when nothing is registered, and
    /// [`DialogError::ContextMismatch`] when `context` belongs to some other
    /// (older) adapter.
    pub fn set_dismiss_handler(
        &self,
        context: AdapterContext,
        dismisser: Arc<dyn DialogDismisser>,
    ) -> Result<(), DialogError> {
        let mut state = self.lock();
        let adapter = state.adapter.as_mut().ok_or(DialogError::NoAdapter)?;
        if adapter.context != context {
            warn!(
                "ignoring dismiss handler for {context:?}; active adapter is {:?}",
                adapter.context
            );
            return Err(DialogError::ContextMismatch);
        }
        adapter.dismisser = Some(dismisser);
        Ok(())
    }

    /// Removes the adapter registered with `context`.
    ///
    /// Idempotent: returns `false` and does nothing when no adapter is
    /// registered or the registered one has a different context.
    pub fn unregister_adapter(&self, context: AdapterContext) -> bool {
        let detached = {
            let mut state = self.lock();
            match &state.adapter {
                Some(adapter) if adapter.context == context => state.detach(),
                _ => None,
            }
        };
        match detached {
            Some(old) => {
                info!("dialog adapter {context:?} unregistered");
                old.dismiss_all();
                true
            }
            None => {
                debug!("unregister for {context:?} ignored; not the active adapter");
                false
            }
        }
    }

    /// Removes whatever adapter is registered and cancels all pending work.
    pub fn teardown(&self) {
        let detached = self.lock().detach();
        if let Some(old) = detached {
            info!("dialog adapter {:?} torn down", old.adapter.context);
            old.dismiss_all();
        }
    }

    pub fn has_adapter(&self) -> bool {
        self.lock().adapter.is_some()
    }

    /// Shows a dialog and returns the token to dismiss it with.
    ///
    /// # Errors
    ///
    /// - [`DialogError::NoAdapter`] – nothing is registered (the "null
    ///   handle" case).
    /// - [`DialogError::PresentationFailed`] – the adapter returned no handle.
    /// - [`DialogError::AdapterChanged`] – the adapter was replaced while it
    ///   was rendering; the dialog has already been dismissed again.
    pub fn show(&self, content: DialogContent) -> Result<DialogHandle, DialogError> {
        let (presenter, dismisser, epoch) = {
            let state = self.lock();
            let adapter = state.adapter.as_ref().ok_or(DialogError::NoAdapter)?;
            (
                Arc::clone(&adapter.presenter),
                adapter.dismisser.clone(),
                adapter.epoch,
            )
        };

        let request = content.into_request(self.ids.next(), false);
        debug!(
            "showing {:?} dialog {} ({:?})",
            request.dialog_type, request.id, request.accessory_type
        );
        let handle = presenter
            .show(&request)
            .ok_or(DialogError::PresentationFailed)?;

        {
            let mut state = self.lock();
            if state.adapter.as_ref().map(|a| a.epoch) == Some(epoch) {
                let key = state.open.insert(OpenDialog { handle });
                return Ok(DialogHandle(key));
            }
        }

        if let Some(dismisser) = dismisser {
            dismisser.dismiss(handle);
        }
        Err(DialogError::AdapterChanged)
    }

    /// Dismisses a dialog returned by [`show`](Self::show).
    ///
    /// Returns `false` (and does nothing) for a handle that was already
    /// dismissed or belongs to a replaced adapter.
    pub fn dismiss(&self, handle: DialogHandle) -> bool {
        let (dialog, dismisser) = {
            let mut state = self.lock();
            let Some(dialog) = state.open.remove(handle.0) else {
                return false;
            };
            let dismisser = state.adapter.as_ref().and_then(|a| a.dismisser.clone());
            (dialog, dismisser)
        };
        match dismisser {
            Some(dismisser) => dismisser.dismiss(dialog.handle),
            None => debug!("no dismiss handler registered; dialog {} left open", handle.0),
        }
        true
    }

    /// Starts an input request and returns immediately.
    ///
    /// The answer arrives on the returned [`InputReceiver`] once the adapter
    /// calls [`deliver_input`](Self::deliver_input) with the returned id, or
    /// as `Cancelled` when the request is cancelled.
    ///
    /// # Errors
    ///
    /// [`DialogError::NoAdapter`] when nothing is registered; no id is left
    /// pending in that case.
    pub fn get_input(
        &self,
        content: DialogContent,
        scope: InputScope,
    ) -> Result<(RequestId, InputReceiver), DialogError> {
        let (reply, rx) = oneshot::channel();
        let id = self.ids.next();

        let (presenter, dismisser, epoch) = {
            let mut state = self.lock();
            let adapter = state.adapter.as_ref().ok_or(DialogError::NoAdapter)?;
            let captured = (
                Arc::clone(&adapter.presenter),
                adapter.dismisser.clone(),
                adapter.epoch,
            );
            state.pending.insert(
                id,
                PendingInput {
                    reply,
                    scope,
                    handle: None,
                    secret: content.accessory_type.is_secret(),
                },
            );
            captured
        };

        let request = content.into_request(id, true);
        debug!(
            "requesting input {id} ({:?}, {:?} scope)",
            request.accessory_type, scope
        );
        // Older adapters return no handle for input dialogs; the request
        // stays pending either way.
        if let Some(handle) = presenter.show(&request) {
            self.attach_shown_input(id, handle, epoch, dismisser);
        }

        Ok((id, InputReceiver { id, rx }))
    }

    /// Links the handle `show` returned for input `id` to its request.
    ///
    /// If the adapter that rendered it was replaced in the meantime, the
    /// replacement already cancelled the request and could not know about
    /// this handle, so it is dismissed here through that adapter's dismisser.
    fn attach_shown_input(
        &self,
        id: RequestId,
        handle: AdapterHandle,
        epoch: u64,
        dismisser: Option<Arc<dyn DialogDismisser>>,
    ) {
        let replaced = {
            let mut state = self.lock();
            if let Some(pending) = state.pending.get_mut(&id) {
                pending.handle = Some(handle);
                return;
            }
            state.adapter.as_ref().map(|a| a.epoch) != Some(epoch)
        };

        // Otherwise the request was answered from inside `show`.
        if replaced {
            debug!("adapter replaced while showing input {id}; dismissing its dialog");
            if let Some(dismisser) = dismisser {
                dismisser.dismiss(handle);
            }
        }
    }

    /// Resolves input request `id`.
    ///
    /// `ok == false` means the user cancelled.  Unknown or already-resolved
    /// ids are ignored; returns whether a waiting request was found.
    pub fn deliver_input(&self, id: RequestId, ok: bool, result: &str) -> bool {
        let pending = self.lock().pending.remove(&id);
        let Some(pending) = pending else {
            debug!("dropping input for unknown or resolved request {id}");
            return false;
        };

        let outcome = InputOutcome::from_delivery(ok, result);
        if outcome.is_cancelled() {
            info!("input request {id} cancelled by the user");
        } else {
            debug!(
                "input request {id} answered: {:?}",
                loggable_answer(pending.secret, result)
            );
        }
        if pending.reply.send(outcome).is_err() {
            debug!("requester of input {id} stopped waiting");
        }
        true
    }

    /// Links an adapter handle to a pending input so the dialog can be
    /// force-dismissed if the request is cancelled.
    ///
    /// Returns `false` when the request is no longer pending.
    pub fn associate_handle(&self, id: RequestId, handle: AdapterHandle) -> bool {
        let mut state = self.lock();
        match state.pending.get_mut(&id) {
            Some(pending) => {
                pending.handle = Some(handle);
                true
            }
            None => false,
        }
    }

    /// Cancels every pending input of `scope` and dismisses its dialogs.
    ///
    /// Returns the number of requests cancelled.
    pub fn cancel_scope(&self, scope: InputScope) -> usize {
        let (handles, cancelled, dismisser) = {
            let mut state = self.lock();
            let before = state.pending.len();
            let handles = state.cancel_pending(|p| p.scope == scope);
            let cancelled = before - state.pending.len();
            let dismisser = state.adapter.as_ref().and_then(|a| a.dismisser.clone());
            (handles, cancelled, dismisser)
        };

        if cancelled > 0 {
            info!("cancelled {cancelled} pending {scope:?} input request(s)");
        }
        if let Some(dismisser) = dismisser {
            for handle in handles {
                dismisser.dismiss(handle);
            }
        }
        cancelled
    }

    /// Number of input requests still waiting for an answer.
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Number of dialogs shown through [`show`](Self::show) and not yet
    /// dismissed.
    pub fn outstanding_count(&self) -> usize {
        self.lock().open.len()
    }
}

impl Default for DialogBroker {
    fn default() -> Self {
        Self::new()
    }
}

// ── Continuations ─────────────────────────────────────────────────────────────

/// Awaitable answer to one input request.
///
/// Resolves to [`InputOutcome::Cancelled`] if the request is dropped without
/// an answer, so a waiter can never hang on a torn-down broker.
#[derive(Debug)]
pub struct InputReceiver {
    id: RequestId,
    rx: oneshot::Receiver<InputOutcome>,
}

impl InputReceiver {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Blocks the current thread until the request is resolved.
    ///
    /// Must not be called from inside an async runtime.
    pub fn blocking_recv(self) -> InputOutcome {
        self.rx.blocking_recv().unwrap_or(InputOutcome::Cancelled)
    }

    /// Returns the outcome if the request was already resolved.
    pub fn try_recv(&mut self) -> Option<InputOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(InputOutcome::Cancelled),
        }
    }
}

impl Future for InputReceiver {
    type Output = InputOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<InputOutcome> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(InputOutcome::Cancelled))
    }
}

/// Scoped view of the broker handed to code that needs to ask the user
/// something (authenticators, the owner-reset flow).
#[derive(Clone)]
pub struct InputPrompter {
    broker: Arc<DialogBroker>,
    scope: InputScope,
}

impl InputPrompter {
    pub fn new(broker: Arc<DialogBroker>, scope: InputScope) -> Self {
        Self { broker, scope }
    }

    pub fn scope(&self) -> InputScope {
        self.scope
    }

    /// Asks for input and waits for the answer.
    ///
    /// # Errors
    ///
    /// [`DialogError::NoAdapter`] when no adapter is registered.
    pub async fn prompt(&self, content: DialogContent) -> Result<InputOutcome, DialogError> {
        let (_, receiver) = self.broker.get_input(content, self.scope)?;
        Ok(receiver.await)
    }

    /// Shows a non-interactive dialog (progress, notice).
    pub fn show(&self, content: DialogContent) -> Result<DialogHandle, DialogError> {
        self.broker.show(content)
    }

    pub fn dismiss(&self, handle: DialogHandle) -> bool {
        self.broker.dismiss(handle)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dialog::{AccessoryType, DialogType};
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio_test::{assert_pending, assert_ready_eq, task};

    /// Adapter that records what it was asked to do.
    #[derive(Default)]
    struct RecordingAdapter {
        shown: Mutex<Vec<DialogRequest>>,
        dismissed: Mutex<Vec<AdapterHandle>>,
        next_handle: AtomicU64,
    }

    impl RecordingAdapter {
        fn shown(&self) -> Vec<DialogRequest> {
            self.shown.lock().unwrap().clone()
        }

        fn dismissed(&self) -> Vec<AdapterHandle> {
            self.dismissed.lock().unwrap().clone()
        }
    }

    impl DialogPresenter for RecordingAdapter {
        fn show(&self, request: &DialogRequest) -> Option<AdapterHandle> {
            self.shown.lock().unwrap().push(request.clone());
            Some(AdapterHandle(100 + self.next_handle.fetch_add(1, Ordering::Relaxed)))
        }
    }

    impl DialogDismisser for RecordingAdapter {
        fn dismiss(&self, handle: AdapterHandle) {
            self.dismissed.lock().unwrap().push(handle);
        }
    }

    fn register(broker: &DialogBroker, ctx: u64) -> Arc<RecordingAdapter> {
        let adapter = Arc::new(RecordingAdapter::default());
        broker.register_adapter(
            AdapterContext(ctx),
            adapter.clone(),
            Some(adapter.clone() as Arc<dyn DialogDismisser>),
        );
        adapter
    }

    fn text_prompt() -> DialogContent {
        DialogContent::new(DialogType::Notify, "Test Input", "Please enter some text")
            .accessory(AccessoryType::TextInput, "")
    }

    #[test]
    fn test_show_without_adapter_fails() {
        let broker = DialogBroker::new();
        let result = broker.show(DialogContent::new(DialogType::Alert, "t", "m"));
        assert_eq!(result, Err(DialogError::NoAdapter));
    }

    #[test]
    fn test_get_input_without_adapter_leaves_nothing_pending() {
        let broker = DialogBroker::new();
        let result = broker.get_input(text_prompt(), InputScope::Global);
        assert!(matches!(result, Err(DialogError::NoAdapter)));
        assert_eq!(broker.pending_count(), 0);
    }

    #[test]
    fn test_show_passes_request_fields_to_adapter() {
        // Arrange
        let broker = DialogBroker::new();
        let adapter = register(&broker, 1);

        // Act
        let handle = broker
            .show(
                DialogContent::new(DialogType::WaitLogin, "Signing in", "Please wait")
                    .accessory(AccessoryType::Spinner, "contacting service")
                    .on_main_thread(),
            )
            .expect("adapter registered");

        // Assert
        let shown = adapter.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].dialog_type, DialogType::WaitLogin);
        assert_eq!(shown[0].accessory_type, AccessoryType::Spinner);
        assert_eq!(shown[0].accessory_text, "contacting service");
        assert!(shown[0].dispatch_to_main);
        assert!(!shown[0].wants_input);
        assert_eq!(shown[0].input_id(), RequestId::NONE);
        assert_eq!(broker.outstanding_count(), 1);
        assert!(broker.dismiss(handle));
    }

    #[test]
    fn test_show_reports_presentation_failure() {
        let broker = DialogBroker::new();
        let presenter = |_: &DialogRequest| -> Option<AdapterHandle> { None };
        broker.register_adapter(AdapterContext(1), Arc::new(presenter), None);

        let result = broker.show(DialogContent::new(DialogType::App, "t", "m"));

        assert_eq!(result, Err(DialogError::PresentationFailed));
        assert_eq!(broker.outstanding_count(), 0);
    }

    #[test]
    fn test_dismiss_twice_is_a_no_op_the_second_time() {
        // Arrange
        let broker = DialogBroker::new();
        let adapter = register(&broker, 1);
        let handle = broker
            .show(DialogContent::new(DialogType::Notify, "t", "m"))
            .unwrap();

        // Act
        let first = broker.dismiss(handle);
        let second = broker.dismiss(handle);

        // Assert
        assert!(first);
        assert!(!second);
        assert_eq!(adapter.dismissed(), vec![AdapterHandle(100)]);
    }

    #[test]
    fn test_stale_dialog_handle_cannot_dismiss_newer_dialog() {
        let broker = DialogBroker::new();
        let adapter = register(&broker, 1);
        let old = broker.show(DialogContent::new(DialogType::Notify, "a", "")).unwrap();
        broker.dismiss(old);
        let new = broker.show(DialogContent::new(DialogType::Notify, "b", "")).unwrap();

        assert!(!broker.dismiss(old));
        assert_eq!(broker.outstanding_count(), 1);
        assert!(broker.dismiss(new));
        assert_eq!(adapter.dismissed(), vec![AdapterHandle(100), AdapterHandle(101)]);
    }

    #[test]
    fn test_deliver_resolves_continuation_exactly_once() {
        // Arrange
        let broker = DialogBroker::new();
        let adapter = register(&broker, 1);
        let (id, receiver) = broker.get_input(text_prompt(), InputScope::Global).unwrap();
        let mut receiver = task::spawn(receiver);
        assert_pending!(receiver.poll());

        // Act
        let first = broker.deliver_input(id, true, "hello");
        let second = broker.deliver_input(id, true, "again");

        // Assert
        assert!(first);
        assert!(!second, "second delivery must be ignored");
        assert_ready_eq!(receiver.poll(), InputOutcome::Submitted("hello".into()));
        assert_eq!(broker.pending_count(), 0);
        let shown = adapter.shown();
        assert!(shown[0].wants_input);
        assert_eq!(shown[0].input_id(), id);
    }

    #[test]
    fn test_deliver_with_ok_false_resolves_as_cancelled() {
        let broker = DialogBroker::new();
        register(&broker, 1);
        let (id, mut receiver) = broker.get_input(text_prompt(), InputScope::Global).unwrap();

        broker.deliver_input(id, false, "whatever");

        assert_eq!(receiver.try_recv(), Some(InputOutcome::Cancelled));
    }

    #[test]
    fn test_deliver_to_unknown_id_is_ignored() {
        let broker = DialogBroker::new();
        register(&broker, 1);
        assert!(!broker.deliver_input(RequestId(999), true, "x"));
    }

    #[test]
    fn test_results_can_arrive_out_of_order() {
        let broker = DialogBroker::new();
        register(&broker, 1);
        let (first_id, mut first) = broker.get_input(text_prompt(), InputScope::Global).unwrap();
        let (second_id, mut second) = broker.get_input(text_prompt(), InputScope::Global).unwrap();

        broker.deliver_input(second_id, true, "two");
        assert_eq!(first.try_recv(), None);
        broker.deliver_input(first_id, true, "one");

        assert_eq!(first.try_recv(), Some(InputOutcome::Submitted("one".into())));
        assert_eq!(second.try_recv(), Some(InputOutcome::Submitted("two".into())));
    }

    #[test]
    fn test_replacing_adapter_cancels_pending_before_new_adapter_is_active() {
        // Arrange
        let broker = Arc::new(DialogBroker::new());
        let old = register(&broker, 1);
        let (_, mut a) = broker.get_input(text_prompt(), InputScope::Global).unwrap();
        let (_, mut b) = broker.get_input(text_prompt(), InputScope::Session).unwrap();

        // The new adapter checks, on its first show, that the old requests
        // were already resolved.
        let observed = Arc::new(Mutex::new(None));
        let checking_presenter = {
            let observed = Arc::clone(&observed);
            let broker = Arc::clone(&broker);
            move |_: &DialogRequest| {
                *observed.lock().unwrap() = Some(broker.pending_count());
                Some(AdapterHandle(7))
            }
        };

        // Act
        broker.register_adapter(AdapterContext(2), Arc::new(checking_presenter), None);

        // Assert
        assert_eq!(a.try_recv(), Some(InputOutcome::Cancelled));
        assert_eq!(b.try_recv(), Some(InputOutcome::Cancelled));
        assert_eq!(broker.pending_count(), 0);
        assert_eq!(old.dismissed(), vec![AdapterHandle(100), AdapterHandle(101)]);

        broker.get_input(text_prompt(), InputScope::Global).unwrap();
        assert_eq!(*observed.lock().unwrap(), Some(1));
    }

    #[test]
    fn test_unregister_cancels_all_pending_and_is_idempotent() {
        // Arrange
        let broker = DialogBroker::new();
        let adapter = register(&broker, 1);
        let mut receivers: Vec<InputReceiver> = (0..3)
            .map(|_| broker.get_input(text_prompt(), InputScope::Global).unwrap().1)
            .collect();
        let dialog = broker.show(DialogContent::new(DialogType::Notify, "t", "m")).unwrap();

        // Act
        let first = broker.unregister_adapter(AdapterContext(1));
        let second = broker.unregister_adapter(AdapterContext(1));

        // Assert
        assert!(first);
        assert!(!second);
        for receiver in &mut receivers {
            assert_eq!(receiver.try_recv(), Some(InputOutcome::Cancelled));
        }
        assert_eq!(broker.pending_count(), 0);
        assert_eq!(broker.outstanding_count(), 0);
        assert!(!broker.has_adapter());
        assert_eq!(adapter.dismissed().len(), 4);
        assert!(!broker.dismiss(dialog));
    }

    #[test]
    fn test_unregister_with_foreign_context_is_ignored() {
        let broker = DialogBroker::new();
        register(&broker, 1);
        let (_, mut receiver) = broker.get_input(text_prompt(), InputScope::Global).unwrap();

        assert!(!broker.unregister_adapter(AdapterContext(2)));

        assert!(broker.has_adapter());
        assert_eq!(receiver.try_recv(), None);
    }

    #[test]
    fn test_unregister_without_adapter_is_a_no_op() {
        let broker = DialogBroker::new();
        assert!(!broker.unregister_adapter(AdapterContext(1)));
        broker.teardown();
        assert!(!broker.has_adapter());
    }

    #[test]
    fn test_cancel_scope_only_touches_that_scope() {
        // Arrange
        let broker = DialogBroker::new();
        let adapter = register(&broker, 1);
        let (_, mut session) = broker.get_input(text_prompt(), InputScope::Session).unwrap();
        let (_, mut global) = broker.get_input(text_prompt(), InputScope::Global).unwrap();

        // Act
        let cancelled = broker.cancel_scope(InputScope::Session);

        // Assert
        assert_eq!(cancelled, 1);
        assert_eq!(session.try_recv(), Some(InputOutcome::Cancelled));
        assert_eq!(global.try_recv(), None);
        assert_eq!(broker.pending_count(), 1);
        assert_eq!(adapter.dismissed(), vec![AdapterHandle(100)]);
    }

    #[test]
    fn test_associate_handle_replaces_adapter_handle() {
        let broker = DialogBroker::new();
        let adapter = register(&broker, 1);
        let (id, _receiver) = broker.get_input(text_prompt(), InputScope::Session).unwrap();

        assert!(broker.associate_handle(id, AdapterHandle(555)));
        broker.cancel_scope(InputScope::Session);

        assert_eq!(adapter.dismissed(), vec![AdapterHandle(555)]);
        assert!(!broker.associate_handle(id, AdapterHandle(556)));
    }

    #[test]
    fn test_adapter_may_answer_synchronously_from_show() {
        // Arrange – the adapter answers before `show` even returns.
        let broker = Arc::new(DialogBroker::new());
        let presenter = {
            let broker = Arc::downgrade(&broker);
            move |request: &DialogRequest| -> Option<AdapterHandle> {
                if let Some(broker) = broker.upgrade() {
                    broker.deliver_input(request.id, true, "instant");
                }
                None
            }
        };
        broker.register_adapter(AdapterContext(1), Arc::new(presenter), None);

        // Act
        let (_, mut receiver) = broker.get_input(text_prompt(), InputScope::Global).unwrap();

        // Assert
        assert_eq!(receiver.try_recv(), Some(InputOutcome::Submitted("instant".into())));
        assert_eq!(broker.pending_count(), 0);
    }

    #[test]
    fn test_input_dialog_of_adapter_replaced_during_show_is_dismissed() {
        // Arrange – the old adapter is replaced while it is still rendering.
        let broker = Arc::new(DialogBroker::new());
        let old_dismissed = Arc::new(Mutex::new(Vec::new()));
        let presenter = {
            let broker = Arc::downgrade(&broker);
            move |_: &DialogRequest| -> Option<AdapterHandle> {
                if let Some(broker) = broker.upgrade() {
                    register(&broker, 2);
                }
                Some(AdapterHandle(42))
            }
        };
        let dismisser = {
            let dismissed = Arc::clone(&old_dismissed);
            move |handle: AdapterHandle| dismissed.lock().unwrap().push(handle)
        };
        broker.register_adapter(
            AdapterContext(1),
            Arc::new(presenter),
            Some(Arc::new(dismisser)),
        );

        // Act
        let (_, mut receiver) = broker.get_input(text_prompt(), InputScope::Global).unwrap();

        // Assert
        assert_eq!(receiver.try_recv(), Some(InputOutcome::Cancelled));
        assert_eq!(*old_dismissed.lock().unwrap(), vec![AdapterHandle(42)]);
        assert_eq!(broker.pending_count(), 0);
    }

    #[test]
    fn test_input_answered_during_show_is_not_dismissed() {
        let broker = Arc::new(DialogBroker::new());
        let dismissed = Arc::new(Mutex::new(Vec::new()));
        let presenter = {
            let broker = Arc::downgrade(&broker);
            move |request: &DialogRequest| -> Option<AdapterHandle> {
                if let Some(broker) = broker.upgrade() {
                    broker.deliver_input(request.id, true, "instant");
                }
                Some(AdapterHandle(7))
            }
        };
        let dismisser = {
            let dismissed = Arc::clone(&dismissed);
            move |handle: AdapterHandle| dismissed.lock().unwrap().push(handle)
        };
        broker.register_adapter(
            AdapterContext(1),
            Arc::new(presenter),
            Some(Arc::new(dismisser)),
        );

        let (_, mut receiver) = broker.get_input(text_prompt(), InputScope::Global).unwrap();

        assert_eq!(receiver.try_recv(), Some(InputOutcome::Submitted("instant".into())));
        assert!(dismissed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_password_answers_are_redacted_from_logs() {
        // Arrange
        let broker = DialogBroker::new();
        register(&broker, 1);
        let password = DialogContent::new(DialogType::App, "Sign in", "Password")
            .accessory(AccessoryType::PasswordInput, "");

        // Act
        let (secret_id, _secret) = broker.get_input(password, InputScope::Session).unwrap();
        let (plain_id, _plain) = broker.get_input(text_prompt(), InputScope::Session).unwrap();

        // Assert
        let state = broker.lock();
        assert!(state.pending[&secret_id].secret);
        assert!(!state.pending[&plain_id].secret);
        assert_eq!(loggable_answer(true, "hunter2"), "<redacted>");
        assert_eq!(loggable_answer(false, "alice"), "alice");
    }

    #[test]
    fn test_dismiss_handler_requires_matching_context() {
        let broker = DialogBroker::new();
        let noop = |_: AdapterHandle| {};
        assert_eq!(
            broker.set_dismiss_handler(AdapterContext(1), Arc::new(noop)),
            Err(DialogError::NoAdapter)
        );

        let silent = |_: &DialogRequest| -> Option<AdapterHandle> { None };
        broker.register_adapter(AdapterContext(1), Arc::new(silent), None);

        assert_eq!(
            broker.set_dismiss_handler(AdapterContext(2), Arc::new(noop)),
            Err(DialogError::ContextMismatch)
        );
        assert_eq!(
            broker.set_dismiss_handler(AdapterContext(1), Arc::new(noop)),
            Ok(())
        );
    }

    #[test]
    fn test_dropped_broker_resolves_waiters_as_cancelled() {
        let broker = DialogBroker::new();
        register(&broker, 1);
        let (_, receiver) = broker.get_input(text_prompt(), InputScope::Global).unwrap();

        drop(broker);

        assert_eq!(receiver.blocking_recv(), InputOutcome::Cancelled);
    }

    #[test]
    fn test_deliver_from_another_thread() {
        let broker = Arc::new(DialogBroker::new());
        register(&broker, 1);
        let (id, receiver) = broker.get_input(text_prompt(), InputScope::Global).unwrap();

        let worker = {
            let broker = Arc::clone(&broker);
            std::thread::spawn(move || broker.deliver_input(id, true, "from ui thread"))
        };

        assert_eq!(
            receiver.blocking_recv(),
            InputOutcome::Submitted("from ui thread".into())
        );
        assert!(worker.join().unwrap());
    }

    #[tokio::test]
    async fn test_prompter_awaits_answer() {
        let broker = Arc::new(DialogBroker::new());
        let presenter = {
            let broker = Arc::downgrade(&broker);
            move |request: &DialogRequest| {
                let broker = broker.clone();
                let id = request.id;
                tokio::spawn(async move {
                    if let Some(broker) = broker.upgrade() {
                        broker.deliver_input(id, true, "alice");
                    }
                });
                Some(AdapterHandle(1))
            }
        };
        broker.register_adapter(AdapterContext(1), Arc::new(presenter), None);
        let prompter = InputPrompter::new(Arc::clone(&broker), InputScope::Session);

        let outcome = prompter.prompt(text_prompt()).await;

        assert_eq!(outcome, Ok(InputOutcome::Submitted("alice".into())));
        assert_eq!(prompter.scope(), InputScope::Session);
    }
}
