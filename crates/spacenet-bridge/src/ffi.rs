//! `#[no_mangle]` entry points.
//!
//! Each function decodes its C arguments and forwards to the installed
//! [`Bridge`].  Before [`install`] has run, calls log a warning and return
//! `0` / null; completions are not invoked.
//!
//! Function-pointer parameters are `Option<fn>` so a null pointer from C is
//! representable and rejected instead of being called.

use std::ffi::{c_char, c_void, CString};
use std::sync::{Arc, OnceLock};

use spacenet_core::Authenticator;
use tracing::{info, warn};

use crate::adapter::{DismissDialogFn, ShowDialogFn};
use crate::bridge::{
    Bridge, BridgeConfig, DoneFn, KeyLoadedFn, OwnerLoggedInFn, SettingsInitFn, StatusChangeFn,
};
use crate::strings::{read_optional_str, read_str};
use crate::{logging, BridgeError};

static BRIDGE: OnceLock<Bridge> = OnceLock::new();

/// Installs the process-wide core.  Must run before any `sn*` call.
///
/// Also installs the `tracing` subscriber unless the host has its own.
///
/// # Errors
///
/// [`BridgeError::AlreadyInstalled`] on a second call, or any error from
/// building the runtime or locating the settings file.
pub fn install(config: BridgeConfig, authenticator: Arc<dyn Authenticator>) -> anyhow::Result<()> {
    logging::init(config.configured_log_level().as_deref());

    if BRIDGE.get().is_some() {
        return Err(BridgeError::AlreadyInstalled.into());
    }
    let bridge = Bridge::new(&config, authenticator)?;
    BRIDGE
        .set(bridge)
        .map_err(|_| BridgeError::AlreadyInstalled)?;
    info!("SpaceNet core installed");
    Ok(())
}

fn core(symbol: &str) -> Option<&'static Bridge> {
    let bridge = BRIDGE.get();
    if bridge.is_none() {
        warn!("{symbol}: {}", BridgeError::NotInstalled);
    }
    bridge
}

fn missing_callback(symbol: &str) {
    warn!("{symbol}: null callback ignored");
}

// ── Status and session ────────────────────────────────────────────────────────

#[no_mangle]
pub extern "C" fn snRegisterStatusChangeHandler(ctx: *mut c_void, handler: Option<StatusChangeFn>) {
    let Some(bridge) = core("snRegisterStatusChangeHandler") else { return };
    match handler {
        Some(handler) => bridge.register_status_handler(ctx, handler),
        None => missing_callback("snRegisterStatusChangeHandler"),
    }
}

/// # Safety
///
/// `passphrase` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn snInitializeContext(passphrase: *const c_char) -> u8 {
    let Some(bridge) = core("snInitializeContext") else { return 0 };
    match read_optional_str(passphrase) {
        Ok(passphrase) => u8::from(bridge.initialize(passphrase)),
        Err(e) => {
            warn!("snInitializeContext: {e}");
            0
        }
    }
}

#[no_mangle]
pub extern "C" fn snLogin(ctx: *mut c_void, on_done: Option<DoneFn>) {
    let Some(bridge) = core("snLogin") else { return };
    match on_done {
        Some(on_done) => bridge.login(ctx, on_done),
        None => missing_callback("snLogin"),
    }
}

#[no_mangle]
pub extern "C" fn snLogout() -> u8 {
    core("snLogout").map_or(0, |bridge| u8::from(bridge.logout()))
}

/// Returns the username of the current session, or null.  The caller owns
/// the string and releases it with [`snFreeString`].
#[no_mangle]
pub extern "C" fn snLoggedInUser() -> *mut c_char {
    core("snLoggedInUser")
        .and_then(Bridge::logged_in_user)
        .map_or(std::ptr::null_mut(), |user| {
            crate::strings::to_cstring(&user).into_raw()
        })
}

/// # Safety
///
/// `s` must be null or a pointer returned by [`snLoggedInUser`] that has not
/// been freed yet.
#[no_mangle]
pub unsafe extern "C" fn snFreeString(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

#[no_mangle]
pub extern "C" fn snIsLoggedInUserOwner() -> u8 {
    core("snIsLoggedInUserOwner").map_or(0, |bridge| u8::from(bridge.is_logged_in_user_owner()))
}

#[no_mangle]
pub extern "C" fn snEULAAccepted() -> u8 {
    core("snEULAAccepted").map_or(0, |bridge| u8::from(bridge.eula_accepted()))
}

#[no_mangle]
pub extern "C" fn snSetEULAAccepted() {
    if let Some(bridge) = core("snSetEULAAccepted") {
        if !bridge.set_eula_accepted() {
            warn!("snSetEULAAccepted: not persisted");
        }
    }
}

/// # Safety
///
/// `passphrase` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn snUnlock(passphrase: *const c_char) -> u8 {
    let Some(bridge) = core("snUnlock") else { return 0 };
    match read_str(passphrase) {
        Ok(passphrase) => u8::from(bridge.unlock(&passphrase)),
        Err(_) => 0,
    }
}

#[no_mangle]
pub extern "C" fn snTouch() {
    if let Some(bridge) = core("snTouch") {
        bridge.touch();
    }
}

// ── Settings ──────────────────────────────────────────────────────────────────

#[no_mangle]
pub extern "C" fn snSettingsInit(ctx: *mut c_void, on_init: Option<SettingsInitFn>) {
    let Some(bridge) = core("snSettingsInit") else { return };
    match on_init {
        Some(on_init) => bridge.settings_init(ctx, on_init),
        None => missing_callback("snSettingsInit"),
    }
}

#[no_mangle]
pub extern "C" fn snSettingsResetDeviceOwner(ctx: *mut c_void, on_owner: Option<OwnerLoggedInFn>) {
    let Some(bridge) = core("snSettingsResetDeviceOwner") else { return };
    match on_owner {
        Some(on_owner) => bridge.reset_device_owner(ctx, on_owner),
        None => missing_callback("snSettingsResetDeviceOwner"),
    }
}

/// # Safety
///
/// `key_file` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn snSettingsLoadUserKey(
    ctx: *mut c_void,
    key_file: *const c_char,
    create: u8,
    on_loaded: Option<KeyLoadedFn>,
) {
    let Some(bridge) = core("snSettingsLoadUserKey") else { return };
    let Some(on_loaded) = on_loaded else {
        return missing_callback("snSettingsLoadUserKey");
    };
    match read_str(key_file) {
        Ok(key_file) => bridge.load_user_key(ctx, key_file, create != 0, on_loaded),
        Err(e) => {
            warn!("snSettingsLoadUserKey: {e}");
            on_loaded(ctx, 0, key_file);
        }
    }
}

/// # Safety
///
/// `device_name` and `lock_passphrase` must be null or valid NUL-terminated
/// strings.
#[no_mangle]
pub unsafe extern "C" fn snSettingsSave(
    ctx: *mut c_void,
    device_name: *const c_char,
    lock_passphrase: *const c_char,
    unlocked_timeout: i32,
    on_done: Option<DoneFn>,
) {
    let Some(bridge) = core("snSettingsSave") else { return };
    let Some(on_done) = on_done else {
        return missing_callback("snSettingsSave");
    };
    // A null passphrase means "no passphrase".
    let decoded = read_str(device_name)
        .and_then(|name| Ok((name, read_optional_str(lock_passphrase)?.unwrap_or_default())));
    match decoded {
        Ok((name, pass)) => bridge.save(ctx, name, pass, unlocked_timeout, on_done),
        Err(_) => bridge.reject(ctx, on_done),
    }
}

// ── Dialogs ───────────────────────────────────────────────────────────────────

#[no_mangle]
pub extern "C" fn snRegisterShowDialogFunc(ctx: *mut c_void, show: Option<ShowDialogFn>) {
    let Some(bridge) = core("snRegisterShowDialogFunc") else { return };
    match show {
        Some(show) => bridge.register_show_dialog(ctx, show),
        None => missing_callback("snRegisterShowDialogFunc"),
    }
}

#[no_mangle]
pub extern "C" fn snSetDialogDismissHandler(ctx: *mut c_void, dismiss: Option<DismissDialogFn>) {
    let Some(bridge) = core("snSetDialogDismissHandler") else { return };
    match dismiss {
        Some(dismiss) => {
            if !bridge.set_dismiss_handler(ctx, dismiss) {
                warn!("snSetDialogDismissHandler: no adapter registered for this context");
            }
        }
        None => missing_callback("snSetDialogDismissHandler"),
    }
}

#[no_mangle]
pub extern "C" fn snUnregisterShowDialogFunc(ctx: *mut c_void) {
    if let Some(bridge) = core("snUnregisterShowDialogFunc") {
        bridge.unregister_show_dialog(ctx);
    }
}

/// # Safety
///
/// `result` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn snHandleDialogInput(id: u64, ok: u8, result: *const c_char) {
    let Some(bridge) = core("snHandleDialogInput") else { return };
    // An undecodable answer still resolves the request, as a cancellation.
    let (ok, result) = match read_optional_str(result) {
        Ok(text) => (ok != 0, text.unwrap_or_default()),
        Err(e) => {
            warn!("snHandleDialogInput({id}): {e}");
            (false, String::new())
        }
    };
    bridge.handle_dialog_input(id, ok, &result);
}

#[no_mangle]
pub extern "C" fn snAssociateDialogInputToHandle(id: u64, handle: u64) {
    if let Some(bridge) = core("snAssociateDialogInputToHandle") {
        bridge.associate_dialog_input(id, handle);
    }
}

// ── Teardown ──────────────────────────────────────────────────────────────────

#[no_mangle]
pub extern "C" fn snReleaseContext(ctx: *mut c_void) {
    if let Some(bridge) = core("snReleaseContext") {
        bridge.release_context(ctx);
    }
}
