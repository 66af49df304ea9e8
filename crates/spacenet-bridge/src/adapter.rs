//! Dialog adapter backed by front-end function pointers.

use std::ffi::{c_char, c_void};

use spacenet_core::{AdapterHandle, DialogDismisser, DialogPresenter, DialogRequest};
use tracing::trace;

use crate::strings::to_cstring;

/// `showFn(ctx, type, title, msg, accessory, accessoryText, dispatchToMain,
/// inputId) -> handle`.  `inputId == 0` means no input is expected; a
/// returned handle of `0` means nothing was shown.
pub type ShowDialogFn = extern "C" fn(
    ctx: *mut c_void,
    dialog_type: u8,
    title: *const c_char,
    message: *const c_char,
    accessory_type: u8,
    accessory_text: *const c_char,
    dispatch_to_main: u8,
    input_id: u64,
) -> u64;

/// `dismissFn(ctx, handle)`.
pub type DismissDialogFn = extern "C" fn(ctx: *mut c_void, handle: u64);

/// Presenter calling the front-end's show function.
pub struct FfiPresenter {
    ctx: usize,
    show: ShowDialogFn,
}

impl FfiPresenter {
    pub fn new(ctx: *mut c_void, show: ShowDialogFn) -> Self {
        Self {
            ctx: ctx as usize,
            show,
        }
    }
}

impl DialogPresenter for FfiPresenter {
    fn show(&self, request: &DialogRequest) -> Option<AdapterHandle> {
        let title = to_cstring(&request.title);
        let message = to_cstring(&request.message);
        let accessory_text = to_cstring(&request.accessory_text);
        trace!(
            "showFn(type {:?}, accessory {:?}, input {})",
            request.dialog_type,
            request.accessory_type,
            request.input_id()
        );

        let handle = (self.show)(
            self.ctx as *mut c_void,
            request.dialog_type.as_u8(),
            title.as_ptr(),
            message.as_ptr(),
            request.accessory_type.as_u8(),
            accessory_text.as_ptr(),
            u8::from(request.dispatch_to_main),
            request.input_id().0,
        );
        (handle != 0).then_some(AdapterHandle(handle))
    }
}

/// Dismisser calling the front-end's dismiss function.
pub struct FfiDismisser {
    ctx: usize,
    dismiss: DismissDialogFn,
}

impl FfiDismisser {
    pub fn new(ctx: *mut c_void, dismiss: DismissDialogFn) -> Self {
        Self {
            ctx: ctx as usize,
            dismiss,
        }
    }
}

impl DialogDismisser for FfiDismisser {
    fn dismiss(&self, handle: AdapterHandle) {
        (self.dismiss)(self.ctx as *mut c_void, handle.0);
    }
}
