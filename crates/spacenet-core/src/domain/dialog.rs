//! Dialog and input-request types shared by the broker and its adapters.

use std::fmt;

use crate::domain::status::DecodeError;
use crate::registry::handle_table::Key;

/// Correlation id linking an input request to its eventual result.
///
/// Ids are allocated by [`crate::RequestIdAllocator`], start at 1 and never
/// repeat within a process.  `0` is reserved as "no input expected".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl RequestId {
    /// The reserved null id.
    pub const NONE: RequestId = RequestId(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque handle created by the adapter when it shows a dialog.
///
/// The core never interprets the value; it only hands it back to the same
/// adapter's dismiss function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdapterHandle(pub u64);

/// Opaque identity of the front-end object that registered an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdapterContext(pub u64);

/// Core-issued token for a dialog that is currently on screen.
///
/// Generational: once the dialog is dismissed the token goes stale and any
/// later `dismiss` with it is a no-op, even if the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DialogHandle(pub(crate) Key);

/// Visual category of a dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DialogType {
    App = 0,
    Notify = 1,
    Alert = 2,
    Error = 3,
    WaitMsg = 4,
    WaitLogin = 5,
}

impl DialogType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for DialogType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(DialogType::App),
            1 => Ok(DialogType::Notify),
            2 => Ok(DialogType::Alert),
            3 => Ok(DialogType::Error),
            4 => Ok(DialogType::WaitMsg),
            5 => Ok(DialogType::WaitLogin),
            other => Err(DecodeError::UnknownDialogType(other)),
        }
    }
}

/// Extra control attached below the dialog message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AccessoryType {
    None = 0,
    YesNo = 1,
    OkCancel = 2,
    TextInput = 3,
    PasswordInput = 4,
    PasswordInputWithVerify = 5,
    FileOpen = 6,
    Spinner = 7,
    ProgressBar = 8,
}

impl AccessoryType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Accessories whose content must never reach a log line.
    pub fn is_secret(self) -> bool {
        matches!(
            self,
            AccessoryType::PasswordInput | AccessoryType::PasswordInputWithVerify
        )
    }
}

impl TryFrom<u8> for AccessoryType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(AccessoryType::None),
            1 => Ok(AccessoryType::YesNo),
            2 => Ok(AccessoryType::OkCancel),
            3 => Ok(AccessoryType::TextInput),
            4 => Ok(AccessoryType::PasswordInput),
            5 => Ok(AccessoryType::PasswordInputWithVerify),
            6 => Ok(AccessoryType::FileOpen),
            7 => Ok(AccessoryType::Spinner),
            8 => Ok(AccessoryType::ProgressBar),
            other => Err(DecodeError::UnknownAccessoryType(other)),
        }
    }
}

/// Everything an adapter needs to render one dialog.
///
/// Every request carries a fresh id.  When `wants_input` is set the adapter
/// must eventually report the user's answer through
/// `DialogBroker::deliver_input(id, ..)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogRequest {
    pub id: RequestId,
    pub dialog_type: DialogType,
    pub accessory_type: AccessoryType,
    pub title: String,
    pub message: String,
    /// Default input for input accessories, body text otherwise.
    pub accessory_text: String,
    /// The adapter must render on its main/UI thread before returning.
    pub dispatch_to_main: bool,
    pub wants_input: bool,
}

impl DialogRequest {
    /// Id the adapter must answer to, or [`RequestId::NONE`] for plain dialogs.
    pub fn input_id(&self) -> RequestId {
        if self.wants_input {
            self.id
        } else {
            RequestId::NONE
        }
    }
}

/// What core logic wants shown; the broker turns it into a [`DialogRequest`].
///
/// ```rust
/// use spacenet_core::{AccessoryType, DialogContent, DialogType};
///
/// let content = DialogContent::new(DialogType::Notify, "Sign in", "Enter your username")
///     .accessory(AccessoryType::TextInput, "alice")
///     .on_main_thread();
/// assert!(content.dispatch_to_main);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogContent {
    pub dialog_type: DialogType,
    pub accessory_type: AccessoryType,
    pub title: String,
    pub message: String,
    pub accessory_text: String,
    pub dispatch_to_main: bool,
}

impl DialogContent {
    pub fn new(dialog_type: DialogType, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            dialog_type,
            accessory_type: AccessoryType::None,
            title: title.into(),
            message: message.into(),
            accessory_text: String::new(),
            dispatch_to_main: false,
        }
    }

    pub fn accessory(mut self, accessory_type: AccessoryType, text: impl Into<String>) -> Self {
        self.accessory_type = accessory_type;
        self.accessory_text = text.into();
        self
    }

    pub fn on_main_thread(mut self) -> Self {
        self.dispatch_to_main = true;
        self
    }

    pub(crate) fn into_request(self, id: RequestId, wants_input: bool) -> DialogRequest {
        DialogRequest {
            id,
            dialog_type: self.dialog_type,
            accessory_type: self.accessory_type,
            title: self.title,
            message: self.message,
            accessory_text: self.accessory_text,
            dispatch_to_main: self.dispatch_to_main,
            wants_input,
        }
    }
}

/// How an input request was resolved.
///
/// Cancellation is a normal answer, not an error: the user closed the dialog,
/// the adapter went away, or the owning session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    Submitted(String),
    Cancelled,
}

impl InputOutcome {
    pub fn from_delivery(ok: bool, result: impl Into<String>) -> Self {
        if ok {
            InputOutcome::Submitted(result.into())
        } else {
            InputOutcome::Cancelled
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, InputOutcome::Cancelled)
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            InputOutcome::Submitted(text) => Some(text),
            InputOutcome::Cancelled => None,
        }
    }
}

/// Lifetime a pending input is tied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputScope {
    /// Cancelled when the current session logs out.
    Session,
    /// Survives logout; cancelled only when the adapter is torn down.
    Global,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialog_type_numbering() {
        let expected = [
            (DialogType::App, 0),
            (DialogType::Notify, 1),
            (DialogType::Alert, 2),
            (DialogType::Error, 3),
            (DialogType::WaitMsg, 4),
            (DialogType::WaitLogin, 5),
        ];
        for (ty, raw) in expected {
            assert_eq!(ty.as_u8(), raw);
            assert_eq!(DialogType::try_from(raw), Ok(ty));
        }
        assert_eq!(
            DialogType::try_from(6),
            Err(DecodeError::UnknownDialogType(6))
        );
    }

    #[test]
    fn test_accessory_type_numbering() {
        for raw in 0u8..=8 {
            let accessory = AccessoryType::try_from(raw).expect("published value");
            assert_eq!(accessory.as_u8(), raw);
        }
        assert_eq!(AccessoryType::try_from(3), Ok(AccessoryType::TextInput));
        assert_eq!(AccessoryType::try_from(8), Ok(AccessoryType::ProgressBar));
        assert_eq!(
            AccessoryType::try_from(9),
            Err(DecodeError::UnknownAccessoryType(9))
        );
    }

    #[test]
    fn test_password_accessories_are_secret() {
        assert!(AccessoryType::PasswordInput.is_secret());
        assert!(AccessoryType::PasswordInputWithVerify.is_secret());
        assert!(!AccessoryType::TextInput.is_secret());
    }

    #[test]
    fn test_outcome_from_delivery() {
        assert_eq!(
            InputOutcome::from_delivery(true, "hello"),
            InputOutcome::Submitted("hello".to_string())
        );
        // The text is ignored when the user cancelled.
        assert_eq!(
            InputOutcome::from_delivery(false, "ignored"),
            InputOutcome::Cancelled
        );
    }

    #[test]
    fn test_request_id_zero_is_none() {
        assert!(RequestId::NONE.is_none());
        assert!(!RequestId(7).is_none());
        assert_eq!(RequestId(7).to_string(), "#7");
    }
}
