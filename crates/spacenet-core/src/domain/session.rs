//! Session and device-owner records.

/// The logged-in user.  Exists only between a successful login and logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub device_name: String,
    /// The user is the bound owner of this device.
    pub is_owner: bool,
    /// The user has no key material on this device yet.
    pub needs_key: bool,
    pub eula_accepted: bool,
}

/// Result of binding a (new) owner to this device.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceOwner {
    pub username: String,
    pub device_name: String,
    pub needs_key: bool,
}
