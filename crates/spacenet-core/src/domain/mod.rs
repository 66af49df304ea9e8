//! Domain types for the SpaceNet client core.
//!
//! Everything here is plain data plus the rules that belong to the data
//! itself (which status edges exist, how an enum maps to its boundary byte).
//! No locking, no I/O, no callbacks.
//!
//! # Why keep the raw integers here? (for beginners)
//!
//! The front-end talks to the core through a C-style boundary where enums
//! travel as single bytes.  Rust code inside the core never handles those
//! bytes directly; it uses the tagged enums below.  The conversion happens in
//! exactly one place per enum (`as_u8` / `TryFrom<u8>`), so a mismatch with
//! the front-end's numbering can only ever be introduced here.

pub mod dialog;
pub mod session;
pub mod settings;
pub mod status;
