//! Infrastructure layer: reference providers for the core's collaborator
//! traits.
//!
//! **Dependency rule**: this layer may depend on `application` and `domain`,
//! but MUST NOT be imported by them.  Hosts are free to plug in their own
//! providers instead.

pub mod storage;
