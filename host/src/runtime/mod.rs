//! Shims around the host process: resolving the default client command
//! and delegating a session to the legacy inbox host.

pub mod startup_command;

#[cfg(windows)]
pub mod legacy_host;
