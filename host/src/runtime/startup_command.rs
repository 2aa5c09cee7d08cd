//! Default client command resolution.
//!
//! When the host is started without a client command line, the classic
//! behavior is to launch the command processor from the Windows
//! directory. Resolution goes through an injectable environment lookup
//! so it stays testable without touching process state.

use std::env;
use std::ffi::OsString;

/// Used when the Windows directory cannot be resolved.
pub const FALLBACK_CLIENT_COMMAND: &str = "C:\\Windows\\system32\\cmd.exe";

/// The command to launch when no client was supplied.
pub fn resolve_default_client_command() -> String {
    resolve_with(|name| env::var_os(name))
}

/// Resolution against an arbitrary environment lookup.
pub fn resolve_with<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<OsString>,
{
    if let Some(windir) = lookup("WINDIR") {
        if let Some(windir) = windir.to_str() {
            if !windir.is_empty() {
                let mut command = String::from(windir);
                if !command.ends_with('\\') && !command.ends_with('/') {
                    command.push('\\');
                }
                command.push_str("system32\\cmd.exe");
                return command;
            }
        }
    }

    FALLBACK_CLIENT_COMMAND.to_string()
}
