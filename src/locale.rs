//! User-facing text.

use ahash::AHashMap;

/// Resolves a translation key to text in the player's locale.
/// `{0}`, `{1}`, ... in the template are replaced by `args`.
pub trait Localization: Send + Sync {
    fn resolve(&self, key: &str, locale: &str, args: &[&str]) -> String;
}

/// Translation keys used by the session engine.
pub mod keys {
    pub const AUTH_TYPE_MISMATCH: &str = "bridge.network.remote.authentication_type_mismatch";
    pub const PASSTHROUGH_LOGIN_ERROR: &str = "bridge.network.remote.passthrough_login_error";
    pub const SERVER_OFFLINE: &str = "bridge.network.remote.server_offline";
    pub const REMOTE_DISCONNECT: &str = "bridge.network.remote.disconnect";
    pub const ENCRYPTION_FAIL: &str = "bridge.auth.passthrough.encryption_fail";
    pub const INVALID_ACCOUNT: &str = "bridge.auth.login.invalid_account";
    pub const LOGIN_TIMED_OUT: &str = "bridge.auth.login.timed_out";
    pub const LOGIN_CANCELLED: &str = "bridge.auth.login.cancelled";
    pub const DEVICE_CODE_TITLE: &str = "bridge.auth.login.device_code.title";
    pub const DEVICE_CODE_BODY: &str = "bridge.auth.login.device_code.body";
    pub const TOKEN_EXPIRED_TITLE: &str = "bridge.auth.login.token_expired.title";
    pub const TOKEN_EXPIRED_BODY: &str = "bridge.auth.login.token_expired.body";
    pub const RETRY: &str = "bridge.auth.login.retry";
    pub const DISCONNECT: &str = "bridge.auth.login.disconnect";
    pub const ALREADY_LOGGED_IN: &str = "bridge.auth.already_logged_in";
    pub const KICKED: &str = "bridge.command.kick.reason";
    pub const PLAYER_LIST: &str = "bridge.command.list";
}

const EN_US: &[(&str, &str)] = &[
    (
        keys::AUTH_TYPE_MISMATCH,
        "Could not connect: the server expects a different login type than this proxy is configured for.",
    ),
    (
        keys::PASSTHROUGH_LOGIN_ERROR,
        "The server rejected the identity forwarded by this proxy. Check that both share the same key.",
    ),
    (keys::SERVER_OFFLINE, "The server is offline."),
    (keys::REMOTE_DISCONNECT, "Disconnected from the server: {0}"),
    (keys::ENCRYPTION_FAIL, "Failed to seal your login data."),
    (
        keys::INVALID_ACCOUNT,
        "This Microsoft account does not own Minecraft: Java Edition.",
    ),
    (keys::LOGIN_TIMED_OUT, "You did not sign in in time."),
    (keys::LOGIN_CANCELLED, "Your login was cancelled."),
    (keys::DEVICE_CODE_TITLE, "Sign in"),
    (keys::DEVICE_CODE_BODY, "Go to {0} and enter the code {1}"),
    (keys::TOKEN_EXPIRED_TITLE, "Session expired"),
    (
        keys::TOKEN_EXPIRED_BODY,
        "Your saved Java account session has expired: {0}",
    ),
    (keys::RETRY, "Sign in again"),
    (keys::DISCONNECT, "Disconnect"),
    (keys::ALREADY_LOGGED_IN, "{0} is already logged in."),
    (keys::KICKED, "You were kicked from the server."),
    (keys::PLAYER_LIST, "{0} player(s) online: {1}"),
];

/// English text compiled into the binary. Other locales fall back to
/// English, unknown keys resolve to the key itself.
pub struct BuiltinLocalization {
    table: AHashMap<&'static str, &'static str>,
}

impl BuiltinLocalization {
    pub fn new() -> Self {
        Self {
            table: EN_US.iter().copied().collect(),
        }
    }
}

impl Default for BuiltinLocalization {
    fn default() -> Self {
        Self::new()
    }
}

impl Localization for BuiltinLocalization {
    fn resolve(&self, key: &str, _locale: &str, args: &[&str]) -> String {
        match self.table.get(key) {
            Some(template) => substitute(template, args),
            None => key.to_owned(),
        }
    }
}

/// Replaces `{n}` placeholders with the matching argument. Placeholders
/// without an argument are left as they are.
pub fn substitute(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let replaced = after.find('}').and_then(|end| {
            let index: usize = after[..end].parse().ok()?;
            Some((args.get(index)?, end))
        });
        match replaced {
            Some((arg, end)) => {
                out.push_str(arg);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders() {
        assert_eq!(substitute("Go to {0} and enter {1}", &["a", "b"]), "Go to a and enter b");
        assert_eq!(substitute("{1}{0}", &["x", "y"]), "yx");
        assert_eq!(substitute("{2} {x}", &["a"]), "{2} {x}");
    }

    #[test]
    fn unknown_key_falls_back_to_key() {
        let locale = BuiltinLocalization::new();
        assert_eq!(locale.resolve("no.such.key", "de_de", &[]), "no.such.key");
        assert_eq!(
            locale.resolve(keys::REMOTE_DISCONNECT, "de_de", &["bye"]),
            "Disconnected from the server: bye"
        );
    }
}
