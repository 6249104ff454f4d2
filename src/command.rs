//! Bridge commands, run from the console or by a player typing
//! `/bridge <command>`.

use crate::{bridge::Bridge, locale::keys, session::Session};
use std::panic::{self, AssertUnwindSafe};

/// Who runs a command and where its output goes.
pub trait CommandSender {
    fn name(&self) -> &str;

    fn send_message(&self, message: &str);

    fn locale(&self) -> &str;

    /// The session behind the sender, if it is a player.
    fn session(&mut self) -> Option<&mut Session> {
        None
    }
}

/// The server console. Output goes to the log.
pub struct ConsoleSender {
    locale: String,
}

impl ConsoleSender {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
        }
    }
}

impl CommandSender for ConsoleSender {
    fn name(&self) -> &str {
        "CONSOLE"
    }

    fn send_message(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn locale(&self) -> &str {
        &self.locale
    }
}

impl CommandSender for Session {
    fn name(&self) -> &str {
        self.display_name()
    }

    fn send_message(&self, message: &str) {
        Session::send_message(self, message);
    }

    fn locale(&self) -> &str {
        Session::locale(self)
    }

    fn session(&mut self) -> Option<&mut Session> {
        Some(self)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command '{0}', try 'help'")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("no player named '{0}' is online")]
    NoSuchPlayer(String),
    #[error("only players can run '{0}'")]
    PlayerOnly(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::AsRefStr, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
enum Command {
    Help,
    List,
    Kick,
    Offhand,
}

impl Command {
    fn description(self) -> &'static str {
        match self {
            Command::Help => "shows this list",
            Command::List => "lists online players",
            Command::Kick => "kick <player>: disconnects a player",
            Command::Offhand => "swaps the items in your hands",
        }
    }
}

/// Runs a bridge command. Returns 0 once the command has completed,
/// whether or not it succeeded; problems are reported to the sender.
/// Only an unexpected failure inside a command gives a non-zero status.
pub fn execute(bridge: &Bridge, sender: &mut dyn CommandSender, argv: &[&str]) -> i32 {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| run(bridge, &mut *sender, argv)));
    match outcome {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => {
            sender.send_message(&e.to_string());
            0
        }
        Err(_) => {
            tracing::error!("Command {argv:?} from {} failed", sender.name());
            1
        }
    }
}

fn run(bridge: &Bridge, sender: &mut dyn CommandSender, argv: &[&str]) -> Result<(), CommandError> {
    let (name, args) = match argv.split_first() {
        Some((name, args)) => (*name, args),
        None => ("help", &[][..]),
    };
    let command: Command = name
        .to_ascii_lowercase()
        .parse()
        .map_err(|_| CommandError::Unknown(name.to_owned()))?;
    tracing::debug!("{} runs {}", sender.name(), command.as_ref());

    match command {
        Command::Help => {
            for command in <Command as strum::IntoEnumIterator>::iter() {
                sender.send_message(&format!("{}: {}", command.as_ref(), command.description()));
            }
        }
        Command::List => {
            let names: Vec<String> = bridge
                .sessions()
                .snapshot()
                .iter()
                .filter_map(|handle| handle.name().map(str::to_owned))
                .collect();
            let count = names.len().to_string();
            let message = bridge.translate(keys::PLAYER_LIST, sender.locale(), &[&count, &names.join(", ")]);
            sender.send_message(&message);
        }
        Command::Kick => {
            let [target] = args else {
                return Err(CommandError::Usage("kick <player>"));
            };
            let handle = bridge
                .sessions()
                .find_by_name(target)
                .ok_or_else(|| CommandError::NoSuchPlayer((*target).to_owned()))?;
            tracing::info!("{} kicked {target}", sender.name());
            handle.disconnect(bridge.translate(keys::KICKED, &bridge.config().default_locale, &[]));
        }
        Command::Offhand => {
            let session = sender.session().ok_or(CommandError::PlayerOnly("offhand"))?;
            session.request_offhand_swap();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ProxyConfig,
        frontend::{ServerPacket, TextKind},
        identity::ClientIdentity,
        link::ChannelLink,
        session::ExecutionContext,
    };
    use std::{cell::RefCell, sync::Arc};

    #[derive(Default)]
    struct Recorder {
        messages: RefCell<Vec<String>>,
    }

    impl CommandSender for Recorder {
        fn name(&self) -> &str {
            "test"
        }

        fn send_message(&self, message: &str) {
            self.messages.borrow_mut().push(message.to_owned());
        }

        fn locale(&self) -> &str {
            "en_us"
        }
    }

    fn named_session(bridge: &Arc<Bridge>, name: &str) -> (Session, crate::link::LinkReceiver<ServerPacket>) {
        let (link, far) = ChannelLink::new(None);
        let mut session = Session::new(Arc::clone(bridge), Box::new(link), ExecutionContext::new());
        session.set_identity(ClientIdentity::named(name));
        (session, far)
    }

    #[test]
    fn list_names_players() {
        let bridge = Bridge::builder(ProxyConfig::default()).build();
        let (_steve, _far) = named_session(&bridge, "Steve");
        let (_alex, _far) = named_session(&bridge, "Alex");

        let mut sender = Recorder::default();
        assert_eq!(execute(&bridge, &mut sender, &["list"]), 0);
        let messages = sender.messages.borrow();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("2 player(s) online"));
        assert!(messages[0].contains("Steve") && messages[0].contains("Alex"));
    }

    #[test]
    fn failures_still_return_zero() {
        let bridge = Bridge::builder(ProxyConfig::default()).build();
        let mut sender = Recorder::default();
        assert_eq!(execute(&bridge, &mut sender, &["frobnicate"]), 0);
        assert_eq!(execute(&bridge, &mut sender, &["kick"]), 0);
        assert_eq!(execute(&bridge, &mut sender, &["kick", "Nobody"]), 0);
        assert_eq!(execute(&bridge, &mut sender, &["offhand"]), 0);

        let messages = sender.messages.borrow();
        assert_eq!(messages.len(), 4);
        assert!(messages[0].contains("frobnicate"));
        assert!(messages[1].starts_with("usage"));
        assert!(messages[2].contains("Nobody"));
        assert!(messages[3].contains("offhand"));
    }

    #[test]
    fn help_lists_every_command() {
        let bridge = Bridge::builder(ProxyConfig::default()).build();
        let mut sender = Recorder::default();
        execute(&bridge, &mut sender, &[]);
        assert_eq!(sender.messages.borrow().len(), 4);
    }

    #[tokio::test]
    async fn kick_disconnects_target() {
        let bridge = Bridge::builder(ProxyConfig::default()).build();
        let (mut steve, far) = named_session(&bridge, "Steve");

        let mut console = ConsoleSender::new("en_us");
        assert_eq!(execute(&bridge, &mut console, &["kick", "steve"]), 0);
        steve.run_until_idle().await;

        assert!(steve.is_closed());
        assert!(bridge.sessions().is_empty());
        assert!(far.drain().iter().any(|message| matches!(
            message,
            crate::link::LinkMessage::Close { reason } if reason == "You were kicked from the server."
        )));
    }

    #[test]
    fn player_output_is_chat() {
        let bridge = Bridge::builder(ProxyConfig::default()).build();
        let (mut steve, far) = named_session(&bridge, "Steve");
        execute(&bridge, &mut steve, &["list"]);
        assert!(far.drain_packets().iter().any(|packet| matches!(
            packet,
            ServerPacket::Text { kind: TextKind::Raw, message } if message.contains("Steve")
        )));
    }
}
