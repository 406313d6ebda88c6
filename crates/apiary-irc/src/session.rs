// SPDX-License-Identifier: GPL-3.0-or-later
use apiary_config::AutosnatchConfig;

use crate::message::{strip_formatting, IrcMessage};

/// Connection details for one tracker's announce channel.
#[derive(Debug, Clone)]
pub struct IrcSettings {
    pub tracker: String,
    pub server: String,
    /// Tracker account name, sent to the announcer together with the IRC key.
    pub user: String,
    pub key: String,
    pub nickserv_password: String,
    pub bot_name: String,
    pub announcer: String,
    pub channel: String,
}

impl IrcSettings {
    pub fn from_config(config: &AutosnatchConfig, user: impl Into<String>) -> Self {
        Self {
            tracker: config.tracker.clone(),
            server: config.irc_server.clone(),
            user: user.into(),
            key: config.irc_key.clone(),
            nickserv_password: config.nickserv_password.clone(),
            bot_name: config.bot_name.clone(),
            announcer: config.announcer.clone(),
            channel: config.announce_channel.clone(),
        }
    }
}

/// What the connection loop should do in response to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Send(String),
    /// Join after giving the announcer a moment to invite us.
    JoinSoon(String),
    Announce(String),
}

/// Protocol state of the announce bot, independent of the socket.
#[derive(Debug, Clone)]
pub struct AnnounceSession {
    settings: IrcSettings,
}

impl AnnounceSession {
    pub fn new(settings: IrcSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &IrcSettings {
        &self.settings
    }

    pub fn registration(&self) -> Vec<String> {
        vec![
            format!("NICK {}", self.settings.bot_name),
            format!("USER {} 0 * :{}", self.settings.bot_name, self.settings.user),
        ]
    }

    pub fn handle(&self, msg: &IrcMessage) -> Vec<Action> {
        let s = &self.settings;
        match msg.command.as_str() {
            "PING" => vec![Action::Send(format!("PONG :{}", msg.param(0).unwrap_or_default()))],
            "001" => vec![
                Action::Send(format!("PRIVMSG NickServ :IDENTIFY {}", s.nickserv_password)),
                Action::Send(format!(
                    "PRIVMSG {} :enter {} {} {}",
                    s.announcer, s.channel, s.user, s.key
                )),
            ],
            "INVITE" if self.from_announcer(msg) => vec![Action::JoinSoon(s.channel.clone())],
            "PRIVMSG" if self.from_announcer(msg) => {
                let (Some(target), Some(text)) = (msg.param(0), msg.param(1)) else {
                    return vec![];
                };
                if target.eq_ignore_ascii_case(&s.bot_name) {
                    vec![Action::JoinSoon(s.channel.clone())]
                } else if target.eq_ignore_ascii_case(&s.channel) {
                    vec![Action::Announce(strip_formatting(text).trim().to_string())]
                } else {
                    vec![]
                }
            }
            _ => vec![],
        }
    }

    fn from_announcer(&self, msg: &IrcMessage) -> bool {
        msg.nick() == Some(self.settings.announcer.as_str())
    }
}
