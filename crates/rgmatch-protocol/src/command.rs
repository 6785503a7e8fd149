//! Client command grammar.
//!
//! Commands are ASCII, space separated:
//!
//! ```text
//! NAME <token>            token: [A-Za-z0-9-_.]+
//! CREATE <key=value ...>
//! JOIN <matchId>          matchId: [A-Za-z0-9]+
//! LIST
//! PLAYERS <matchId>
//! START
//! TURN
//! TURN <action batch bytes>
//! ```
//!
//! Parsing here is state-independent. Whether a command is acceptable
//! right now is the connection state machine's call.

use std::collections::BTreeMap;

use crate::{CommandError, MatchId};

/// A parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Name(String),
    Create(CreateOptions),
    Join(MatchId),
    List,
    Players(MatchId),
    Start,
    /// Bare `TURN`: ask for the current snapshot.
    Turn,
    /// `TURN <payload>`: the codec-encoded action batch, undecoded.
    SubmitTurn(Vec<u8>),
    /// Anything that doesn't fit the grammar.
    Unknown,
}

impl Command {
    /// Parses one inbound payload.
    ///
    /// Only `CREATE` can fail: its options are checked for syntax here so
    /// the connection can reply without touching any match state.
    pub fn parse(data: &[u8]) -> Result<Self, CommandError> {
        if data == b"TURN" {
            return Ok(Self::Turn);
        }
        if let Some(payload) = data.strip_prefix(b"TURN ") {
            return Ok(Self::SubmitTurn(payload.to_vec()));
        }

        let Ok(text) = std::str::from_utf8(data) else {
            return Ok(Self::Unknown);
        };

        let command = match text {
            "LIST" => Self::List,
            "START" => Self::Start,
            _ => {
                if let Some(name) = text.strip_prefix("NAME ") {
                    if is_name_token(name) {
                        Self::Name(name.to_string())
                    } else {
                        Self::Unknown
                    }
                } else if let Some(id) = text.strip_prefix("JOIN ") {
                    MatchId::parse(id).map_or(Self::Unknown, Self::Join)
                } else if let Some(id) = text.strip_prefix("PLAYERS ") {
                    MatchId::parse(id).map_or(Self::Unknown, Self::Players)
                } else if let Some(options) = text.strip_prefix("CREATE ") {
                    if options.is_empty() {
                        Self::Unknown
                    } else {
                        Self::Create(CreateOptions::parse(options)?)
                    }
                } else {
                    Self::Unknown
                }
            }
        };
        Ok(command)
    }

    /// Short label for logs and violation reports. Never includes the
    /// binary payload.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Name(_) => "NAME",
            Self::Create(_) => "CREATE",
            Self::Join(_) => "JOIN",
            Self::List => "LIST",
            Self::Players(_) => "PLAYERS",
            Self::Start => "START",
            Self::Turn => "TURN",
            Self::SubmitTurn(_) => "TURN <actions>",
            Self::Unknown => "unknown command",
        }
    }
}

fn is_name_token(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

/// `key=value` options of a `CREATE` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateOptions(BTreeMap<String, String>);

impl CreateOptions {
    /// Upper bound on `num_players`.
    pub const MAX_PLAYERS: u8 = 2;

    /// Parses whitespace-separated `key=value` tokens.
    ///
    /// # Errors
    /// [`CommandError::MalformedOption`] if any token does not contain
    /// exactly one `=`. Nothing is kept in that case.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let mut options = BTreeMap::new();
        for token in text.split_whitespace() {
            let mut parts = token.split('=');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(key), Some(value), None) => {
                    options.insert(key.to_string(), value.to_string());
                }
                _ => return Err(CommandError::MalformedOption),
            }
        }
        Ok(Self(options))
    }

    /// Raw value of an option.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// The required `num_players` option, in `1..=2`.
    pub fn num_players(&self) -> Result<u8, CommandError> {
        let raw = self.get("num_players").ok_or(CommandError::MissingNumPlayers)?;
        match raw.parse::<u8>() {
            Ok(n) if (1..=Self::MAX_PLAYERS).contains(&n) => Ok(n),
            _ => Err(CommandError::InvalidNumPlayers),
        }
    }

    /// The optional `max_turns` override. Range checks against server
    /// policy happen at the caller.
    pub fn max_turns(&self) -> Result<Option<u32>, CommandError> {
        match self.get("max_turns") {
            None => Ok(None),
            Some(raw) => raw
                .parse::<u32>()
                .map(Some)
                .map_err(|_| CommandError::InvalidMaxTurns),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &[u8]) -> Command {
        Command::parse(s).unwrap()
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse(b"LIST"), Command::List);
        assert_eq!(parse(b"START"), Command::Start);
        assert_eq!(parse(b"TURN"), Command::Turn);
        assert_eq!(parse(b"NAME r1.bot_2-x"), Command::Name("r1.bot_2-x".into()));
    }

    #[test]
    fn test_parse_match_id_commands() {
        let id = MatchId::parse("aB3").unwrap();
        assert_eq!(parse(b"JOIN aB3"), Command::Join(id.clone()));
        assert_eq!(parse(b"PLAYERS aB3"), Command::Players(id));
        assert_eq!(parse(b"JOIN a-b"), Command::Unknown);
        assert_eq!(parse(b"JOIN "), Command::Unknown);
    }

    #[test]
    fn test_parse_rejects_names_with_spaces_or_symbols() {
        assert_eq!(parse(b"NAME two words"), Command::Unknown);
        assert_eq!(parse(b"NAME bad!"), Command::Unknown);
        assert_eq!(parse(b"NAME "), Command::Unknown);
    }

    #[test]
    fn test_parse_turn_keeps_binary_payload() {
        assert_eq!(
            parse(b"TURN \x00\xff "),
            Command::SubmitTurn(vec![0, 255, b' '])
        );
    }

    #[test]
    fn test_parse_non_utf8_is_unknown() {
        assert_eq!(parse(b"\xff\xfe"), Command::Unknown);
    }

    #[test]
    fn test_parse_is_case_and_whitespace_exact() {
        assert_eq!(parse(b"list"), Command::Unknown);
        assert_eq!(parse(b"LIST "), Command::Unknown);
        assert_eq!(parse(b"CREATE"), Command::Unknown);
    }

    #[test]
    fn test_create_options() {
        let Command::Create(opts) = parse(b"CREATE num_players=2 max_turns=3 x=") else {
            panic!("expected Create");
        };
        assert_eq!(opts.num_players(), Ok(2));
        assert_eq!(opts.max_turns(), Ok(Some(3)));
        assert_eq!(opts.get("x"), Some(""));
    }

    #[test]
    fn test_create_malformed_option() {
        assert_eq!(
            Command::parse(b"CREATE num_players"),
            Err(CommandError::MalformedOption)
        );
        assert_eq!(
            Command::parse(b"CREATE a=b=c"),
            Err(CommandError::MalformedOption)
        );
    }

    #[test]
    fn test_num_players_validation() {
        let opts = |s| CreateOptions::parse(s).unwrap();
        assert_eq!(opts("").num_players(), Err(CommandError::MissingNumPlayers));
        assert_eq!(opts("num_players=0").num_players(), Err(CommandError::InvalidNumPlayers));
        assert_eq!(opts("num_players=3").num_players(), Err(CommandError::InvalidNumPlayers));
        assert_eq!(opts("num_players=two").num_players(), Err(CommandError::InvalidNumPlayers));
        assert_eq!(opts("num_players=1").num_players(), Ok(1));
    }

    #[test]
    fn test_max_turns_validation() {
        let opts = CreateOptions::parse("max_turns=-4").unwrap();
        assert_eq!(opts.max_turns(), Err(CommandError::InvalidMaxTurns));
        assert_eq!(CreateOptions::default().max_turns(), Ok(None));
    }

    #[test]
    fn test_label_hides_payload() {
        assert_eq!(Command::SubmitTurn(vec![1, 2, 3]).label(), "TURN <actions>");
    }
}
