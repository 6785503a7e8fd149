//! Match URIs: `rg-match://host:port/[matchId]`.

use std::fmt;
use std::str::FromStr;

use crate::{MatchId, ProtocolError};

/// The scheme the server uses when it hands out URIs.
pub const MATCH_SCHEME: &str = "rg-match";

/// Where a match lives. Without an id the URI points at the server itself,
/// which a client takes as "create a new match there".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchUri {
    pub host: String,
    pub port: u16,
    pub match_id: Option<MatchId>,
}

impl MatchUri {
    pub fn for_match(host: &str, port: u16, match_id: MatchId) -> Self {
        Self {
            host: host.to_string(),
            port,
            match_id: Some(match_id),
        }
    }

    /// `host:port`, suitable for connecting.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for MatchUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{MATCH_SCHEME}://{}:{}/", self.host, self.port)?;
        if let Some(id) = &self.match_id {
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

impl FromStr for MatchUri {
    type Err = ProtocolError;

    /// Any scheme is accepted; only the authority and path matter.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| ProtocolError::InvalidUri(format!("{s:?}: {why}"));

        let (_, rest) = s.split_once("://").ok_or_else(|| invalid("missing scheme"))?;
        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, path),
            None => (rest, ""),
        };
        let (host, port) = authority
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing port"))?;
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        let port = port.parse().map_err(|_| invalid("bad port"))?;
        let match_id = if path.is_empty() {
            None
        } else {
            Some(MatchId::parse(path).ok_or_else(|| invalid("bad match id"))?)
        };

        Ok(Self {
            host: host.to_string(),
            port,
            match_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_embeds_id_verbatim() {
        let uri = MatchUri::for_match("127.0.0.1", 8007, MatchId::parse("Xy7").unwrap());
        assert_eq!(uri.to_string(), "rg-match://127.0.0.1:8007/Xy7");
        assert_eq!(uri.addr(), "127.0.0.1:8007");
    }

    #[test]
    fn test_parse_with_and_without_id() {
        let uri: MatchUri = "rg-match://example.org:9000/abc".parse().unwrap();
        assert_eq!(uri.host, "example.org");
        assert_eq!(uri.port, 9000);
        assert_eq!(uri.match_id.as_ref().map(MatchId::as_str), Some("abc"));

        let server: MatchUri = "rg-match://localhost:8007/".parse().unwrap();
        assert!(server.match_id.is_none());
        let bare: MatchUri = "rg-match://localhost:8007".parse().unwrap();
        assert_eq!(bare, server);
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "localhost:8007",
            "rg-match://localhost/abc",
            "rg-match://:8007/",
            "rg-match://localhost:99999/",
            "rg-match://localhost:8007/a-b",
        ] {
            assert!(bad.parse::<MatchUri>().is_err(), "{bad} should not parse");
        }
    }
}
