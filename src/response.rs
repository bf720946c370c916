//! Unsolicited responses a session owes its client

use std::fmt;

use crate::flags::FlagSet;
use crate::types::{SequenceNumber, Uid};

/// Responses the server sends without the client asking, in the form they
/// take on the wire (minus the trailing CRLF)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsolicitedResponse {
    /// The mailbox now holds this many messages
    Exists(usize),

    /// This many messages carry `\Recent`
    Recent(usize),

    /// Flags of the message at `msn` changed
    Fetch {
        msn: SequenceNumber,
        flags: FlagSet,
        uid: Option<Uid>,
    },

    /// The message at this position was removed
    Expunge(SequenceNumber),

    /// The server is closing the connection
    Bye(String),
}

impl fmt::Display for UnsolicitedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsolicitedResponse::Exists(n) => write!(f, "* {} EXISTS", n),
            UnsolicitedResponse::Recent(n) => write!(f, "* {} RECENT", n),
            UnsolicitedResponse::Fetch { msn, flags, uid } => {
                write!(f, "* {} FETCH (FLAGS {}", msn, flags)?;
                if let Some(uid) = uid {
                    write!(f, " UID {}", uid)?;
                }
                write!(f, ")")
            }
            UnsolicitedResponse::Expunge(msn) => write!(f, "* {} EXPUNGE", msn),
            UnsolicitedResponse::Bye(text) => write!(f, "* BYE {}", text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageFlag;

    #[test]
    fn test_wire_format() {
        assert_eq!(UnsolicitedResponse::Exists(3).to_string(), "* 3 EXISTS");
        assert_eq!(UnsolicitedResponse::Recent(0).to_string(), "* 0 RECENT");
        assert_eq!(UnsolicitedResponse::Expunge(1).to_string(), "* 1 EXPUNGE");
        assert_eq!(
            UnsolicitedResponse::Bye("Mailbox deleted".into()).to_string(),
            "* BYE Mailbox deleted"
        );
    }

    #[test]
    fn test_fetch_with_and_without_uid() {
        let flags: FlagSet = [MessageFlag::Seen, MessageFlag::Deleted].into_iter().collect();

        let fetch = UnsolicitedResponse::Fetch {
            msn: 2,
            flags: flags.clone(),
            uid: Some(7),
        };
        assert_eq!(fetch.to_string(), "* 2 FETCH (FLAGS (\\Seen \\Deleted) UID 7)");

        let fetch = UnsolicitedResponse::Fetch {
            msn: 2,
            flags,
            uid: None,
        };
        assert_eq!(fetch.to_string(), "* 2 FETCH (FLAGS (\\Seen \\Deleted))");
    }
}
