use std::fmt;

/// The closed set of arm actions the chat channel can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RobotCommand {
    PickRipe,
    PickUnripe,
}

impl RobotCommand {
    pub const ALL: [RobotCommand; 2] = [RobotCommand::PickRipe, RobotCommand::PickUnripe];

    /// Wire form, as the language backend must spell it.
    pub fn as_str(&self) -> &'static str {
        match self {
            RobotCommand::PickRipe => "Pick the ripe tomato and put it on the bag",
            RobotCommand::PickUnripe => "Pick the unripe tomato and put it on the bag",
        }
    }

    /// Exact match only; anything else is not a command.
    pub fn parse(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.as_str() == text)
    }
}

impl fmt::Display for RobotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one chat exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub reply: String,
    pub command: Option<RobotCommand>,
}

impl ChatTurn {
    pub fn reply_only(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            command: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exact_strings() {
        assert_eq!(
            RobotCommand::parse("Pick the ripe tomato and put it on the bag"),
            Some(RobotCommand::PickRipe)
        );
        assert_eq!(
            RobotCommand::parse("Pick the unripe tomato and put it on the bag"),
            Some(RobotCommand::PickUnripe)
        );
    }

    #[test]
    fn test_parse_rejects_near_misses() {
        assert_eq!(RobotCommand::parse("pick the ripe tomato and put it on the bag"), None);
        assert_eq!(RobotCommand::parse("Pick the ripe tomato"), None);
        assert_eq!(RobotCommand::parse(""), None);
    }

    #[test]
    fn test_display_round_trips() {
        for command in RobotCommand::ALL {
            assert_eq!(RobotCommand::parse(&command.to_string()), Some(command));
        }
    }
}
