//! Status messages flowing from pipeline components to operator sinks

use serde::{Deserialize, Serialize};

/// Severity of a status message.
///
/// `None` is forced display (shown regardless of any level filter);
/// `Panic` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    None,
    Panic,
}

/// A severity-leveled log line appended to the status history and forwarded
/// to the outbound status channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub level: LogLevel,
    pub text: String,
}

impl StatusMessage {
    pub fn new(level: LogLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::None);
        assert!(LogLevel::None < LogLevel::Panic);
    }
}
