//! Arguments for `CLIENT TRACKING ON`.

use super::Command;

/// Builder for the option list appended to `CLIENT TRACKING ON`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientTrackingOptions {
    arguments: Vec<String>,
}

impl ClientTrackingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// In broadcast mode, only notify about keys starting with these prefixes.
    pub fn prefix<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for prefix in prefixes {
            self.arguments.push("PREFIX".to_string());
            self.arguments.push(prefix.into());
        }
        self
    }

    /// Enable tracking in broadcasting mode.
    pub fn broadcast(mut self) -> Self {
        self.arguments.push("BCAST".to_string());
        self
    }

    /// Only track keys read right after `CLIENT CACHING YES`.
    pub fn opt_in(mut self) -> Self {
        self.arguments.push("OPTIN".to_string());
        self
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// `CLIENT TRACKING ON <options...>`
    pub fn to_command(&self) -> Command {
        let mut arguments = vec!["TRACKING".to_string(), "ON".to_string()];
        arguments.extend(self.arguments.iter().cloned());
        Command::raw("CLIENT", arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tracking_command() {
        let command = ClientTrackingOptions::new().to_command();
        assert_eq!(command.id(), "CLIENT");
        assert_eq!(command.arguments(), ["TRACKING", "ON"]);
    }

    #[test]
    fn test_broadcast_with_prefixes() {
        let options = ClientTrackingOptions::new()
            .broadcast()
            .prefix(["user:", "session:"]);
        assert_eq!(
            options.arguments(),
            ["BCAST", "PREFIX", "user:", "PREFIX", "session:"]
        );
    }

    #[test]
    fn test_opt_in() {
        let command = ClientTrackingOptions::new().opt_in().to_command();
        assert_eq!(command.arguments(), ["TRACKING", "ON", "OPTIN"]);
    }
}
