use serde::Serialize;

/// Optional collaborators present for a generator, resolved once at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub ml_advisor: bool,
    pub backup_advisor: bool,
    pub gex: bool,
    pub quotes: bool,
    pub persistence: bool,
}

impl Capabilities {
    #[must_use]
    pub fn has_any_advisor(&self) -> bool {
        self.ml_advisor || self.backup_advisor
    }

    /// Names of the absent capabilities.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (self.ml_advisor, "ml_advisor"),
            (self.backup_advisor, "backup_advisor"),
            (self.gex, "gex"),
            (self.quotes, "quotes"),
            (self.persistence, "persistence"),
        ]
        .into_iter()
        .filter_map(|(present, name)| (!present).then_some(name))
        .collect()
    }
}

impl std::fmt::Display for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flag = |b: bool| if b { "yes" } else { "no" };
        write!(
            f,
            "ml={} backup={} gex={} quotes={} persistence={}",
            flag(self.ml_advisor),
            flag(self.backup_advisor),
            flag(self.gex),
            flag(self.quotes),
            flag(self.persistence)
        )
    }
}
