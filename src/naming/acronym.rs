use std::collections::BTreeSet;

pub const DEFAULT_ACRONYMS: &[&str] = &[
    "ID", "API", "HTTP", "HTTPS", "URL", "URI", "UUID", "SQL", "JSON", "XML", "HTML", "CSS", "RPC", "TCP", "UDP",
    "IP", "DB", "UI", "CPU", "GPU", "RAM", "ASCII", "UTF", "JWT", "SSL", "TLS", "SSH", "FTP", "DNS", "SMTP",
    "IMAP", "GRPC", "CORS", "CSRF", "XSS",
];

/// Words kept fully upper-case in every casing that capitalizes words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcronymTable {
    entries: BTreeSet<String>,
}

impl Default for AcronymTable {
    fn default() -> Self {
        Self::new(DEFAULT_ACRONYMS.iter().copied())
    }
}

impl AcronymTable {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            entries: entries.into_iter().map(|e| e.as_ref().to_ascii_uppercase()).collect(),
        }
    }

    pub fn empty() -> Self {
        Self {
            entries: BTreeSet::new(),
        }
    }

    pub fn insert(&mut self, acronym: &str) {
        self.entries.insert(acronym.to_ascii_uppercase());
    }

    pub fn remove(&mut self, acronym: &str) {
        self.entries.remove(&acronym.to_ascii_uppercase());
    }

    pub fn contains(&self, word: &str) -> bool {
        self.entries.contains(&word.to_ascii_uppercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Splits an all-caps run made entirely of acronyms (`IDURL` -> `ID`, `URL`).
    ///
    /// Longest match first; `None` when any part of the run is not an acronym.
    pub fn segment(&self, run: &str) -> Option<Vec<String>> {
        let upper = run.to_ascii_uppercase();
        let mut rest = upper.as_str();
        let mut parts = Vec::new();
        while !rest.is_empty() {
            let found = (1..=rest.len())
                .rev()
                .filter(|end| rest.is_char_boundary(*end))
                .find(|end| self.entries.contains(&rest[..*end]))?;
            parts.push(rest[..found].to_owned());
            rest = &rest[found..];
        }
        Some(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_ignore_case() {
        let table = AcronymTable::default();
        assert!(table.contains("id"));
        assert!(table.contains("Http"));
        assert!(!table.contains("user"));
    }

    #[test]
    fn runs_split_into_known_acronyms() {
        let table = AcronymTable::default();
        assert_eq!(table.segment("IDURL"), Some(vec!["ID".to_owned(), "URL".to_owned()]));
        assert_eq!(table.segment("HTTPSURL"), Some(vec!["HTTPS".to_owned(), "URL".to_owned()]));
        assert_eq!(table.segment("USER"), None);
    }

    #[test]
    fn entries_can_be_added_and_removed() {
        let mut table = AcronymTable::default();
        table.insert("oauth");
        table.remove("ID");
        assert!(table.contains("OAUTH"));
        assert!(!table.contains("ID"));
    }
}
