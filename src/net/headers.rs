//! Default response headers handed to the HTTP layer.

use std::collections::BTreeMap;

/// An ordered set of headers the HTTP layer adds to every response.
///
/// Connections carry this through `initialize` without looking inside.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultHeaders {
    headers: Vec<(String, String)>,
}

impl DefaultHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header, replacing an existing one with the same name
    /// (case-insensitive).
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl From<&BTreeMap<String, String>> for DefaultHeaders {
    fn from(map: &BTreeMap<String, String>) -> Self {
        let mut headers = Self::new();
        for (name, value) in map {
            headers.set(name.clone(), value.clone());
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_case_insensitively() {
        let mut headers = DefaultHeaders::new();
        headers.set("Server", "a");
        headers.set("server", "b");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("SERVER"), Some("b"));
    }
}
