use serde::{Deserialize, Serialize};
use tracing::warn;

/// Ordered device names, highest priority first. Never holds the same name twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct PriorityList {
    names: Vec<String>,
}

impl From<Vec<String>> for PriorityList {
    fn from(names: Vec<String>) -> Self {
        let mut list = PriorityList::default();
        for name in names {
            if !list.append(name.clone()) {
                warn!("Ignoring duplicate priority entry '{}'", name);
            }
        }
        list
    }
}

impl From<PriorityList> for Vec<String> {
    fn from(list: PriorityList) -> Self {
        list.names
    }
}

impl<S: Into<String>> FromIterator<S> for PriorityList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        iter.into_iter()
            .map(Into::into)
            .collect::<Vec<String>>()
            .into()
    }
}

impl PriorityList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Adds the name at the lowest priority. Returns false if it was already listed.
    pub fn append(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.names.push(name);
        true
    }

    /// Returns false if the name was not listed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.names.len();
        self.names.retain(|n| n != name);
        self.names.len() != before
    }

    /// Swaps the name with its higher-priority neighbour. No-op for the first entry.
    pub fn move_up(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(index) if index > 0 => {
                self.names.swap(index, index - 1);
                true
            }
            _ => false,
        }
    }

    /// Swaps the name with its lower-priority neighbour. No-op for the last entry.
    pub fn move_down(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(index) if index + 1 < self.names.len() => {
                self.names.swap(index, index + 1);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(names: &[&str]) -> PriorityList {
        names.iter().copied().collect()
    }

    #[test]
    fn append_rejects_duplicates() {
        let mut priorities = list(&["AirPods Pro"]);

        assert!(!priorities.append("AirPods Pro"));
        assert!(priorities.append("Studio Speakers"));
        assert_eq!(priorities.names(), ["AirPods Pro", "Studio Speakers"]);
    }

    #[test]
    fn construction_keeps_first_occurrence() {
        let priorities = list(&["A", "B", "A", "C", "B"]);
        assert_eq!(priorities.names(), ["A", "B", "C"]);
    }

    #[test]
    fn remove_reports_whether_anything_changed() {
        let mut priorities = list(&["A", "B"]);

        assert!(priorities.remove("A"));
        assert!(!priorities.remove("A"));
        assert_eq!(priorities.names(), ["B"]);
    }

    #[test]
    fn move_up_and_down_swap_adjacent_entries() {
        let mut priorities = list(&["A", "B", "C"]);

        assert!(priorities.move_up("C"));
        assert_eq!(priorities.names(), ["A", "C", "B"]);

        assert!(priorities.move_down("A"));
        assert_eq!(priorities.names(), ["C", "A", "B"]);
    }

    #[test]
    fn moves_at_the_ends_are_no_ops() {
        let mut priorities = list(&["A", "B"]);

        assert!(!priorities.move_up("A"));
        assert!(!priorities.move_down("B"));
        assert!(!priorities.move_up("missing"));
        assert_eq!(priorities.names(), ["A", "B"]);
    }

    #[test]
    fn deserializing_drops_duplicates() {
        #[derive(Deserialize)]
        struct Wrapper {
            names: PriorityList,
        }

        let wrapper: Wrapper = toml::from_str(r#"names = ["A", "B", "A"]"#).unwrap();
        assert_eq!(wrapper.names.names(), ["A", "B"]);
    }
}
