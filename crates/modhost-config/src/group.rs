//! Configuration groups: ordered key/value items plus nested subgroups.

/// A group of key/value pairs and nested subgroups.
///
/// Keys may repeat; insertion order is preserved for both values and
/// subgroups. Groups with the same name may also repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationGroup {
    values: Vec<(String, String)>,
    groups: Vec<(String, ConfigurationGroup)>,
}

impl ConfigurationGroup {
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// First value stored under `key`.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values stored under `key`, in file order.
    pub fn values(&self, key: &str) -> Vec<&str> {
        self.values
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Number of values stored under `key`.
    pub fn value_count(&self, key: &str) -> usize {
        self.values.iter().filter(|(k, _)| k == key).count()
    }

    /// Whether at least one value is stored under `key`.
    pub fn has_value(&self, key: &str) -> bool {
        self.values.iter().any(|(k, _)| k == key)
    }

    /// Iterate over all key/value pairs in file order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// First subgroup named `name`.
    pub fn group(&self, name: &str) -> Option<&ConfigurationGroup> {
        self.groups.iter().find(|(n, _)| n == name).map(|(_, g)| g)
    }

    /// All subgroups named `name`, in file order.
    pub fn groups(&self, name: &str) -> Vec<&ConfigurationGroup> {
        self.groups
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, g)| g)
            .collect()
    }

    /// Names of all direct subgroups, in file order, duplicates included.
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Whether the group holds neither values nor subgroups.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.groups.is_empty()
    }

    pub(crate) fn push_value(&mut self, key: String, value: String) {
        self.values.push((key, value));
    }

    pub(crate) fn push_group(&mut self, name: String) -> usize {
        self.groups.push((name, ConfigurationGroup::new()));
        self.groups.len() - 1
    }

    pub(crate) fn last_group_index(&self, name: &str) -> Option<usize> {
        self.groups.iter().rposition(|(n, _)| n == name)
    }

    pub(crate) fn group_len(&self) -> usize {
        self.groups.len()
    }

    /// Callers check `index < group_len()` first.
    pub(crate) fn child_mut(&mut self, index: usize) -> &mut ConfigurationGroup {
        &mut self.groups[index].1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConfigurationGroup {
        let mut group = ConfigurationGroup::new();
        group.push_value("depends".to_string(), "Dog".to_string());
        group.push_value("name".to_string(), "Chihuahua".to_string());
        group.push_value("depends".to_string(), "Bone".to_string());
        let idx = group.push_group("data".to_string());
        group
            .child_mut(idx)
            .push_value("legs".to_string(), "4".to_string());
        group
    }

    #[test]
    fn test_value_returns_first() {
        let group = sample();
        assert_eq!(group.value("depends"), Some("Dog"));
        assert_eq!(group.value("missing"), None);
    }

    #[test]
    fn test_values_keep_order() {
        let group = sample();
        assert_eq!(group.values("depends"), vec!["Dog", "Bone"]);
        assert_eq!(group.value_count("depends"), 2);
        assert!(group.has_value("name"));
    }

    #[test]
    fn test_subgroups() {
        let group = sample();
        assert_eq!(group.group_names(), vec!["data"]);
        assert_eq!(group.group("data").and_then(|g| g.value("legs")), Some("4"));
        assert!(group.group("nope").is_none());
        assert!(!group.is_empty());
        assert!(ConfigurationGroup::new().is_empty());
    }
}
