//! Character formatting marks.

use serde::{Deserialize, Serialize};

/// Free-form node or mark data.
pub type Data = serde_json::Map<String, serde_json::Value>;

/// Returns true when every entry of `subset` is present in `data` with an
/// equal value.
pub fn is_superset(data: &Data, subset: &Data) -> bool {
    subset
        .iter()
        .all(|(name, value)| data.get(name) == Some(value))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mark {
    #[serde(rename = "type")]
    pub mark_type: String,
    #[serde(default, skip_serializing_if = "Data::is_empty")]
    pub data: Data,
}

impl Mark {
    pub fn new(mark_type: impl Into<String>) -> Self {
        Self {
            mark_type: mark_type.into(),
            data: Data::new(),
        }
    }

    pub fn with_data(mut self, data: Data) -> Self {
        self.data = data;
        self
    }

    /// Copy of this mark with `properties` laid over it
    pub fn merge(&self, properties: &MarkProperties) -> Mark {
        Mark {
            mark_type: properties
                .mark_type
                .clone()
                .unwrap_or_else(|| self.mark_type.clone()),
            data: properties.data.clone().unwrap_or_else(|| self.data.clone()),
        }
    }
}

/// Partial mark used by `set_mark`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkProperties {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mark_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Data>,
}

/// Set of marks applied to one character.
///
/// Stored in insertion order so serialized output is stable; equality
/// ignores order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Marks(Vec<Mark>);

impl Marks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, mark: &Mark) -> bool {
        self.0.contains(mark)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Mark> {
        self.0.iter()
    }

    /// Adds `mark`, returning false when it was already present
    pub fn insert(&mut self, mark: Mark) -> bool {
        if self.contains(&mark) {
            return false;
        }
        self.0.push(mark);
        true
    }

    pub fn remove(&mut self, mark: &Mark) -> bool {
        let before = self.0.len();
        self.0.retain(|existing| existing != mark);
        before != self.0.len()
    }

    /// Swaps `old` for `new` in place. No-op when `old` is absent.
    pub fn replace(&mut self, old: &Mark, new: Mark) {
        let Some(index) = self.0.iter().position(|existing| existing == old) else {
            return;
        };
        if self.0.iter().any(|existing| existing == &new) {
            self.0.remove(index);
        } else {
            self.0[index] = new;
        }
    }

    pub fn extend(&mut self, other: &Marks) {
        for mark in other {
            self.insert(mark.clone());
        }
    }

    pub fn intersect(&self, other: &Marks) -> Marks {
        self.0
            .iter()
            .filter(|mark| other.contains(mark))
            .cloned()
            .collect()
    }
}

impl PartialEq for Marks {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.0.iter().all(|mark| other.contains(mark))
    }
}

impl Eq for Marks {}

impl FromIterator<Mark> for Marks {
    fn from_iter<I: IntoIterator<Item = Mark>>(iter: I) -> Self {
        let mut marks = Marks::new();
        for mark in iter {
            marks.insert(mark);
        }
        marks
    }
}

impl From<Vec<Mark>> for Marks {
    fn from(marks: Vec<Mark>) -> Self {
        marks.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a Marks {
    type Item = &'a Mark;
    type IntoIter = std::slice::Iter<'a, Mark>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_marks_equality_ignores_order() {
        let a: Marks = vec![Mark::new("bold"), Mark::new("italic")].into();
        let b: Marks = vec![Mark::new("italic"), Mark::new("bold")].into();
        assert_eq!(a, b);
    }

    #[test]
    fn test_insert_deduplicates() {
        let mut marks = Marks::new();
        assert!(marks.insert(Mark::new("bold")));
        assert!(!marks.insert(Mark::new("bold")));
        assert_eq!(marks.len(), 1);
    }

    #[test]
    fn test_merge_properties() {
        let mut data = Data::new();
        data.insert("href".into(), json!("https://example.com"));
        let link = Mark::new("link");
        let merged = link.merge(&MarkProperties {
            mark_type: None,
            data: Some(data.clone()),
        });
        assert_eq!(merged.mark_type, "link");
        assert_eq!(merged.data, data);
    }

    #[test]
    fn test_data_superset() {
        let mut data = Data::new();
        data.insert("a".into(), json!(1));
        data.insert("b".into(), json!(2));
        let mut subset = Data::new();
        subset.insert("a".into(), json!(1));
        assert!(is_superset(&data, &subset));
        subset.insert("c".into(), json!(3));
        assert!(!is_superset(&data, &subset));
    }
}
