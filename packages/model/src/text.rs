//! Text leaves and their character runs.

use serde::{Deserialize, Serialize};

use crate::{Key, Mark, MarkProperties, Marks, NodeError};

type Result<T> = std::result::Result<T, NodeError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub text: char,
    #[serde(default, skip_serializing_if = "Marks::is_empty")]
    pub marks: Marks,
}

impl Character {
    pub fn new(text: char, marks: Marks) -> Self {
        Self { text, marks }
    }
}

/// A text leaf: an ordered run of characters, each carrying its own marks.
///
/// Offsets are counted in characters, never bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    pub key: Key,
    #[serde(default)]
    pub characters: Vec<Character>,
}

impl Text {
    pub fn new(content: &str) -> Self {
        Self::with_marks(content, &Marks::default())
    }

    pub fn with_marks(content: &str, marks: &Marks) -> Self {
        Self {
            key: Key::generate(),
            characters: content
                .chars()
                .map(|text| Character::new(text, marks.clone()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    pub fn text(&self) -> String {
        self.characters.iter().map(|character| character.text).collect()
    }

    /// Marks of the character just before `index`; empty at index 0.
    pub fn marks_at_index(&self, index: usize) -> Marks {
        index
            .checked_sub(1)
            .and_then(|previous| self.characters.get(previous))
            .map(|character| character.marks.clone())
            .unwrap_or_default()
    }

    /// Union of every character's marks
    pub fn marks(&self) -> Marks {
        let mut marks = Marks::new();
        for character in &self.characters {
            marks.extend(&character.marks);
        }
        marks
    }

    fn check_range(&self, offset: usize, length: usize) -> Result<()> {
        let end = offset.saturating_add(length);
        if end > self.len() {
            return Err(NodeError::OffsetOutOfRange {
                key: self.key.clone(),
                offset,
                end,
                length: self.len(),
            });
        }
        Ok(())
    }

    /// Inserts `text` at `offset`. Without explicit marks the new characters
    /// inherit the marks of the character before the insertion point.
    pub fn insert_text(&self, offset: usize, text: &str, marks: Option<&Marks>) -> Result<Text> {
        self.check_range(offset, 0)?;
        let marks = marks
            .cloned()
            .unwrap_or_else(|| self.marks_at_index(offset));

        let mut characters = self.characters.clone();
        characters.splice(
            offset..offset,
            text.chars().map(|text| Character::new(text, marks.clone())),
        );

        Ok(Text {
            key: self.key.clone(),
            characters,
        })
    }

    pub fn remove_text(&self, offset: usize, length: usize) -> Result<Text> {
        self.check_range(offset, length)?;
        let mut characters = self.characters.clone();
        characters.drain(offset..offset + length);
        Ok(Text {
            key: self.key.clone(),
            characters,
        })
    }

    fn map_marks(
        &self,
        offset: usize,
        length: usize,
        mut update: impl FnMut(&mut Marks),
    ) -> Result<Text> {
        self.check_range(offset, length)?;
        let mut characters = self.characters.clone();
        for character in &mut characters[offset..offset + length] {
            update(&mut character.marks);
        }
        Ok(Text {
            key: self.key.clone(),
            characters,
        })
    }

    pub fn add_mark(&self, offset: usize, length: usize, mark: &Mark) -> Result<Text> {
        self.map_marks(offset, length, |marks| {
            marks.insert(mark.clone());
        })
    }

    pub fn remove_mark(&self, offset: usize, length: usize, mark: &Mark) -> Result<Text> {
        self.map_marks(offset, length, |marks| {
            marks.remove(mark);
        })
    }

    /// Replaces `mark` with `mark` merged with `properties`, only on the
    /// characters that carry it.
    pub fn update_mark(
        &self,
        offset: usize,
        length: usize,
        mark: &Mark,
        properties: &MarkProperties,
    ) -> Result<Text> {
        let updated = mark.merge(properties);
        self.map_marks(offset, length, |marks| {
            marks.replace(mark, updated.clone());
        })
    }

    /// Splits at `offset`. The left half keeps this key, the right half gets
    /// a fresh one.
    pub fn split_at(&self, offset: usize) -> Result<(Text, Text)> {
        self.check_range(offset, 0)?;
        let one = Text {
            key: self.key.clone(),
            characters: self.characters[..offset].to_vec(),
        };
        let two = Text {
            key: Key::generate(),
            characters: self.characters[offset..].to_vec(),
        };
        Ok((one, two))
    }

    /// Appends `other`'s characters, keeping this key
    pub fn join(&self, other: &Text) -> Text {
        let mut characters = self.characters.clone();
        characters.extend(other.characters.iter().cloned());
        Text {
            key: self.key.clone(),
            characters,
        }
    }
}
