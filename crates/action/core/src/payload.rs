//! Key/value payload carried by events and owned by each executing action.

use crate::handle::ActionSpecHandle;
use crate::math::Vec3;
use crate::tag::{GameplayTag, TagContainer};

/// Well-known payload keys.
pub mod keys {
    /// Name of the animation notify that produced an event.
    pub const NOTIFY_NAME: &str = "NotifyName";
    /// Movement path as a point list.
    pub const PATH_DATA: &str = "PathData";
    /// Granted spec and level of the executing action.
    pub const ACTION_SPEC: &str = "ActionSpec";
    /// Input that completed a wait.
    pub const INPUT_TAG: &str = "InputTag";
    /// Seconds a wait task spent waiting.
    pub const TIME_WAITED: &str = "TimeWaited";
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PayloadValue {
    Name(String),
    Tag(GameplayTag),
    Tags(TagContainer),
    Float(f32),
    Int(i64),
    Vector(Vec3),
    Path(Vec<Vec3>),
    Spec { handle: ActionSpecHandle, level: u32 },
}

/// Ordered key/value store. Setting an existing key replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ContextPayload {
    entries: Vec<(String, PayloadValue)>,
}

impl ContextPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload carrying only a notify name.
    pub fn notify(name: impl Into<String>) -> Self {
        Self::new().with(keys::NOTIFY_NAME, PayloadValue::Name(name.into()))
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: PayloadValue) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: PayloadValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<PayloadValue> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn name(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            PayloadValue::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn float(&self, key: &str) -> Option<f32> {
        match self.get(key)? {
            PayloadValue::Float(value) => Some(*value),
            PayloadValue::Int(value) => Some(*value as f32),
            _ => None,
        }
    }

    pub fn tag(&self, key: &str) -> Option<&GameplayTag> {
        match self.get(key)? {
            PayloadValue::Tag(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn path(&self, key: &str) -> Option<&[Vec3]> {
        match self.get(key)? {
            PayloadValue::Path(points) => Some(points),
            _ => None,
        }
    }

    pub fn notify_name(&self) -> Option<&str> {
        self.name(keys::NOTIFY_NAME)
    }

    pub fn spec(&self) -> Option<(ActionSpecHandle, u32)> {
        match self.get(keys::ACTION_SPEC)? {
            PayloadValue::Spec { handle, level } => Some((*handle, *level)),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PayloadValue)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
