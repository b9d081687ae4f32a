//! The event envelope: the only message shape that travels on the wire.
//!
//! An [`Event`] is encoded positionally rather than as a JSON object:
//!
//! - `[type]` when there is no payload,
//! - `[type, payload]` otherwise.
//!
//! Anything else (an empty array, a non-array, a non-string or empty type,
//! or more than two elements) is rejected when decoding. The payload is
//! kept as an untyped [`serde_json::Value`]; handlers decode it into
//! their own structures with [`Event::decode_payload`].

use std::fmt;

use serde::de::{self, DeserializeOwned, IgnoredAny, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::ProtocolError;

/// Separator between the room name and the rest of an event type.
const ROOM_SEPARATOR: char = ':';

/// A typed label plus an opaque payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event type, e.g. `"chat:message"`. Never empty on the wire.
    pub event_type: String,
    /// Schema-less payload. `None` when the envelope has a single slot.
    pub payload: Option<Value>,
}

impl Event {
    /// Creates an event without a payload.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: None,
        }
    }

    /// Creates an event whose payload is the JSON form of `payload`.
    ///
    /// A payload that serializes to `null` is stored as absent.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if `payload` cannot be represented
    /// as JSON (e.g. a map with non-string keys).
    pub fn with_payload<T: Serialize>(
        event_type: impl Into<String>,
        payload: &T,
    ) -> Result<Self, ProtocolError> {
        let value = serde_json::to_value(payload).map_err(ProtocolError::Encode)?;
        Ok(Self {
            event_type: event_type.into(),
            payload: non_null(value),
        })
    }

    /// Decodes an event from one frame's bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] for any shape other than a one- or
    /// two-element array whose first element is a non-empty string.
    pub fn from_slice(data: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }

    /// Encodes the event into frame bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] if the event type is empty.
    pub fn to_vec(&self) -> Result<Vec<u8>, ProtocolError> {
        self.to_json().map(String::into_bytes)
    }

    /// Encodes the event as JSON text, for text frames.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] if the event type is empty.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        if self.event_type.is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "event type must not be empty".into(),
            ));
        }
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Decodes the payload into a concrete type.
    ///
    /// An absent payload is presented to `T` as JSON `null`, so
    /// `Option<_>` and unit-like targets accept it. The event itself is left
    /// untouched whatever the outcome.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the payload does not match `T`.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        match &self.payload {
            Some(value) => T::deserialize(value),
            None => T::deserialize(&Value::Null),
        }
        .map_err(ProtocolError::Decode)
    }

    /// The room this event is published into, derived from its type.
    pub fn room(&self) -> &str {
        room_of(&self.event_type)
    }
}

/// Returns the part of `event_type` before the first `:`.
///
/// `"chat:message"` belongs to room `"chat"`. A type without a separator is
/// its own room name.
pub fn room_of(event_type: &str) -> &str {
    event_type
        .split_once(ROOM_SEPARATOR)
        .map_or(event_type, |(room, _)| room)
}

fn non_null(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        value => Some(value),
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.payload.is_some() { 2 } else { 1 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.event_type)?;
        if let Some(payload) = &self.payload {
            seq.serialize_element(payload)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(EventVisitor)
    }
}

struct EventVisitor;

impl<'de> Visitor<'de> for EventVisitor {
    type Value = Event;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of the form [type] or [type, payload]")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Event, A::Error> {
        let event_type: String = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        if event_type.is_empty() {
            return Err(de::Error::invalid_value(
                de::Unexpected::Str(""),
                &"a non-empty event type",
            ));
        }

        let payload = seq.next_element::<Value>()?.and_then(non_null);

        if seq.next_element::<IgnoredAny>()?.is_some() {
            return Err(de::Error::invalid_length(3, &self));
        }

        Ok(Event {
            event_type,
            payload,
        })
    }
}
