//! Line codec for the record file.
//!
//! Known fields are written in a fixed order so diffs stay small; anything
//! else found on a record is carried through untouched after them.

use serde_json::{Map, Value};

use crate::error::ArcError;
use crate::item::{ActionState, Brief, Item, ItemId, ItemKind, Kind, Status, DEFAULT_ORDER};
use crate::tactical::Tactical;

const KNOWN_FIELDS: &[&str] = &[
    "id",
    "type",
    "title",
    "brief",
    "status",
    "parent",
    "order",
    "created_at",
    "created_by",
    "waiting_for",
    "done_at",
    "archived_at",
    "tactical",
];

fn required_str(object: &Map<String, Value>, field: &str) -> Result<String, ArcError> {
    match object.get(field) {
        None => Err(ArcError::validation(format!(
            "Missing required field: {field}"
        ))),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(other) => Err(ArcError::validation(format!(
            "Field {field} must be a string, got {other}"
        ))),
    }
}

fn optional_str(object: &Map<String, Value>, field: &str) -> Result<Option<String>, ArcError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(ArcError::validation(format!(
            "Field {field} must be a string or null, got {other}"
        ))),
    }
}

fn decode_order(object: &Map<String, Value>) -> Result<u32, ArcError> {
    match object.get("order") {
        None | Some(Value::Null) => Ok(DEFAULT_ORDER),
        Some(Value::Number(number)) => number
            .as_u64()
            .and_then(|value| u32::try_from(value).ok())
            .filter(|value| *value > 0)
            .ok_or_else(|| ArcError::validation(format!("Invalid order: {number}"))),
        Some(other) => Err(ArcError::validation(format!("Invalid order: {other}"))),
    }
}

fn decode_brief(object: &Map<String, Value>) -> Result<Option<Brief>, ArcError> {
    match object.get("brief") {
        None | Some(Value::Null) => Ok(None),
        Some(value @ Value::Object(_)) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|err| ArcError::validation(format!("Invalid brief: {err}"))),
        Some(other) => Err(ArcError::validation(format!(
            "Field brief must be an object, got {other}"
        ))),
    }
}

fn decode_tactical(object: &Map<String, Value>) -> Result<Option<Tactical>, ArcError> {
    match object.get("tactical") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let tactical: Tactical = serde_json::from_value(value.clone())
                .map_err(|err| ArcError::validation(format!("Invalid tactical: {err}")))?;
            if tactical.current > tactical.steps.len() {
                return Err(ArcError::validation(format!(
                    "Invalid tactical: current {} exceeds {} steps",
                    tactical.current,
                    tactical.steps.len()
                )));
            }
            Ok(Some(tactical))
        }
    }
}

impl Item {
    /// Decodes one record with load-time (lenient) validation: `id`, `type`,
    /// `title` and `status` must be present and well formed, everything
    /// else may be missing.
    ///
    /// # Errors
    /// Returns [`ArcError::Validation`] naming the first problem found.
    pub fn from_json_value(value: Value) -> Result<Self, ArcError> {
        let Value::Object(object) = value else {
            return Err(ArcError::validation("Record must be a JSON object"));
        };

        let id = required_str(&object, "id")?;
        if id.trim().is_empty() {
            return Err(ArcError::validation("Field id cannot be empty"));
        }
        let raw_kind = required_str(&object, "type")?;
        let kind = Kind::parse(&raw_kind)
            .ok_or_else(|| ArcError::validation(format!("Invalid type: {raw_kind}")))?;
        let title = required_str(&object, "title")?;
        let raw_status = required_str(&object, "status")?;
        let status = Status::parse(&raw_status)
            .ok_or_else(|| ArcError::validation(format!("Invalid status: {raw_status}")))?;

        let kind = match kind {
            Kind::Outcome => ItemKind::Outcome,
            Kind::Action => ItemKind::Action(ActionState {
                parent: optional_str(&object, "parent")?.map(ItemId::new),
                waiting_for: optional_str(&object, "waiting_for")?,
                tactical: decode_tactical(&object)?,
            }),
        };

        let extra = object
            .iter()
            .filter(|(key, _)| !KNOWN_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            id: ItemId::new(id),
            title,
            brief: decode_brief(&object)?,
            status,
            order: decode_order(&object)?,
            created_at: optional_str(&object, "created_at")?,
            created_by: optional_str(&object, "created_by")?,
            done_at: optional_str(&object, "done_at")?,
            archived_at: optional_str(&object, "archived_at")?,
            kind,
            extra,
        })
    }

    /// # Errors
    /// Returns [`ArcError::Validation`] for malformed JSON or a record that
    /// fails lenient validation.
    pub fn from_json_line(line: &str) -> Result<Self, ArcError> {
        let value: Value = serde_json::from_str(line)
            .map_err(|err| ArcError::validation(format!("Invalid JSON: {err}")))?;
        Self::from_json_value(value)
    }

    /// Encodes the record with known fields first. Actions always carry
    /// `parent` and `waiting_for` (null when unset); optional fields that are
    /// unset are omitted.
    ///
    /// # Errors
    /// Returns [`ArcError::Validation`] if a nested value cannot be encoded.
    pub fn to_json_value(&self) -> Result<Value, ArcError> {
        let mut object = Map::new();
        object.insert("id".to_string(), Value::from(self.id.as_str()));
        object.insert("type".to_string(), Value::from(self.kind().as_str()));
        object.insert("title".to_string(), Value::from(self.title.as_str()));
        if let Some(brief) = &self.brief {
            let brief = serde_json::to_value(brief)
                .map_err(|err| ArcError::validation(format!("Cannot encode brief: {err}")))?;
            object.insert("brief".to_string(), brief);
        }
        object.insert("status".to_string(), Value::from(self.status.as_str()));
        if let Some(state) = self.action() {
            object.insert(
                "parent".to_string(),
                state
                    .parent
                    .as_ref()
                    .map_or(Value::Null, |parent| Value::from(parent.as_str())),
            );
        }
        object.insert("order".to_string(), Value::from(self.order));
        for (field, value) in [("created_at", &self.created_at), ("created_by", &self.created_by)] {
            if let Some(value) = value {
                object.insert(field.to_string(), Value::from(value.as_str()));
            }
        }
        if let Some(state) = self.action() {
            object.insert(
                "waiting_for".to_string(),
                state
                    .waiting_for
                    .as_deref()
                    .map_or(Value::Null, Value::from),
            );
        }
        for (field, value) in [("done_at", &self.done_at), ("archived_at", &self.archived_at)] {
            if let Some(value) = value {
                object.insert(field.to_string(), Value::from(value.as_str()));
            }
        }
        if let Some(tactical) = self.tactical() {
            let tactical = serde_json::to_value(tactical)
                .map_err(|err| ArcError::validation(format!("Cannot encode tactical: {err}")))?;
            object.insert("tactical".to_string(), tactical);
        }
        for (key, value) in &self.extra {
            object.insert(key.clone(), value.clone());
        }
        Ok(Value::Object(object))
    }

    /// # Errors
    /// See [`Item::to_json_value`].
    pub fn to_json_line(&self) -> Result<String, ArcError> {
        let value = self.to_json_value()?;
        serde_json::to_string(&value)
            .map_err(|err| ArcError::validation(format!("Cannot encode {}: {err}", self.id)))
    }
}
