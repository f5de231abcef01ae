use serde_json::Map;
use time::OffsetDateTime;

use crate::item::{ActionState, Brief, Item, ItemId, ItemKind, Status};
use crate::parse_rfc3339_utc;

pub(crate) fn must_ok<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("expected Ok(..), got error: {err}"),
    }
}

pub(crate) fn must_err<T, E>(result: Result<T, E>) -> E {
    match result {
        Ok(_) => panic!("expected Err(..), got Ok(..)"),
        Err(err) => err,
    }
}

pub(crate) fn must_some<T>(value: Option<T>) -> T {
    match value {
        Some(inner) => inner,
        None => panic!("expected Some(..), got None"),
    }
}

pub(crate) fn fixed_now() -> OffsetDateTime {
    must_ok(parse_rfc3339_utc("2026-02-07T12:00:00Z"))
}

pub(crate) fn brief() -> Brief {
    Brief {
        why: "Users are blocked".to_string(),
        what: "Do the work".to_string(),
        done: "It works".to_string(),
    }
}

fn base(id: &str, order: u32, kind: ItemKind) -> Item {
    Item {
        id: ItemId::new(id),
        title: format!("Title of {id}"),
        brief: Some(brief()),
        status: Status::Open,
        order,
        created_at: Some("2026-02-01T09:00:00Z".to_string()),
        created_by: Some("tester".to_string()),
        done_at: None,
        archived_at: None,
        kind,
        extra: Map::new(),
    }
}

pub(crate) fn outcome(id: &str, order: u32) -> Item {
    base(id, order, ItemKind::Outcome)
}

pub(crate) fn action(id: &str, parent: Option<&str>, order: u32) -> Item {
    base(
        id,
        order,
        ItemKind::Action(ActionState {
            parent: parent.map(ItemId::new),
            ..ActionState::default()
        }),
    )
}
