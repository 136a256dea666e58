use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::db::models::{ChannelRow, ServerRow};

/// The authenticated caller of a listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
}

/// Listing failures, surfaced to the caller with their message text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ListingError {
    #[error("You must be logged in to view this content.")]
    AuthenticationRequired,

    #[error("{0}")]
    InvalidInput(String),
}

/// A server with everything the listing needs: its category name, member
/// set and channels.
#[derive(Debug, Clone)]
pub struct ServerRecord {
    pub server: ServerRow,
    pub category_name: String,
    pub member_ids: Vec<i64>,
    pub channels: Vec<ChannelRow>,
}

/// Listing directives parsed from a query string.
///
/// Boolean directives are set only by the literal `"true"`. Empty values are
/// treated as absent. `qty` and `by_server_id` keep their raw text; they are
/// coerced at the step that uses them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListDirectives {
    pub category: Option<String>,
    pub with_num_members: bool,
    pub by_user: bool,
    pub by_owner: bool,
    pub qty: Option<String>,
    pub by_server_id: Option<String>,
}

impl ListDirectives {
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        let text = |key: &str| params.get(key).filter(|v| !v.is_empty()).cloned();
        let flag = |key: &str| params.get(key).is_some_and(|v| v == "true");

        Self {
            category: text("category"),
            with_num_members: flag("with_num_members"),
            by_user: flag("by_user"),
            by_owner: flag("by_owner"),
            qty: text("qty"),
            by_server_id: text("by_serverid"),
        }
    }
}

/// One server in a listing response. `num_members` is omitted from the
/// serialized form unless the member count was requested.
#[derive(Debug, Clone, Serialize)]
pub struct ServerListing {
    pub id: i64,
    pub name: String,
    pub owner: i64,
    pub category: i64,
    pub description: Option<String>,
    pub member: Vec<i64>,
    #[serde(rename = "channel_server")]
    pub channels: Vec<ChannelRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_members: Option<i64>,
}

struct Candidate {
    record: ServerRecord,
    num_members: Option<i64>,
}

/// Compose a server listing from `base` by applying each directive in turn.
///
/// The order is fixed: category, member count, membership, ownership,
/// quantity, server id. Every step receives the set left by the previous one.
pub fn compose(
    base: Vec<ServerRecord>,
    directives: &ListDirectives,
    principal: Option<Principal>,
) -> Result<Vec<ServerListing>, ListingError> {
    let candidates = base
        .into_iter()
        .map(|record| Candidate {
            record,
            num_members: None,
        })
        .collect();

    let candidates = filter_category(candidates, directives.category.as_deref());
    let candidates = annotate_num_members(candidates, directives.with_num_members);
    let candidates = filter_by_user(candidates, directives.by_user, principal)?;
    let candidates = filter_by_owner(candidates, directives.by_owner, principal)?;
    let candidates = truncate(candidates, directives.qty.as_deref())?;
    let candidates = filter_server_id(candidates, directives.by_server_id.as_deref(), principal)?;

    Ok(candidates
        .into_iter()
        .map(|c| into_listing(c, directives.with_num_members))
        .collect())
}

fn filter_category(candidates: Vec<Candidate>, category: Option<&str>) -> Vec<Candidate> {
    let Some(category) = category else {
        return candidates;
    };
    candidates
        .into_iter()
        .filter(|c| c.record.category_name == category)
        .collect()
}

/// Counted over the full member set; later identity filters do not change it.
fn annotate_num_members(candidates: Vec<Candidate>, enabled: bool) -> Vec<Candidate> {
    if !enabled {
        return candidates;
    }
    candidates
        .into_iter()
        .map(|c| Candidate {
            num_members: Some(c.record.member_ids.len() as i64),
            record: c.record,
        })
        .collect()
}

fn require(principal: Option<Principal>) -> Result<Principal, ListingError> {
    principal.ok_or(ListingError::AuthenticationRequired)
}

fn filter_by_user(
    candidates: Vec<Candidate>,
    enabled: bool,
    principal: Option<Principal>,
) -> Result<Vec<Candidate>, ListingError> {
    if !enabled {
        return Ok(candidates);
    }
    let user = require(principal)?;
    Ok(candidates
        .into_iter()
        .filter(|c| c.record.member_ids.contains(&user.user_id))
        .collect())
}

fn filter_by_owner(
    candidates: Vec<Candidate>,
    enabled: bool,
    principal: Option<Principal>,
) -> Result<Vec<Candidate>, ListingError> {
    if !enabled {
        return Ok(candidates);
    }
    let user = require(principal)?;
    Ok(candidates
        .into_iter()
        .filter(|c| c.record.server.owner_id == user.user_id)
        .collect())
}

fn truncate(candidates: Vec<Candidate>, qty: Option<&str>) -> Result<Vec<Candidate>, ListingError> {
    let Some(raw) = qty else {
        return Ok(candidates);
    };
    let qty: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ListingError::InvalidInput(format!("qty must be an integer, got {raw}")))?;

    let keep = usize::try_from(qty).unwrap_or(0);
    Ok(candidates.into_iter().take(keep).collect())
}

fn filter_server_id(
    candidates: Vec<Candidate>,
    server_id: Option<&str>,
    principal: Option<Principal>,
) -> Result<Vec<Candidate>, ListingError> {
    let Some(raw) = server_id else {
        return Ok(candidates);
    };
    require(principal)?;

    let not_found = || ListingError::InvalidInput(format!("Server with id {raw} does not exist."));
    let id: i64 = raw.trim().parse().map_err(|_| not_found())?;

    let matched: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| c.record.server.id == id)
        .collect();
    if matched.is_empty() {
        return Err(not_found());
    }
    Ok(matched)
}

fn into_listing(candidate: Candidate, with_num_members: bool) -> ServerListing {
    let Candidate {
        record,
        num_members,
    } = candidate;
    ServerListing {
        id: record.server.id,
        name: record.server.name,
        owner: record.server.owner_id,
        category: record.server.category_id,
        description: record.server.description,
        member: record.member_ids,
        channels: record.channels,
        num_members: if with_num_members { num_members } else { None },
    }
}
