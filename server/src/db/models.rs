use serde::{Deserialize, Serialize};

use crate::media::attachments::{AttachmentKind, AttachmentSlots, Slot};

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub created_at: String,
}

/// A server category (e.g. "Gaming"), optionally carrying an icon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
}

/// A stored server (community) from the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServerRow {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
    pub category_id: i64,
    pub description: Option<String>,
}

/// A server membership record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServerMemberRow {
    pub server_id: i64,
    pub user_id: i64,
    pub joined_at: String,
}

/// A stored channel from the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChannelRow {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
    pub topic: String,
    pub server_id: i64,
    pub banner: Option<String>,
    pub icon: Option<String>,
    pub created_at: String,
}

/// Parameters for creating a channel (avoids too-many-arguments).
pub struct CreateChannelParams<'a> {
    pub name: &'a str,
    pub owner_id: i64,
    pub topic: &'a str,
    pub server_id: i64,
    pub banner: Option<&'a str>,
    pub icon: Option<&'a str>,
}

impl AttachmentSlots for CategoryRow {
    const SLOTS: &'static [Slot] = &[Slot {
        name: "icon",
        kind: AttachmentKind::CategoryIcon,
    }];

    fn slot_path(&self, name: &str) -> Option<&str> {
        match name {
            "icon" => self.icon.as_deref(),
            _ => None,
        }
    }
}

impl ChannelRow {
    /// The field holding this channel's file of the given kind.
    pub fn slot_mut(&mut self, kind: AttachmentKind) -> Option<&mut Option<String>> {
        match kind {
            AttachmentKind::ServerIcon => Some(&mut self.icon),
            AttachmentKind::ServerBanner => Some(&mut self.banner),
            AttachmentKind::CategoryIcon => None,
        }
    }
}

impl AttachmentSlots for ChannelRow {
    const SLOTS: &'static [Slot] = &[
        Slot {
            name: "icon",
            kind: AttachmentKind::ServerIcon,
        },
        Slot {
            name: "banner",
            kind: AttachmentKind::ServerBanner,
        },
    ];

    fn slot_path(&self, name: &str) -> Option<&str> {
        match name {
            "icon" => self.icon.as_deref(),
            "banner" => self.banner.as_deref(),
            _ => None,
        }
    }
}
