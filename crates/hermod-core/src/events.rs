//! Domain event kinds.
//!
//! The set is closed: subscriber records referencing an unknown kind are
//! rejected at validation time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HermodError;

/// A domain event kind, serialized in SCREAMING_SNAKE_CASE on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    ApplicationStartup,
    InstanceCreate,
    InstanceDelete,
    QrcodeUpdated,
    MessagesSet,
    MessagesUpsert,
    MessagesEdited,
    MessagesUpdate,
    MessagesDelete,
    SendMessage,
    SendMessageUpdate,
    ContactsSet,
    ContactsUpdate,
    ContactsUpsert,
    PresenceUpdate,
    ChatsSet,
    ChatsUpdate,
    ChatsDelete,
    ChatsUpsert,
    ConnectionUpdate,
    LabelsEdit,
    LabelsAssociation,
    GroupsUpsert,
    GroupUpdate,
    GroupParticipantsUpdate,
    Call,
    TypebotStart,
    TypebotChangeStatus,
    Errors,
}

impl EventKind {
    /// Every kind in the closed set, in declaration order.
    pub const ALL: [EventKind; 29] = [
        EventKind::ApplicationStartup,
        EventKind::InstanceCreate,
        EventKind::InstanceDelete,
        EventKind::QrcodeUpdated,
        EventKind::MessagesSet,
        EventKind::MessagesUpsert,
        EventKind::MessagesEdited,
        EventKind::MessagesUpdate,
        EventKind::MessagesDelete,
        EventKind::SendMessage,
        EventKind::SendMessageUpdate,
        EventKind::ContactsSet,
        EventKind::ContactsUpdate,
        EventKind::ContactsUpsert,
        EventKind::PresenceUpdate,
        EventKind::ChatsSet,
        EventKind::ChatsUpdate,
        EventKind::ChatsDelete,
        EventKind::ChatsUpsert,
        EventKind::ConnectionUpdate,
        EventKind::LabelsEdit,
        EventKind::LabelsAssociation,
        EventKind::GroupsUpsert,
        EventKind::GroupUpdate,
        EventKind::GroupParticipantsUpdate,
        EventKind::Call,
        EventKind::TypebotStart,
        EventKind::TypebotChangeStatus,
        EventKind::Errors,
    ];

    /// Wire name, e.g. `MESSAGES_UPSERT`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ApplicationStartup => "APPLICATION_STARTUP",
            EventKind::InstanceCreate => "INSTANCE_CREATE",
            EventKind::InstanceDelete => "INSTANCE_DELETE",
            EventKind::QrcodeUpdated => "QRCODE_UPDATED",
            EventKind::MessagesSet => "MESSAGES_SET",
            EventKind::MessagesUpsert => "MESSAGES_UPSERT",
            EventKind::MessagesEdited => "MESSAGES_EDITED",
            EventKind::MessagesUpdate => "MESSAGES_UPDATE",
            EventKind::MessagesDelete => "MESSAGES_DELETE",
            EventKind::SendMessage => "SEND_MESSAGE",
            EventKind::SendMessageUpdate => "SEND_MESSAGE_UPDATE",
            EventKind::ContactsSet => "CONTACTS_SET",
            EventKind::ContactsUpdate => "CONTACTS_UPDATE",
            EventKind::ContactsUpsert => "CONTACTS_UPSERT",
            EventKind::PresenceUpdate => "PRESENCE_UPDATE",
            EventKind::ChatsSet => "CHATS_SET",
            EventKind::ChatsUpdate => "CHATS_UPDATE",
            EventKind::ChatsDelete => "CHATS_DELETE",
            EventKind::ChatsUpsert => "CHATS_UPSERT",
            EventKind::ConnectionUpdate => "CONNECTION_UPDATE",
            EventKind::LabelsEdit => "LABELS_EDIT",
            EventKind::LabelsAssociation => "LABELS_ASSOCIATION",
            EventKind::GroupsUpsert => "GROUPS_UPSERT",
            EventKind::GroupUpdate => "GROUP_UPDATE",
            EventKind::GroupParticipantsUpdate => "GROUP_PARTICIPANTS_UPDATE",
            EventKind::Call => "CALL",
            EventKind::TypebotStart => "TYPEBOT_START",
            EventKind::TypebotChangeStatus => "TYPEBOT_CHANGE_STATUS",
            EventKind::Errors => "ERRORS",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = HermodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or_else(|| HermodError::validation(format!("unknown event kind: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&EventKind::MessagesUpsert).unwrap();
        assert_eq!(json, "\"MESSAGES_UPSERT\"");

        let kind: EventKind = serde_json::from_str("\"QRCODE_UPDATED\"").unwrap();
        assert_eq!(kind, EventKind::QrcodeUpdated);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!("MESSAGES_EXPLODED".parse::<EventKind>().is_err());
    }
}
