use dstore_types::{
    BindingKey, CallbackKey, GetBindingForRemoveResults, GetBindingForUpdateResults,
    GetBindingResults, GetObjectForUpdateResults, GetObjectResults, NextBoundNameResults,
    NextObjectResults, NodeId, RegisterNodeResult, ReleaseKind,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// A message that can be framed by [`DstoreCodec`](crate::DstoreCodec).
pub trait Message: Serialize + DeserializeOwned + Send {
    fn type_tag(&self) -> u8;
    fn type_name(&self) -> &'static str;
}

/// Node-to-server requests, one per directory operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// `callback_addr` is where the server will dial to deliver callbacks.
    RegisterNode { callback_addr: String },
    NewObjectIds { count: i32 },
    GetObject { node_id: NodeId, oid: i64 },
    GetObjectForUpdate { node_id: NodeId, oid: i64 },
    UpgradeObject { node_id: NodeId, oid: i64 },
    NextObjectId { node_id: NodeId, oid: i64 },
    GetBinding { node_id: NodeId, name: String },
    GetBindingForUpdate { node_id: NodeId, name: String },
    GetBindingForRemove { node_id: NodeId, name: String },
    NextBoundName { node_id: NodeId, name: Option<String> },
    GetClassId { class_info: Vec<u8> },
    GetClassInfo { class_id: i32 },
    ReleaseObject { node_id: NodeId, oid: i64 },
    ReleaseBinding { node_id: NodeId, key: BindingKey },
}

/// Server replies. Every request gets exactly one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Registered(RegisterNodeResult),
    ObjectIds { first: i64 },
    Object(Option<GetObjectResults>),
    ObjectForUpdate(Option<GetObjectForUpdateResults>),
    Upgraded { callback_downgrade: bool },
    NextObject(Option<NextObjectResults>),
    Binding(GetBindingResults),
    BindingForUpdate(GetBindingForUpdateResults),
    BindingForRemove(GetBindingForRemoveResults),
    NextBoundName(NextBoundNameResults),
    ClassId { class_id: i32 },
    ClassInfo { class_info: Option<Vec<u8>> },
    Released { released: bool },
    Error { kind: ErrorKind, message: String },
}

/// Server-to-node release callbacks and their replies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackMessage {
    Release { key: CallbackKey, release: ReleaseKind },
    Ack,
    Refused { reason: String },
}

impl Message for Request {
    fn type_tag(&self) -> u8 {
        match self {
            Self::RegisterNode { .. } => 1,
            Self::NewObjectIds { .. } => 2,
            Self::GetObject { .. } => 3,
            Self::GetObjectForUpdate { .. } => 4,
            Self::UpgradeObject { .. } => 5,
            Self::NextObjectId { .. } => 6,
            Self::GetBinding { .. } => 7,
            Self::GetBindingForUpdate { .. } => 8,
            Self::GetBindingForRemove { .. } => 9,
            Self::NextBoundName { .. } => 10,
            Self::GetClassId { .. } => 11,
            Self::GetClassInfo { .. } => 12,
            Self::ReleaseObject { .. } => 13,
            Self::ReleaseBinding { .. } => 14,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::RegisterNode { .. } => "RegisterNode",
            Self::NewObjectIds { .. } => "NewObjectIds",
            Self::GetObject { .. } => "GetObject",
            Self::GetObjectForUpdate { .. } => "GetObjectForUpdate",
            Self::UpgradeObject { .. } => "UpgradeObject",
            Self::NextObjectId { .. } => "NextObjectId",
            Self::GetBinding { .. } => "GetBinding",
            Self::GetBindingForUpdate { .. } => "GetBindingForUpdate",
            Self::GetBindingForRemove { .. } => "GetBindingForRemove",
            Self::NextBoundName { .. } => "NextBoundName",
            Self::GetClassId { .. } => "GetClassId",
            Self::GetClassInfo { .. } => "GetClassInfo",
            Self::ReleaseObject { .. } => "ReleaseObject",
            Self::ReleaseBinding { .. } => "ReleaseBinding",
        }
    }
}

impl Message for Response {
    fn type_tag(&self) -> u8 {
        match self {
            Self::Registered(_) => 101,
            Self::ObjectIds { .. } => 102,
            Self::Object(_) => 103,
            Self::ObjectForUpdate(_) => 104,
            Self::Upgraded { .. } => 105,
            Self::NextObject(_) => 106,
            Self::Binding(_) => 107,
            Self::BindingForUpdate(_) => 108,
            Self::BindingForRemove(_) => 109,
            Self::NextBoundName(_) => 110,
            Self::ClassId { .. } => 111,
            Self::ClassInfo { .. } => 112,
            Self::Released { .. } => 113,
            Self::Error { .. } => 255,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Registered(_) => "Registered",
            Self::ObjectIds { .. } => "ObjectIds",
            Self::Object(_) => "Object",
            Self::ObjectForUpdate(_) => "ObjectForUpdate",
            Self::Upgraded { .. } => "Upgraded",
            Self::NextObject(_) => "NextObject",
            Self::Binding(_) => "Binding",
            Self::BindingForUpdate(_) => "BindingForUpdate",
            Self::BindingForRemove(_) => "BindingForRemove",
            Self::NextBoundName(_) => "NextBoundName",
            Self::ClassId { .. } => "ClassId",
            Self::ClassInfo { .. } => "ClassInfo",
            Self::Released { .. } => "Released",
            Self::Error { .. } => "Error",
        }
    }
}

impl Message for CallbackMessage {
    fn type_tag(&self) -> u8 {
        match self {
            Self::Release { .. } => 201,
            Self::Ack => 202,
            Self::Refused { .. } => 203,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Release { .. } => "Release",
            Self::Ack => "Ack",
            Self::Refused { .. } => "Refused",
        }
    }
}
