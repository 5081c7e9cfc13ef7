//! Request bodies of the document protocol.
//!
//! Each command line is `<COMMAND> <json>`. Collection names and ids travel as
//! JSON strings inside the body, so spaces and newlines in them cannot split or
//! inject commands.

use serde::{Deserialize, Serialize};

use crate::model::Fields;

/// Body of `ADD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddRequest {
    pub collection: String,
    pub data: Fields,
}

/// Body of `UPDATE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRequest {
    pub collection: String,
    pub id: String,
    pub data: Fields,
}

/// Body of `DEL`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteRequest {
    pub collection: String,
    pub id: String,
}
