use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// The profile fields of a member that elections display.
///
/// The `users` collection belongs to the wider membership system, so its
/// fields are camelCase and most of them are ignored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberCore {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub profile_img: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub departments: Vec<Id>,
}

/// A member from the user directory, with their unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub member: MemberCore,
}

impl Deref for Member {
    type Target = MemberCore;

    fn deref(&self) -> &Self::Target {
        &self.member
    }
}
