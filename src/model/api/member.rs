use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::member::Member, mongodb::Id};

/// Directory entries by ID, as resolved for one response.
pub type Profiles = HashMap<Id, Member>;

/// A member's public profile, as shown next to their candidacy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberProfile {
    pub id: ApiId,
    pub name: String,
    pub profile_img: String,
    pub position: String,
    pub departments: Vec<ApiId>,
}

impl From<&Member> for MemberProfile {
    fn from(member: &Member) -> Self {
        Self {
            id: member.id.into(),
            name: format!("{} {}", member.first_name, member.last_name),
            profile_img: member.profile_img.clone(),
            position: member.position.clone(),
            departments: member.departments.iter().copied().map(ApiId::from).collect(),
        }
    }
}

impl MemberProfile {
    /// Look up the profile for `id`; members since removed from the directory
    /// have none.
    pub fn lookup(profiles: &Profiles, id: Id) -> Option<Self> {
        profiles.get(&id).map(Self::from)
    }
}
