use std::collections::HashMap;

use mongodb::{bson::doc, Database};
use rocket::futures::TryStreamExt;

use crate::error::Result;
use crate::model::mongodb::{Coll, Id};

use super::Member;

/// Read access to the membership user directory.
#[rocket::async_trait]
pub trait MemberDirectory: Send + Sync {
    /// Look up the given members. IDs that match nobody are simply absent from
    /// the result; order is not guaranteed.
    async fn resolve_users(&self, ids: &[Id]) -> Result<Vec<Member>>;
}

/// The directory backed by the shared `users` collection.
#[derive(Clone)]
pub struct MongoDirectory {
    users: Coll<Member>,
}

impl MongoDirectory {
    pub fn new(db: &Database) -> Self {
        Self {
            users: Coll::from_db(db),
        }
    }
}

#[rocket::async_trait]
impl MemberDirectory for MongoDirectory {
    async fn resolve_users(&self, ids: &[Id]) -> Result<Vec<Member>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<_> = ids.iter().map(|id| **id).collect();
        let filter = doc! { "_id": { "$in": ids } };
        let members = self.users.find(filter, None).await?.try_collect().await?;
        Ok(members)
    }
}

/// A fixed directory held in memory.
#[derive(Default)]
pub struct MemoryDirectory {
    members: HashMap<Id, Member>,
}

impl MemoryDirectory {
    pub fn new(members: impl IntoIterator<Item = Member>) -> Self {
        Self {
            members: members.into_iter().map(|m| (m.id, m)).collect(),
        }
    }
}

#[rocket::async_trait]
impl MemberDirectory for MemoryDirectory {
    async fn resolve_users(&self, ids: &[Id]) -> Result<Vec<Member>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.members.get(id).cloned())
            .collect())
    }
}
