use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Database,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::mongodb::{Coll, Id};

use super::{
    base::{Election, NewElection},
    store::{conditional_filter, BallotStore, ElectionQuery, Mutation, Precondition},
};

/// A [`BallotStore`] over the `elections` collection.
///
/// Each conditional write is a single `findOneAndUpdate` whose filter carries
/// every precondition, so the server checks and applies it atomically.
#[derive(Clone)]
pub struct MongoStore {
    elections: Coll<Election>,
    new_elections: Coll<NewElection>,
}

impl MongoStore {
    pub fn new(db: &Database) -> Self {
        Self {
            elections: Coll::from_db(db),
            new_elections: Coll::from_db(db),
        }
    }
}

#[rocket::async_trait]
impl BallotStore for MongoStore {
    async fn insert(&self, election: NewElection) -> Result<Election> {
        let id: Id = self
            .new_elections
            .insert_one(&election, None)
            .await?
            .inserted_id
            .as_object_id()
            .ok_or_else(|| {
                Error::InvariantViolation("inserted election has a non-ObjectId key".to_string())
            })?
            .into();
        Ok(Election { id, election })
    }

    async fn find_by_id(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.elections.find_one(id.as_doc(), None).await?)
    }

    async fn find(&self, query: ElectionQuery) -> Result<Vec<Election>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        let elections = self
            .elections
            .find(query.to_filter(), options)
            .await?
            .try_collect()
            .await?;
        Ok(elections)
    }

    async fn find_one_and_update(
        &self,
        id: Id,
        preconditions: &[Precondition],
        mutation: &Mutation,
    ) -> Result<Option<Election>> {
        let filter = conditional_filter(id, preconditions);
        let (update, array_filters) = mutation.to_update();
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .array_filters(array_filters)
            .build();
        let updated = self
            .elections
            .find_one_and_update(filter, update, options)
            .await?;
        Ok(updated)
    }

    async fn delete_if(&self, id: Id, preconditions: &[Precondition]) -> Result<bool> {
        let filter = conditional_filter(id, preconditions);
        let result = self.elections.delete_one(filter, None).await?;
        Ok(result.deleted_count == 1)
    }
}
