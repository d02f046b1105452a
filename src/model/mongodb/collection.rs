use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{
    election::{Election, NewElection},
    member::Member,
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Election collections
const ELECTIONS: &str = "elections";
impl MongoCollection for Election {
    const NAME: &'static str = ELECTIONS;
}
impl MongoCollection for NewElection {
    const NAME: &'static str = ELECTIONS;
}

// Member directory, shared with the rest of the membership system.
const USERS: &str = "users";
impl MongoCollection for Member {
    const NAME: &'static str = USERS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let elections = Coll::<Election>::from_db(db);

    // Reconciliation scans for closed, unpublished elections.
    let reconcile_index = IndexModel::builder()
        .keys(doc! {"end_time": 1, "result_published": 1})
        .options(IndexOptions::builder().name("reconcile".to_string()).build())
        .build();
    elections.create_index(reconcile_index, None).await?;

    // Admin listings are newest first.
    let created_index = IndexModel::builder()
        .keys(doc! {"created_at": -1})
        .build();
    elections.create_index(created_index, None).await?;

    Ok(())
}
