//! User document schema

use bson::{doc, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::db::mongo::IntoIndexes;

/// Collection name for users
pub const USERS_COLLECTION: &str = "users";

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserDoc {
    /// Application-level identifier (UUID), unique across the collection
    pub id: String,

    pub email: String,

    pub name: String,

    #[serde(default)]
    pub picture: String,

    /// admin, researcher or observer
    #[serde(default)]
    pub role: Role,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub last_login_at: DateTime<Utc>,
}

impl UserDoc {
    /// Create a new user with the default observer role
    pub fn new(id: String, email: String, name: String, picture: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            email,
            name,
            picture,
            role: Role::Observer,
            created_at: now,
            updated_at: now,
            last_login_at: now,
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}
