use async_trait::async_trait;

use echo_types::{Comment, EntityKind, NewComment, NewPost, NewUser, Post, User};

use super::error::{SeedError, SeedResult};
use crate::db::repositories::{CommentRepository, PostRepository, UserRepository};
use crate::db::DbPool;

/// Persistence services the workers write through
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> SeedResult<User>;
    async fn create_post(&self, post: &NewPost) -> SeedResult<Post>;
    async fn create_comment(&self, comment: &NewComment) -> SeedResult<Comment>;
    async fn count_users(&self) -> SeedResult<i64>;
}

pub struct SqliteEntityStore {
    users: UserRepository,
    posts: PostRepository,
    comments: CommentRepository,
}

impl SqliteEntityStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            posts: PostRepository::new(pool.clone()),
            comments: CommentRepository::new(pool),
        }
    }
}

#[async_trait]
impl EntityStore for SqliteEntityStore {
    async fn create_user(&self, user: &NewUser) -> SeedResult<User> {
        self.users
            .create(user)
            .map_err(|e| SeedError::persistence(EntityKind::User, e))
    }

    async fn create_post(&self, post: &NewPost) -> SeedResult<Post> {
        self.posts
            .create(post)
            .map_err(|e| SeedError::persistence(EntityKind::Post, e))
    }

    async fn create_comment(&self, comment: &NewComment) -> SeedResult<Comment> {
        self.comments
            .create(comment)
            .map_err(|e| SeedError::persistence(EntityKind::Comment, e))
    }

    async fn count_users(&self) -> SeedResult<i64> {
        self.users
            .count()
            .map_err(|e| SeedError::persistence(EntityKind::User, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::fixtures::{sample_new_post, sample_new_user};
    use crate::db::Database;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_duplicate_user_is_a_persistence_error() {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");
        let store = SqliteEntityStore::new(db.pool);

        store.create_user(&sample_new_user(1)).await.expect("First create failed");
        let result = store.create_user(&sample_new_user(1)).await;

        assert!(matches!(
            result,
            Err(SeedError::Persistence {
                entity: EntityKind::User,
                ..
            })
        ));
        assert_eq!(store.count_users().await.expect("Count failed"), 1);
    }

    #[tokio::test]
    async fn test_post_for_missing_user_is_rejected() {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");
        let store = SqliteEntityStore::new(db.pool);

        let result = store.create_post(&sample_new_post(1, Uuid::new_v4())).await;
        assert!(matches!(
            result,
            Err(SeedError::Persistence {
                entity: EntityKind::Post,
                ..
            })
        ));
    }
}
