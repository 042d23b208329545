use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::OptionalExtension;
use uuid::Uuid;

use echo_types::{NewPost, Post};

use super::{page_offset, timestamp_column, uuid_column, PAGE_SIZE};
use crate::db::DbPool;

pub struct PostRepository {
    pool: DbPool,
}

impl PostRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
        Ok(Post {
            id: uuid_column(row, 0)?,
            seed_index: row.get(1)?,
            user_id: uuid_column(row, 2)?,
            title: row.get(3)?,
            body: row.get(4)?,
            created_at: timestamp_column(row, 5)?,
        })
    }

    /// Create a new post for an existing user
    pub fn create(&self, new_post: &NewPost) -> Result<Post> {
        let post = Post {
            id: Uuid::new_v4(),
            seed_index: new_post.seed_index,
            user_id: new_post.user_id,
            title: new_post.title.clone(),
            body: new_post.body.clone(),
            created_at: Utc::now(),
        };

        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO posts (id, seed_index, user_id, title, body, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                post.id.to_string(),
                post.seed_index,
                post.user_id.to_string(),
                &post.title,
                &post.body,
                post.created_at.to_rfc3339(),
            ),
        )
        .with_context(|| format!("Failed to create post for user {}", post.user_id))?;

        Ok(post)
    }

    /// Get a single post by ID
    pub fn get_by_id(&self, post_id: &Uuid) -> Result<Option<Post>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, seed_index, user_id, title, body, created_at FROM posts WHERE id = ?",
        )?;
        let post = stmt
            .query_row([post_id.to_string()], Self::map_row)
            .optional()?;
        Ok(post)
    }

    /// Get one page of posts across all users
    pub fn list(&self, page: u32) -> Result<Vec<Post>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, seed_index, user_id, title, body, created_at
             FROM posts
             ORDER BY seed_index ASC
             LIMIT ? OFFSET ?",
        )?;

        let posts = stmt
            .query_map((PAGE_SIZE, page_offset(page)), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(posts)
    }

    /// Get all posts written by a user
    pub fn get_by_user(&self, user_id: &Uuid) -> Result<Vec<Post>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, seed_index, user_id, title, body, created_at
             FROM posts
             WHERE user_id = ?
             ORDER BY seed_index ASC",
        )?;

        let posts = stmt
            .query_map([user_id.to_string()], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(posts)
    }

    pub fn count(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::fixtures::{sample_new_post, sample_new_user};
    use crate::db::repositories::UserRepository;
    use crate::db::Database;

    #[test]
    fn test_posts_reference_their_user() {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");
        let user = UserRepository::new(db.pool.clone())
            .create(&sample_new_user(1))
            .expect("Failed to create user");
        let repo = PostRepository::new(db.pool);

        for n in 1..=3 {
            repo.create(&sample_new_post(n, user.id)).expect("Failed to create post");
        }

        let posts = repo.get_by_user(&user.id).expect("Failed to list posts");
        assert_eq!(posts.len(), 3);
        assert!(posts.iter().all(|p| p.user_id == user.id));
        assert_eq!(posts[2].title, "sunt aut facere_3");
        assert_eq!(repo.count().expect("Failed to count posts"), 3);
    }

    #[test]
    fn test_post_for_unknown_user_fails() {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");
        let repo = PostRepository::new(db.pool);

        assert!(repo.create(&sample_new_post(1, Uuid::new_v4())).is_err());
        assert_eq!(repo.count().expect("Failed to count posts"), 0);
    }
}
