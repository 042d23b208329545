use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::OptionalExtension;
use uuid::Uuid;

use echo_types::{Comment, NewComment};

use super::{page_offset, timestamp_column, uuid_column, PAGE_SIZE};
use crate::db::DbPool;

pub struct CommentRepository {
    pool: DbPool,
}

impl CommentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
        Ok(Comment {
            id: uuid_column(row, 0)?,
            seed_index: row.get(1)?,
            post_id: uuid_column(row, 2)?,
            name: row.get(3)?,
            email: row.get(4)?,
            body: row.get(5)?,
            created_at: timestamp_column(row, 6)?,
        })
    }

    pub fn create(&self, new_comment: &NewComment) -> Result<Comment> {
        let comment = Comment {
            id: Uuid::new_v4(),
            seed_index: new_comment.seed_index,
            post_id: new_comment.post_id,
            name: new_comment.name.clone(),
            email: new_comment.email.clone(),
            body: new_comment.body.clone(),
            created_at: Utc::now(),
        };

        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO comments (id, seed_index, post_id, name, email, body, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            (
                comment.id.to_string(),
                comment.seed_index,
                comment.post_id.to_string(),
                &comment.name,
                &comment.email,
                &comment.body,
                comment.created_at.to_rfc3339(),
            ),
        )
        .with_context(|| format!("Failed to create comment on post {}", comment.post_id))?;

        Ok(comment)
    }

    pub fn get_by_id(&self, comment_id: &Uuid) -> Result<Option<Comment>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, seed_index, post_id, name, email, body, created_at FROM comments WHERE id = ?",
        )?;
        let comment = stmt
            .query_row([comment_id.to_string()], Self::map_row)
            .optional()?;
        Ok(comment)
    }

    /// Get one page of comments on a post
    pub fn list_by_post(&self, post_id: &Uuid, page: u32) -> Result<Vec<Comment>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, seed_index, post_id, name, email, body, created_at
             FROM comments
             WHERE post_id = ?
             ORDER BY seed_index ASC
             LIMIT ? OFFSET ?",
        )?;

        let comments = stmt
            .query_map((post_id.to_string(), PAGE_SIZE, page_offset(page)), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(comments)
    }

    pub fn count(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_by_post(&self, post_id: &Uuid) -> Result<i64> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM comments WHERE post_id = ?",
            [post_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::fixtures::{sample_new_comment, sample_new_post, sample_new_user};
    use crate::db::repositories::{PostRepository, UserRepository};
    use crate::db::Database;

    #[test]
    fn test_comments_paged_per_post() {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");
        let user = UserRepository::new(db.pool.clone())
            .create(&sample_new_user(1))
            .expect("Failed to create user");
        let post = PostRepository::new(db.pool.clone())
            .create(&sample_new_post(1, user.id))
            .expect("Failed to create post");
        let repo = CommentRepository::new(db.pool);

        for n in 1..=15 {
            repo.create(&sample_new_comment(n, post.id))
                .expect("Failed to create comment");
        }

        assert_eq!(repo.count_by_post(&post.id).expect("Failed to count"), 15);
        assert_eq!(repo.list_by_post(&post.id, 1).expect("Failed to list").len(), 10);

        let second = repo.list_by_post(&post.id, 2).expect("Failed to list");
        assert_eq!(second.len(), 5);
        assert_eq!(second[0].email, "Eliseo_11@gardner.biz");

        let fetched = repo
            .get_by_id(&second[0].id)
            .expect("Failed to fetch comment")
            .expect("Comment should exist");
        assert_eq!(fetched.post_id, post.id);
    }
}
