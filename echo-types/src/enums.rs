use serde::{Deserialize, Serialize};

/// The three seeded entity types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    User,
    Post,
    Comment,
}

impl EntityKind {
    /// Key of the uniqueness counter row for this entity
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "User",
            EntityKind::Post => "Post",
            EntityKind::Comment => "Comment",
        }
    }

    /// Collection name used by the sample source and the HTTP routes
    pub fn resource(&self) -> &'static str {
        match self {
            EntityKind::User => "users",
            EntityKind::Post => "posts",
            EntityKind::Comment => "comments",
        }
    }

    pub fn job_kind(&self) -> JobKind {
        match self {
            EntityKind::User => JobKind::UserSeed,
            EntityKind::Post => JobKind::PostSeed,
            EntityKind::Comment => JobKind::CommentSeed,
        }
    }

    /// Accepts either the singular or the collection name, case-insensitive
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" | "users" => Some(EntityKind::User),
            "post" | "posts" => Some(EntityKind::Post),
            "comment" | "comments" => Some(EntityKind::Comment),
            _ => None,
        }
    }
}

/// Job kinds, one per named queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    UserSeed,
    PostSeed,
    CommentSeed,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::UserSeed, JobKind::PostSeed, JobKind::CommentSeed];

    pub fn queue_name(&self) -> &'static str {
        match self {
            JobKind::UserSeed => "user-seed",
            JobKind::PostSeed => "post-seed",
            JobKind::CommentSeed => "comment-seed",
        }
    }

    /// Whether descriptors of this kind carry a parent entity id
    pub fn requires_parent(&self) -> bool {
        !matches!(self, JobKind::UserSeed)
    }

    pub fn parse_queue(s: &str) -> Option<Self> {
        match s {
            "user-seed" => Some(JobKind::UserSeed),
            "post-seed" => Some(JobKind::PostSeed),
            "comment-seed" => Some(JobKind::CommentSeed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_names_round_trip() {
        for kind in JobKind::ALL {
            assert_eq!(JobKind::parse_queue(kind.queue_name()), Some(kind));
        }
        assert_eq!(JobKind::parse_queue("email-seed"), None);
    }

    #[test]
    fn test_each_entity_has_its_own_queue() {
        let kinds = [EntityKind::User, EntityKind::Post, EntityKind::Comment]
            .map(|entity| entity.job_kind());
        assert_eq!(kinds, JobKind::ALL);
    }

    #[test]
    fn test_entity_parse_accepts_collection_names() {
        assert_eq!(EntityKind::parse("Users"), Some(EntityKind::User));
        assert_eq!(EntityKind::parse("post"), Some(EntityKind::Post));
        assert_eq!(EntityKind::parse("COMMENTS"), Some(EntityKind::Comment));
        assert_eq!(EntityKind::parse("likes"), None);
    }

    #[test]
    fn test_only_user_seed_has_no_parent() {
        assert!(!JobKind::UserSeed.requires_parent());
        assert!(JobKind::PostSeed.requires_parent());
        assert!(JobKind::CommentSeed.requires_parent());
    }
}
