use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use echo_types::{Address, Company, EntityKind, Geo, NewComment, NewPost, NewUser};

use super::counter::UniquenessCounter;
use super::error::{SeedError, SeedResult};
use super::job::PAGE_SIZE;
use super::source::{CommentTemplate, PostTemplate, SampleSource, UserTemplate};

/// Turns sample templates into creation payloads whose unique fields carry a
/// freshly reserved seed index.
#[derive(Clone)]
pub struct RecordFactory {
    source: Arc<dyn SampleSource>,
    counter: Arc<dyn UniquenessCounter>,
}

impl RecordFactory {
    pub fn new(source: Arc<dyn SampleSource>, counter: Arc<dyn UniquenessCounter>) -> Self {
        Self { source, counter }
    }

    pub async fn synthesize_users(&self, count: usize) -> SeedResult<Vec<NewUser>> {
        let (base, templates) = self
            .prepare::<UserTemplate>(EntityKind::User, count)
            .await?;

        Ok(templates
            .into_iter()
            .enumerate()
            .map(|(i, template)| user_payload(template, base + i as i64 + 1))
            .collect())
    }

    pub async fn synthesize_posts(&self, count: usize, user_id: Uuid) -> SeedResult<Vec<NewPost>> {
        let (base, templates) = self
            .prepare::<PostTemplate>(EntityKind::Post, count)
            .await?;

        Ok(templates
            .into_iter()
            .enumerate()
            .map(|(i, template)| {
                let n = base + i as i64 + 1;
                NewPost {
                    seed_index: n,
                    user_id,
                    title: suffix(&template.title, n),
                    body: suffix(&template.body, n),
                }
            })
            .collect())
    }

    pub async fn synthesize_comments(
        &self,
        count: usize,
        post_id: Uuid,
    ) -> SeedResult<Vec<NewComment>> {
        let (base, templates) = self
            .prepare::<CommentTemplate>(EntityKind::Comment, count)
            .await?;

        Ok(templates
            .into_iter()
            .enumerate()
            .map(|(i, template)| {
                let n = base + i as i64 + 1;
                NewComment {
                    seed_index: n,
                    post_id,
                    name: suffix(&template.name, n),
                    email: suffix_email(&template.email, n),
                    body: suffix(&template.body, n),
                }
            })
            .collect())
    }

    /// Fetch exactly `count` templates, then reserve their indices.
    ///
    /// Returns the counter value before the reservation together with the
    /// templates. A fetch failure leaves the counter untouched.
    async fn prepare<T: DeserializeOwned>(
        &self,
        entity: EntityKind,
        count: usize,
    ) -> SeedResult<(i64, Vec<T>)> {
        if count == 0 {
            return Ok((0, Vec::new()));
        }

        let templates = self.fetch_templates::<T>(entity, count).await?;
        let base = self.counter.reserve(entity, count as i64).await?;

        debug!(
            entity = entity.as_str(),
            count,
            first = base + 1,
            last = base + count as i64,
            "Reserved seed indices"
        );
        Ok((base, templates))
    }

    async fn fetch_templates<T: DeserializeOwned>(
        &self,
        entity: EntityKind,
        count: usize,
    ) -> SeedResult<Vec<T>> {
        let fetches = count.div_ceil(PAGE_SIZE);
        let mut raw = Vec::with_capacity(fetches * PAGE_SIZE);
        for _ in 0..fetches {
            raw.extend(self.source.fetch_page(entity).await?);
        }

        if raw.len() < count {
            return Err(SeedError::Fetch(format!(
                "sample source returned {} {} templates, {} needed",
                raw.len(),
                entity.resource(),
                count
            )));
        }

        raw.truncate(count);
        raw.into_iter()
            .map(|value| {
                serde_json::from_value(value).map_err(|e| {
                    SeedError::Fetch(format!("malformed {} template: {}", entity.resource(), e))
                })
            })
            .collect()
    }
}

fn user_payload(template: UserTemplate, n: i64) -> NewUser {
    NewUser {
        seed_index: n,
        name: template.name,
        username: suffix(&template.username, n),
        email: suffix_email(&template.email, n),
        phone: suffix_first_token(&template.phone, n),
        website: suffix_host_label(&template.website, n),
        address: Address {
            street: template.address.street,
            suite: template.address.suite,
            city: template.address.city,
            zipcode: template.address.zipcode,
            geo: Geo {
                lat: template.address.geo.lat,
                lng: template.address.geo.lng,
            },
        },
        company: Company {
            name: suffix(&template.company.name, n),
            catch_phrase: suffix(&template.company.catch_phrase, n),
            bs: suffix(&template.company.bs, n),
        },
    }
}

fn suffix(value: &str, n: i64) -> String {
    format!("{}_{}", value, n)
}

/// `local@domain` becomes `local_n@domain`
fn suffix_email(email: &str, n: i64) -> String {
    match email.split_once('@') {
        Some((local, domain)) => format!("{}_{}@{}", local, n, domain),
        None => suffix(email, n),
    }
}

/// Keeps the first whitespace-separated token, dropping extensions like `x56442`
fn suffix_first_token(value: &str, n: i64) -> String {
    suffix(value.split_whitespace().next().unwrap_or(value), n)
}

/// `hildegard.org` becomes `hildegard_n`
fn suffix_host_label(website: &str, n: i64) -> String {
    suffix(website.split('.').next().unwrap_or(website), n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::seeding::counter::SqliteCounter;
    use crate::seeding::source::StaticSampleSource;
    use serde_json::json;

    fn factory_with(source: StaticSampleSource) -> (RecordFactory, Arc<StaticSampleSource>, Arc<SqliteCounter>) {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");
        let source = Arc::new(source);
        let counter = Arc::new(SqliteCounter::new(db.pool));
        (RecordFactory::new(source.clone(), counter.clone()), source, counter)
    }

    fn builtin() -> StaticSampleSource {
        StaticSampleSource::builtin().expect("Built-in pages should parse")
    }

    #[test]
    fn test_field_rewrites() {
        assert_eq!(suffix_email("Sincere@april.biz", 7), "Sincere_7@april.biz");
        assert_eq!(suffix_email("no-at-sign", 7), "no-at-sign_7");
        assert_eq!(suffix_first_token("1-770-736-8031 x56442", 7), "1-770-736-8031_7");
        assert_eq!(suffix_first_token("", 7), "_7");
        assert_eq!(suffix_host_label("hildegard.org", 7), "hildegard_7");
        assert_eq!(suffix_host_label("localhost", 7), "localhost_7");
    }

    #[tokio::test]
    async fn test_users_follow_prior_counter_value() {
        let (factory, _source, counter) = factory_with(builtin());
        counter.reserve(EntityKind::User, 4).await.expect("Reserve failed");

        let users = factory.synthesize_users(3).await.expect("Synthesis failed");

        assert_eq!(users.len(), 3);
        assert_eq!(users[0].seed_index, 5);
        assert_eq!(users[0].username, "Bret_5");
        assert_eq!(users[0].email, "Sincere_5@april.biz");
        assert_eq!(users[0].phone, "1-770-736-8031_5");
        assert_eq!(users[0].website, "hildegard_5");
        assert_eq!(users[0].company.catch_phrase, "Multi-layered client-server neural-net_5");
        assert_eq!(users[0].address.city, "Gwenborough");
        assert_eq!(users[2].seed_index, 7);
        assert_eq!(counter.current(EntityKind::User).expect("Read failed"), 7);
    }

    #[tokio::test]
    async fn test_synthesize_25_issues_3_fetches() {
        let (factory, source, _counter) = factory_with(builtin());
        let post_parent = Uuid::new_v4();

        let comments = factory
            .synthesize_comments(25, post_parent)
            .await
            .expect("Synthesis failed");

        assert_eq!(comments.len(), 25);
        assert_eq!(source.calls(EntityKind::Comment), 3);
        assert!(comments.iter().all(|c| c.post_id == post_parent));

        let indices: Vec<i64> = comments.iter().map(|c| c.seed_index).collect();
        assert_eq!(indices, (1..=25).collect::<Vec<_>>());
        // Templates repeat across pages but the suffixed emails never do
        assert_eq!(comments[0].email, "Eliseo_1@gardner.biz");
        assert_eq!(comments[10].email, "Eliseo_11@gardner.biz");
    }

    #[tokio::test]
    async fn test_posts_carry_parent_and_suffixes() {
        let (factory, _source, _counter) = factory_with(builtin());
        let user_id = Uuid::new_v4();

        let posts = factory.synthesize_posts(10, user_id).await.expect("Synthesis failed");
        assert_eq!(posts.len(), 10);
        assert_eq!(posts[1].title, "qui est esse_2");
        assert!(posts[1].body.ends_with("_2"));
        assert!(posts.iter().all(|p| p.user_id == user_id));
    }

    #[tokio::test]
    async fn test_fetch_failure_reserves_nothing() {
        let (factory, _source, counter) = factory_with(builtin().failing());

        let result = factory.synthesize_users(10).await;
        assert!(matches!(result, Err(SeedError::Fetch(_))));
        assert_eq!(counter.current(EntityKind::User).expect("Read failed"), 0);
    }

    #[tokio::test]
    async fn test_short_source_is_a_fetch_error() {
        let page = vec![json!({"title": "only", "body": "one"})];
        let (factory, source, counter) =
            factory_with(StaticSampleSource::empty().with_page(EntityKind::Post, page));

        let result = factory.synthesize_posts(5, Uuid::new_v4()).await;
        assert!(matches!(result, Err(SeedError::Fetch(_))));
        assert_eq!(source.calls(EntityKind::Post), 1);
        assert_eq!(counter.current(EntityKind::Post).expect("Read failed"), 0);
    }

    #[tokio::test]
    async fn test_malformed_template_is_a_fetch_error() {
        let page = vec![json!({"title": "missing body"})];
        let (factory, _source, _counter) =
            factory_with(StaticSampleSource::empty().with_page(EntityKind::Post, page));

        let result = factory.synthesize_posts(1, Uuid::new_v4()).await;
        assert!(matches!(result, Err(SeedError::Fetch(_))));
    }
}
