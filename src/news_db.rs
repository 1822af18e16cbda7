use std::{collections::HashMap, path::Path};

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::{
    article::{Article, ArticleDraft, ArticlePatch},
    auth::{self, Role},
    error::{Error, Result},
    partition::Partition,
    store::{PartitionStore, sort_by_recency},
};

/// Keyed by `"<partition>\0<article id>"`, JSON-encoded [`Article`] values.
const ARTICLES: TableDefinition<&str, &[u8]> = TableDefinition::new("articles");
/// Same keys as [`ARTICLES`], valued by per-partition insertion sequence.
/// Breaks ties between articles with equal timestamps.
const ARTICLE_ORDER: TableDefinition<&str, u64> =
    TableDefinition::new("article_order");
/// Keyed by `"<partition>\0<category>"`, valued by insertion sequence.
const CATEGORIES: TableDefinition<&str, u64> =
    TableDefinition::new("categories");
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");
const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

/// A stored admin account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRecord {
    id: String,
    role: Role,
    password_hash: String,
}

/// An admin account as shown to other admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub role: Role,
}

/// Changes to an existing account. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserUpdate {
    pub id: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

/// Everything loaded into one partition by a bulk import.
#[derive(Debug, Clone)]
pub struct PartitionBatch {
    pub partition: Partition,
    pub articles: Vec<Article>,
    pub categories: Vec<String>,
}

/// An account carried over from another installation, password hash and
/// all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedUser {
    pub id: String,
    pub role: Role,
    pub password_hash: String,
}

/// Totals written by [`NewsDb::import`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub articles: usize,
    pub categories: usize,
}

/// The on-disk news store.
///
/// Every read runs in its own read transaction and so sees a consistent
/// snapshot. redb serializes write transactions, so concurrent admins never
/// lose each other's updates.
pub struct NewsDb {
    db: Database,
}

impl NewsDb {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(redb::Error::from)?;

        // Ensure all tables exist by opening them in a write transaction.
        let txn = db.begin_write()?;
        txn.open_table(ARTICLES)?;
        txn.open_table(ARTICLE_ORDER)?;
        txn.open_table(CATEGORIES)?;
        txn.open_table(USERS)?;
        txn.open_table(SETTINGS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    // -- Articles --

    pub fn get_article(
        &self,
        partition: Partition,
        id: &str,
    ) -> Result<Option<Article>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ARTICLES)?;
        let key = record_key(partition, id);
        match table.get(key.as_str())? {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    pub fn create_article(
        &self,
        partition: Partition,
        draft: ArticleDraft,
    ) -> Result<Article> {
        let article = Article::from_draft(draft, Utc::now());
        let bytes = serde_json::to_vec(&article)?;

        let txn = self.db.begin_write()?;
        {
            let categories = txn.open_table(CATEGORIES)?;
            warn_unknown_category(&categories, partition, &article.category)?;

            let key = record_key(partition, &article.id);
            let mut order = txn.open_table(ARTICLE_ORDER)?;
            let next = next_seq(&order, partition)?;
            order.insert(key.as_str(), next)?;

            let mut table = txn.open_table(ARTICLES)?;
            table.insert(key.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;

        tracing::info!(%partition, id = %article.id, "created article");
        Ok(article)
    }

    pub fn update_article(
        &self,
        partition: Partition,
        id: &str,
        patch: ArticlePatch,
    ) -> Result<Article> {
        let key = record_key(partition, id);

        let txn = self.db.begin_write()?;
        let article = {
            let mut table = txn.open_table(ARTICLES)?;
            let mut article: Article = match table.get(key.as_str())? {
                Some(v) => serde_json::from_slice(v.value())?,
                None => {
                    return Err(Error::NotFound {
                        kind: "article",
                        name: id.to_string(),
                    });
                }
            };
            article.apply(patch);

            let categories = txn.open_table(CATEGORIES)?;
            warn_unknown_category(&categories, partition, &article.category)?;

            let bytes = serde_json::to_vec(&article)?;
            table.insert(key.as_str(), bytes.as_slice())?;
            article
        };
        txn.commit()?;

        tracing::info!(%partition, id, "updated article");
        Ok(article)
    }

    /// Delete an article. Returns whether it existed.
    pub fn delete_article(&self, partition: Partition, id: &str) -> Result<bool> {
        let key = record_key(partition, id);
        let txn = self.db.begin_write()?;
        let removed = {
            let mut order = txn.open_table(ARTICLE_ORDER)?;
            order.remove(key.as_str())?;
            let mut table = txn.open_table(ARTICLES)?;
            table.remove(key.as_str())?.is_some()
        };
        txn.commit()?;

        if removed {
            tracing::info!(%partition, id, "deleted article");
        }
        Ok(removed)
    }

    // -- Categories --

    /// Add a category and return the partition's updated category list.
    pub fn add_category(
        &self,
        partition: Partition,
        name: &str,
    ) -> Result<Vec<String>> {
        if name.trim().is_empty() {
            return Err(Error::InvalidCategory(name.to_string()));
        }

        let key = record_key(partition, name);
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(CATEGORIES)?;
            if table.get(key.as_str())?.is_some() {
                return Err(Error::InvalidCategory(name.to_string()));
            }
            let next = next_seq(&table, partition)?;
            table.insert(key.as_str(), next)?;
        }
        txn.commit()?;

        tracing::info!(%partition, category = name, "added category");
        self.list_categories(partition)
    }

    /// Remove a category no article of the partition still uses.
    ///
    /// Removing a category that does not exist is not an error.
    pub fn remove_category(&self, partition: Partition, name: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let articles = txn.open_table(ARTICLES)?;
            for (_, bytes) in partition_articles(&articles, partition)? {
                let article: Article = serde_json::from_slice(&bytes)?;
                if article.category == name {
                    return Err(Error::CategoryInUse(name.to_string()));
                }
            }

            let mut table = txn.open_table(CATEGORIES)?;
            let key = record_key(partition, name);
            table.remove(key.as_str())?;
        }
        txn.commit()?;

        tracing::info!(%partition, category = name, "removed category");
        Ok(())
    }

    // -- Bulk import --

    /// Write every batch in a single transaction. Existing records with the
    /// same keys are overwritten; duplicate categories are skipped.
    pub fn import(&self, batches: &[PartitionBatch]) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();

        let txn = self.db.begin_write()?;
        {
            let mut articles = txn.open_table(ARTICLES)?;
            let mut order = txn.open_table(ARTICLE_ORDER)?;
            let mut categories = txn.open_table(CATEGORIES)?;

            for batch in batches {
                let mut next = next_seq(&categories, batch.partition)?;

                for name in &batch.categories {
                    let key = record_key(batch.partition, name);
                    if name.trim().is_empty()
                        || categories.get(key.as_str())?.is_some()
                    {
                        continue;
                    }
                    categories.insert(key.as_str(), next)?;
                    next += 1;
                    summary.categories += 1;
                }

                // Overwritten articles keep their original position.
                let mut next_article = next_seq(&order, batch.partition)?;
                for article in &batch.articles {
                    let key = record_key(batch.partition, &article.id);
                    if order.get(key.as_str())?.is_none() {
                        order.insert(key.as_str(), next_article)?;
                        next_article += 1;
                    }
                    let bytes = serde_json::to_vec(article)?;
                    articles.insert(key.as_str(), bytes.as_slice())?;
                    summary.articles += 1;
                }
            }
        }
        txn.commit()?;

        Ok(summary)
    }

    // -- Users --

    pub fn add_user(&self, id: &str, password: &str, role: Role) -> Result<()> {
        let record = UserRecord {
            id: id.to_string(),
            role,
            password_hash: auth::hash_password(password)?,
        };
        let bytes = serde_json::to_vec(&record)?;

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(USERS)?;
            if table.get(id)?.is_some() {
                return Err(Error::Conflict {
                    kind: "user",
                    name: id.to_string(),
                });
            }
            table.insert(id, bytes.as_slice())?;
        }
        txn.commit()?;

        tracing::info!(user = id, %role, "added user");
        Ok(())
    }

    /// Rename an account, change its role or reset its password.
    pub fn update_user(
        &self,
        original_id: &str,
        update: UserUpdate,
    ) -> Result<UserSummary> {
        let txn = self.db.begin_write()?;
        let summary = {
            let mut table = txn.open_table(USERS)?;
            let mut record: UserRecord = match table.get(original_id)? {
                Some(v) => serde_json::from_slice(v.value())?,
                None => {
                    return Err(Error::NotFound {
                        kind: "user",
                        name: original_id.to_string(),
                    });
                }
            };

            if let Some(new_id) = update.id.filter(|id| !id.is_empty())
                && new_id != original_id
            {
                if table.get(new_id.as_str())?.is_some() {
                    return Err(Error::Conflict {
                        kind: "user",
                        name: new_id,
                    });
                }
                table.remove(original_id)?;
                record.id = new_id;
            }
            if let Some(role) = update.role {
                record.role = role;
            }
            if let Some(password) = update.password.filter(|p| !p.is_empty()) {
                record.password_hash = auth::hash_password(&password)?;
            }

            let bytes = serde_json::to_vec(&record)?;
            table.insert(record.id.as_str(), bytes.as_slice())?;
            UserSummary {
                id: record.id,
                role: record.role,
            }
        };
        txn.commit()?;

        tracing::info!(user = original_id, "updated user");
        Ok(summary)
    }

    pub fn remove_user(&self, id: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(USERS)?;
            table.remove(id)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    pub fn list_users(&self) -> Result<Vec<UserSummary>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(USERS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (_k, v) = entry?;
            let record: UserRecord = serde_json::from_slice(v.value())?;
            result.push(UserSummary {
                id: record.id,
                role: record.role,
            });
        }
        Ok(result)
    }

    /// Check credentials. Returns the account's role when they match.
    pub fn verify_user(&self, id: &str, password: &str) -> Result<Option<Role>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(USERS)?;
        let Some(v) = table.get(id)? else {
            return Ok(None);
        };
        let record: UserRecord = serde_json::from_slice(v.value())?;
        Ok(auth::verify_password(password, &record.password_hash)
            .then_some(record.role))
    }

    /// Store accounts whose passwords are already bcrypt hashes. Existing
    /// accounts with the same id are replaced.
    pub fn import_users(&self, users: &[ImportedUser]) -> Result<usize> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(USERS)?;
            for user in users {
                let record = UserRecord {
                    id: user.id.clone(),
                    role: user.role,
                    password_hash: user.password_hash.clone(),
                };
                let bytes = serde_json::to_vec(&record)?;
                table.insert(user.id.as_str(), bytes.as_slice())?;
            }
        }
        txn.commit()?;

        tracing::info!(users = users.len(), "imported users");
        Ok(users.len())
    }

    // -- Settings --

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    pub fn remove_setting(&self, key: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(SETTINGS)?;
            table.remove(key)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }
}

impl PartitionStore for NewsDb {
    fn list_articles(&self, partition: Partition) -> Result<Vec<Article>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ARTICLES)?;
        let order: HashMap<String, u64> =
            partition_sequences(&txn.open_table(ARTICLE_ORDER)?, partition)?
                .into_iter()
                .collect();

        let mut entries = Vec::new();
        for (id, bytes) in partition_articles(&table, partition)? {
            let article: Article = serde_json::from_slice(&bytes)?;
            let seq = order.get(&id).copied().unwrap_or(u64::MAX);
            entries.push((seq, article));
        }
        entries.sort_by_key(|(seq, _)| *seq);

        let mut articles: Vec<Article> =
            entries.into_iter().map(|(_, article)| article).collect();
        sort_by_recency(&mut articles);
        Ok(articles)
    }

    fn list_categories(&self, partition: Partition) -> Result<Vec<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(CATEGORIES)?;
        let mut entries = partition_sequences(&table, partition)?;
        entries.sort_by_key(|(_, seq)| *seq);
        Ok(entries.into_iter().map(|(name, _)| name).collect())
    }
}

impl std::fmt::Debug for NewsDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsDb").finish_non_exhaustive()
    }
}

fn record_key(partition: Partition, name: &str) -> String {
    format!("{}\0{}", partition.key(), name)
}

/// Every `(article id, JSON bytes)` stored under `partition`, in key order.
fn partition_articles<T>(
    table: &T,
    partition: Partition,
) -> Result<Vec<(String, Vec<u8>)>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let (start, end) = partition_range(partition);
    let mut result = Vec::new();
    for entry in table.range(start.as_str()..end.as_str())? {
        let (k, v) = entry?;
        result.push((record_name(k.value()), v.value().to_vec()));
    }
    Ok(result)
}

/// Every `(name, sequence)` stored under `partition`, in key order.
fn partition_sequences<T>(
    table: &T,
    partition: Partition,
) -> Result<Vec<(String, u64)>>
where
    T: ReadableTable<&'static str, u64>,
{
    let (start, end) = partition_range(partition);
    let mut result = Vec::new();
    for entry in table.range(start.as_str()..end.as_str())? {
        let (k, v) = entry?;
        result.push((record_name(k.value()), v.value()));
    }
    Ok(result)
}

/// Key bounds covering exactly one partition's records.
fn partition_range(partition: Partition) -> (String, String) {
    (
        format!("{}\0", partition.key()),
        format!("{}\u{1}", partition.key()),
    )
}

fn record_name(key: &str) -> String {
    key.split_once('\0')
        .map_or(key, |(_, name)| name)
        .to_string()
}

fn next_seq<T>(table: &T, partition: Partition) -> Result<u64>
where
    T: ReadableTable<&'static str, u64>,
{
    Ok(partition_sequences(table, partition)?
        .into_iter()
        .map(|(_, seq)| seq + 1)
        .max()
        .unwrap_or(0))
}

fn warn_unknown_category<T>(
    categories: &T,
    partition: Partition,
    category: &str,
) -> Result<()>
where
    T: ReadableTable<&'static str, u64>,
{
    if category.is_empty() {
        return Ok(());
    }
    let key = record_key(partition, category);
    if categories.get(key.as_str())?.is_none() {
        tracing::warn!(
            %partition,
            category,
            "article references a category that does not exist"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::partition::Region;

    const ASIA: Partition = Partition::Region(Region::Asia);
    const EUROPE: Partition = Partition::Region(Region::Europe);

    fn test_db() -> (tempfile::TempDir, NewsDb) {
        let tmp = tempfile::tempdir().unwrap();
        let db = NewsDb::open(&tmp.path().join("news.redb")).unwrap();
        (tmp, db)
    }

    fn draft(heading: &str, category: &str) -> ArticleDraft {
        ArticleDraft {
            heading: heading.to_string(),
            category: category.to_string(),
            content: format!("{heading} in detail."),
            source: Some("Reuters".to_string()),
            ..Default::default()
        }
    }

    fn stored(id: &str, secs: i64) -> Article {
        Article {
            id: id.to_string(),
            heading: id.to_string(),
            category: String::new(),
            content: String::new(),
            source: None,
            website_link: None,
            is_older: false,
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn articles_crud() {
        let (_tmp, db) = test_db();

        let created = db.create_article(ASIA, draft("Monsoon", "")).unwrap();
        assert_eq!(
            db.get_article(ASIA, &created.id).unwrap(),
            Some(created.clone())
        );

        let updated = db
            .update_article(
                ASIA,
                &created.id,
                ArticlePatch {
                    heading: Some("Late monsoon".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.timestamp, created.timestamp);
        assert_eq!(updated.heading, "Late monsoon");
        assert_eq!(db.list_articles(ASIA).unwrap(), vec![updated]);

        assert!(db.delete_article(ASIA, &created.id).unwrap());
        assert!(!db.delete_article(ASIA, &created.id).unwrap());
        assert!(db.list_articles(ASIA).unwrap().is_empty());
    }

    #[test]
    fn update_missing_article_is_not_found() {
        let (_tmp, db) = test_db();

        let err = db
            .update_article(ASIA, "nope", ArticlePatch::default())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "article", .. }));
    }

    #[test]
    fn articles_are_listed_most_recent_first() {
        let (_tmp, db) = test_db();
        db.import(&[PartitionBatch {
            partition: ASIA,
            articles: vec![stored("b", 10), stored("a", 30), stored("c", 20)],
            categories: vec![],
        }])
        .unwrap();

        let ids: Vec<String> =
            db.list_articles(ASIA).unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
    }

    #[test]
    fn equal_timestamps_keep_insertion_order() {
        let (_tmp, db) = test_db();
        db.import(&[PartitionBatch {
            partition: ASIA,
            articles: vec![stored("zeta", 10), stored("alpha", 10)],
            categories: vec![],
        }])
        .unwrap();
        db.import(&[PartitionBatch {
            partition: ASIA,
            articles: vec![stored("mid", 10), stored("zeta", 10)],
            categories: vec![],
        }])
        .unwrap();

        let ids: Vec<String> =
            db.list_articles(ASIA).unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn source_search_over_store_keeps_stored_order() {
        let (_tmp, db) = test_db();
        let mut first = stored("zeta", 10);
        first.heading = "Storm one".to_string();
        first.source = Some("Reuters".to_string());
        let mut second = stored("alpha", 10);
        second.heading = "Storm two".to_string();
        second.source = Some("Reuters".to_string());
        db.import(&[PartitionBatch {
            partition: Partition::Homepage,
            articles: vec![first, second],
            categories: vec![],
        }])
        .unwrap();

        let reply = crate::search::execute_search(&db, "reuters", None).unwrap();
        let headings: Vec<&str> =
            reply.results().iter().map(|r| r.heading.as_str()).collect();
        assert_eq!(headings, vec!["Storm one", "Storm two"]);
    }

    #[test]
    fn deleted_article_leaves_no_order_entry() {
        let (_tmp, db) = test_db();
        let article = db.create_article(ASIA, draft("Typhoon", "")).unwrap();
        db.delete_article(ASIA, &article.id).unwrap();

        let txn = db.db.begin_read().unwrap();
        let order = txn.open_table(ARTICLE_ORDER).unwrap();
        assert!(partition_sequences(&order, ASIA).unwrap().is_empty());
    }

    #[test]
    fn partitions_do_not_leak() {
        let (_tmp, db) = test_db();
        let article = db.create_article(ASIA, draft("Typhoon", "")).unwrap();
        db.add_category(ASIA, "Weather").unwrap();

        assert!(db.list_articles(EUROPE).unwrap().is_empty());
        assert!(db.list_articles(Partition::Homepage).unwrap().is_empty());
        assert!(db.list_categories(EUROPE).unwrap().is_empty());
        assert_eq!(db.get_article(EUROPE, &article.id).unwrap(), None);
        assert!(!db.delete_article(EUROPE, &article.id).unwrap());
    }

    #[test]
    fn categories_keep_insertion_order() {
        let (_tmp, db) = test_db();

        db.add_category(Partition::Homepage, "World").unwrap();
        db.add_category(Partition::Homepage, "Business").unwrap();
        let all = db.add_category(Partition::Homepage, "Arts").unwrap();

        assert_eq!(all, vec!["World", "Business", "Arts"]);
    }

    #[test]
    fn duplicate_or_empty_category_is_rejected() {
        let (_tmp, db) = test_db();
        db.add_category(ASIA, "Sports").unwrap();

        assert!(matches!(
            db.add_category(ASIA, "Sports"),
            Err(Error::InvalidCategory(_))
        ));
        assert!(matches!(
            db.add_category(ASIA, "  "),
            Err(Error::InvalidCategory(_))
        ));
        // Same name in another partition is fine.
        assert_eq!(db.add_category(EUROPE, "Sports").unwrap(), vec!["Sports"]);
    }

    #[test]
    fn category_in_use_cannot_be_removed() {
        let (_tmp, db) = test_db();
        db.add_category(ASIA, "Politics").unwrap();
        let article = db.create_article(ASIA, draft("Vote", "Politics")).unwrap();

        assert!(matches!(
            db.remove_category(ASIA, "Politics"),
            Err(Error::CategoryInUse(_))
        ));
        assert_eq!(db.list_categories(ASIA).unwrap(), vec!["Politics"]);

        db.delete_article(ASIA, &article.id).unwrap();
        db.remove_category(ASIA, "Politics").unwrap();
        assert!(db.list_categories(ASIA).unwrap().is_empty());
    }

    #[test]
    fn category_use_is_checked_per_partition() {
        let (_tmp, db) = test_db();
        db.add_category(EUROPE, "Politics").unwrap();
        db.create_article(ASIA, draft("Vote", "Politics")).unwrap();

        db.remove_category(EUROPE, "Politics").unwrap();
        db.remove_category(EUROPE, "never-existed").unwrap();
    }

    #[test]
    fn unknown_category_is_accepted() {
        let (_tmp, db) = test_db();
        let article = db.create_article(ASIA, draft("Vote", "Ghost")).unwrap();
        assert_eq!(article.category, "Ghost");
    }

    #[test]
    fn users_crud() {
        let (_tmp, db) = test_db();

        db.add_user("alice", "s3cret", Role::Editor).unwrap();
        db.add_user("bob", "pw", Role::Regional(Region::Asia)).unwrap();
        assert!(matches!(
            db.add_user("alice", "other", Role::Editor),
            Err(Error::Conflict { kind: "user", .. })
        ));

        assert_eq!(db.verify_user("alice", "s3cret").unwrap(), Some(Role::Editor));
        assert_eq!(db.verify_user("alice", "wrong").unwrap(), None);
        assert_eq!(db.verify_user("carol", "s3cret").unwrap(), None);

        let users = db.list_users().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, "alice");

        assert!(db.remove_user("bob").unwrap());
        assert!(!db.remove_user("bob").unwrap());
    }

    #[test]
    fn update_user_renames_and_resets_password() {
        let (_tmp, db) = test_db();
        db.add_user("bob", "pw", Role::Regional(Region::Asia)).unwrap();
        db.add_user("carol", "pw", Role::Editor).unwrap();

        assert!(matches!(
            db.update_user(
                "bob",
                UserUpdate {
                    id: Some("carol".to_string()),
                    ..Default::default()
                }
            ),
            Err(Error::Conflict { .. })
        ));

        let summary = db
            .update_user(
                "bob",
                UserUpdate {
                    id: Some("robert".to_string()),
                    password: Some("new-pw".to_string()),
                    role: Some(Role::Regional(Region::India)),
                },
            )
            .unwrap();
        assert_eq!(summary.id, "robert");
        assert_eq!(summary.role, Role::Regional(Region::India));

        assert_eq!(db.verify_user("bob", "pw").unwrap(), None);
        assert_eq!(
            db.verify_user("robert", "new-pw").unwrap(),
            Some(Role::Regional(Region::India))
        );

        assert!(matches!(
            db.update_user("ghost", UserUpdate::default()),
            Err(Error::NotFound { kind: "user", .. })
        ));
    }

    #[test]
    fn imported_users_keep_their_hashes() {
        let (_tmp, db) = test_db();
        db.add_user("alice", "old", Role::Editor).unwrap();
        let hash = auth::hash_password("from-csv").unwrap();

        let count = db
            .import_users(&[
                ImportedUser {
                    id: "alice".to_string(),
                    role: Role::Regional(Region::Africa),
                    password_hash: hash.clone(),
                },
                ImportedUser {
                    id: "dave".to_string(),
                    role: Role::Editor,
                    password_hash: hash,
                },
            ])
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(db.verify_user("alice", "old").unwrap(), None);
        assert_eq!(
            db.verify_user("alice", "from-csv").unwrap(),
            Some(Role::Regional(Region::Africa))
        );
        assert_eq!(db.verify_user("dave", "from-csv").unwrap(), Some(Role::Editor));
    }

    #[test]
    fn settings_crud() {
        let (_tmp, db) = test_db();

        assert_eq!(db.get_setting("bind_addr").unwrap(), None);
        db.set_setting("bind_addr", "0.0.0.0:8080").unwrap();
        assert_eq!(
            db.get_setting("bind_addr").unwrap(),
            Some("0.0.0.0:8080".to_string())
        );
        assert!(db.remove_setting("bind_addr").unwrap());
        assert!(!db.remove_setting("bind_addr").unwrap());
    }

    #[test]
    fn import_counts_and_skips_duplicate_categories() {
        let (_tmp, db) = test_db();
        db.add_category(Partition::Homepage, "World").unwrap();

        let summary = db
            .import(&[
                PartitionBatch {
                    partition: Partition::Homepage,
                    articles: vec![stored("h1", 1)],
                    categories: vec!["World".to_string(), "Tech".to_string()],
                },
                PartitionBatch {
                    partition: ASIA,
                    articles: vec![stored("a1", 1), stored("a2", 2)],
                    categories: vec![String::new()],
                },
            ])
            .unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                articles: 3,
                categories: 1
            }
        );
        assert_eq!(
            db.list_categories(Partition::Homepage).unwrap(),
            vec!["World", "Tech"]
        );
    }

    #[test]
    fn reopen_preserves_data() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("news.redb");

        let id = {
            let db = NewsDb::open(&path).unwrap();
            db.add_category(EUROPE, "Culture").unwrap();
            db.create_article(EUROPE, draft("Opera", "Culture")).unwrap().id
        };

        {
            let db = NewsDb::open(&path).unwrap();
            assert_eq!(db.list_categories(EUROPE).unwrap(), vec!["Culture"]);
            assert_eq!(db.get_article(EUROPE, &id).unwrap().unwrap().heading, "Opera");
        }
    }
}
