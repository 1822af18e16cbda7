//! Read access to partitioned news.
//!
//! The search engine only ever reads through [`PartitionStore`], which lets
//! it run against the on-disk [`NewsDb`](crate::news_db::NewsDb) or an
//! in-memory fixture alike.

use std::collections::HashMap;

use crate::{article::Article, error::Result, partition::Partition};

pub trait PartitionStore {
    /// Articles of one partition, most recent first.
    fn list_articles(&self, partition: Partition) -> Result<Vec<Article>>;

    /// Categories of one partition, in insertion order.
    fn list_categories(&self, partition: Partition) -> Result<Vec<String>>;
}

impl<S: PartitionStore + ?Sized> PartitionStore for &S {
    fn list_articles(&self, partition: Partition) -> Result<Vec<Article>> {
        (**self).list_articles(partition)
    }

    fn list_categories(&self, partition: Partition) -> Result<Vec<String>> {
        (**self).list_categories(partition)
    }
}

/// Sort articles most recent first. Stable, so equal timestamps keep their
/// stored order.
pub fn sort_by_recency(articles: &mut [Article]) {
    articles.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// A store held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    partitions: HashMap<Partition, Bucket>,
}

#[derive(Debug, Clone, Default)]
struct Bucket {
    articles: Vec<Article>,
    categories: Vec<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_article(&mut self, partition: Partition, article: Article) {
        self.partitions
            .entry(partition)
            .or_default()
            .articles
            .push(article);
    }

    pub fn insert_category(&mut self, partition: Partition, name: &str) {
        let bucket = self.partitions.entry(partition).or_default();
        if !bucket.categories.iter().any(|c| c == name) {
            bucket.categories.push(name.to_string());
        }
    }
}

impl PartitionStore for MemoryStore {
    fn list_articles(&self, partition: Partition) -> Result<Vec<Article>> {
        let mut articles = self
            .partitions
            .get(&partition)
            .map(|b| b.articles.clone())
            .unwrap_or_default();
        sort_by_recency(&mut articles);
        Ok(articles)
    }

    fn list_categories(&self, partition: Partition) -> Result<Vec<String>> {
        Ok(self
            .partitions
            .get(&partition)
            .map(|b| b.categories.clone())
            .unwrap_or_default())
    }
}
