use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A news article stored in one partition.
///
/// Serialized in camelCase so the JSON matches what portal pages expect
/// (`websiteLink`, `isOlder`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    #[serde(default)]
    pub heading: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_link: Option<String>,
    /// Archived articles are listed under "older news".
    #[serde(default)]
    pub is_older: bool,
    pub timestamp: DateTime<Utc>,
}

impl Article {
    /// Build a new article from a draft, assigning a fresh id.
    pub fn from_draft(draft: ArticleDraft, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            heading: draft.heading,
            category: draft.category,
            content: draft.content,
            source: non_empty(draft.source),
            website_link: non_empty(draft.website_link),
            is_older: draft.is_older,
            timestamp,
        }
    }

    /// Apply the fields present in `patch`. Id and timestamp never change.
    pub fn apply(&mut self, patch: ArticlePatch) {
        if let Some(heading) = patch.heading {
            self.heading = heading;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(source) = patch.source {
            self.source = non_empty(Some(source));
        }
        if let Some(link) = patch.website_link {
            self.website_link = non_empty(Some(link));
        }
        if let Some(is_older) = patch.is_older {
            self.is_older = is_older;
        }
    }

    /// The source name, if one was given.
    pub fn source_name(&self) -> Option<&str> {
        self.source.as_deref().filter(|s| !s.is_empty())
    }
}

/// Body of an article creation request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ArticleDraft {
    #[serde(default)]
    pub heading: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub website_link: Option<String>,
    #[serde(default)]
    pub is_older: bool,
}

/// Body of an article update request. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ArticlePatch {
    pub heading: Option<String>,
    pub category: Option<String>,
    pub content: Option<String>,
    pub source: Option<String>,
    pub website_link: Option<String>,
    pub is_older: Option<bool>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ArticleDraft {
        ArticleDraft {
            heading: "Rains arrive early".to_string(),
            category: "Weather".to_string(),
            content: "The monsoon reached the coast.".to_string(),
            source: Some("Reuters".to_string()),
            website_link: Some(String::new()),
            is_older: false,
        }
    }

    #[test]
    fn from_draft_assigns_id_and_drops_empty_link() {
        let now = Utc::now();
        let a = Article::from_draft(draft(), now);
        let b = Article::from_draft(draft(), now);

        assert_ne!(a.id, b.id);
        assert_eq!(a.timestamp, now);
        assert_eq!(a.website_link, None);
        assert_eq!(a.source_name(), Some("Reuters"));
    }

    #[test]
    fn apply_keeps_identity() {
        let mut article = Article::from_draft(draft(), Utc::now());
        let id = article.id.clone();
        let timestamp = article.timestamp;

        article.apply(ArticlePatch {
            heading: Some("Rains arrive late".to_string()),
            is_older: Some(true),
            source: Some(String::new()),
            ..Default::default()
        });

        assert_eq!(article.id, id);
        assert_eq!(article.timestamp, timestamp);
        assert_eq!(article.heading, "Rains arrive late");
        assert_eq!(article.content, "The monsoon reached the coast.");
        assert!(article.is_older);
        assert_eq!(article.source, None);
    }

    #[test]
    fn draft_rejects_unknown_fields() {
        let err = serde_json::from_str::<ArticleDraft>(
            r#"{"heading":"x","priority":3}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn article_uses_camel_case_on_the_wire() {
        let json = r#"{
            "id": "n1",
            "heading": "Quake",
            "category": "Science",
            "content": "A tremor was felt.",
            "source": "AP",
            "websiteLink": "https://example.com/quake",
            "isOlder": true,
            "timestamp": "2024-03-01T10:00:00Z"
        }"#;
        let article: Article = serde_json::from_str(json).unwrap();

        assert_eq!(
            article.website_link.as_deref(),
            Some("https://example.com/quake")
        );
        assert!(article.is_older);

        let value = serde_json::to_value(&article).unwrap();
        assert_eq!(value["isOlder"], true);
        assert_eq!(value["websiteLink"], "https://example.com/quake");
    }
}
