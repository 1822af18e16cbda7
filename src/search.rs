use serde::Serialize;

use crate::{
    article::Article,
    error::Result,
    partition::{Partition, Region},
    query,
    store::PartitionStore,
};

pub const SOURCE_PROMPT: &str = "Please provide a source name to search for.";
pub const KEYWORD_PROMPT: &str =
    "Please provide a more specific keyword to search for.";
pub const NO_MATCHES: &str =
    "I couldn't find any news matching your search. Please try again.";

/// Shown in place of a missing source.
pub const UNKNOWN_SOURCE: &str = "N/A";

/// Points a keyword earns for each field it appears in.
pub const HEADING_WEIGHT: u32 = 5;
pub const CONTENT_WEIGHT: u32 = 2;
pub const SOURCE_WEIGHT: u32 = 3;
pub const CATEGORY_WEIGHT: u32 = 4;

/// The runner-up needs this many distinct keyword hits to widen the answer.
const PROMOTION_MIN_MATCHES: usize = 3;
const PROMOTED_RESULT_COUNT: usize = 3;

/// Answer to a chat message: either a plain reply or a list of articles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChatReply {
    Message { reply: String },
    Results { results: Vec<ChatResult> },
}

impl ChatReply {
    fn message(text: impl Into<String>) -> Self {
        ChatReply::Message { reply: text.into() }
    }

    /// Articles in the reply, empty for plain messages.
    pub fn results(&self) -> &[ChatResult] {
        match self {
            ChatReply::Message { .. } => &[],
            ChatReply::Results { results } => results,
        }
    }
}

/// One article in a chat answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResult {
    /// The article body. Named `reply` so chat widgets can render it like
    /// any other bot message.
    pub reply: String,
    pub heading: String,
    pub source: String,
    pub category: String,
    /// Display name of the partition the article came from.
    pub page_name: String,
}

/// An article tagged with the partition it was found in.
#[derive(Debug, Clone)]
struct Candidate {
    article: Article,
    page_name: String,
}

impl Candidate {
    fn to_result(&self) -> ChatResult {
        ChatResult {
            reply: self.article.content.clone(),
            heading: self.article.heading.clone(),
            source: self
                .article
                .source_name()
                .unwrap_or(UNKNOWN_SOURCE)
                .to_string(),
            category: self.article.category.clone(),
            page_name: self.page_name.clone(),
        }
    }

    fn lowercase_source(&self) -> Option<String> {
        self.article.source_name().map(str::to_lowercase)
    }
}

#[derive(Debug)]
struct Scored<'a> {
    candidate: &'a Candidate,
    score: u32,
    keyword_matches: usize,
}

/// Answer a chat message.
///
/// `continent` limits the search to one region; `None` or a name that is not
/// a known region searches the homepage and every region.
///
/// 1. Collect candidate articles, tagged with their partition's name
/// 2. If the message names a source (directly or via `@source:`), return
///    every article from that source
/// 3. Otherwise score each article by weighted keyword hits
/// 4. Return the best hit, or the top three when the runner-up matched at
///    least three distinct keywords
///
/// "Nothing found" is a normal reply. Only store failures are errors.
pub fn execute_search<S: PartitionStore>(
    store: &S,
    message: &str,
    continent: Option<&str>,
) -> Result<ChatReply> {
    let scope = continent.and_then(|name| name.parse::<Region>().ok());
    let candidates = collect_candidates(store, scope)?;
    let parsed = query::parse(message);

    if let Some(reply) = source_search(&candidates, message, &parsed) {
        return Ok(reply);
    }

    let keywords = query::keywords(&parsed.query);
    if keywords.is_empty() {
        tracing::debug!("no usable keywords in message");
        return Ok(ChatReply::message(KEYWORD_PROMPT));
    }

    let ranked = rank(&candidates, &keywords);
    tracing::debug!(
        keywords = ?keywords,
        candidates = candidates.len(),
        matched = ranked.len(),
        "keyword search"
    );

    if ranked.is_empty() {
        return Ok(ChatReply::message(NO_MATCHES));
    }

    let promote = ranked
        .get(1)
        .is_some_and(|second| second.keyword_matches >= PROMOTION_MIN_MATCHES);
    let limit = if promote { PROMOTED_RESULT_COUNT } else { 1 };

    Ok(ChatReply::Results {
        results: ranked
            .iter()
            .take(limit)
            .map(|s| s.candidate.to_result())
            .collect(),
    })
}

fn collect_candidates<S: PartitionStore>(
    store: &S,
    scope: Option<Region>,
) -> Result<Vec<Candidate>> {
    let partitions: Vec<Partition> = match scope {
        Some(region) => vec![Partition::Region(region)],
        None => Partition::all().collect(),
    };

    let mut candidates = Vec::new();
    for partition in partitions {
        let page_name = partition.display_name();
        for article in store.list_articles(partition)? {
            candidates.push(Candidate {
                article,
                page_name: page_name.clone(),
            });
        }
    }
    Ok(candidates)
}

/// Handle messages that ask for a source. Returns `None` when the message
/// is not a source search.
fn source_search(
    candidates: &[Candidate],
    message: &str,
    parsed: &query::ParsedQuery,
) -> Option<ChatReply> {
    let message = query::normalize(message);
    let exact = candidates
        .iter()
        .filter_map(Candidate::lowercase_source)
        .find(|source| *source == message);

    if exact.is_none() && !parsed.is_source_search() {
        return None;
    }

    let wanted = exact.unwrap_or_else(|| parsed.query.clone());
    if wanted.is_empty() {
        return Some(ChatReply::message(SOURCE_PROMPT));
    }

    let results: Vec<ChatResult> = candidates
        .iter()
        .filter(|c| {
            c.lowercase_source()
                .is_some_and(|source| source.contains(&wanted))
        })
        .map(Candidate::to_result)
        .collect();

    tracing::debug!(source = %wanted, matched = results.len(), "source search");

    if results.is_empty() {
        Some(ChatReply::message(format!(
            "I couldn't find any news from the source \"{wanted}\"."
        )))
    } else {
        Some(ChatReply::Results { results })
    }
}

/// Score every candidate, drop the ones without a hit and order the rest by
/// score. The sort is stable, so ties keep their aggregation order.
fn rank<'a>(candidates: &'a [Candidate], keywords: &[String]) -> Vec<Scored<'a>> {
    let mut scored: Vec<Scored<'a>> = candidates
        .iter()
        .map(|candidate| {
            let (score, keyword_matches) = score(&candidate.article, keywords);
            Scored {
                candidate,
                score,
                keyword_matches,
            }
        })
        .filter(|s| s.score > 0)
        .collect();
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored
}

/// Weighted keyword score of an article and the number of keywords that hit
/// at least one of its fields.
fn score(article: &Article, keywords: &[String]) -> (u32, usize) {
    let heading = article.heading.to_lowercase();
    let content = article.content.to_lowercase();
    let source = article.source.as_deref().unwrap_or_default().to_lowercase();
    let category = article.category.to_lowercase();

    let fields = [
        (heading.as_str(), HEADING_WEIGHT),
        (content.as_str(), CONTENT_WEIGHT),
        (source.as_str(), SOURCE_WEIGHT),
        (category.as_str(), CATEGORY_WEIGHT),
    ];

    let mut total = 0;
    let mut matches = 0;
    for keyword in keywords {
        let mut hit = false;
        for (text, weight) in fields {
            if text.contains(keyword.as_str()) {
                total += weight;
                hit = true;
            }
        }
        if hit {
            matches += 1;
        }
    }
    (total, matches)
}

/// Format a reply for human-readable terminal output.
pub fn format_human(reply: &ChatReply) {
    match reply {
        ChatReply::Message { reply } => println!("{reply}"),
        ChatReply::Results { results } => {
            for (i, r) in results.iter().enumerate() {
                println!("{:>3}. {} [{}]", i + 1, r.heading, r.page_name);
                println!("     {} | {}", r.source, r.category);
                if !r.reply.is_empty() {
                    println!("     {}", preview(&r.reply));
                }
            }
            println!("\n{} result(s)", results.len());
        }
    }
}

/// Format a reply as the JSON the chat endpoint returns.
pub fn format_json(reply: &ChatReply) -> Result<()> {
    println!("{}", serde_json::to_string(reply)?);
    Ok(())
}

const PREVIEW_MAX_CHARS: usize = 120;

fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > PREVIEW_MAX_CHARS {
        let cut: String = line.chars().take(PREVIEW_MAX_CHARS).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}
