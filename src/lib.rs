//! newsportal - a continent-partitioned news portal with a keyword chatbot.
//!
//! Articles and categories live in one of ten partitions (the homepage and
//! nine regions) inside a [redb](https://github.com/cberner/redb) store.
//! The chatbot ranks articles by weighted keyword hits, or lists everything
//! from a named source.
//!
//! # Quick start
//!
//! ```no_run
//! use newsportal::{DataDir, NewsDb};
//! use newsportal::search::{self, ChatReply};
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let db = NewsDb::open(&data_dir.news_db()).unwrap();
//!
//! match search::execute_search(&db, "election results", Some("asia")).unwrap() {
//!     ChatReply::Message { reply } => println!("{reply}"),
//!     ChatReply::Results { results } => {
//!         for r in &results {
//!             println!("{} ({}, {})", r.heading, r.source, r.page_name);
//!         }
//!     }
//! }
//! ```

pub mod article;
pub mod auth;
pub mod cli;
pub mod config;
pub mod data_dir;
pub mod error;
pub mod import;
pub mod news_db;
pub mod partition;
pub mod query;
pub mod search;
pub mod server;
pub mod store;

pub use article::Article;
pub use auth::Role;
pub use data_dir::DataDir;
pub use error::{Error, Result};
pub use news_db::NewsDb;
pub use partition::{Partition, Region};
pub use store::{MemoryStore, PartitionStore};
