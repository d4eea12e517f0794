//! Shared fakes and fixtures for the nl2sql workspace's test suites:
//! an in-memory `Warehouse`/`AdminWarehouse`/`QueryMemoryStore`/
//! `SearchWarehouse`, deterministic fake `EmbeddingProvider`/
//! `ChatProvider`, and a fixture-catalog tree builder. Every crate in
//! the workspace that needs any of these pulls them from here instead
//! of re-authoring its own, the same role `caliber-test-utils` plays
//! for the rest of its workspace.

mod catalog_fixture;
mod providers;
mod search_warehouse;
mod warehouse;

pub use catalog_fixture::{minimal_catalog, write_minimal_catalog_tree};
pub use providers::{FakeChatProvider, FakeEmbeddingProvider};
pub use search_warehouse::InMemorySearchWarehouse;
pub use warehouse::{InMemoryQueryMemoryStore, InMemoryWarehouse};
