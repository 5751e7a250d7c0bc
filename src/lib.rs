// Favorites - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod error;
pub mod db;
pub mod catalog;        // Catalog Store - characters, planets
pub mod favorites;      // Favorite Store + merged reader
pub mod reconciliation; // Reconciliation Engine - desired vs stored favorites
pub mod auth;           // Argon2 passwords, JWT access tokens
pub mod users;
pub mod config;
pub mod logging;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use error::{FavoritesError, FavoritesResult};
pub use db::{
    Event, StoreStats,
    open_database, setup_database, insert_event, get_events_for_entity, store_stats,
};
pub use catalog::{
    Character, Planet, SeedReport,
    load_characters_csv, load_planets_csv, seed_catalog, list_characters, list_planets,
};
pub use favorites::{
    Category, FavoriteCharacter, FavoritePlanet, FavoriteRow,
    favorite_ids, get_merged_lists,
};
pub use reconciliation::{
    ReconciliationEngine, ReconciliationSummary, FavoriteDiff, FavoriteItem,
    DesiredFavorites, UnknownCategoryPolicy,
};
pub use auth::{AuthError, TokenIssuer, hash_password, verify_password};
pub use users::{User, CreateAccount, NewAccount, AccountError, create_user, authenticate};
pub use config::{Config, ConfigError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
