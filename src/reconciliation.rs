// ⚖️ Reconciliation Engine - bring stored favorites in line with a desired list
//
// For each category independently:
//   to_delete = current - desired
//   to_insert = desired - current
//
// Deletions run before insertions. The whole invocation (reads, writes and the
// audit event) happens inside one IMMEDIATE transaction, so it either applies
// completely or not at all, and concurrent callers for the same database
// serialize on SQLite's writer lock.

use crate::db::{insert_event, Event};
use crate::error::{FavoritesError, FavoritesResult};
use crate::favorites::{
    delete_favorite, favorite_ids, get_merged_lists, insert_favorite, missing_catalog_ids,
    user_exists, Category, FavoriteRow,
};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;
use tracing::{debug, info, instrument};

// ============================================================================
// PAYLOAD
// ============================================================================

/// One entry of the client's desired-state list.
///
/// Fields stay optional so malformed entries reach validation instead of
/// failing inside the JSON extractor with a less useful message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FavoriteItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planet_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<i64>,
}

impl FavoriteItem {
    pub fn planet(id: i64) -> Self {
        FavoriteItem {
            category: Some(Category::Planet.as_str().to_string()),
            planet_id: Some(id),
            character_id: None,
        }
    }

    pub fn character(id: i64) -> Self {
        FavoriteItem {
            category: Some(Category::Character.as_str().to_string()),
            planet_id: None,
            character_id: Some(id),
        }
    }
}

impl From<&FavoriteRow> for FavoriteItem {
    fn from(row: &FavoriteRow) -> Self {
        match row.category() {
            Category::Character => FavoriteItem::character(row.entity_id()),
            Category::Planet => FavoriteItem::planet(row.entity_id()),
        }
    }
}

/// What to do with entries whose category is neither PLANET nor CHARACTER
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownCategoryPolicy {
    /// Fail the whole call with a validation error
    #[default]
    Reject,
    /// Drop the entry and carry on
    Ignore,
}

impl FromStr for UnknownCategoryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reject" => Ok(UnknownCategoryPolicy::Reject),
            "ignore" => Ok(UnknownCategoryPolicy::Ignore),
            other => Err(format!("unknown category policy '{}' (expected reject|ignore)", other)),
        }
    }
}

/// Payload partitioned into one id list per category.
/// Ids are unique and keep the order in which they first appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredFavorites {
    pub character_ids: Vec<i64>,
    pub planet_ids: Vec<i64>,
}

impl DesiredFavorites {
    pub fn from_payload(
        items: &[FavoriteItem],
        policy: UnknownCategoryPolicy,
    ) -> FavoritesResult<Self> {
        let mut desired = DesiredFavorites::default();
        let mut seen: HashSet<(Category, i64)> = HashSet::new();

        for (index, item) in items.iter().enumerate() {
            let Some(raw_category) = item.category.as_deref() else {
                return Err(FavoritesError::validation(format!(
                    "item {} is missing 'category'",
                    index
                )));
            };

            let category = match (Category::parse(raw_category), policy) {
                (Some(category), _) => category,
                (None, UnknownCategoryPolicy::Ignore) => {
                    debug!(index, category = raw_category, "ignoring unknown category");
                    continue;
                }
                (None, UnknownCategoryPolicy::Reject) => {
                    return Err(FavoritesError::validation(format!(
                        "item {} has unknown category '{}'",
                        index, raw_category
                    )));
                }
            };

            let id = match category {
                Category::Character => item.character_id,
                Category::Planet => item.planet_id,
            }
            .ok_or_else(|| {
                FavoritesError::validation(format!(
                    "item {} ({}) is missing '{}'",
                    index,
                    category.as_str(),
                    category.entity_column()
                ))
            })?;

            if seen.insert((category, id)) {
                match category {
                    Category::Character => desired.character_ids.push(id),
                    Category::Planet => desired.planet_ids.push(id),
                }
            }
        }

        Ok(desired)
    }

    pub fn ids(&self, category: Category) -> &[i64] {
        match category {
            Category::Character => &self.character_ids,
            Category::Planet => &self.planet_ids,
        }
    }
}

// ============================================================================
// DIFF
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FavoriteDiff {
    pub to_delete: Vec<i64>,
    pub to_insert: Vec<i64>,
}

impl FavoriteDiff {
    /// An empty `desired` means "remove everything in this category".
    pub fn compute(current: &BTreeSet<i64>, desired: &[i64]) -> Self {
        let desired_set: BTreeSet<i64> = desired.iter().copied().collect();

        FavoriteDiff {
            to_delete: current.difference(&desired_set).copied().collect(),
            to_insert: desired
                .iter()
                .copied()
                .filter(|id| !current.contains(id))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_insert.is_empty()
    }
}

/// What one reconciliation changed, per category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationSummary {
    pub characters: FavoriteDiff,
    pub planets: FavoriteDiff,
}

impl ReconciliationSummary {
    pub fn is_noop(&self) -> bool {
        self.characters.is_empty() && self.planets.is_empty()
    }

    pub fn diff(&self, category: Category) -> &FavoriteDiff {
        match category {
            Category::Character => &self.characters,
            Category::Planet => &self.planets,
        }
    }

    fn slot(&mut self, category: Category) -> &mut FavoriteDiff {
        match category {
            Category::Character => &mut self.characters,
            Category::Planet => &mut self.planets,
        }
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ReconciliationEngine {
    pub unknown_categories: UnknownCategoryPolicy,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        ReconciliationEngine::default()
    }

    pub fn with_policy(unknown_categories: UnknownCategoryPolicy) -> Self {
        ReconciliationEngine { unknown_categories }
    }

    /// Reconcile `user_id`'s favorites with `items` and return the merged
    /// post-reconciliation list (characters first, then planets).
    pub fn reconcile(
        &self,
        conn: &mut Connection,
        user_id: i64,
        items: &[FavoriteItem],
    ) -> FavoritesResult<Vec<FavoriteRow>> {
        self.reconcile_with_summary(conn, user_id, items)
            .map(|(_, rows)| rows)
    }

    #[instrument(skip(self, conn, items), fields(items = items.len()))]
    pub fn reconcile_with_summary(
        &self,
        conn: &mut Connection,
        user_id: i64,
        items: &[FavoriteItem],
    ) -> FavoritesResult<(ReconciliationSummary, Vec<FavoriteRow>)> {
        // Validation happens before the store is touched
        let desired = DesiredFavorites::from_payload(items, self.unknown_categories)?;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !user_exists(&tx, user_id)? {
            return Err(FavoritesError::not_found(format!("user {}", user_id)));
        }

        let mut summary = ReconciliationSummary::default();

        // Plan both categories, including catalog checks, before any write
        for category in Category::ALL {
            let current = favorite_ids(&tx, category, user_id)?;
            let diff = FavoriteDiff::compute(&current, desired.ids(category));

            let missing = missing_catalog_ids(&tx, category, &diff.to_insert)?;
            if !missing.is_empty() {
                return Err(FavoritesError::not_found(format!(
                    "{} ids {:?}",
                    category.as_str().to_lowercase(),
                    missing
                )));
            }

            *summary.slot(category) = diff;
        }

        for category in Category::ALL {
            let diff = summary.diff(category);

            for &entity_id in &diff.to_delete {
                delete_favorite(&tx, category, user_id, entity_id)?;
            }
            for &entity_id in &diff.to_insert {
                insert_favorite(&tx, category, user_id, entity_id)?;
            }

            debug!(
                category = category.as_str(),
                deleted = diff.to_delete.len(),
                inserted = diff.to_insert.len(),
                "category reconciled"
            );
        }

        if !summary.is_noop() {
            let data = serde_json::to_value(&summary)
                .map_err(|e| FavoritesError::StoreUnavailable(e.to_string()))?;
            let event = Event::new(
                "favorites_reconciled",
                "user",
                &user_id.to_string(),
                data,
                "reconciliation_engine",
            );
            insert_event(&tx, &event)?;
        }

        // Read back inside the transaction so the result is exactly what commits
        let rows = get_merged_lists(&tx, user_id)?;
        tx.commit()?;

        info!(
            user_id,
            characters_deleted = summary.characters.to_delete.len(),
            characters_inserted = summary.characters.to_insert.len(),
            planets_deleted = summary.planets.to_delete.len(),
            planets_inserted = summary.planets.to_insert.len(),
            "favorites reconciled"
        );

        Ok((summary, rows))
    }
}
