// Favorite Store + Favorites Reader
//
// Two join relations, one per category. Every query is scoped by user_id;
// nothing here ever reads or writes another user's rows.

use crate::error::FavoritesResult;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// CATEGORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Character,
    Planet,
}

impl Category {
    /// Characters are always listed before planets
    pub const ALL: [Category; 2] = [Category::Character, Category::Planet];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Character => "CHARACTER",
            Category::Planet => "PLANET",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CHARACTER" => Some(Category::Character),
            "PLANET" => Some(Category::Planet),
            _ => None,
        }
    }

    fn favorite_table(&self) -> &'static str {
        match self {
            Category::Character => "favorite_character",
            Category::Planet => "favorite_planet",
        }
    }

    pub fn entity_column(&self) -> &'static str {
        match self {
            Category::Character => "character_id",
            Category::Planet => "planet_id",
        }
    }

    fn catalog_table(&self) -> &'static str {
        match self {
            Category::Character => "character",
            Category::Planet => "planet",
        }
    }
}

// ============================================================================
// ROWS (public shape: id, user_id, entity id - never catalog details)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteCharacter {
    pub id: i64,
    pub user_id: i64,
    pub character_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoritePlanet {
    pub id: i64,
    pub user_id: i64,
    pub planet_id: i64,
}

/// One entry of the merged list. Serializes as the bare row object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FavoriteRow {
    Character(FavoriteCharacter),
    Planet(FavoritePlanet),
}

impl FavoriteRow {
    pub fn category(&self) -> Category {
        match self {
            FavoriteRow::Character(_) => Category::Character,
            FavoriteRow::Planet(_) => Category::Planet,
        }
    }

    pub fn entity_id(&self) -> i64 {
        match self {
            FavoriteRow::Character(c) => c.character_id,
            FavoriteRow::Planet(p) => p.planet_id,
        }
    }

    pub fn user_id(&self) -> i64 {
        match self {
            FavoriteRow::Character(c) => c.user_id,
            FavoriteRow::Planet(p) => p.user_id,
        }
    }
}

// ============================================================================
// READER
// ============================================================================

pub fn list_favorite_characters(
    conn: &Connection,
    user_id: i64,
) -> rusqlite::Result<Vec<FavoriteCharacter>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, character_id FROM favorite_character WHERE user_id = ?1 ORDER BY id",
    )?;

    let rows = stmt
        .query_map([user_id], |row| {
            Ok(FavoriteCharacter {
                id: row.get(0)?,
                user_id: row.get(1)?,
                character_id: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub fn list_favorite_planets(
    conn: &Connection,
    user_id: i64,
) -> rusqlite::Result<Vec<FavoritePlanet>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, planet_id FROM favorite_planet WHERE user_id = ?1 ORDER BY id",
    )?;

    let rows = stmt
        .query_map([user_id], |row| {
            Ok(FavoritePlanet {
                id: row.get(0)?,
                user_id: row.get(1)?,
                planet_id: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Both favorite sets for a user, characters first. Pure read.
pub fn get_merged_lists(conn: &Connection, user_id: i64) -> FavoritesResult<Vec<FavoriteRow>> {
    let characters = list_favorite_characters(conn, user_id)?;
    let planets = list_favorite_planets(conn, user_id)?;

    Ok(characters
        .into_iter()
        .map(FavoriteRow::Character)
        .chain(planets.into_iter().map(FavoriteRow::Planet))
        .collect())
}

// ============================================================================
// STORE PRIMITIVES (used by the reconciliation engine inside its transaction)
// ============================================================================

/// Entity ids currently favorited by `user_id` in `category`.
/// An empty set is a successful read; failures come back as `Err`.
pub fn favorite_ids(
    conn: &Connection,
    category: Category,
    user_id: i64,
) -> rusqlite::Result<BTreeSet<i64>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE user_id = ?1",
        category.entity_column(),
        category.favorite_table()
    );
    let mut stmt = conn.prepare(&sql)?;

    let ids = stmt
        .query_map([user_id], |row| row.get(0))?
        .collect::<Result<BTreeSet<i64>, _>>()?;

    Ok(ids)
}

pub(crate) fn insert_favorite(
    conn: &Connection,
    category: Category,
    user_id: i64,
    entity_id: i64,
) -> rusqlite::Result<()> {
    let sql = format!(
        "INSERT INTO {} (user_id, {}) VALUES (?1, ?2)",
        category.favorite_table(),
        category.entity_column()
    );
    conn.execute(&sql, params![user_id, entity_id])?;
    Ok(())
}

pub(crate) fn delete_favorite(
    conn: &Connection,
    category: Category,
    user_id: i64,
    entity_id: i64,
) -> rusqlite::Result<usize> {
    let sql = format!(
        "DELETE FROM {} WHERE user_id = ?1 AND {} = ?2",
        category.favorite_table(),
        category.entity_column()
    );
    conn.execute(&sql, params![user_id, entity_id])
}

/// Ids from `ids` that have no row in the category's catalog table
pub(crate) fn missing_catalog_ids(
    conn: &Connection,
    category: Category,
    ids: &[i64],
) -> rusqlite::Result<Vec<i64>> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", category.catalog_table());
    let mut stmt = conn.prepare(&sql)?;

    let mut missing = Vec::new();
    for &id in ids {
        let exists: bool = stmt.query_row([id], |row| row.get(0))?;
        if !exists {
            missing.push(id);
        }
    }

    Ok(missing)
}

pub(crate) fn user_exists(conn: &Connection, user_id: i64) -> rusqlite::Result<bool> {
    conn.query_row("SELECT EXISTS(SELECT 1 FROM user WHERE id = ?1)", [user_id], |row| {
        row.get(0)
    })
}
