// Catalog Store - immutable reference entities (characters, planets)
//
// The favorites core only ever references these rows by id. They are
// loaded from CSV by the seeder and never updated afterwards.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

// ============================================================================
// ENTITIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: i64,
    pub name: String,
    pub birth_day: String,
    pub gender: String,
    pub height: i64,
    pub skin_color: String,
    pub hair_color: String,
    pub eye_color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Planet {
    pub id: i64,
    pub name: String,
    pub climate: String,
    pub population: i64,
    pub terrain: String,
    pub rotation_period: i64,
    pub orbital_period: i64,
    pub diameter: i64,
}

/// Outcome of a seeding run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeedReport {
    pub characters_inserted: usize,
    pub planets_inserted: usize,
}

// ============================================================================
// CSV LOADING
// ============================================================================

pub fn load_characters_csv(path: &Path) -> Result<Vec<Character>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    rdr.deserialize()
        .map(|record| record.context("Failed to deserialize character"))
        .collect()
}

pub fn load_planets_csv(path: &Path) -> Result<Vec<Planet>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    rdr.deserialize()
        .map(|record| record.context("Failed to deserialize planet"))
        .collect()
}

// ============================================================================
// PERSISTENCE
// ============================================================================

/// Insert characters, skipping ids already present. Returns rows inserted.
pub fn insert_characters(conn: &Connection, characters: &[Character]) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO character (
            id, name, birth_day, gender, height, skin_color, hair_color, eye_color
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;

    let mut inserted = 0;
    for c in characters {
        inserted += stmt.execute(params![
            c.id,
            c.name,
            c.birth_day,
            c.gender,
            c.height,
            c.skin_color,
            c.hair_color,
            c.eye_color,
        ])?;
    }

    Ok(inserted)
}

/// Insert planets, skipping ids already present. Returns rows inserted.
pub fn insert_planets(conn: &Connection, planets: &[Planet]) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO planet (
            id, name, climate, population, terrain, rotation_period, orbital_period, diameter
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;

    let mut inserted = 0;
    for p in planets {
        inserted += stmt.execute(params![
            p.id,
            p.name,
            p.climate,
            p.population,
            p.terrain,
            p.rotation_period,
            p.orbital_period,
            p.diameter,
        ])?;
    }

    Ok(inserted)
}

/// Load both catalogs from CSV and insert them in one transaction.
/// Safe to run repeatedly: existing ids are left untouched.
pub fn seed_catalog(
    conn: &mut Connection,
    characters_csv: &Path,
    planets_csv: &Path,
) -> Result<SeedReport> {
    let characters = load_characters_csv(characters_csv)?;
    let planets = load_planets_csv(planets_csv)?;

    let tx = conn.transaction()?;
    let report = SeedReport {
        characters_inserted: insert_characters(&tx, &characters)?,
        planets_inserted: insert_planets(&tx, &planets)?,
    };
    tx.commit()?;

    info!(
        characters = report.characters_inserted,
        planets = report.planets_inserted,
        "catalog seeded"
    );

    Ok(report)
}

pub fn list_characters(conn: &Connection) -> Result<Vec<Character>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, birth_day, gender, height, skin_color, hair_color, eye_color
         FROM character
         ORDER BY id",
    )?;

    let characters = stmt
        .query_map([], |row| {
            Ok(Character {
                id: row.get(0)?,
                name: row.get(1)?,
                birth_day: row.get(2)?,
                gender: row.get(3)?,
                height: row.get(4)?,
                skin_color: row.get(5)?,
                hair_color: row.get(6)?,
                eye_color: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(characters)
}

pub fn list_planets(conn: &Connection) -> Result<Vec<Planet>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, climate, population, terrain, rotation_period, orbital_period, diameter
         FROM planet
         ORDER BY id",
    )?;

    let planets = stmt
        .query_map([], |row| {
            Ok(Planet {
                id: row.get(0)?,
                name: row.get(1)?,
                climate: row.get(2)?,
                population: row.get(3)?,
                terrain: row.get(4)?,
                rotation_period: row.get(5)?,
                orbital_period: row.get(6)?,
                diameter: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(planets)
}
