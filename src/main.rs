use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use favorites::logging::init_logging;
use favorites::{list_characters, list_planets, open_database, seed_catalog, store_stats, Config};

fn main() -> Result<()> {
    init_logging("info");

    let args: Vec<String> = env::args().collect();
    let config = Config::from_env()?;

    match args.get(1).map(String::as_str) {
        Some("seed") => run_seed(&config, &args[2..])?,
        Some("stats") | None => run_stats(&config)?,
        Some(other) => {
            eprintln!("❌ Unknown command: {}", other);
            eprintln!("   Usage: favorites [seed [characters.csv] [planets.csv] | stats]");
            std::process::exit(2);
        }
    }

    Ok(())
}

fn run_seed(config: &Config, paths: &[String]) -> Result<()> {
    println!("🌱 Seeding catalogs");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let characters_csv = paths
        .first()
        .map(PathBuf::from)
        .unwrap_or_else(|| config.characters_csv.clone());
    let planets_csv = paths
        .get(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.planets_csv.clone());

    let mut conn = open_database(&config.db_path, config.db_busy_timeout)?;
    let report = seed_catalog(&mut conn, &characters_csv, &planets_csv)
        .context("Seeding failed")?;

    println!("✓ Characters inserted: {}", report.characters_inserted);
    println!("✓ Planets inserted: {}", report.planets_inserted);
    println!("✓ Catalog now holds {} characters, {} planets",
        list_characters(&conn)?.len(),
        list_planets(&conn)?.len()
    );

    Ok(())
}

fn run_stats(config: &Config) -> Result<()> {
    let conn = open_database(&config.db_path, config.db_busy_timeout)?;
    let stats = store_stats(&conn)?;

    println!("📊 Favorites store: {}", config.db_path);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  users:               {}", stats.users);
    println!("  characters:          {}", stats.characters);
    println!("  planets:             {}", stats.planets);
    println!("  favorite characters: {}", stats.favorite_characters);
    println!("  favorite planets:    {}", stats.favorite_planets);
    println!("  events:              {}", stats.events);

    Ok(())
}
