//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! - name: Rope sandals
//!   description: Hand-braided, one size fits most.
//!   price: 2499        # minor units
//!   stock: 40
//!   images:
//!     - uploads/sandals-front.png
//!     - uploads/sandals-side.png
//! - name: Straw hat
//!   price: 1500
//!   stock: 12
//! ```
//!
//! Image entries are stored paths; the API prefixes them with its asset base
//! URL when serving.

use std::path::Path;

use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info};

use cartwheel_api::db::store::{NewImage, NewItem};
use cartwheel_api::db::{ItemRepository, UserRepository};
use cartwheel_api::services::ids::IdGenerator;
use cartwheel_core::{Price, UserId, Username};

use super::connect;

/// One catalog entry in the seed file.
#[derive(Debug, Deserialize)]
struct SeedItem {
    name: String,
    #[serde(default)]
    description: String,
    price: i64,
    stock: i32,
    #[serde(default)]
    images: Vec<String>,
}

impl SeedItem {
    fn into_new_item(self, ids: &IdGenerator, owner: UserId) -> NewItem {
        NewItem {
            id: ids.next_id(),
            name: self.name,
            description: self.description,
            price: Price::from_minor(self.price),
            stock: self.stock,
            created_by: owner,
            created_at: Utc::now(),
            images: self
                .images
                .into_iter()
                .map(|url| NewImage {
                    id: ids.next_id(),
                    url,
                })
                .collect(),
        }
    }
}

/// Reject entries the API itself would refuse.
fn validate(items: &[SeedItem]) -> Vec<String> {
    let mut errors = Vec::new();
    for (n, item) in items.iter().enumerate() {
        if item.name.trim().is_empty() {
            errors.push(format!("entry {n}: name is empty"));
        }
        if item.price < 0 {
            errors.push(format!("entry {n} ({}): price is negative", item.name));
        }
        if item.stock < 0 {
            errors.push(format!("entry {n} ({}): stock is negative", item.name));
        }
    }
    errors
}

/// Seed catalog items from a YAML file.
///
/// # Arguments
///
/// * `file_path` - Path to the YAML file
/// * `owner` - Username recorded as creator of every item
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails validation, if the
/// owner does not exist, or if database operations fail.
pub async fn items(file_path: &str, owner: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog items from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let entries: Vec<SeedItem> = serde_yaml::from_str(&content)?;

    let errors = validate(&entries);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    info!(items = entries.len(), "Parsed seed file");

    let (config, store) = connect().await?;
    let ids = IdGenerator::new(config.node_id)?;

    let owner = Username::parse(owner)?;
    let owner = UserRepository::new(&store)
        .get_by_username(&owner)
        .await?
        .ok_or_else(|| format!("Owner not found: {owner}"))?;

    let repo = ItemRepository::new(&store);
    let mut images = 0;
    for entry in entries {
        let item = repo.create(entry.into_new_item(&ids, owner.id)).await?;
        images += item.images.len();
        info!(item_id = %item.id, name = %item.name, "Item created");
    }

    info!("Seeding complete!");
    info!("  Images attached: {images}");

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
- name: Rope sandals
  description: Hand-braided.
  price: 2499
  stock: 40
  images: [uploads/a.png, uploads/b.png]
- name: Straw hat
  price: 1500
  stock: 12
";

    #[test]
    fn test_parse_seed_file() {
        let items: Vec<SeedItem> = serde_yaml::from_str(SAMPLE).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].images, ["uploads/a.png", "uploads/b.png"]);
        assert!(items[1].description.is_empty());
        assert!(items[1].images.is_empty());
        assert!(validate(&items).is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_entries() {
        let items: Vec<SeedItem> =
            serde_yaml::from_str("- {name: ' ', price: -1, stock: -2}").unwrap();

        assert_eq!(validate(&items).len(), 3);
    }

    #[test]
    fn test_into_new_item_assigns_distinct_ids() {
        let ids = IdGenerator::new(1).unwrap();
        let items: Vec<SeedItem> = serde_yaml::from_str(SAMPLE).unwrap();
        let owner = UserId::new(7);

        let new = items.into_iter().next().unwrap().into_new_item(&ids, owner);

        assert_eq!(new.created_by, owner);
        assert_eq!(new.price, Price::from_minor(2499));
        assert_eq!(new.images.len(), 2);
        assert_ne!(new.images[0].id, new.images[1].id);
    }
}
