//! Initial camps and pricing from `config/seed.toml`.
//!
//! Applied only to an empty store, so restarting never duplicates rows.

use camp_core::{AdminGateway, CampDraft, PricingItemDraft, SharedStore};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub camps: Vec<CampDraft>,
    #[serde(default)]
    pub pricing: Vec<PricingItemDraft>,
}

impl SeedFile {
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Load the seed file from the usual locations
pub fn load_seed_file() -> anyhow::Result<Option<SeedFile>> {
    let config_paths = [
        "config/seed.toml",
        "../config/seed.toml",
        "../../config/seed.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            let seed = SeedFile::parse(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
            info!(
                "Loaded {} camps and {} pricing items from {}",
                seed.camps.len(),
                seed.pricing.len(),
                path
            );
            return Ok(Some(seed));
        }
    }

    warn!("No seed file found");
    Ok(None)
}

/// Insert the seed through the admin gateway if the store has no camps yet.
/// Returns how many camps were created.
pub async fn apply_seed(
    seed: SeedFile,
    store: &SharedStore,
    admin: &AdminGateway,
) -> anyhow::Result<usize> {
    if !store.list_camps(true).await?.is_empty() {
        info!("Store already has camps, skipping seed");
        return Ok(0);
    }

    let mut created = 0;
    for draft in seed.camps {
        admin.create_camp(draft).await?;
        created += 1;
    }
    for draft in seed.pricing {
        admin.create_pricing_item(draft).await?;
    }
    Ok(created)
}
