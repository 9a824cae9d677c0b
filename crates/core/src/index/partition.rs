//! Barrel partitioner: splits the inverted index into ten
//! frequency-partitioned barrels and emits the total lookup table.
//!
//! Partitioning is by document frequency class:
//! - barrel 0 (hot): `df > 10_000`
//! - barrels 1..=6 (warm): `df > 1_000`, spread by `lemma_id % 6`
//! - barrels 7..=9 (cold): everything else, spread by `lemma_id % 3`
//!
//! Threshold comparisons are strict: df exactly 10_000 is warm and df
//! exactly 1_000 is cold. Every lemma with a non-empty posting list lands in
//! exactly one primary barrel, and the lookup table `lemma_id → barrel_id`
//! is total over present lemmas.

use crate::config::{HOT_DF_THRESHOLD, NUM_BARRELS, WARM_DF_THRESHOLD};
use crate::index::inverted::{self, PostingList};
use crate::lexicon::{atomic_write, LemmaId};
use crate::settings::Settings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

/// Assign a lemma to its primary barrel by frequency class.
pub fn barrel_for(lemma_id: LemmaId, df: i32) -> u8 {
    if df > HOT_DF_THRESHOLD {
        0
    } else if df > WARM_DF_THRESHOLD {
        1 + (lemma_id.rem_euclid(6)) as u8
    } else {
        7 + (lemma_id.rem_euclid(3)) as u8
    }
}

/// Frequency class label stored in each JSON barrel.
fn barrel_type(barrel_id: u8) -> &'static str {
    match barrel_id {
        0 => "HOT",
        1..=6 => "WARM",
        7..=9 => "COLD",
        _ => "NEW_DOCS",
    }
}

/// On-disk shape of a textual barrel file.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonBarrel {
    pub barrel_id: u8,
    #[serde(rename = "type")]
    pub barrel_type: String,
    pub num_terms: usize,
    pub postings: HashMap<String, PostingList>,
}

impl JsonBarrel {
    pub fn empty(barrel_id: u8) -> Self {
        Self {
            barrel_id,
            barrel_type: barrel_type(barrel_id).to_string(),
            num_terms: 0,
            postings: HashMap::new(),
        }
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid barrel {}: {}", path.display(), e),
            )
        })
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let bytes = serde_json::to_vec(self).map_err(io::Error::other)?;
        atomic_write(path, &bytes)
    }
}

/// Lookup table mapping every present lemma to its barrel.
#[derive(Debug, Default)]
pub struct BarrelLookup {
    map: HashMap<LemmaId, u8>,
}

impl BarrelLookup {
    pub fn get(&self, lemma: LemmaId) -> Option<u8> {
        self.map.get(&lemma).copied()
    }

    pub fn insert(&mut self, lemma: LemmaId, barrel_id: u8) {
        self.map.insert(lemma, barrel_id);
    }

    pub fn contains(&self, lemma: LemmaId) -> bool {
        self.map.contains_key(&lemma)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LemmaId, u8)> + '_ {
        self.map.iter().map(|(&l, &b)| (l, b))
    }

    /// Load from JSON (`{"<lemma_id>": barrel_id}`).
    pub fn load(path: &Path) -> io::Result<Self> {
        let raw = fs::read_to_string(path)?;
        let string_map: HashMap<String, u8> = serde_json::from_str(&raw).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid barrel lookup {}: {}", path.display(), e),
            )
        })?;
        let mut map = HashMap::with_capacity(string_map.len());
        for (key, barrel_id) in string_map {
            let lemma: LemmaId = key.parse().map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("non-numeric lemma key '{}' in barrel lookup", key),
                )
            })?;
            map.insert(lemma, barrel_id);
        }
        Ok(Self { map })
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let string_map: HashMap<String, u8> =
            self.map.iter().map(|(l, b)| (l.to_string(), *b)).collect();
        let bytes = serde_json::to_vec(&string_map).map_err(io::Error::other)?;
        atomic_write(path, &bytes)
    }
}

/// Per-class term counts reported by a partitioning run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PartitionSummary {
    pub hot: usize,
    pub warm: usize,
    pub cold: usize,
}

/// Read the textual inverted index, write the ten JSON barrels and the
/// lookup table under the configured paths.
pub fn build_barrels(settings: &Settings) -> io::Result<PartitionSummary> {
    let mut barrels: Vec<JsonBarrel> = (0..NUM_BARRELS as u8).map(JsonBarrel::empty).collect();
    let mut lookup = BarrelLookup::default();
    let mut summary = PartitionSummary::default();

    inverted::scan(&settings.inverted_index_path(), |lemma, df, postings| {
        if postings.is_empty() {
            return;
        }
        let barrel_id = barrel_for(lemma, df);
        match barrel_id {
            0 => summary.hot += 1,
            1..=6 => summary.warm += 1,
            _ => summary.cold += 1,
        }
        let barrel = &mut barrels[barrel_id as usize];
        barrel
            .postings
            .insert(lemma.to_string(), PostingList { df, docs: postings });
        barrel.num_terms += 1;
        lookup.insert(lemma, barrel_id);
    })?;

    fs::create_dir_all(settings.barrels_dir())?;
    for barrel in &barrels {
        barrel.save(&settings.json_barrel_path(barrel.barrel_id))?;
    }
    lookup.save(&settings.barrel_lookup_path())?;

    tracing::info!(
        hot = summary.hot,
        warm = summary.warm,
        cold = summary.cold,
        "partitioned inverted index into {} barrels",
        NUM_BARRELS
    );
    Ok(summary)
}
