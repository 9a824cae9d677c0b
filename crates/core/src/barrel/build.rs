//! Build-side conversion of textual barrels into binary pairs.
//!
//! Converts each `inverted_barrel_K.json` into `barrel_K.bin` + `.idx`.
//! Missing textual barrels are skipped with a warning, matching the serving
//! side's tolerance for missing barrel files.

use crate::barrel::codec;
use crate::config::NUM_BARRELS;
use crate::index::inverted::PostingList;
use crate::index::partition::JsonBarrel;
use crate::lexicon::LemmaId;
use crate::settings::Settings;
use std::io;

/// Convert one textual barrel to its binary pair. Returns the number of
/// terms written, or 0 if the textual barrel does not exist.
pub fn convert_barrel(settings: &Settings, barrel_id: u8) -> io::Result<usize> {
    let json_path = settings.json_barrel_path(barrel_id);
    if !json_path.exists() {
        tracing::warn!(barrel = barrel_id, "textual barrel not found, skipping");
        return Ok(0);
    }

    let barrel = JsonBarrel::load(&json_path)?;
    let mut entries: Vec<(LemmaId, PostingList)> = Vec::with_capacity(barrel.postings.len());
    for (lemma_key, list) in barrel.postings {
        let lemma: LemmaId = lemma_key.parse().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "non-numeric lemma key '{}' in {}",
                    lemma_key,
                    json_path.display()
                ),
            )
        })?;
        entries.push((lemma, list));
    }

    codec::write_barrel_files(
        &settings.barrel_bin_path(barrel_id),
        &settings.barrel_idx_path(barrel_id),
        entries.iter().map(|(lemma, list)| (*lemma, list.df, list.docs.as_slice())),
    )?;
    Ok(entries.len())
}

/// Convert all ten primary barrels. Returns the total term count.
pub fn convert_all_barrels(settings: &Settings) -> io::Result<usize> {
    let mut total = 0;
    for barrel_id in 0..NUM_BARRELS as u8 {
        let terms = convert_barrel(settings, barrel_id)?;
        tracing::debug!(barrel = barrel_id, terms, "barrel converted");
        total += terms;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::partition::build_barrels;
    use std::path::Path;

    fn test_settings(dir: &Path) -> Settings {
        Settings {
            data_dir: dir.join("data"),
            indexes_dir: dir.join("indexes"),
            lexicon_file: "lexicon.json".into(),
            forward_index_file: "forward_index.txt".into(),
            inverted_index_file: "inverted_index.txt".into(),
            barrels_dir: "barrels".into(),
            barrel_lookup: "barrel_lookup.json".into(),
            json_data: "pmc_json".into(),
        }
    }

    #[test]
    fn test_convert_round_trips_through_serving_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let settings = test_settings(tmp.path());
        std::fs::create_dir_all(&settings.indexes_dir).unwrap();
        std::fs::write(
            settings.inverted_index_path(),
            "1|2|PMC1:3,PMC2:1\n2|1|PMC3:5\n",
        )
        .unwrap();
        build_barrels(&settings).unwrap();

        let total = convert_all_barrels(&settings).unwrap();
        assert_eq!(total, 2);

        let index = crate::barrel::BarrelIndex::open(&settings).unwrap();
        let list = index.fetch(1).unwrap().unwrap();
        assert_eq!(list.df, 2);
        let tfs: Vec<i32> = list.docs.iter().map(|p| p.tf).collect();
        assert!(tfs.contains(&3) && tfs.contains(&1));
    }

    #[test]
    fn test_missing_textual_barrel_skipped() {
        let tmp = tempfile::TempDir::new().unwrap();
        let settings = test_settings(tmp.path());
        assert_eq!(convert_barrel(&settings, 4).unwrap(), 0);
    }
}
