//! Barrel serving: in-memory offset maps over long-lived `.bin` handles,
//! with delta-barrel merging at query time.
//!
//! At startup every present `.idx` is loaded entirely into memory and one
//! read handle per `.bin` is kept open for the process lifetime. A lookup is
//! then O(1): lookup table → offset map → seek + bounded read → decode.
//!
//! The delta barrel ("new docs") is the one mutable piece. Readers see it
//! through an immutable [`DeltaSnapshot`] behind a `parking_lot::RwLock`;
//! the incremental indexer builds a complete replacement snapshot and swaps
//! it in, so a query observes either the pre-write or post-write delta,
//! never a partial one.

use crate::barrel::codec::{self, IdxEntry};
use crate::config::{NEW_DOCS_BARREL, NUM_BARRELS};
use crate::index::inverted::{Posting, PostingList};
use crate::index::partition::{BarrelLookup, JsonBarrel};
use crate::lexicon::LemmaId;
use crate::settings::Settings;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

/// A primary barrel: its offset map and the long-lived `.bin` handle.
struct PrimaryBarrel {
    offsets: HashMap<LemmaId, IdxEntry>,
    file: Mutex<File>,
}

/// Immutable view of the delta barrel published to readers.
#[derive(Default)]
pub struct DeltaSnapshot {
    offsets: HashMap<LemmaId, IdxEntry>,
    file: Option<Mutex<File>>,
}

impl DeltaSnapshot {
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// The barrel index: O(1) posting-list retrieval across all barrels.
pub struct BarrelIndex {
    settings: Settings,
    lookup: RwLock<BarrelLookup>,
    primaries: Vec<Option<PrimaryBarrel>>,
    delta: RwLock<Arc<DeltaSnapshot>>,
    /// Writer-side copy of the delta content, used to rebuild the pair on
    /// each insert. Guarded separately; only the single writer touches it.
    delta_postings: Mutex<HashMap<LemmaId, PostingList>>,
}

impl BarrelIndex {
    /// Open all barrels under the configured layout.
    ///
    /// The lookup table is required. Missing primary barrel files are
    /// tolerated (treated as empty, with a warning); a missing delta pair
    /// just means no documents have been added incrementally.
    pub fn open(settings: &Settings) -> io::Result<Self> {
        let lookup = BarrelLookup::load(&settings.barrel_lookup_path())?;

        let mut primaries = Vec::with_capacity(NUM_BARRELS);
        for barrel_id in 0..NUM_BARRELS as u8 {
            primaries.push(Self::open_primary(settings, barrel_id)?);
        }

        let (snapshot, postings) = Self::load_delta(settings);
        tracing::info!(
            terms = lookup.len(),
            delta_terms = snapshot.len(),
            "barrel index ready"
        );

        Ok(Self {
            settings: settings.clone(),
            lookup: RwLock::new(lookup),
            primaries,
            delta: RwLock::new(Arc::new(snapshot)),
            delta_postings: Mutex::new(postings),
        })
    }

    fn open_primary(settings: &Settings, barrel_id: u8) -> io::Result<Option<PrimaryBarrel>> {
        let idx_path = settings.barrel_idx_path(barrel_id);
        let bin_path = settings.barrel_bin_path(barrel_id);
        if !idx_path.exists() || !bin_path.exists() {
            tracing::warn!(barrel = barrel_id, "barrel files missing, treating as empty");
            return Ok(None);
        }
        let offsets = codec::read_offset_map(&idx_path)?;
        let file = File::open(&bin_path)?;
        Ok(Some(PrimaryBarrel {
            offsets,
            file: Mutex::new(file),
        }))
    }

    /// Load and validate the delta pair. Entries that do not decode to a
    /// well-formed block for their lemma are dropped; this is how a crash
    /// between the `.bin` and `.idx` renames heals itself on restart.
    fn load_delta(settings: &Settings) -> (DeltaSnapshot, HashMap<LemmaId, PostingList>) {
        let idx_path = settings.barrel_idx_path(NEW_DOCS_BARREL);
        let bin_path = settings.barrel_bin_path(NEW_DOCS_BARREL);
        if !idx_path.exists() || !bin_path.exists() {
            return (DeltaSnapshot::default(), HashMap::new());
        }

        let raw_offsets = match codec::read_offset_map(&idx_path) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!("delta barrel idx unreadable, starting empty: {}", e);
                return (DeltaSnapshot::default(), HashMap::new());
            }
        };
        let file = match File::open(&bin_path) {
            Ok(f) => Mutex::new(f),
            Err(e) => {
                tracing::warn!("delta barrel bin unreadable, starting empty: {}", e);
                return (DeltaSnapshot::default(), HashMap::new());
            }
        };

        let mut offsets = HashMap::with_capacity(raw_offsets.len());
        let mut postings = HashMap::with_capacity(raw_offsets.len());
        for (lemma, entry) in raw_offsets {
            match read_block(&file, lemma, &entry) {
                Ok(block) => {
                    offsets.insert(lemma, entry);
                    postings.insert(
                        lemma,
                        PostingList {
                            df: block.df,
                            docs: block.postings,
                        },
                    );
                }
                Err(e) => {
                    tracing::warn!(lemma, "dropping inconsistent delta entry: {}", e);
                }
            }
        }

        (
            DeltaSnapshot {
                offsets,
                file: Some(file),
            },
            postings,
        )
    }

    /// Fetch the merged posting list for a lemma.
    ///
    /// Consults the primary barrel named by the lookup table, then unions in
    /// delta postings, skipping document IDs already present and raising df
    /// only by the newly contributed count, so a document that exists in
    /// both (possible after a compaction) is never double-counted.
    ///
    /// `Ok(None)` means the lemma has no postings anywhere. An `Err` means
    /// this lemma's postings are unavailable (IO or corrupt block); callers
    /// continue the query with the remaining terms.
    pub fn fetch(&self, lemma: LemmaId) -> io::Result<Option<PostingList>> {
        let barrel_id = self.lookup.read().get(lemma);

        let mut list = PostingList::default();
        match barrel_id {
            None => return Ok(None),
            Some(id) if id == NEW_DOCS_BARREL => {}
            Some(id) => {
                if let Some(Some(barrel)) = self.primaries.get(id as usize) {
                    if let Some(entry) = barrel.offsets.get(&lemma) {
                        let block = read_block(&barrel.file, lemma, entry)?;
                        list.df = block.df;
                        list.docs = block.postings;
                    }
                }
            }
        }

        let delta = self.delta.read().clone();
        if let (Some(entry), Some(file)) = (delta.offsets.get(&lemma), delta.file.as_ref()) {
            match read_block(file, lemma, entry) {
                Ok(block) => {
                    for posting in block.postings {
                        list.push_unique(&posting.doc_id, posting.tf);
                    }
                }
                Err(e) => {
                    // The primary result is still good; serve it.
                    tracing::warn!(lemma, "delta postings unavailable: {}", e);
                    if list.docs.is_empty() {
                        return Err(e);
                    }
                }
            }
        }

        if list.docs.is_empty() {
            Ok(None)
        } else {
            Ok(Some(list))
        }
    }

    /// Current number of lemmas with a delta posting list.
    pub fn delta_term_count(&self) -> usize {
        self.delta.read().len()
    }

    /// Append one document's postings to the delta barrel and publish the
    /// new snapshot. Called by the incremental indexer under its write lock.
    ///
    /// The delta pair is rewritten whole (it stays small between
    /// compactions): `.bin` is written and fsynced before `.idx`, and the
    /// in-memory snapshot swap happens only after both files are in place.
    pub fn append_delta_document(
        &self,
        doc_id: &str,
        freqs: &HashMap<LemmaId, i32>,
    ) -> io::Result<()> {
        let mut postings = self.delta_postings.lock();
        for (&lemma, &tf) in freqs {
            postings.entry(lemma).or_default().push_unique(doc_id, tf);
        }

        // Textual twin, so an offline rebuild can fold the delta back in.
        let mut twin = JsonBarrel::empty(NEW_DOCS_BARREL);
        twin.num_terms = postings.len();
        twin.postings = postings
            .iter()
            .map(|(lemma, list)| (lemma.to_string(), list.clone()))
            .collect();
        std::fs::create_dir_all(self.settings.barrels_dir())?;
        twin.save(&self.settings.json_barrel_path(NEW_DOCS_BARREL))?;

        let bin_path = self.settings.barrel_bin_path(NEW_DOCS_BARREL);
        let idx_path = self.settings.barrel_idx_path(NEW_DOCS_BARREL);
        let offsets = codec::write_barrel_files(
            &bin_path,
            &idx_path,
            postings
                .iter()
                .map(|(&lemma, list)| (lemma, list.df, list.docs.as_slice())),
        )?;

        let file = File::open(&bin_path)?;
        let snapshot = Arc::new(DeltaSnapshot {
            offsets,
            file: Some(Mutex::new(file)),
        });
        *self.delta.write() = snapshot;

        // New lemmas become reachable through the lookup table; lemmas that
        // already live in a primary barrel keep their assignment.
        let mut lookup = self.lookup.write();
        let mut added = false;
        for &lemma in freqs.keys() {
            if !lookup.contains(lemma) {
                lookup.insert(lemma, NEW_DOCS_BARREL);
                added = true;
            }
        }
        if added {
            lookup.save(&self.settings.barrel_lookup_path())?;
        }
        Ok(())
    }
}

/// Seek to an idx entry and decode its block, verifying the lemma matches.
fn read_block(
    file: &Mutex<File>,
    lemma: LemmaId,
    entry: &IdxEntry,
) -> io::Result<codec::PostingBlock> {
    entry.validate()?;
    let mut buf = vec![0u8; entry.length as usize];
    {
        let mut file = file.lock();
        file.seek(SeekFrom::Start(entry.offset as u64))?;
        file.read_exact(&mut buf)?;
    }
    let block = codec::decode_block(&buf)?;
    if block.lemma_id != lemma {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "idx entry for lemma {} points at block for lemma {}",
                lemma, block.lemma_id
            ),
        ));
    }
    Ok(block)
}
