//! Binary barrel codec: the `.bin`/`.idx` pair format.
//!
//! All integers are little-endian. The `.idx` file is a header
//! `num_entries: i32` followed by `num_entries` records of
//! `(lemma_id: i32, offset: i64, length: i64)`. The `.bin` file is a
//! concatenation of posting blocks:
//!
//! ```text
//! [lemma_id: i32][df: i32][num_docs: i32]
//! num_docs × [doc_id: 20 bytes, NUL-padded][tf: i32]
//! ```
//!
//! Decoding is the hot path of every query and runs over untrusted bytes, so
//! it is a typed, bounds-checked reader over a contiguous slice. A corrupt
//! block fails the lemma with `InvalidData`; it can never panic or crash the
//! process.

use crate::config::DOC_ID_SIZE;
use crate::index::inverted::Posting;
use crate::lexicon::LemmaId;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Byte size of a posting block header (`lemma_id`, `df`, `num_docs`).
pub const BLOCK_HEADER_SIZE: usize = 12;

/// Byte size of one encoded posting (20-byte doc ID + i32 tf).
pub const POSTING_SIZE: usize = DOC_ID_SIZE + 4;

/// Upper bound accepted for a single block, guarding allocations against a
/// corrupt idx entry. Generous: ~10M postings.
const MAX_BLOCK_LEN: i64 = 256 * 1024 * 1024;

/// One `.idx` record: where a lemma's block lives in the `.bin` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdxEntry {
    pub offset: i64,
    pub length: i64,
}

impl IdxEntry {
    /// Validate that this entry can describe a well-formed block.
    pub fn validate(&self) -> io::Result<()> {
        if self.offset < 0 || self.length < BLOCK_HEADER_SIZE as i64 || self.length > MAX_BLOCK_LEN
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "implausible idx entry: offset={} length={}",
                    self.offset, self.length
                ),
            ));
        }
        Ok(())
    }
}

/// A decoded posting block.
#[derive(Debug, Clone, PartialEq)]
pub struct PostingBlock {
    pub lemma_id: LemmaId,
    pub df: i32,
    pub postings: Vec<Posting>,
}

/// Append one encoded block to `buf`. Document IDs longer than 19 bytes or
/// containing NUL are rejected before any bytes are written.
pub fn encode_block(
    buf: &mut Vec<u8>,
    lemma_id: LemmaId,
    df: i32,
    postings: &[Posting],
) -> io::Result<()> {
    for posting in postings {
        let id = posting.doc_id.as_bytes();
        if id.is_empty() || id.len() > DOC_ID_SIZE || id.contains(&0) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("document ID not encodable: {:?}", posting.doc_id),
            ));
        }
    }

    buf.extend_from_slice(&lemma_id.to_le_bytes());
    buf.extend_from_slice(&df.to_le_bytes());
    buf.extend_from_slice(&(postings.len() as i32).to_le_bytes());
    for posting in postings {
        let id = posting.doc_id.as_bytes();
        buf.extend_from_slice(id);
        buf.extend(std::iter::repeat(0u8).take(DOC_ID_SIZE - id.len()));
        buf.extend_from_slice(&posting.tf.to_le_bytes());
    }
    Ok(())
}

/// Decode exactly one posting block from `bytes`.
///
/// The slice must span the block precisely: trailing bytes are as much a
/// corruption signal as missing ones, since idx entries record exact lengths.
pub fn decode_block(bytes: &[u8]) -> io::Result<PostingBlock> {
    let mut reader = SliceReader::new(bytes);
    let lemma_id = reader.read_i32()?;
    let df = reader.read_i32()?;
    let num_docs = reader.read_i32()?;

    if num_docs < 0 {
        return Err(corrupt(format!("negative posting count {}", num_docs)));
    }
    let expected = BLOCK_HEADER_SIZE + num_docs as usize * POSTING_SIZE;
    if bytes.len() != expected {
        return Err(corrupt(format!(
            "block size mismatch: {} bytes for {} postings (expected {})",
            bytes.len(),
            num_docs,
            expected
        )));
    }

    let mut postings = Vec::with_capacity(num_docs as usize);
    for _ in 0..num_docs {
        let raw_id = reader.read_bytes(DOC_ID_SIZE)?;
        let tf = reader.read_i32()?;
        // IDs are right-padded with NULs; an ID may also fill all 20 bytes
        // with no terminator.
        let id_len = raw_id.iter().position(|&b| b == 0).unwrap_or(DOC_ID_SIZE);
        let doc_id = std::str::from_utf8(&raw_id[..id_len])
            .map_err(|_| corrupt("non-UTF8 document ID".to_string()))?
            .to_string();
        if doc_id.is_empty() {
            return Err(corrupt("empty document ID in posting".to_string()));
        }
        postings.push(Posting { doc_id, tf });
    }

    Ok(PostingBlock {
        lemma_id,
        df,
        postings,
    })
}

fn corrupt(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Bounds-checked cursor over a byte slice.
struct SliceReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_bytes(&mut self, n: usize) -> io::Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or_else(|| {
            corrupt("block length overflow".to_string())
        })?;
        let slice = self.bytes.get(self.pos..end).ok_or_else(|| {
            corrupt(format!(
                "truncated block: wanted {} bytes at {}, have {}",
                n,
                self.pos,
                self.bytes.len()
            ))
        })?;
        self.pos = end;
        Ok(slice)
    }

    fn read_i32(&mut self) -> io::Result<i32> {
        let bytes = self.read_bytes(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// Load a `.idx` file into an in-memory offset map.
pub fn read_offset_map(path: &Path) -> io::Result<HashMap<LemmaId, IdxEntry>> {
    let mut reader = BufReader::new(File::open(path)?);

    let mut i32_buf = [0u8; 4];
    reader.read_exact(&mut i32_buf)?;
    let num_entries = i32::from_le_bytes(i32_buf);
    if num_entries < 0 {
        return Err(corrupt(format!("negative idx entry count {}", num_entries)));
    }

    let mut map = HashMap::with_capacity(num_entries as usize);
    let mut i64_buf = [0u8; 8];
    for _ in 0..num_entries {
        reader.read_exact(&mut i32_buf)?;
        let lemma_id = i32::from_le_bytes(i32_buf);
        reader.read_exact(&mut i64_buf)?;
        let offset = i64::from_le_bytes(i64_buf);
        reader.read_exact(&mut i64_buf)?;
        let length = i64::from_le_bytes(i64_buf);
        map.insert(lemma_id, IdxEntry { offset, length });
    }
    Ok(map)
}

/// Write a complete `.bin`/`.idx` pair for one barrel.
///
/// Blocks are streamed to a temp `.bin`, then the `.idx` is written from the
/// recorded offsets; both files are fsynced before being renamed into place
/// (`.bin` first, so a visible idx never precedes its data). Returns the
/// offset map describing the new pair.
pub fn write_barrel_files<'a>(
    bin_path: &Path,
    idx_path: &Path,
    entries: impl Iterator<Item = (LemmaId, i32, &'a [Posting])>,
) -> io::Result<HashMap<LemmaId, IdxEntry>> {
    if let Some(parent) = bin_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let bin_tmp = bin_path.with_extension("bin.tmp");
    let idx_tmp = idx_path.with_extension("idx.tmp");

    let mut offsets: Vec<(LemmaId, IdxEntry)> = Vec::new();
    {
        let mut writer = BufWriter::new(File::create(&bin_tmp)?);
        let mut position: i64 = 0;
        let mut buf = Vec::new();
        for (lemma_id, df, postings) in entries {
            buf.clear();
            encode_block(&mut buf, lemma_id, df, postings)?;
            writer.write_all(&buf)?;
            offsets.push((
                lemma_id,
                IdxEntry {
                    offset: position,
                    length: buf.len() as i64,
                },
            ));
            position += buf.len() as i64;
        }
        writer.flush()?;
        writer.get_mut().sync_all()?;
    }

    {
        let mut writer = BufWriter::new(File::create(&idx_tmp)?);
        writer.write_all(&(offsets.len() as i32).to_le_bytes())?;
        for (lemma_id, entry) in &offsets {
            writer.write_all(&lemma_id.to_le_bytes())?;
            writer.write_all(&entry.offset.to_le_bytes())?;
            writer.write_all(&entry.length.to_le_bytes())?;
        }
        writer.flush()?;
        writer.get_mut().sync_all()?;
    }

    fs::rename(&bin_tmp, bin_path)?;
    fs::rename(&idx_tmp, idx_path)?;

    Ok(offsets.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(doc_id: &str, tf: i32) -> Posting {
        Posting {
            doc_id: doc_id.to_string(),
            tf,
        }
    }

    #[test]
    fn test_block_round_trip() {
        let postings = vec![posting("PMC7134257", 3), posting("PMC5583365", 7)];
        let mut buf = Vec::new();
        encode_block(&mut buf, 42, 2, &postings).unwrap();

        let block = decode_block(&buf).unwrap();
        assert_eq!(block.lemma_id, 42);
        assert_eq!(block.df, 2);
        assert_eq!(block.postings, postings);
    }

    #[test]
    fn test_short_id_is_trimmed_of_padding() {
        let mut buf = Vec::new();
        encode_block(&mut buf, 1, 1, &[posting("A", 5)]).unwrap();
        assert_eq!(buf.len(), BLOCK_HEADER_SIZE + POSTING_SIZE);

        let block = decode_block(&buf).unwrap();
        assert_eq!(block.postings[0].doc_id, "A");
    }

    #[test]
    fn test_twenty_byte_id_without_terminator() {
        // Exactly DOC_ID_SIZE bytes: no NUL terminator on disk, still decodes.
        let id = "D".repeat(DOC_ID_SIZE);
        let mut buf = Vec::new();
        buf.extend_from_slice(&9i32.to_le_bytes());
        buf.extend_from_slice(&1i32.to_le_bytes());
        buf.extend_from_slice(&1i32.to_le_bytes());
        buf.extend_from_slice(id.as_bytes());
        buf.extend_from_slice(&2i32.to_le_bytes());

        let block = decode_block(&buf).unwrap();
        assert_eq!(block.postings[0].doc_id, id);
        assert_eq!(block.postings[0].tf, 2);
    }

    #[test]
    fn test_encode_rejects_oversized_or_nul_ids() {
        let mut buf = Vec::new();
        let too_long = "X".repeat(DOC_ID_SIZE + 1);
        assert!(encode_block(&mut buf, 1, 1, &[posting(&too_long, 1)]).is_err());
        assert!(encode_block(&mut buf, 1, 1, &[posting("a\0b", 1)]).is_err());
        assert!(buf.is_empty(), "rejected encode must not write bytes");
    }

    #[test]
    fn test_decode_rejects_truncated_block() {
        let mut buf = Vec::new();
        encode_block(&mut buf, 7, 1, &[posting("PMC1", 1)]).unwrap();
        buf.truncate(buf.len() - 3);
        assert!(decode_block(&buf).is_err());
    }

    #[test]
    fn test_decode_rejects_trailing_garbage() {
        let mut buf = Vec::new();
        encode_block(&mut buf, 7, 1, &[posting("PMC1", 1)]).unwrap();
        buf.extend_from_slice(&[0xAB; 4]);
        assert!(decode_block(&buf).is_err());
    }

    #[test]
    fn test_decode_rejects_negative_doc_count() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1i32.to_le_bytes());
        buf.extend_from_slice(&1i32.to_le_bytes());
        buf.extend_from_slice(&(-1i32).to_le_bytes());
        assert!(decode_block(&buf).is_err());
    }

    #[test]
    fn test_decode_never_panics_on_arbitrary_bytes() {
        for len in 0..64 {
            let junk: Vec<u8> = (0..len).map(|i| (i * 37 + 11) as u8).collect();
            let _ = decode_block(&junk);
        }
    }

    #[test]
    fn test_write_barrel_files_round_trip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let bin = tmp.path().join("barrel_0.bin");
        let idx = tmp.path().join("barrel_0.idx");

        let a = vec![posting("PMC1", 3), posting("PMC2", 1)];
        let b = vec![posting("PMC3", 9)];
        let entries: Vec<(LemmaId, i32, &[Posting])> =
            vec![(10, 2, a.as_slice()), (11, 1, b.as_slice())];
        let offsets = write_barrel_files(&bin, &idx, entries.into_iter()).unwrap();
        assert_eq!(offsets.len(), 2);

        // The idx on disk must agree with the returned map, and each entry
        // must span exactly one well-formed block with the right lemma.
        let loaded = read_offset_map(&idx).unwrap();
        assert_eq!(loaded, offsets);

        let data = std::fs::read(&bin).unwrap();
        for (lemma, entry) in &loaded {
            entry.validate().unwrap();
            let start = entry.offset as usize;
            let end = start + entry.length as usize;
            let block = decode_block(&data[start..end]).unwrap();
            assert_eq!(block.lemma_id, *lemma);
        }
    }

    #[test]
    fn test_idx_entry_validation() {
        assert!(IdxEntry { offset: -1, length: 24 }.validate().is_err());
        assert!(IdxEntry { offset: 0, length: 4 }.validate().is_err());
        assert!(IdxEntry { offset: 0, length: 36 }.validate().is_ok());
    }
}
