//! Binary-tree match finder over a ring-buffer dictionary.
//!
//! The dictionary is a power-of-two ring of `max_dict_size` bytes followed
//! by a mirror of its head, so a match starting near the end of the ring can
//! be compared with plain slice indexing. Every position is inserted into a
//! binary search tree rooted at the hash bucket of its first three bytes;
//! the tree is ordered by the bytes following each node, which lets one walk
//! find the longest matches while re-rooting the tree at the new position.
//!
//! Tree links and hash entries are ring positions plus one (zero is empty),
//! never pointers. A link is dead when the distance it implies is zero or
//! exceeds the history that is valid at the time of the walk, so stale
//! entries need no cleanup.
//!
//! Usage per block: [`SearchAccelerator::add_bytes_begin`] copies the block
//! in, [`SearchAccelerator::add_bytes_end`] searches every lookahead
//! position, the parser reads the per-position candidate lists and
//! [`SearchAccelerator::advance_bytes`] slides the window.

use crate::error::{LzhamError, Result};
use crate::tables::{MAX_HUGE_MATCH_LEN, MAX_LEN2_MATCH_DIST, MAX_MATCH_LEN, MIN_MATCH_LEN};
use tracing::debug;

/// Hash entries with the 24-bit exact hash.
pub const HASH_SIZE_24: usize = 1 << 24;
/// Hash entries with the 16-bit hash.
pub const HASH_SIZE_16: usize = 1 << 16;
/// Digram (length-2 match) hash entries.
pub const DIGRAM_HASH_SIZE: usize = 4096;

/// Upper bound on tree nodes visited per position.
pub const MAX_SUPPORTED_PROBES: u32 = 128;
/// Upper bound on helper threads the accelerator accepts.
pub const MAX_SUPPORTED_THREADS: u32 = 32;

/// Shortest match the tree search reports.
const MIN_TREE_MATCH_LEN: u32 = 3;

/// Empty hash entry or tree link. Stored links are absolute position + 1.
const NIL: u32 = 0;

/// Match finder behaviour flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccelFlags(u32);

impl AccelFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Results must not depend on thread scheduling.
    pub const DETERMINISTIC: Self = Self(1);
    /// Maintain the digram index for length-2 matches.
    pub const LEN2_MATCHES: Self = Self(2);
    /// Use the 24-bit exact hash instead of the 16-bit one.
    pub const HASH24: Self = Self(4);

    /// Whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for AccelFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for AccelFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Match finder construction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccelConfig {
    /// Requested helper threads (recorded, always run single-threaded).
    pub max_helper_threads: u32,
    /// Dictionary size, must be a power of two.
    pub max_dict_size: u32,
    /// Candidates kept per position.
    pub max_matches: u32,
    /// Report every match instead of one per distinct length.
    pub all_matches: bool,
    /// Tree nodes visited per position.
    pub max_probes: u32,
    /// Behaviour flags.
    pub flags: AccelFlags,
}

/// A match candidate: distance and biased length, with the list-end marker
/// in the top distance bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DictMatch {
    dist: u32,
    len: u16,
}

impl DictMatch {
    const LAST_FLAG: u32 = 0x8000_0000;

    fn new(dist: u32, len: u32, last: bool) -> Self {
        Self {
            dist: if last { dist | Self::LAST_FLAG } else { dist },
            len: (len - MIN_MATCH_LEN) as u16,
        }
    }

    /// Match distance (at least 1).
    pub fn dist(&self) -> u32 {
        self.dist & !Self::LAST_FLAG
    }

    /// Match length in bytes.
    pub fn len(&self) -> u32 {
        self.len as u32 + MIN_MATCH_LEN
    }

    /// Whether this is the final entry of its position's list.
    pub fn is_last(&self) -> bool {
        self.dist & Self::LAST_FLAG != 0
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Node {
    left: u32,
    right: u32,
}

/// The link a tree walk writes next.
#[derive(Debug, Clone, Copy)]
enum Child {
    Left(u32),
    Right(u32),
}

/// Sliding dictionary with binary-tree match search.
#[derive(Debug)]
pub struct SearchAccelerator {
    max_helper_threads: u32,
    max_dict_size: u32,
    max_dict_size_mask: u32,

    /// Absolute position of the first lookahead byte.
    lookahead_pos: u32,
    /// Bytes added but not yet advanced over.
    lookahead_size: u32,
    /// Valid history before `lookahead_pos`.
    cur_dict_size: u32,

    /// Ring plus mirror region.
    dict: Vec<u8>,
    hash: Vec<u32>,
    nodes: Vec<Node>,

    matches: Vec<DictMatch>,
    /// Start of each lookahead position's list in `matches`, -1 for none.
    match_refs: Vec<i32>,

    digram_hash: Vec<u32>,
    /// Distance to the previous occurrence of each lookahead position's digram.
    digram_next: Vec<u32>,

    /// Per-walk candidates, `(distance, length)`.
    scratch: Vec<(u32, u32)>,

    max_probes: u32,
    max_matches: u32,
    all_matches: bool,
    deterministic: bool,
    len2_matches: bool,
    hash24: bool,
}

fn try_filled<T: Clone>(len: usize, value: T) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|e| {
        LzhamError::failed_initializing(format!("match finder allocation of {len} entries: {e}"))
    })?;
    buf.resize(len, value);
    Ok(buf)
}

/// Zero a table in place by repeatedly doubling the cleared prefix.
fn zero_fill<T: Copy + Default>(buf: &mut [T]) {
    let Some(first) = buf.first_mut() else {
        return;
    };
    *first = T::default();
    let mut filled = 1;
    while filled < buf.len() {
        let n = filled.min(buf.len() - filled);
        buf.copy_within(0..n, filled);
        filled += n;
    }
}

#[inline]
fn digram_index(c0: u8, c1: u8) -> usize {
    (((c0 as usize) << 4) ^ c1 as usize) & (DIGRAM_HASH_SIZE - 1)
}

impl SearchAccelerator {
    /// Create a match finder.
    ///
    /// Fails with `InvalidParameter` unless `max_dict_size` is a power of
    /// two, and with `FailedInitializing` if the tables cannot be allocated.
    pub fn new(config: AccelConfig) -> Result<Self> {
        if !config.max_dict_size.is_power_of_two() {
            return Err(LzhamError::invalid_parameter(format!(
                "match finder dictionary size {} is not a power of two",
                config.max_dict_size
            )));
        }

        let max_probes = config.max_probes.clamp(1, MAX_SUPPORTED_PROBES);
        let max_matches = config.max_matches.clamp(1, max_probes);
        let hash24 = config.flags.contains(AccelFlags::HASH24);
        let max_dict_size = config.max_dict_size;
        let mirror = max_dict_size.min(MAX_HUGE_MATCH_LEN);

        let dict = try_filled((max_dict_size + mirror) as usize, 0u8)?;
        let hash = try_filled(if hash24 { HASH_SIZE_24 } else { HASH_SIZE_16 }, 0u32)?;
        let nodes = try_filled(max_dict_size as usize, Node::default())?;
        let digram_hash = try_filled(DIGRAM_HASH_SIZE, 0u32)?;

        debug!(
            max_dict_size,
            max_probes,
            max_matches,
            hash24,
            requested_helper_threads = config.max_helper_threads,
            "match finder initialized"
        );

        Ok(Self {
            // Parsing is single-threaded.
            max_helper_threads: 0,
            max_dict_size,
            max_dict_size_mask: max_dict_size - 1,
            lookahead_pos: 0,
            lookahead_size: 0,
            cur_dict_size: 0,
            dict,
            hash,
            nodes,
            matches: Vec::new(),
            match_refs: Vec::new(),
            digram_hash,
            digram_next: Vec::new(),
            scratch: Vec::with_capacity(max_probes as usize),
            max_probes,
            max_matches,
            all_matches: config.all_matches,
            deterministic: config.flags.contains(AccelFlags::DETERMINISTIC),
            len2_matches: config.flags.contains(AccelFlags::LEN2_MATCHES),
            hash24,
        })
    }

    /// Forget all history without reallocating.
    pub fn reset(&mut self) {
        self.lookahead_pos = 0;
        self.lookahead_size = 0;
        self.cur_dict_size = 0;
        self.matches.clear();
        self.match_refs.clear();
        self.digram_next.clear();

        zero_fill(&mut self.hash);
        zero_fill(&mut self.digram_hash);
        zero_fill(&mut self.nodes);
    }

    /// Copy `bytes` into the ring as the new lookahead.
    ///
    /// # Panics
    ///
    /// If the previous lookahead has not been advanced over, or `bytes` is
    /// larger than the dictionary.
    pub fn add_bytes_begin(&mut self, bytes: &[u8]) {
        assert_eq!(self.lookahead_size, 0, "lookahead must be consumed first");
        assert!(
            bytes.len() <= self.max_dict_size as usize,
            "{} bytes exceed the {} byte dictionary",
            bytes.len(),
            self.max_dict_size
        );

        let num_bytes = bytes.len() as u32;
        let ring = self.max_dict_size as usize;
        let add_pos = (self.lookahead_pos & self.max_dict_size_mask) as usize;

        let head = bytes.len().min(ring - add_pos);
        self.dict[add_pos..add_pos + head].copy_from_slice(&bytes[..head]);
        let wrapped = &bytes[head..];
        self.dict[..wrapped.len()].copy_from_slice(wrapped);

        let mirror = ring.min(MAX_HUGE_MATCH_LEN as usize);
        if add_pos < mirror || !wrapped.is_empty() {
            self.dict.copy_within(0..mirror, ring);
        }

        self.lookahead_size = num_bytes;
        self.cur_dict_size = self.cur_dict_size.min(self.max_dict_size - num_bytes);
    }

    /// Search every lookahead position, inserting it into the tree.
    pub fn add_bytes_end(&mut self) {
        self.find_all_matches();
    }

    fn find_all_matches(&mut self) {
        let count = self.lookahead_size as usize;
        self.matches.clear();
        self.match_refs.clear();
        self.match_refs.resize(count, -1);
        self.digram_next.clear();
        self.digram_next.resize(count, 0);

        for ofs in 0..self.lookahead_size {
            let pos = self.lookahead_pos.wrapping_add(ofs);
            let cur = pos & self.max_dict_size_mask;
            let remaining = self.lookahead_size - ofs;

            if self.len2_matches && remaining >= MIN_MATCH_LEN {
                let c = cur as usize;
                let h = digram_index(self.dict[c], self.dict[c + 1]);
                let prev = self.digram_hash[h];
                self.digram_hash[h] = pos;
                self.digram_next[ofs as usize] = pos.wrapping_sub(prev);
            }

            if remaining < MIN_TREE_MATCH_LEN {
                continue;
            }

            let history = self.history_len(ofs);
            self.search_tree(pos, history, remaining.min(MAX_MATCH_LEN));
            self.store_candidates(ofs as usize);
        }
    }

    #[inline]
    fn hash_index(&self, cur: usize) -> usize {
        let (c0, c1, c2) = (
            self.dict[cur] as usize,
            self.dict[cur + 1] as usize,
            self.dict[cur + 2] as usize,
        );
        if self.hash24 {
            (c0 << 16) | (c1 << 8) | c2
        } else {
            ((c0 | (c1 << 8)) ^ (c2 << 4)) & (HASH_SIZE_16 - 1)
        }
    }

    #[inline]
    fn set_child(&mut self, child: Child, value: u32) {
        match child {
            Child::Left(n) => self.nodes[n as usize].left = value,
            Child::Right(n) => self.nodes[n as usize].right = value,
        }
    }

    #[inline]
    fn common_len(&self, a: usize, b: usize, max_len: usize) -> u32 {
        self.dict[a..a + max_len]
            .iter()
            .zip(&self.dict[b..b + max_len])
            .take_while(|(x, y)| x == y)
            .count() as u32
    }

    /// Walk the tree for absolute position `pos`, re-rooting it at `pos` and
    /// collecting candidates into `scratch`.
    ///
    /// Links hold absolute position + 1, so a link to a position that has
    /// left the window fails the distance check even when its ring slot has
    /// been rewritten since.
    fn search_tree(&mut self, pos: u32, history: u32, max_len: u32) {
        self.scratch.clear();

        let mask = self.max_dict_size_mask;
        let cur = pos & mask;
        let h = self.hash_index(cur as usize);
        let mut link = self.hash[h];
        self.hash[h] = pos.wrapping_add(1);

        let mut left = Child::Left(cur);
        let mut right = Child::Right(cur);
        let mut best_len = MIN_MATCH_LEN;
        let mut probes = 0;

        loop {
            if link == NIL || probes >= self.max_probes {
                self.set_child(left, NIL);
                self.set_child(right, NIL);
                break;
            }
            let delta = pos.wrapping_sub(link.wrapping_sub(1));
            if delta == 0 || delta > history {
                self.set_child(left, NIL);
                self.set_child(right, NIL);
                break;
            }
            probes += 1;

            let probe = pos.wrapping_sub(delta) & mask;
            let len = self.common_len(cur as usize, probe as usize, max_len as usize);
            if len > best_len || (self.all_matches && len >= MIN_TREE_MATCH_LEN) {
                self.scratch.push((delta, len));
                best_len = best_len.max(len);
            }

            let node = self.nodes[probe as usize];
            if len >= max_len {
                self.set_child(left, node.left);
                self.set_child(right, node.right);
                break;
            }

            if self.dict[(probe + len) as usize] < self.dict[(cur + len) as usize] {
                self.set_child(left, link);
                left = Child::Right(probe);
                link = node.right;
            } else {
                self.set_child(right, link);
                right = Child::Left(probe);
                link = node.left;
            }
        }
    }

    /// Move the longest `max_matches` scratch candidates into the match list.
    fn store_candidates(&mut self, ofs: usize) {
        if self.scratch.is_empty() {
            return;
        }
        if self.all_matches {
            self.scratch.sort_by_key(|&(_, len)| len);
        }

        let keep = self.scratch.len().min(self.max_matches as usize);
        let start = self.scratch.len() - keep;
        self.match_refs[ofs] = self.matches.len() as i32;
        for (i, &(dist, len)) in self.scratch[start..].iter().enumerate() {
            self.matches.push(DictMatch::new(dist, len, i + 1 == keep));
        }
    }

    /// Candidates for lookahead offset `ofs`, shortest first.
    pub fn get_match_list(&self, ofs: u32) -> &[DictMatch] {
        let Some(&start) = self.match_refs.get(ofs as usize) else {
            return &[];
        };
        if start < 0 {
            return &[];
        }
        let start = start as usize;
        let end = self.matches[start..]
            .iter()
            .position(DictMatch::is_last)
            .map_or(self.matches.len(), |i| start + i + 1);
        &self.matches[start..end]
    }

    /// Nearest length-2 match distance at lookahead offset `ofs`, if any.
    pub fn get_len2_match(&self, ofs: u32) -> Option<u32> {
        if !self.len2_matches || ofs + MIN_MATCH_LEN > self.lookahead_size {
            return None;
        }
        let dist = *self.digram_next.get(ofs as usize)?;
        if dist == 0 || dist > MAX_LEN2_MATCH_DIST || dist > self.history_len(ofs) {
            return None;
        }
        (self.match_len_at(ofs, dist, MIN_MATCH_LEN) == MIN_MATCH_LEN).then_some(dist)
    }

    /// Length of the match at lookahead offset `ofs` against distance `dist`,
    /// up to `max_len` and the end of the lookahead. Zero if `dist` is not
    /// valid history.
    pub fn match_len_at(&self, ofs: u32, dist: u32, max_len: u32) -> u32 {
        if dist == 0 || dist > self.history_len(ofs) || ofs >= self.lookahead_size {
            return 0;
        }
        let max_len = max_len.min(self.lookahead_size - ofs).min(MAX_MATCH_LEN);
        let pos = self.lookahead_pos.wrapping_add(ofs);
        let cur = pos & self.max_dict_size_mask;
        let src = pos.wrapping_sub(dist) & self.max_dict_size_mask;
        self.common_len(cur as usize, src as usize, max_len as usize)
    }

    /// Lookahead byte at offset `ofs`.
    pub fn lookahead_byte(&self, ofs: u32) -> u8 {
        let pos = self.lookahead_pos.wrapping_add(ofs) & self.max_dict_size_mask;
        self.dict[pos as usize]
    }

    /// Byte `dist` positions before lookahead offset `ofs`, or 0 outside the history.
    pub fn byte_before(&self, ofs: u32, dist: u32) -> u8 {
        if dist == 0 || dist > self.history_len(ofs) {
            return 0;
        }
        let pos = self.lookahead_pos.wrapping_add(ofs).wrapping_sub(dist) & self.max_dict_size_mask;
        self.dict[pos as usize]
    }

    /// Valid history before lookahead offset `ofs`.
    pub fn history_len(&self, ofs: u32) -> u32 {
        (self.cur_dict_size + ofs).min(self.max_dict_size)
    }

    /// Slide the window forward over `num_bytes` lookahead bytes.
    ///
    /// # Panics
    ///
    /// If `num_bytes` exceeds the remaining lookahead.
    pub fn advance_bytes(&mut self, num_bytes: u32) {
        assert!(
            num_bytes <= self.lookahead_size,
            "advance of {num_bytes} past a {} byte lookahead",
            self.lookahead_size
        );
        self.lookahead_pos = self.lookahead_pos.wrapping_add(num_bytes);
        self.lookahead_size -= num_bytes;
        self.cur_dict_size = (self.cur_dict_size + num_bytes).min(self.max_dict_size);
    }

    /// Absolute position of the first lookahead byte.
    pub fn lookahead_pos(&self) -> u32 {
        self.lookahead_pos
    }

    /// Bytes added and not yet advanced over.
    pub fn lookahead_size(&self) -> u32 {
        self.lookahead_size
    }

    /// Valid history before the lookahead.
    pub fn cur_dict_size(&self) -> u32 {
        self.cur_dict_size
    }

    /// Dictionary size.
    pub fn max_dict_size(&self) -> u32 {
        self.max_dict_size
    }

    /// Ring offset of the first lookahead byte.
    pub fn lookahead_dict_ofs(&self) -> u32 {
        self.lookahead_pos & self.max_dict_size_mask
    }

    /// Candidates kept per position.
    pub fn max_matches(&self) -> u32 {
        self.max_matches
    }

    /// Tree nodes visited per position.
    pub fn max_probes(&self) -> u32 {
        self.max_probes
    }

    /// Effective helper threads (always 0).
    pub fn max_helper_threads(&self) -> u32 {
        self.max_helper_threads
    }

    /// Whether every match of three or more bytes is kept, not only
    /// strictly longer ones.
    pub fn all_matches(&self) -> bool {
        self.all_matches
    }

    /// Whether the finder was asked for scheduling-independent results.
    pub fn is_deterministic(&self) -> bool {
        self.deterministic
    }
}
