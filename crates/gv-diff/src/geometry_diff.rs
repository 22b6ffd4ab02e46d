//! Longest-common-subsequence diff of geometries.
//!
//! A geometry is flattened into a token sequence: its type name, then for
//! every part a `/` marker, for every ring or path in it an `@` marker, and
//! one `x,y` token per coordinate. The two sequences are diffed with Myers'
//! algorithm, and the differing runs become positional hunks that can be
//! applied, reversed, and written as text.

use std::fmt;

use gv_types::{Coordinate, Geometry};
use similar::{capture_diff_slices, Algorithm, DiffTag};

use crate::error::{DiffError, DiffResult};

const PART_MARKER: &str = "/";
const RING_MARKER: &str = "@";

/// Token sequence of an optional geometry. Absent geometries have none.
pub fn geometry_tokens(geometry: Option<&Geometry>) -> Vec<String> {
    let Some(geometry) = geometry else {
        return Vec::new();
    };
    let mut tokens = vec![geometry.geometry_type().to_string()];
    for part in geometry.parts() {
        tokens.push(PART_MARKER.to_string());
        for ring in part {
            tokens.push(RING_MARKER.to_string());
            tokens.extend(ring.iter().map(|c| format!("{},{}", c.x, c.y)));
        }
    }
    tokens
}

/// Inverse of [`geometry_tokens`].
pub fn geometry_from_tokens(tokens: &[String]) -> DiffResult<Option<Geometry>> {
    let Some((geometry_type, rest)) = tokens.split_first() else {
        return Ok(None);
    };
    let bad = |what: &str| DiffError::Parse(format!("geometry tokens: {what}"));
    let mut parts: Vec<Vec<Vec<Coordinate>>> = Vec::new();
    for token in rest {
        match token.as_str() {
            PART_MARKER => parts.push(Vec::new()),
            RING_MARKER => parts
                .last_mut()
                .ok_or_else(|| bad("ring outside a part"))?
                .push(Vec::new()),
            coord => {
                let (x, y) = coord
                    .split_once(',')
                    .ok_or_else(|| bad(&format!("unexpected token '{coord}'")))?;
                let x: f64 = x.parse().map_err(|_| bad(&format!("bad ordinate '{x}'")))?;
                let y: f64 = y.parse().map_err(|_| bad(&format!("bad ordinate '{y}'")))?;
                parts
                    .last_mut()
                    .and_then(|p| p.last_mut())
                    .ok_or_else(|| bad("coordinate outside a ring"))?
                    .push(Coordinate::new(x, y));
            }
        }
    }
    Ok(Some(Geometry::from_parts(geometry_type, parts)?))
}

fn is_coordinate(token: &str) -> bool {
    token.contains(',')
}

/// A run of differing tokens: `old` replaced by `new`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub new_start: usize,
    pub old: Vec<String>,
    pub new: Vec<String>,
}

impl Hunk {
    fn old_end(&self) -> usize {
        self.old_start + self.old.len()
    }

    fn reversed(&self) -> Self {
        Self {
            old_start: self.new_start,
            new_start: self.old_start,
            old: self.new.clone(),
            new: self.old.clone(),
        }
    }

    fn to_text(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.old_start,
            self.new_start,
            self.old.join(" "),
            self.new.join(" ")
        )
    }

    fn parse(text: &str) -> DiffResult<Self> {
        let fields: Vec<&str> = text.split(':').collect();
        let [old_start, new_start, old, new] = fields.as_slice() else {
            return Err(DiffError::Parse(format!("geometry hunk '{text}'")));
        };
        let index = |s: &str| {
            s.parse::<usize>()
                .map_err(|_| DiffError::Parse(format!("geometry hunk index '{s}'")))
        };
        let tokens = |s: &str| s.split_whitespace().map(str::to_string).collect();
        Ok(Self {
            old_start: index(old_start)?,
            new_start: index(new_start)?,
            old: tokens(old),
            new: tokens(new),
        })
    }
}

/// Reversible, serializable difference between two geometries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GeometryDiff {
    deleted: usize,
    inserted: usize,
    moved: usize,
    hunks: Vec<Hunk>,
}

impl GeometryDiff {
    pub fn compute(old: Option<&Geometry>, new: Option<&Geometry>) -> Self {
        let a = geometry_tokens(old);
        let b = geometry_tokens(new);
        let mut diff = Self::default();
        let mut current: Option<Hunk> = None;
        for op in capture_diff_slices(Algorithm::Myers, &a, &b) {
            let (tag, old_range, new_range) = op.as_tag_tuple();
            if tag == DiffTag::Equal {
                if let Some(hunk) = current.take() {
                    diff.close(hunk);
                }
                continue;
            }
            let hunk = current.get_or_insert_with(|| Hunk {
                old_start: old_range.start,
                new_start: new_range.start,
                old: Vec::new(),
                new: Vec::new(),
            });
            hunk.old.extend_from_slice(&a[old_range]);
            hunk.new.extend_from_slice(&b[new_range]);
        }
        if let Some(hunk) = current.take() {
            diff.close(hunk);
        }
        diff
    }

    fn close(&mut self, hunk: Hunk) {
        let deletions = hunk.old.iter().filter(|t| is_coordinate(t)).count();
        let insertions = hunk.new.iter().filter(|t| is_coordinate(t)).count();
        let moved = deletions.min(insertions);
        self.moved += moved;
        self.deleted += deletions - moved;
        self.inserted += insertions - moved;
        self.hunks.push(hunk);
    }

    /// Points removed without a counterpart.
    pub fn deleted(&self) -> usize {
        self.deleted
    }

    /// Points added without a counterpart.
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// Points replaced by another point.
    pub fn moved(&self) -> usize {
        self.moved
    }

    pub fn hunks(&self) -> &[Hunk] {
        &self.hunks
    }

    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    pub fn reversed(&self) -> Self {
        Self {
            deleted: self.inserted,
            inserted: self.deleted,
            moved: self.moved,
            hunks: self.hunks.iter().map(Hunk::reversed).collect(),
        }
    }

    fn apply_tokens(&self, tokens: &[String]) -> DiffResult<Vec<String>> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut pos = 0;
        for hunk in &self.hunks {
            if hunk.old_start < pos || hunk.old_end() > tokens.len() {
                return Err(DiffError::CannotApply(format!(
                    "hunk at {} is out of range",
                    hunk.old_start
                )));
            }
            if tokens[hunk.old_start..hunk.old_end()] != hunk.old[..] {
                return Err(DiffError::CannotApply(format!(
                    "geometry differs at token {}",
                    hunk.old_start
                )));
            }
            out.extend_from_slice(&tokens[pos..hunk.old_start]);
            out.extend_from_slice(&hunk.new);
            pos = hunk.old_end();
        }
        out.extend_from_slice(&tokens[pos..]);
        Ok(out)
    }

    /// Returns `true` if every hunk finds its old tokens in `geometry`.
    pub fn can_be_applied_on(&self, geometry: Option<&Geometry>) -> bool {
        self.apply_tokens(&geometry_tokens(geometry)).is_ok()
    }

    pub fn apply_on(&self, geometry: Option<&Geometry>) -> DiffResult<Option<Geometry>> {
        let tokens = self.apply_tokens(&geometry_tokens(geometry))?;
        geometry_from_tokens(&tokens)
    }

    /// Returns `true` if both diffs edit the same or adjacent tokens of a
    /// common base in different ways.
    pub fn conflicts(&self, other: &GeometryDiff) -> bool {
        if self == other {
            return false;
        }
        self.hunks.iter().any(|a| {
            other.hunks.iter().any(|b| {
                a != b && a.old_start <= b.old_end() && b.old_start <= a.old_end()
            })
        })
    }

    /// A single diff from the common base carrying the hunks of both diffs,
    /// or `None` if they conflict.
    pub fn combine(&self, other: &GeometryDiff) -> Option<GeometryDiff> {
        if self.conflicts(other) {
            return None;
        }
        let mut hunks: Vec<Hunk> = self.hunks.clone();
        for hunk in &other.hunks {
            if !hunks.contains(hunk) {
                hunks.push(hunk.clone());
            }
        }
        hunks.sort_by_key(|h| h.old_start);
        let mut combined = GeometryDiff::default();
        let mut shift: isize = 0;
        for mut hunk in hunks {
            hunk.new_start = hunk.old_start.saturating_add_signed(shift);
            shift += hunk.new.len() as isize - hunk.old.len() as isize;
            combined.close(hunk);
        }
        Some(combined)
    }

    /// `deleted/inserted/moved` followed by a tab and the hunks.
    pub fn as_text(&self) -> String {
        let hunks: Vec<String> = self.hunks.iter().map(Hunk::to_text).collect();
        format!(
            "{}/{}/{}\t{}",
            self.deleted,
            self.inserted,
            self.moved,
            hunks.join(";")
        )
    }

    pub fn parse(text: &str) -> DiffResult<Self> {
        let bad = || DiffError::Parse(format!("geometry diff '{text}'"));
        let (counts, hunks) = text.split_once('\t').ok_or_else(bad)?;
        let counts: Vec<usize> = counts
            .split('/')
            .map(|c| c.parse().map_err(|_| bad()))
            .collect::<DiffResult<_>>()?;
        let [deleted, inserted, moved] = counts.as_slice() else {
            return Err(bad());
        };
        let hunks = if hunks.is_empty() {
            Vec::new()
        } else {
            hunks.split(';').map(Hunk::parse).collect::<DiffResult<_>>()?
        };
        Ok(Self {
            deleted: *deleted,
            inserted: *inserted,
            moved: *moved,
            hunks,
        })
    }
}

impl fmt::Display for GeometryDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} point(s) deleted, {} new point(s) added, {} point(s) moved",
            self.deleted, self.inserted, self.moved
        )
    }
}
