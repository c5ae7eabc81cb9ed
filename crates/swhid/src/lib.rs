//! The Software Heritage persistent identifier: `swh:1:<kind>:<40-hex-hash>`.
//!
//! A SWHID names an archive object by the content hash of its canonical
//! representation. This crate only knows how to parse and render the
//! identifier text; it carries no knowledge of what the referenced object
//! actually contains.

use std::fmt;
use std::str::FromStr;

mod error;
pub use error::SwhidError;

/// The five artifact kinds plus `ori`, the SWHID-adjacent origin reference
/// used throughout the mountpoint layout even though origins have no
/// content-addressed identifier of their own in the upstream model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Kind {
    /// `cnt` — a file's contents.
    Content,
    /// `dir` — a directory listing.
    Directory,
    /// `ori` — a visited origin URL.
    Origin,
    /// `rel` — a release/tag.
    Release,
    /// `rev` — a revision/commit.
    Revision,
    /// `snp` — a snapshot of branches.
    Snapshot,
}

impl Kind {
    /// The 3-letter tag used in the textual form, e.g. `cnt`.
    pub const fn tag(self) -> &'static str {
        match self {
            Kind::Content => "cnt",
            Kind::Directory => "dir",
            Kind::Origin => "ori",
            Kind::Release => "rel",
            Kind::Revision => "rev",
            Kind::Snapshot => "snp",
        }
    }

    fn from_tag(tag: &str) -> Result<Self, SwhidError> {
        match tag {
            "cnt" => Ok(Kind::Content),
            "dir" => Ok(Kind::Directory),
            "ori" => Ok(Kind::Origin),
            "rel" => Ok(Kind::Release),
            "rev" => Ok(Kind::Revision),
            "snp" => Ok(Kind::Snapshot),
            other => Err(SwhidError::InvalidKind(other.to_owned())),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A parsed SWHID: an object kind plus the 20-byte hash identifying it.
///
/// Total order follows the textual form (`swh:1:<kind>:<hex>`), so SWHIDs
/// naturally sort by kind tag first and by hash second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Swhid {
    kind: Kind,
    hash: [u8; 20],
}

impl Swhid {
    /// The only identifier scheme version this crate understands.
    pub const VERSION: u8 = 1;

    /// Build a SWHID directly from its kind and raw hash bytes.
    pub const fn new(kind: Kind, hash: [u8; 20]) -> Self {
        Self { kind, hash }
    }

    /// The object kind.
    pub const fn kind(&self) -> Kind {
        self.kind
    }

    /// The raw 20-byte hash.
    pub const fn hash(&self) -> &[u8; 20] {
        &self.hash
    }

    /// The hash rendered as 40 lowercase hex characters.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// The first `n` hex digits of the hash, used to build cache/history
    /// shard directory names. Panics if `n > 40`.
    pub fn hash_prefix(&self, n: usize) -> String {
        let full = self.hash_hex();
        full[..n].to_owned()
    }
}

impl fmt::Display for Swhid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "swh:{}:{}:{}", Self::VERSION, self.kind, self.hash_hex())
    }
}

impl PartialOrd for Swhid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Swhid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_string().cmp(&other.to_string())
    }
}

impl FromStr for Swhid {
    type Err = SwhidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');

        let scheme = parts.next().ok_or_else(|| SwhidError::Malformed(s.to_owned()))?;
        if scheme != "swh" {
            return Err(SwhidError::Malformed(s.to_owned()));
        }

        let version = parts.next().ok_or_else(|| SwhidError::Malformed(s.to_owned()))?;
        if version != "1" {
            return Err(SwhidError::UnsupportedVersion(version.to_owned()));
        }

        let tag = parts.next().ok_or_else(|| SwhidError::Malformed(s.to_owned()))?;
        let kind = Kind::from_tag(tag)?;

        let hash_hex = parts.next().ok_or_else(|| SwhidError::Malformed(s.to_owned()))?;
        if parts.next().is_some() {
            return Err(SwhidError::Malformed(s.to_owned()));
        }

        if hash_hex.len() != 40 || !hash_hex.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
            return Err(SwhidError::InvalidHash(hash_hex.to_owned()));
        }

        let mut hash = [0u8; 20];
        hex::decode_to_slice(hash_hex, &mut hash)
            .map_err(|_| SwhidError::InvalidHash(hash_hex.to_owned()))?;

        Ok(Swhid { kind, hash })
    }
}

/// Parse a SWHID from its textual form. Convenience wrapper around
/// [`Swhid::from_str`] for call sites that prefer a free function, matching
/// the shape of backend responses which hand back plain strings.
pub fn parse_swhid(s: &str) -> Result<Swhid, SwhidError> {
    s.parse()
}

/// Parse the basename of a `<SWHID>.json` mountpoint entry, stripping the
/// suffix before delegating to [`parse_swhid`].
pub fn parse_metadata_filename(name: &str) -> Result<Swhid, SwhidError> {
    let stem = name
        .strip_suffix(".json")
        .ok_or_else(|| SwhidError::Malformed(name.to_owned()))?;
    parse_swhid(stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    const README_SWHID: &str = "swh:1:cnt:669ac7c32292798644b21dbb5a0dc657125f444d";

    #[test]
    fn roundtrip() {
        let id = parse_swhid(README_SWHID).unwrap();
        assert_eq!(id.kind(), Kind::Content);
        assert_eq!(id.to_string(), README_SWHID);
    }

    #[test]
    fn rejects_bad_version() {
        let err = parse_swhid("swh:2:cnt:669ac7c32292798644b21dbb5a0dc657125f444d").unwrap_err();
        assert!(matches!(err, SwhidError::UnsupportedVersion(_)));
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = parse_swhid("swh:1:foo:669ac7c32292798644b21dbb5a0dc657125f444d").unwrap_err();
        assert!(matches!(err, SwhidError::InvalidKind(_)));
    }

    #[test]
    fn rejects_short_hash() {
        let err = parse_swhid("swh:1:cnt:abcd").unwrap_err();
        assert!(matches!(err, SwhidError::InvalidHash(_)));
    }

    #[test]
    fn rejects_uppercase_hash() {
        let err = parse_swhid("swh:1:cnt:669AC7C32292798644B21DBB5A0DC657125F444D").unwrap_err();
        assert!(matches!(err, SwhidError::InvalidHash(_)));
    }

    #[test]
    fn metadata_filename() {
        let name = format!("{README_SWHID}.json");
        let id = parse_metadata_filename(&name).unwrap();
        assert_eq!(id.to_string(), README_SWHID);
    }

    #[test]
    fn orders_by_textual_form() {
        let a = parse_swhid("swh:1:cnt:0000000000000000000000000000000000000000").unwrap();
        let b = parse_swhid("swh:1:dir:0000000000000000000000000000000000000000").unwrap();
        assert!(a < b, "cnt sorts before dir lexicographically");
    }
}
