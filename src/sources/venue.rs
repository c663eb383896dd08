//! Static venue catalog.

use std::fmt;
use std::str::FromStr;

use super::SourceError;

/// Which site adapter understands a venue's own program page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteKind {
    /// IACR `currentProgram.php` JSON feed.
    Iacr,
    /// USENIX technical-sessions listing.
    Usenix,
    /// NDSS accepted-papers listing.
    Ndss,
    /// IEEE S&P program-papers listing.
    IeeeSp,
    /// ACM CCS accepted-papers listing.
    Ccs,
}

impl SiteKind {
    /// Adapter name used as the registry key.
    #[must_use]
    pub fn adapter_name(self) -> &'static str {
        match self {
            Self::Iacr => "iacr",
            Self::Usenix => "usenix",
            Self::Ndss => "ndss",
            Self::IeeeSp => "ieee-sp",
            Self::Ccs => "ccs",
        }
    }
}

/// One known conference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Venue {
    /// Short lowercase tag used on the command line.
    pub tag: &'static str,
    /// Display name stored as the paper's `conference`.
    pub conference: &'static str,
    /// DBLP stream key, e.g. `conf/crypto`.
    pub dblp_key: &'static str,
    /// Adapter for the venue's own program page.
    pub site: SiteKind,
}

/// All supported venues.
pub const VENUES: &[Venue] = &[
    Venue {
        tag: "crypto",
        conference: "CRYPTO",
        dblp_key: "conf/crypto",
        site: SiteKind::Iacr,
    },
    Venue {
        tag: "eurocrypt",
        conference: "EUROCRYPT",
        dblp_key: "conf/eurocrypt",
        site: SiteKind::Iacr,
    },
    Venue {
        tag: "asiacrypt",
        conference: "ASIACRYPT",
        dblp_key: "conf/asiacrypt",
        site: SiteKind::Iacr,
    },
    Venue {
        tag: "usenix-security",
        conference: "USENIX Security",
        dblp_key: "conf/uss",
        site: SiteKind::Usenix,
    },
    Venue {
        tag: "ndss",
        conference: "NDSS",
        dblp_key: "conf/ndss",
        site: SiteKind::Ndss,
    },
    Venue {
        tag: "ieee-sp",
        conference: "IEEE S&P",
        dblp_key: "conf/sp",
        site: SiteKind::IeeeSp,
    },
    Venue {
        tag: "ccs",
        conference: "CCS",
        dblp_key: "conf/ccs",
        site: SiteKind::Ccs,
    },
];

/// Looks a venue up by tag or display name, case-insensitively.
///
/// # Errors
///
/// Returns [`SourceError::UnknownVenue`] when nothing matches.
pub fn find_venue(name: &str) -> Result<&'static Venue, SourceError> {
    let needle = name.trim();
    VENUES
        .iter()
        .find(|v| v.tag.eq_ignore_ascii_case(needle) || v.conference.eq_ignore_ascii_case(needle))
        .ok_or_else(|| SourceError::UnknownVenue(needle.to_string()))
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.conference)
    }
}

/// Which kind of upstream a task crawls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SourceKind {
    /// The DBLP search API.
    #[default]
    Dblp,
    /// The venue's own program page.
    Site,
}

impl SourceKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dblp => "dblp",
            Self::Site => "site",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dblp" => Ok(Self::Dblp),
            "site" | "official" => Ok(Self::Site),
            other => Err(format!("unknown source '{other}' (expected dblp or site)")),
        }
    }
}
