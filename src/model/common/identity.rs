//! Decoding of institutional e-mail addresses into academic identities.

use std::fmt::{Display, Formatter};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Error, Result};

/// Degree programmes known to the institution.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Degree {
    BTech,
    MTech,
    MSc,
    PhD,
}

impl Degree {
    /// Years after which a student of this degree is no longer enrolled.
    pub fn max_years(self) -> u32 {
        match self {
            Self::BTech => 4,
            Self::MTech => 2,
            Self::MSc | Self::PhD => 5,
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "phd" => Some(Self::PhD),
            "mt" => Some(Self::MTech),
            "msc" => Some(Self::MSc),
            _ => None,
        }
    }
}

impl Display for Degree {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::BTech => "BTech",
            Self::MTech => "MTech",
            Self::MSc => "MSc",
            Self::PhD => "PhD",
        };
        write!(f, "{label}")
    }
}

/// Label for bachelor's branch tokens missing from the code table.
pub const UNKNOWN_BRANCH: &str = "Unknown Branch";

/// Map a bachelor's branch token to its label, trying the token as written
/// and then without a leading `b`.
fn branch_label(token: &str) -> &'static str {
    known_branch(token)
        .or_else(|| {
            token
                .strip_prefix('b')
                .filter(|rest| !rest.is_empty())
                .and_then(known_branch)
        })
        .unwrap_or(UNKNOWN_BRANCH)
}

/// Look a branch token (numeric code or literal name) up in the code table.
fn known_branch(token: &str) -> Option<&'static str> {
    Some(match token {
        "01" | "cse" => "CSE",
        "02" | "ee" => "EE",
        "03" | "me" => "ME",
        "04" | "civil" => "CIVIL",
        "05" | "mems" => "MEMS",
        "che" => "CHE",
        "ep" => "EP",
        "sse" => "SSE",
        "mc" => "MC",
        _ => return None,
    })
}

/// A voter's current year of study, or the fact they have left.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AcademicStatus {
    /// Enrolled, in the given (1-based) year.
    Year(u32),
    /// A doctoral student past the nominal length of the programme.
    ExtendedDoctoral,
    Alumni,
}

impl AcademicStatus {
    /// Derive the status of a student who entered in `entry_year`, as of `today`.
    ///
    /// Returns `None` if the entry year lies in the future.
    pub fn derive(degree: Degree, entry_year: i32, today: NaiveDate) -> Option<Self> {
        let elapsed = u32::try_from(today.year() - entry_year).ok()?;
        let status = if elapsed <= degree.max_years() {
            Self::Year(elapsed.max(1))
        } else if degree == Degree::PhD {
            Self::ExtendedDoctoral
        } else {
            Self::Alumni
        };
        Some(status)
    }

    /// Whether the voter is still enrolled.
    pub fn is_enrolled(&self) -> bool {
        !matches!(self, Self::Alumni)
    }
}

impl Display for AcademicStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Year(year) => {
                let suffix = match year {
                    1 => "st",
                    2 => "nd",
                    3 => "rd",
                    _ => "th",
                };
                write!(f, "{year}{suffix} Year")
            }
            Self::ExtendedDoctoral => write!(f, "5+ Year"),
            Self::Alumni => write!(f, "Alumni"),
        }
    }
}

impl Serialize for AcademicStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Everything we know about a voter's academic standing, derived from their e-mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoterIdentity {
    pub email: String,
    pub degree: Degree,
    /// Only bachelor's addresses carry a branch.
    pub branch: Option<String>,
    pub entry_year: i32,
    pub academic_status: AcademicStatus,
    pub roll_no: String,
}

/// Parses institutional e-mail addresses.
///
/// Pure: the result depends only on the address and the date passed in.
#[derive(Debug, Clone)]
pub struct IdentityDecoder {
    domain: String,
}

/// The parts of an address's local part, e.g. `cse` `22` `b045`.
#[derive(Debug, PartialEq, Eq)]
struct LocalPart<'a> {
    prefix: Prefix<'a>,
    year: &'a str,
    roll: &'a str,
}

#[derive(Debug, PartialEq, Eq)]
enum Prefix<'a> {
    Degree(Degree),
    /// A bachelor's branch token, either a name or a two-digit code.
    Branch(&'a str),
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Split a lower-cased local part into prefix, entry year and roll suffix.
///
/// Accepted shapes are `{phd|mt|msc}YY{roll}`, `{branch letters}YY{roll}` and
/// `[b]{NN}YY{roll}`, where `{roll}` is letters followed by at least one digit.
fn split_local_part(local: &str) -> Option<LocalPart<'_>> {
    let letters = local.len() - local.trim_start_matches(|c: char| c.is_ascii_lowercase()).len();
    let (head, rest) = local.split_at(letters);

    let (prefix, rest) = match Degree::from_prefix(head) {
        Some(degree) => (Prefix::Degree(degree), rest),
        None => {
            if head.is_empty() || head == "b" {
                let code = rest.get(..2).filter(|code| is_digits(code))?;
                (Prefix::Branch(code), &rest[2..])
            } else {
                (Prefix::Branch(head), rest)
            }
        }
    };

    let year = rest.get(..2).filter(|year| is_digits(year))?;
    let roll = &rest[2..];
    if !is_digits(roll.trim_start_matches(|c: char| c.is_ascii_lowercase())) {
        return None;
    }
    Some(LocalPart { prefix, year, roll })
}

impl IdentityDecoder {
    /// Create a decoder accepting addresses at the given domain.
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into().to_lowercase(),
        }
    }

    /// The institutional domain this decoder accepts.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Decode an e-mail address into a [`VoterIdentity`] as of `today`.
    pub fn decode(&self, email: &str, today: NaiveDate) -> Result<VoterIdentity> {
        let email = email.trim().to_lowercase();
        let invalid = || Error::InvalidFormat(format!("'{email}' is not an institutional address"));

        let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
        if domain != self.domain {
            return Err(invalid());
        }
        let LocalPart { prefix, year, roll } = split_local_part(local).ok_or_else(invalid)?;

        let (degree, branch) = match prefix {
            Prefix::Degree(degree) => (degree, None),
            Prefix::Branch(token) => (Degree::BTech, Some(branch_label(token).to_string())),
        };

        let entry_year = 2000 + year.parse::<i32>().map_err(|_| invalid())?;
        let academic_status = AcademicStatus::derive(degree, entry_year, today).ok_or_else(|| {
            Error::InvalidFormat(format!("entry year {entry_year} of '{email}' is in the future"))
        })?;

        Ok(VoterIdentity {
            degree,
            branch,
            entry_year,
            academic_status,
            roll_no: format!("{year}{roll}").to_uppercase(),
            email,
        })
    }
}
