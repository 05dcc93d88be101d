use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::model::common::identity::VoterIdentity;

/// The dimensions a position can restrict its electorate on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Dimension {
    Batch,
    Branch,
    Degree,
}

impl Display for Dimension {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Batch => "batch",
            Self::Branch => "branch",
            Self::Degree => "degree",
        };
        write!(f, "{name}")
    }
}

/// Why a voter failed a restriction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub dimension: Dimension,
    /// The voter's value on this dimension, if they have one.
    pub actual: Option<String>,
    pub allowed: Vec<String>,
}

impl Display for Mismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let actual = self.actual.as_deref().unwrap_or("none");
        write!(
            f,
            "{} '{}' is not one of [{}]",
            self.dimension,
            actual,
            self.allowed.join(", ")
        )
    }
}

/// Who may vote for a position.
///
/// Each dimension is a list of allowed labels. An empty list, or one containing
/// an "All" sentinel (e.g. `"All"` or `"All Branches"`), leaves that dimension
/// unrestricted. Dimensions are combined conjunctively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictionSet {
    /// Allowed academic statuses, e.g. `"3rd Year"`.
    #[serde(default)]
    pub batch_restriction: Vec<String>,
    /// Allowed branches, e.g. `"CSE"`.
    #[serde(default)]
    pub branch_restriction: Vec<String>,
    /// Allowed degrees, e.g. `"BTech"`.
    #[serde(default)]
    pub degree_restriction: Vec<String>,
}

impl RestrictionSet {
    /// Check every dimension, reporting the first one the voter fails.
    pub fn check(&self, identity: &VoterIdentity) -> Result<(), Mismatch> {
        let batch = identity.academic_status.to_string();
        let degree = identity.degree.to_string();
        check_dimension(Dimension::Batch, &self.batch_restriction, Some(&batch))?;
        check_dimension(
            Dimension::Branch,
            &self.branch_restriction,
            identity.branch.as_deref(),
        )?;
        check_dimension(Dimension::Degree, &self.degree_restriction, Some(&degree))?;
        Ok(())
    }

    /// Whether the voter may vote. A voter whose identity could not be
    /// determined is never eligible.
    pub fn is_eligible(&self, identity: Option<&VoterIdentity>) -> bool {
        identity.map_or(false, |identity| self.check(identity).is_ok())
    }

    /// Whether no dimension is restricted at all.
    pub fn is_unrestricted(&self) -> bool {
        is_unrestricted(&self.batch_restriction)
            && is_unrestricted(&self.branch_restriction)
            && is_unrestricted(&self.degree_restriction)
    }
}

fn is_sentinel(label: &str) -> bool {
    let label = label.trim();
    label.eq_ignore_ascii_case("all")
        || label
            .get(..4)
            .map_or(false, |prefix| prefix.eq_ignore_ascii_case("all "))
}

fn is_unrestricted(allowed: &[String]) -> bool {
    allowed.iter().all(|label| label.trim().is_empty()) || allowed.iter().any(|l| is_sentinel(l))
}

fn check_dimension(
    dimension: Dimension,
    allowed: &[String],
    actual: Option<&str>,
) -> Result<(), Mismatch> {
    if is_unrestricted(allowed) {
        return Ok(());
    }
    let matches = actual.map_or(false, |actual| {
        allowed
            .iter()
            .any(|label| label.trim().eq_ignore_ascii_case(actual.trim()))
    });
    if matches {
        Ok(())
    } else {
        Err(Mismatch {
            dimension,
            actual: actual.map(str::to_string),
            allowed: allowed.to_vec(),
        })
    }
}


#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::common::identity::IdentityDecoder;

    fn identity(email: &str) -> VoterIdentity {
        IdentityDecoder::new("iiti.ac.in")
            .decode(email, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
            .unwrap()
    }

    fn labels(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn third_year_cse_scenario() {
        let voter = identity("cse22b045@iiti.ac.in");
        assert!(RestrictionSet::third_year_cse().is_eligible(Some(&voter)));

        let mismatch = RestrictionSet::electrical_only().check(&voter).unwrap_err();
        assert_eq!(mismatch.dimension, Dimension::Branch);
        assert_eq!(mismatch.actual.as_deref(), Some("CSE"));
        assert!(!RestrictionSet::electrical_only().is_eligible(Some(&voter)));
    }

    #[test]
    fn unrestricted_sets_admit_everyone() {
        let voter = identity("phd2001001@iiti.ac.in");
        let empty = RestrictionSet::default();
        assert!(empty.is_unrestricted());
        assert!(empty.is_eligible(Some(&voter)));

        let sentinels = RestrictionSet {
            batch_restriction: labels(&["All Years"]),
            branch_restriction: labels(&["ALL"]),
            degree_restriction: labels(&["all degrees"]),
        };
        assert!(sentinels.is_unrestricted());
        assert!(sentinels.is_eligible(Some(&voter)));
    }

    #[test]
    fn undecoded_voters_are_never_eligible() {
        assert!(!RestrictionSet::default().is_eligible(None));
        assert!(!RestrictionSet::third_year_cse().is_eligible(None));
    }

    #[test]
    fn dimensions_are_conjunctive() {
        let voter = identity("cse22b045@iiti.ac.in");
        let restrictions = RestrictionSet {
            batch_restriction: labels(&["3rd Year"]),
            branch_restriction: labels(&["CSE"]),
            degree_restriction: labels(&["MTech"]),
        };
        let mismatch = restrictions.check(&voter).unwrap_err();
        assert_eq!(mismatch.dimension, Dimension::Degree);
        assert_eq!(
            mismatch.to_string(),
            "degree 'BTech' is not one of [MTech]"
        );
    }

    #[test]
    fn branchless_voters_fail_branch_restrictions() {
        let voter = identity("mt2401001@iiti.ac.in");
        let mismatch = RestrictionSet::electrical_only().check(&voter).unwrap_err();
        assert_eq!(mismatch.dimension, Dimension::Branch);
        assert_eq!(mismatch.actual, None);
        assert_eq!(mismatch.to_string(), "branch 'none' is not one of [EE]");
    }

    #[test]
    fn matching_ignores_case() {
        let voter = identity("ee23001@iiti.ac.in");
        let restrictions = RestrictionSet {
            batch_restriction: labels(&["2ND YEAR"]),
            branch_restriction: labels(&[" ee "]),
            degree_restriction: labels(&["btech"]),
        };
        assert!(restrictions.is_eligible(Some(&voter)));
    }

    #[test]
    fn widening_never_revokes_eligibility() {
        let voter = identity("cse22b045@iiti.ac.in");
        let mut restrictions = RestrictionSet::third_year_cse();
        assert!(restrictions.is_eligible(Some(&voter)));

        restrictions.branch_restriction.push("EE".to_string());
        assert!(restrictions.is_eligible(Some(&voter)));
        restrictions.batch_restriction.push("All".to_string());
        assert!(restrictions.is_eligible(Some(&voter)));

        // Widening a different dimension does not mask the failing one.
        let mut restrictions = RestrictionSet::electrical_only();
        restrictions.batch_restriction = labels(&["All"]);
        let mismatch = restrictions.check(&voter).unwrap_err();
        assert_eq!(mismatch.dimension, Dimension::Branch);
    }
}
