//! Categorization decision engine
//!
//! Turns the nearest-neighbor result for an activity description into a
//! letter grade and decides whether the match is trusted enough to commit
//! its project / task / Jira without human review. The nearest match is
//! always recorded for audit, accepted or not.
//!
//! [`decide`] is pure: same matches and accepted grades, same outcome.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use aidea_common::{Activity, Error, Result, Rule};
use serde::{Deserialize, Serialize};

/// Sentinel stored when no rule matched
pub const NOT_APPLICABLE: &str = "N/A";

/// Distance bucket, A (closest) through F
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl Grade {
    /// Grade a cosine distance
    ///
    /// `[0.0, 0.2)` A, `[0.2, 0.4)` B, `[0.4, 0.7)` C, `[0.7, 1.0)` D,
    /// anything else (negative, >= 1.0, NaN) F.
    pub fn from_distance(distance: f64) -> Self {
        match distance {
            d if (0.0..0.2).contains(&d) => Grade::A,
            d if (0.2..0.4).contains(&d) => Grade::B,
            d if (0.4..0.7).contains(&d) => Grade::C,
            d if (0.7..1.0).contains(&d) => Grade::D,
            _ => Grade::F,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
            Grade::NotApplicable => NOT_APPLICABLE,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Grade::A),
            "B" => Ok(Grade::B),
            "C" => Ok(Grade::C),
            "D" => Ok(Grade::D),
            "F" => Ok(Grade::F),
            NOT_APPLICABLE => Ok(Grade::NotApplicable),
            other => Err(Error::InvalidInput(format!("Unknown grade: {}", other))),
        }
    }
}

/// Grades that auto-commit a match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedGrades(BTreeSet<Grade>);

impl AcceptedGrades {
    pub fn new(grades: impl IntoIterator<Item = Grade>) -> Self {
        Self(
            grades
                .into_iter()
                .filter(|g| *g != Grade::NotApplicable)
                .collect(),
        )
    }

    /// Parse a comma list such as `"A,B"`
    ///
    /// Blank entries are skipped. `N/A` and unknown letters are rejected,
    /// since no-match outcomes can never be committed.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut grades = BTreeSet::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let grade: Grade = part
                .parse()
                .map_err(|_| Error::Config(format!("Invalid auto-categorize grade: {}", part)))?;
            if grade == Grade::NotApplicable {
                return Err(Error::Config(
                    "N/A cannot be an auto-categorize grade".to_string(),
                ));
            }
            grades.insert(grade);
        }
        Ok(Self(grades))
    }

    pub fn contains(&self, grade: Grade) -> bool {
        self.0.contains(&grade)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for AcceptedGrades {
    fn default() -> Self {
        Self::new([Grade::A, Grade::B])
    }
}

impl fmt::Display for AcceptedGrades {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.0.iter().map(Grade::as_str).collect();
        f.write_str(&joined.join(","))
    }
}

/// One nearest-neighbor candidate
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    /// Rule properties; `rule.id` is the vector backend reference
    pub rule: Rule,
    pub distance: f64,
}

/// Outcome of grading the top candidate
#[derive(Debug, Clone, PartialEq)]
pub struct Categorization {
    pub weaviate_id: String,
    pub rule_description: String,
    pub distance: f64,
    pub grade: Grade,
    /// Present only when the match was committed
    pub committed: Option<CommittedCategory>,
}

/// Category fields copied from an accepted rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedCategory {
    pub project: String,
    pub task: String,
    pub jira: String,
}

impl Categorization {
    /// Outcome when the search returned nothing
    pub fn no_match() -> Self {
        Self {
            weaviate_id: String::new(),
            rule_description: NOT_APPLICABLE.to_string(),
            distance: 0.0,
            grade: Grade::NotApplicable,
            committed: None,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.committed.is_some()
    }

    /// Write the outcome onto `activity`
    ///
    /// A rejected outcome clears any category left by an earlier run, so
    /// `categorized` always reflects this decision.
    pub fn apply_to(self, activity: &mut Activity) {
        activity.weaviate_id = self.weaviate_id;
        activity.rule_description = self.rule_description;
        activity.categorization_distance = self.distance;
        activity.categorization_grade = self.grade.to_string();

        match self.committed {
            Some(category) => {
                activity.project = category.project;
                activity.task = category.task;
                activity.jira = category.jira;
                activity.categorized = true;
            }
            None => {
                activity.project.clear();
                activity.task.clear();
                activity.jira.clear();
                activity.categorized = false;
            }
        }
    }
}

/// Grade the closest candidate and decide whether to commit it
///
/// `matches` need not be sorted; the smallest distance wins. A candidate
/// missing its project, task or Jira is never committed.
pub fn decide(matches: &[RuleMatch], accepted: &AcceptedGrades) -> Categorization {
    let Some(top) = matches
        .iter()
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
    else {
        return Categorization::no_match();
    };

    let grade = Grade::from_distance(top.distance);
    let rule = &top.rule;
    let complete = !rule.project.is_empty() && !rule.task.is_empty() && !rule.jira.is_empty();

    let committed = (accepted.contains(grade) && complete).then(|| CommittedCategory {
        project: rule.project.clone(),
        task: rule.task.clone(),
        jira: rule.jira.clone(),
    });

    Categorization {
        weaviate_id: rule.id.clone(),
        rule_description: rule.description.clone(),
        distance: top.distance,
        grade,
        committed,
    }
}
