//! Data models for the registry.
//!
//! This module contains the student record variants stored in the table
//! and the validation applied when they are constructed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Integer key under which a record is stored.
pub type RecordId = u64;

/// Maximum session grades a junior student may carry.
pub const MAX_JUNIOR_GRADES: usize = 5;

/// Maximum session grades a senior student may carry.
pub const MAX_SENIOR_GRADES: usize = 4;

/// Reasons a record cannot be constructed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("student name cannot be empty")]
    EmptyName,

    #[error("department number cannot be negative (got {0})")]
    NegativeDepartment(i32),

    #[error("a {category} student can have at most {max} grades (got {given})")]
    TooManyGrades {
        category: Category,
        max: usize,
        given: usize,
    },
}

/// Category of a student record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Junior,
    Senior,
    Graduate,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Junior => write!(f, "Junior"),
            Category::Senior => write!(f, "Senior"),
            Category::Graduate => write!(f, "Graduate"),
        }
    }
}

/// Fields shared by every category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Full name and initials.
    pub name: String,
    /// Group label, e.g. `IU7-21B`. Aggregation keys on this.
    pub group: String,
    /// Department number, never negative.
    pub department: i32,
}

impl Profile {
    /// Creates a validated profile.
    pub fn new(
        name: impl Into<String>,
        group: impl Into<String>,
        department: i32,
    ) -> Result<Self, RecordError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RecordError::EmptyName);
        }
        if department < 0 {
            return Err(RecordError::NegativeDepartment(department));
        }
        Ok(Self {
            name,
            group: group.into(),
            department,
        })
    }
}

/// Research work carried by a senior student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchWork {
    pub topic: String,
    pub place: String,
    pub supervisor_grade: i32,
    pub commission_grade: i32,
}

/// Diploma project carried by a graduate student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiplomaProject {
    pub topic: String,
    pub place: String,
    pub supervisor_grade: i32,
    pub reviewer_grade: i32,
    pub state_commission_grade: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Junior {
    pub profile: Profile,
    pub session_grades: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Senior {
    pub profile: Profile,
    pub session_grades: Vec<i32>,
    pub research: ResearchWork,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graduate {
    pub profile: Profile,
    pub diploma: DiplomaProject,
}

/// A student record, one of three categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum Record {
    Junior(Junior),
    Senior(Senior),
    Graduate(Graduate),
}

impl Record {
    /// Creates a junior record with at most [`MAX_JUNIOR_GRADES`] grades.
    pub fn junior(profile: Profile, session_grades: Vec<i32>) -> Result<Self, RecordError> {
        check_grade_count(Category::Junior, MAX_JUNIOR_GRADES, &session_grades)?;
        Ok(Record::Junior(Junior {
            profile,
            session_grades,
        }))
    }

    /// Creates a senior record with at most [`MAX_SENIOR_GRADES`] grades.
    pub fn senior(
        profile: Profile,
        session_grades: Vec<i32>,
        research: ResearchWork,
    ) -> Result<Self, RecordError> {
        check_grade_count(Category::Senior, MAX_SENIOR_GRADES, &session_grades)?;
        Ok(Record::Senior(Senior {
            profile,
            session_grades,
            research,
        }))
    }

    pub fn graduate(profile: Profile, diploma: DiplomaProject) -> Self {
        Record::Graduate(Graduate { profile, diploma })
    }

    pub fn category(&self) -> Category {
        match self {
            Record::Junior(_) => Category::Junior,
            Record::Senior(_) => Category::Senior,
            Record::Graduate(_) => Category::Graduate,
        }
    }

    pub fn profile(&self) -> &Profile {
        match self {
            Record::Junior(r) => &r.profile,
            Record::Senior(r) => &r.profile,
            Record::Graduate(r) => &r.profile,
        }
    }

    pub fn group(&self) -> &str {
        &self.profile().group
    }

    /// Moves the record to another group.
    pub fn set_group(&mut self, group: impl Into<String>) {
        let profile = match self {
            Record::Junior(r) => &mut r.profile,
            Record::Senior(r) => &mut r.profile,
            Record::Graduate(r) => &mut r.profile,
        };
        profile.group = group.into();
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let profile = self.profile();
        writeln!(f, "Name: {}", profile.name)?;
        writeln!(f, "Group Index: {}", profile.group)?;
        writeln!(f, "Department Number: {}", profile.department)?;
        writeln!(f, "Category: {} Student", self.category())?;

        match self {
            Record::Junior(r) => {
                writeln!(f, "Session Grades: {}", join_grades(&r.session_grades))?;
            }
            Record::Senior(r) => {
                writeln!(f, "Session Grades: {}", join_grades(&r.session_grades))?;
                writeln!(f, "Research Work Topic: {}", r.research.topic)?;
                writeln!(f, "Research Work Place: {}", r.research.place)?;
                writeln!(
                    f,
                    "Research Work Grades (Supervisor, Commission): {}, {}",
                    r.research.supervisor_grade, r.research.commission_grade
                )?;
            }
            Record::Graduate(r) => {
                writeln!(f, "Diploma Project Topic: {}", r.diploma.topic)?;
                writeln!(f, "Diploma Project Place: {}", r.diploma.place)?;
                writeln!(
                    f,
                    "Diploma Project Grades (Supervisor, Reviewer, State Commission): {}, {}, {}",
                    r.diploma.supervisor_grade,
                    r.diploma.reviewer_grade,
                    r.diploma.state_commission_grade
                )?;
            }
        }
        Ok(())
    }
}

/// One population size measured by the benchmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRow {
    /// Number of records in the registry.
    pub records: usize,
    /// Number of groups in the aggregation result.
    pub groups: usize,
    /// Sequential aggregation time in milliseconds.
    pub sequential_ms: f64,
    /// Parallel aggregation time in milliseconds.
    pub parallel_ms: f64,
    /// Sequential time divided by parallel time.
    pub speedup: f64,
    /// Whether both modes produced the same averages.
    pub results_match: bool,
}

/// Metadata about a benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkMetadata {
    /// When the run finished.
    pub generated_at: DateTime<Utc>,
    /// Seed used for record generation.
    pub seed: u64,
    /// Worker threads used by the parallel mode.
    pub workers: usize,
}

/// The complete benchmark report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub metadata: BenchmarkMetadata,
    pub rows: Vec<BenchmarkRow>,
}

impl BenchmarkReport {
    /// Whether every measured size produced matching results.
    pub fn all_match(&self) -> bool {
        self.rows.iter().all(|row| row.results_match)
    }
}

fn check_grade_count(category: Category, max: usize, grades: &[i32]) -> Result<(), RecordError> {
    if grades.len() > max {
        return Err(RecordError::TooManyGrades {
            category,
            max,
            given: grades.len(),
        });
    }
    Ok(())
}

fn join_grades(grades: &[i32]) -> String {
    grades
        .iter()
        .map(|g| g.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
