use super::patterns::{detect_pattern, ValuePattern};
use super::score::{score, ScoreBreakdown};
use crate::fuzzy_matcher::FuzzyMatcher;
use crate::metadata::{OracleColumn, SObjectSchema};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

pub const DEFAULT_THRESHOLD: f64 = 0.55;
pub const MAX_CANDIDATES: usize = 3;

/// A Salesforce field proposed for an Oracle column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub field: String,
    pub label: String,
    pub field_type: String,
    pub score: ScoreBreakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingStatus {
    /// Best candidate clears the threshold.
    Accepted,
    /// Lost its best field to a stronger column, took the next candidate.
    Reassigned,
    /// Lost every candidate above the threshold to stronger columns.
    Conflict,
    BelowThreshold,
    /// No createable field to compare against.
    Unmapped,
}

impl std::fmt::Display for MappingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MappingStatus::Accepted => "accepted",
            MappingStatus::Reassigned => "reassigned",
            MappingStatus::Conflict => "conflict",
            MappingStatus::BelowThreshold => "below_threshold",
            MappingStatus::Unmapped => "unmapped",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub column: String,
    pub data_type: String,
    pub pattern: Option<ValuePattern>,
    /// Ranked best first, at most [`MAX_CANDIDATES`].
    pub candidates: Vec<Candidate>,
    /// Index into `candidates` of the field this column maps to.
    pub selected: Option<usize>,
    pub status: MappingStatus,
}

impl ColumnMapping {
    pub fn selected_candidate(&self) -> Option<&Candidate> {
        self.selected.and_then(|i| self.candidates.get(i))
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self.status, MappingStatus::Accepted | MappingStatus::Reassigned)
    }
}

/// One line of the mapping CSV.
#[derive(Debug, Clone, Serialize)]
pub struct MappingRow {
    pub column: String,
    pub data_type: String,
    pub pattern: String,
    pub field: String,
    pub label: String,
    pub name_score: String,
    pub dtype_score: String,
    pub pattern_score: String,
    pub synonym_score: String,
    pub total_score: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingReport {
    pub table: String,
    pub object: String,
    pub threshold: f64,
    pub generated_at: DateTime<Utc>,
    pub mappings: Vec<ColumnMapping>,
}

impl MappingReport {
    /// `<TABLE>_to_<Object>`, the stem of the CSV and JSON artifacts.
    pub fn file_stem(&self) -> String {
        format!("{}_to_{}", self.table.to_uppercase(), self.object)
    }

    pub fn mapped_count(&self) -> usize {
        self.mappings.iter().filter(|m| m.is_mapped()).count()
    }

    pub fn unmapped(&self) -> impl Iterator<Item = &ColumnMapping> {
        self.mappings.iter().filter(|m| !m.is_mapped())
    }

    /// Mapped column → field pairs.
    pub fn field_map(&self) -> Vec<(&str, &str)> {
        self.mappings
            .iter()
            .filter(|m| m.is_mapped())
            .filter_map(|m| Some((m.column.as_str(), m.selected_candidate()?.field.as_str())))
            .collect()
    }

    /// Rows for the CSV artifact: the selected (or best) candidate per column.
    pub fn rows(&self) -> Vec<MappingRow> {
        self.mappings
            .iter()
            .map(|m| {
                let shown = m.selected_candidate().or_else(|| m.candidates.first());
                let fmt = |v: Option<f64>| v.map(|x| format!("{:.3}", x)).unwrap_or_default();
                MappingRow {
                    column: m.column.clone(),
                    data_type: m.data_type.clone(),
                    pattern: m.pattern.map(|p| p.to_string()).unwrap_or_default(),
                    field: if m.is_mapped() { shown.map(|c| c.field.clone()).unwrap_or_default() } else { String::new() },
                    label: shown.map(|c| c.label.clone()).unwrap_or_default(),
                    name_score: fmt(shown.map(|c| c.score.name)),
                    dtype_score: fmt(shown.map(|c| c.score.dtype)),
                    pattern_score: fmt(shown.map(|c| c.score.pattern)),
                    synonym_score: fmt(shown.map(|c| c.score.synonym)),
                    total_score: fmt(shown.map(|c| c.score.total)),
                    status: m.status.to_string(),
                }
            })
            .collect()
    }
}

impl std::fmt::Display for MappingReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", "=".repeat(80))?;
        writeln!(f, " FIELD MAPPING: {} → {}", self.table, self.object)?;
        writeln!(f, "{}\n", "=".repeat(80))?;
        writeln!(f, "Threshold: {:.2}", self.threshold)?;
        writeln!(f, "Mapped: {}/{}", self.mapped_count(), self.mappings.len())?;

        writeln!(f, "\n{}", "-".repeat(80))?;
        writeln!(f, "{:<28} {:<28} {:>7}  {}", "COLUMN", "FIELD", "SCORE", "STATUS")?;
        writeln!(f, "{}", "-".repeat(80))?;
        for m in &self.mappings {
            let shown = m.selected_candidate().or_else(|| m.candidates.first());
            writeln!(
                f,
                "{:<28} {:<28} {:>7}  {}",
                m.column,
                shown.map(|c| c.field.as_str()).unwrap_or("-"),
                shown.map(|c| format!("{:.3}", c.score.total)).unwrap_or_default(),
                m.status
            )?;
        }
        Ok(())
    }
}

/// Ranks Salesforce fields for every column of an Oracle table.
pub struct FieldMapper {
    matcher: FuzzyMatcher,
    threshold: f64,
}

impl Default for FieldMapper {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl FieldMapper {
    pub fn new(threshold: f64) -> Self {
        Self {
            matcher: FuzzyMatcher::default(),
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Top candidates for one column, best first.
    pub fn rank(&self, column: &OracleColumn, schema: &SObjectSchema) -> (Option<ValuePattern>, Vec<Candidate>) {
        let pattern = detect_pattern(&column.samples);
        let mut candidates: Vec<Candidate> = schema
            .createable_fields()
            .map(|field| Candidate {
                field: field.name.clone(),
                label: field.label.clone(),
                field_type: field.field_type.clone(),
                score: score(&self.matcher, column, pattern, field),
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.score
                .total
                .partial_cmp(&a.score.total)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(MAX_CANDIDATES);
        (pattern, candidates)
    }

    pub fn map_table(&self, columns: &[OracleColumn], schema: &SObjectSchema) -> MappingReport {
        let table = columns.first().map(|c| c.table.clone()).unwrap_or_default();
        let ranked: Vec<(Option<ValuePattern>, Vec<Candidate>)> =
            columns.iter().map(|c| self.rank(c, schema)).collect();

        let (pointers, lost) = self.resolve_conflicts(&ranked);

        let mappings: Vec<ColumnMapping> = columns
            .iter()
            .zip(ranked)
            .enumerate()
            .map(|(i, (column, (pattern, candidates)))| {
                let current = candidates.get(pointers[i]).filter(|c| c.score.total >= self.threshold);
                let (selected, status) = match current {
                    Some(_) if lost[i] => (Some(pointers[i]), MappingStatus::Reassigned),
                    Some(_) => (Some(pointers[i]), MappingStatus::Accepted),
                    None if candidates.is_empty() => (None, MappingStatus::Unmapped),
                    None if lost[i] => (None, MappingStatus::Conflict),
                    None => (None, MappingStatus::BelowThreshold),
                };
                ColumnMapping {
                    column: column.name.clone(),
                    data_type: column.data_type.clone(),
                    pattern,
                    candidates,
                    selected,
                    status,
                }
            })
            .collect();

        let report = MappingReport {
            table,
            object: schema.name.clone(),
            threshold: self.threshold,
            generated_at: Utc::now(),
            mappings,
        };
        info!(
            "Mapped {}/{} columns of {} to {}",
            report.mapped_count(),
            report.mappings.len(),
            report.table,
            report.object
        );
        report
    }

    /// Each field keeps only its highest scoring claim; losing columns move
    /// on to their next candidate until no field is claimed twice.
    fn resolve_conflicts(&self, ranked: &[(Option<ValuePattern>, Vec<Candidate>)]) -> (Vec<usize>, Vec<bool>) {
        let mut pointers = vec![0usize; ranked.len()];
        let mut lost = vec![false; ranked.len()];

        loop {
            let mut claims: HashMap<&str, Vec<usize>> = HashMap::new();
            for (i, (_, candidates)) in ranked.iter().enumerate() {
                if let Some(c) = candidates.get(pointers[i]) {
                    if c.score.total >= self.threshold {
                        claims.entry(c.field.as_str()).or_default().push(i);
                    }
                }
            }

            let mut changed = false;
            for (field, claimants) in claims.into_iter().filter(|(_, v)| v.len() > 1) {
                let score_of = |i: usize| ranked[i].1[pointers[i]].score.total;
                let winner = claimants
                    .iter()
                    .copied()
                    .fold(claimants[0], |best, i| if score_of(i) > score_of(best) { i } else { best });
                for &i in claimants.iter().filter(|&&i| i != winner) {
                    debug!("{} lost to a stronger column, trying next candidate", field);
                    pointers[i] += 1;
                    lost[i] = true;
                    changed = true;
                }
            }

            if !changed {
                return (pointers, lost);
            }
        }
    }
}
