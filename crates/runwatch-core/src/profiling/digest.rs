//! Multi-window performance comparison.
//!
//! Windows are given most recent first. Every label of the newest window
//! becomes a row; each older window contributes a delta of best values.

use super::summary::{ProfilingSummary, StatSummary};
use crate::model::RegressionMode;
use crate::notify::html::escape;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Statistics of one profiling point (or point/alias pair) within a window.
#[derive(Debug, Clone, PartialEq)]
pub struct PointStats {
    pub regression_mode: RegressionMode,
    pub labels: BTreeMap<String, StatSummary>,
}

/// Named window, e.g. "today", mapping table title to its statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowStats {
    pub name: String,
    pub points: BTreeMap<String, PointStats>,
}

impl WindowStats {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: BTreeMap::new(),
        }
    }

    /// Merges stored day summaries into this window.
    ///
    /// Summaries are grouped by point name plus `[alias]` when an alias is set.
    /// A point without labels yields one row named after the point.
    pub fn add_summaries(&mut self, summaries: &[ProfilingSummary]) {
        for s in summaries {
            let title = table_title(&s.key.profiling_point, &s.key.option_alias);
            let mode = s.regression_mode;
            let entry = self.points.entry(title).or_insert_with(|| PointStats {
                regression_mode: mode,
                labels: BTreeMap::new(),
            });
            if s.labels.is_empty() {
                let row = &s.key.profiling_point;
                entry
                    .labels
                    .entry(row.clone())
                    .or_insert_with(|| StatSummary::new(row.clone()))
                    .merge(&s.global, mode);
            } else {
                for label in &s.labels {
                    entry
                        .labels
                        .entry(label.label.clone())
                        .or_insert_with(|| StatSummary::new(label.label.clone()))
                        .merge(label, mode);
                }
            }
        }
    }
}

pub fn table_title(point: &str, option_alias: &str) -> String {
    if option_alias.is_empty() {
        point.to_string()
    } else {
        format!("{point} [{option_alias}]")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaFlag {
    Regression,
    Improvement,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaCell {
    pub percent: f64,
    pub flag: DeltaFlag,
}

impl DeltaCell {
    /// `None` when there is nothing to compare against.
    pub fn compute(
        current_best: f64,
        older_best: f64,
        mode: RegressionMode,
        threshold_pct: f64,
    ) -> Option<Self> {
        if older_best == 0.0 || !older_best.is_finite() || !current_best.is_finite() {
            return None;
        }
        let percent = (current_best - older_best) / older_best.abs() * 100.0;
        let (worse, better) = match mode {
            RegressionMode::HigherIsBetter => (percent <= -threshold_pct, percent >= threshold_pct),
            RegressionMode::LowerIsBetter => (percent >= threshold_pct, percent <= -threshold_pct),
        };
        let flag = if worse {
            DeltaFlag::Regression
        } else if better {
            DeltaFlag::Improvement
        } else {
            DeltaFlag::Neutral
        };
        Some(DeltaCell { percent, flag })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DigestRow {
    pub label: String,
    pub best: f64,
    pub mean: f64,
    pub std: f64,
    pub count: u64,
    /// One cell per older window, in window order.
    pub deltas: Vec<Option<DeltaCell>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DigestTable {
    pub title: String,
    pub regression_mode: RegressionMode,
    pub rows: Vec<DigestRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceDigest {
    pub test_name: String,
    pub window_names: Vec<String>,
    pub tables: Vec<DigestTable>,
}

impl PerformanceDigest {
    /// Builds one table per point present in the newest window.
    pub fn build(test_name: &str, windows: &[WindowStats], threshold_pct: f64) -> Self {
        let window_names = windows.iter().map(|w| w.name.clone()).collect();
        let Some((newest, older)) = windows.split_first() else {
            return Self {
                test_name: test_name.to_string(),
                window_names,
                tables: Vec::new(),
            };
        };

        let mut tables = Vec::new();
        for (title, stats) in &newest.points {
            let mode = stats.regression_mode;
            let rows = stats
                .labels
                .iter()
                .filter(|(_, s)| s.count > 0)
                .map(|(label, current)| DigestRow {
                    label: label.clone(),
                    best: current.best,
                    mean: current.mean,
                    std: current.std(),
                    count: current.count,
                    deltas: older
                        .iter()
                        .map(|w| {
                            let old = w.points.get(title)?.labels.get(label)?;
                            if old.count == 0 {
                                return None;
                            }
                            DeltaCell::compute(current.best, old.best, mode, threshold_pct)
                        })
                        .collect(),
                })
                .collect::<Vec<_>>();
            if !rows.is_empty() {
                tables.push(DigestTable {
                    title: title.clone(),
                    regression_mode: mode,
                    rows,
                });
            }
        }

        Self {
            test_name: test_name.to_string(),
            window_names,
            tables,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn regressions(&self) -> usize {
        self.tables
            .iter()
            .flat_map(|t| &t.rows)
            .flat_map(|r| &r.deltas)
            .filter(|c| matches!(c, Some(DeltaCell { flag: DeltaFlag::Regression, .. })))
            .count()
    }

    /// Renders every table as an HTML fragment.
    pub fn to_html(&self) -> String {
        let older = self.window_names.get(1..).unwrap_or(&[]);
        let mut out = String::new();
        for table in &self.tables {
            let _ = writeln!(out, "<h3>{}</h3>", escape(&table.title));
            out.push_str("<table border=\"1\" cellpadding=\"4\">\n<tr><th>Label</th><th>Best</th><th>Mean</th><th>Std</th><th>Count</th>");
            for name in older {
                let _ = write!(out, "<th>&Delta; vs {}</th>", escape(name));
            }
            out.push_str("</tr>\n");
            for row in &table.rows {
                let _ = write!(
                    out,
                    "<tr><td>{}</td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td><td>{}</td>",
                    escape(&row.label),
                    row.best,
                    row.mean,
                    row.std,
                    row.count
                );
                for cell in &row.deltas {
                    match cell {
                        Some(c) => {
                            let color = match c.flag {
                                DeltaFlag::Regression => "#f4c7c3",
                                DeltaFlag::Improvement => "#b7e1cd",
                                DeltaFlag::Neutral => "#ffffff",
                            };
                            let _ = write!(
                                out,
                                "<td style=\"background-color:{color}\">{:+.1}%</td>",
                                c.percent
                            );
                        }
                        None => out.push_str("<td></td>"),
                    }
                }
                out.push_str("</tr>\n");
            }
            out.push_str("</table>\n");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiling::summary::SummaryKey;

    fn stats(samples: &[f64], mode: RegressionMode) -> StatSummary {
        StatSummary::from_samples("x", samples, mode)
    }

    fn window(name: &str, point: &str, mode: RegressionMode, labels: &[(&str, Vec<f64>)]) -> WindowStats {
        let mut w = WindowStats::new(name);
        w.points.insert(
            point.to_string(),
            PointStats {
                regression_mode: mode,
                labels: labels
                    .iter()
                    .map(|(l, xs)| (l.to_string(), stats(xs, mode)))
                    .collect(),
            },
        );
        w
    }

    #[test]
    fn lower_is_better_flags_increase_as_regression() {
        let mode = RegressionMode::LowerIsBetter;
        let windows = [
            window("today", "latency", mode, &[("4", vec![110.0]), ("8", vec![90.0])]),
            window("yesterday", "latency", mode, &[("4", vec![100.0]), ("8", vec![100.0])]),
        ];
        let digest = PerformanceDigest::build("t", &windows, 5.0);
        let rows = &digest.tables[0].rows;
        assert_eq!(rows[0].deltas[0].unwrap().flag, DeltaFlag::Regression);
        assert_eq!(rows[1].deltas[0].unwrap().flag, DeltaFlag::Improvement);
        assert_eq!(digest.regressions(), 1);
    }

    #[test]
    fn higher_is_better_within_threshold_is_neutral() {
        let mode = RegressionMode::HigherIsBetter;
        let windows = [
            window("today", "tput", mode, &[("1k", vec![98.0])]),
            window("yesterday", "tput", mode, &[("1k", vec![100.0])]),
        ];
        let cell = PerformanceDigest::build("t", &windows, 5.0).tables[0].rows[0].deltas[0].unwrap();
        assert_eq!(cell.flag, DeltaFlag::Neutral);
        assert!((cell.percent + 2.0).abs() < 1e-9);
    }

    #[test]
    fn missing_or_zero_older_data_leaves_empty_cells() {
        let mode = RegressionMode::HigherIsBetter;
        let windows = [
            window("today", "tput", mode, &[("a", vec![1.0]), ("b", vec![2.0])]),
            window("yesterday", "tput", mode, &[("a", vec![0.0])]),
            WindowStats::new("last week"),
        ];
        let digest = PerformanceDigest::build("t", &windows, 5.0);
        for row in &digest.tables[0].rows {
            assert_eq!(row.deltas, vec![None, None]);
        }
        let html = digest.to_html();
        assert!(html.contains("<td></td>"));
        assert!(html.contains("&Delta; vs last week"));
    }

    #[test]
    fn no_windows_is_empty() {
        assert!(PerformanceDigest::build("t", &[], 5.0).is_empty());
    }

    #[test]
    fn add_summaries_merges_days_and_titles_aliases() {
        let key = |alias: &str, day: i64| SummaryKey {
            test_name: "t".into(),
            profiling_point: "p".into(),
            branch: "ALL".into(),
            device: "ALL".into(),
            option_alias: alias.into(),
            day_start: day,
        };
        let mode = RegressionMode::HigherIsBetter;
        let summary = |alias: &str, day: i64, xs: &[f64]| ProfilingSummary {
            key: key(alias, day),
            regression_mode: mode,
            x_label: String::new(),
            y_label: String::new(),
            global: StatSummary::from_samples("p", xs, mode),
            labels: vec![],
        };

        let mut w = WindowStats::new("last week");
        w.add_summaries(&[
            summary("", 1, &[1.0, 2.0]),
            summary("", 2, &[3.0]),
            summary("binderized", 1, &[7.0]),
        ]);

        let plain = &w.points["p"].labels["p"];
        assert_eq!(plain.count, 3);
        assert!((plain.mean - 2.0).abs() < 1e-12);
        assert_eq!(plain.best, 3.0);
        assert_eq!(w.points["p [binderized]"].labels["p"].count, 1);
    }
}
