// Result tables: one row per term or feature.
//
// The construction checks enforce the two table invariants: a unique row
// index and rows in processing order. Display follows the terminal style
// used elsewhere in the crate: ranked rows, fixed-width columns, dimmed
// chrome.

use std::collections::HashSet;

use anyhow::Result;
use colored::Colorize;
use ndarray::ArrayView1;
use serde::Serialize;

/// One decoded term and its weight.
#[derive(Debug, Clone, Serialize)]
pub struct TermWeight {
    pub term: String,
    pub weight: f64,
}

/// Term-indexed weight table produced by image-to-text decoding.
#[derive(Debug, Clone, Serialize)]
pub struct TermWeightTable {
    rows: Vec<TermWeight>,
}

impl TermWeightTable {
    /// Build a table from parallel term and weight sequences.
    pub fn new(terms: &[String], weights: ArrayView1<f64>) -> Result<Self> {
        if terms.len() != weights.len() {
            anyhow::bail!(
                "Term list ({}) and weight vector ({}) differ in length",
                terms.len(),
                weights.len()
            );
        }
        check_unique_index(terms.iter().map(|t| t.as_str()))?;
        Ok(Self {
            rows: terms
                .iter()
                .zip(weights.iter())
                .map(|(term, &weight)| TermWeight {
                    term: term.clone(),
                    weight,
                })
                .collect(),
        })
    }

    pub fn rows(&self) -> &[TermWeight] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Weight for a term, if the term is in the table.
    pub fn weight(&self, term: &str) -> Option<f64> {
        self.rows.iter().find(|r| r.term == term).map(|r| r.weight)
    }

    /// Print the top-weighted terms as a ranked list.
    pub fn display(&self, top_n: usize) {
        let mut ranked: Vec<&TermWeight> = self.rows.iter().collect();
        ranked.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal));

        println!(
            "\n{}",
            format!("=== Decoded terms (top {} of {}) ===", top_n.min(ranked.len()), ranked.len())
                .bold()
        );
        println!();
        println!("  {:>4}  {:<30} {:>12}", "Rank".dimmed(), "Term".dimmed(), "Weight".dimmed());
        println!("  {}", "-".repeat(50).dimmed());
        for (i, row) in ranked.iter().take(top_n).enumerate() {
            println!("  {:>4}. {:<30} {:>12.6}", i + 1, row.term, row.weight);
        }
        println!();
    }
}

/// One feature and its correlation with the query map.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureCorrelation {
    pub feature: String,
    pub r: f64,
}

/// Feature-indexed correlation table produced by the correlation decoder.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationTable {
    rows: Vec<FeatureCorrelation>,
}

impl CorrelationTable {
    pub fn new(features: &[String], correlations: ArrayView1<f64>) -> Result<Self> {
        if features.len() != correlations.len() {
            anyhow::bail!(
                "Feature list ({}) and correlation vector ({}) differ in length",
                features.len(),
                correlations.len()
            );
        }
        check_unique_index(features.iter().map(|f| f.as_str()))?;
        Ok(Self {
            rows: features
                .iter()
                .zip(correlations.iter())
                .map(|(feature, &r)| FeatureCorrelation {
                    feature: feature.clone(),
                    r,
                })
                .collect(),
        })
    }

    pub fn rows(&self) -> &[FeatureCorrelation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn correlation(&self, feature: &str) -> Option<f64> {
        self.rows.iter().find(|r| r.feature == feature).map(|r| r.r)
    }

    /// Print features ranked by correlation.
    pub fn display(&self) {
        let mut ranked: Vec<&FeatureCorrelation> = self.rows.iter().collect();
        ranked.sort_by(|a, b| b.r.partial_cmp(&a.r).unwrap_or(std::cmp::Ordering::Equal));

        println!("\n{}", format!("=== Feature correlations ({}) ===", ranked.len()).bold());
        println!();
        for (i, row) in ranked.iter().enumerate() {
            let value = format!("{:+.4}", row.r);
            let colored_value = if row.r >= 0.5 {
                value.bright_green()
            } else if row.r >= 0.0 {
                value.normal()
            } else {
                value.bright_blue()
            };
            println!("  {:>4}. {:<30} {}", i + 1, row.feature, colored_value);
        }
        println!();
    }
}

/// One feature and the distribution of its Fisher-z study correlations.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureDistribution {
    pub feature: String,
    pub mean: f64,
    pub std: f64,
}

/// Feature-indexed mean/std table produced by the distribution decoder.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationDistributionTable {
    rows: Vec<FeatureDistribution>,
}

impl CorrelationDistributionTable {
    pub fn new(rows: Vec<FeatureDistribution>) -> Result<Self> {
        check_unique_index(rows.iter().map(|r| r.feature.as_str()))?;
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[FeatureDistribution] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn distribution(&self, feature: &str) -> Option<(f64, f64)> {
        self.rows
            .iter()
            .find(|r| r.feature == feature)
            .map(|r| (r.mean, r.std))
    }

    /// Print features ranked by mean Fisher-z correlation.
    pub fn display(&self) {
        let mut ranked: Vec<&FeatureDistribution> = self.rows.iter().collect();
        ranked.sort_by(|a, b| b.mean.partial_cmp(&a.mean).unwrap_or(std::cmp::Ordering::Equal));

        println!(
            "\n{}",
            format!("=== Feature correlation distributions ({}) ===", ranked.len()).bold()
        );
        println!();
        println!(
            "  {:>4}  {:<30} {:>10} {:>10}",
            "Rank".dimmed(),
            "Feature".dimmed(),
            "Mean z".dimmed(),
            "Std".dimmed()
        );
        println!("  {}", "-".repeat(58).dimmed());
        for (i, row) in ranked.iter().enumerate() {
            println!(
                "  {:>4}. {:<30} {:>+10.4} {:>10.4}",
                i + 1,
                row.feature,
                row.mean,
                row.std
            );
        }
        println!();
    }
}

fn check_unique_index<'a>(index: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for key in index {
        if !seen.insert(key) {
            anyhow::bail!("Table index entry '{key}' appears more than once");
        }
    }
    Ok(())
}
