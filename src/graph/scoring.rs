//! Heuristic path scoring.
//!
//! Scores are deterministic functions of a path's step outputs: the same
//! path always yields the same score. Four factors worth up to 2.5 points
//! each sit on top of a 5.0 base, and the total is clamped to the 0-10
//! scale.

use serde::{Deserialize, Serialize};

use super::{ResearchPath, StepStatus, DEFAULT_PATH_SCORE};

/// Per-factor score components, each in 0.0-2.5.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Citation and reference marker density.
    pub citation_density: f64,
    /// Lexical source-quality signals in the output text.
    pub source_quality: f64,
    /// Content length, query breadth, and step depth.
    pub coverage: f64,
    /// Fraction of steps completed with substantive output.
    pub completeness: f64,
}

impl ScoreBreakdown {
    /// Sum of the factors on top of the base score, clamped to 0-10.
    pub fn total(&self) -> f64 {
        (DEFAULT_PATH_SCORE
            + self.citation_density
            + self.source_quality
            + self.coverage
            + self.completeness)
            .clamp(0.0, 10.0)
    }
}

/// Score a path, returning the overall score and its factor breakdown.
pub fn score_path(path: &ResearchPath) -> (f64, ScoreBreakdown) {
    let breakdown = ScoreBreakdown {
        citation_density: citation_density(path),
        source_quality: source_quality(path),
        coverage: coverage(path),
        completeness: completeness(path),
    };
    (breakdown.total(), breakdown)
}

/// Citations per 1000 characters of output, scaled so one citation per
/// thousand characters earns half the factor.
fn citation_density(path: &ResearchPath) -> f64 {
    let mut citations = 0usize;
    let mut total_length = 0usize;

    for step in &path.steps {
        let output = &step.output;
        total_length += output.len();

        citations += output.matches("http://").count();
        citations += output.matches("https://").count();
        citations += output.matches("doi:").count();
        citations += output.matches("DOI:").count();
        for n in 1..=20 {
            citations += output.matches(&format!("[{}]", n)).count();
        }
    }

    if total_length == 0 {
        return 0.5;
    }

    let density = citations as f64 / (total_length as f64 / 1000.0);
    (density * 1.25).min(2.5)
}

const HIGH_QUALITY_MARKERS: &[&str] = &[
    ".edu",
    ".gov",
    "pubmed",
    "arxiv",
    "scholar.google",
    "ieee",
    "acm.org",
    "nature.com",
    "science.org",
    "peer-reviewed",
    "systematic review",
    "meta-analysis",
];

const MEDIUM_QUALITY_MARKERS: &[&str] = &[
    "gartner",
    "forrester",
    "mckinsey",
    "reuters",
    "bloomberg",
    "techcrunch",
    "wired",
    "official documentation",
];

const LOW_QUALITY_MARKERS: &[&str] = &[
    "reddit.com",
    "quora.com",
    "blog",
    "medium.com",
    "opinion",
    "allegedly",
    "rumor",
];

/// Lexical scan of the output for trust markers. Each distinct high-trust
/// marker adds 0.3, each medium marker 0.15, each low-trust marker
/// subtracts 0.1.
fn source_quality(path: &ResearchPath) -> f64 {
    let content = joined_output(path);
    if content.is_empty() {
        return 0.5;
    }
    let lower = content.to_lowercase();

    let mut score: f64 = 0.0;
    for marker in HIGH_QUALITY_MARKERS {
        if lower.contains(marker) {
            score += 0.3;
        }
    }
    for marker in MEDIUM_QUALITY_MARKERS {
        if lower.contains(marker) {
            score += 0.15;
        }
    }
    for marker in LOW_QUALITY_MARKERS {
        if lower.contains(marker) {
            score -= 0.1;
        }
    }

    score.clamp(0.0, 2.5)
}

/// Content length (up to 1.0 at 5000 chars), distinct queries (0.25 each up
/// to 0.75), and step depth (0.15 each up to 0.75).
fn coverage(path: &ResearchPath) -> f64 {
    let content_length = joined_output(path).len();
    let query_count = path.distinct_queries();
    let step_count = path.steps.len();

    let length_score = (content_length as f64 / 5000.0).min(1.0);
    let query_score = (query_count as f64 * 0.25).min(0.75);
    let depth_score = (step_count as f64 * 0.15).min(0.75);

    length_score + query_score + depth_score
}

/// Blend of the completed-step ratio and the substantive-output ratio
/// (outputs longer than 50 characters).
fn completeness(path: &ResearchPath) -> f64 {
    if path.steps.is_empty() {
        return 0.0;
    }

    let mut completed = 0usize;
    let mut with_output = 0usize;

    for step in &path.steps {
        if step.output.len() > 50 {
            with_output += 1;
        }
        if step.status == StepStatus::Completed || !step.output.is_empty() {
            completed += 1;
        }
    }

    let completion_ratio = completed as f64 / path.steps.len() as f64;
    let output_ratio = with_output as f64 / path.steps.len() as f64;

    ((completion_ratio + output_ratio) * 1.25).min(2.5)
}

fn joined_output(path: &ResearchPath) -> String {
    let mut content = String::new();
    for step in &path.steps {
        content.push_str(&step.output);
        content.push(' ');
    }
    content.trim_end().to_string()
}
