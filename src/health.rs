//! Posture-related health information shown alongside the metrics.

use serde::Serialize;
use std::collections::BTreeMap;

/// One health condition associated with poor sitting posture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCondition {
    pub name: &'static str,
    pub description: &'static str,
    pub risk_factors: &'static [&'static str],
    pub prevention: &'static str,
}

const MUSCULOSKELETAL: HealthCondition = HealthCondition {
    name: "Musculoskeletal Issues",
    description: "Poor posture can lead to muscle imbalances, joint stress, and chronic pain conditions.",
    risk_factors: &["Forward head posture", "Rounded shoulders", "Excessive slouching"],
    prevention: "Regular posture checks, ergonomic workspace, and strengthening exercises.",
};

const NEUROLOGICAL: HealthCondition = HealthCondition {
    name: "Neurological Impact",
    description: "Prolonged poor posture may increase pressure on nerves, contributing to conditions like cervical radiculopathy.",
    risk_factors: &["Neck compression", "Spinal misalignment", "Nerve impingement"],
    prevention: "Proper alignment, regular breaks, and posture-correcting exercises.",
};

const RESPIRATORY: HealthCondition = HealthCondition {
    name: "Respiratory Function",
    description: "Slouching compresses the lungs and can reduce oxygen intake by up to 30%, affecting energy levels and cognitive function.",
    risk_factors: &["Slouched sitting", "Compressed chest cavity", "Limited lung expansion"],
    prevention: "Open chest posture, deep breathing exercises, and regular posture correction.",
};

/// The catalog keyed by condition id.
pub fn health_conditions() -> BTreeMap<&'static str, HealthCondition> {
    BTreeMap::from([
        ("musculoskeletal", MUSCULOSKELETAL),
        ("neurological", NEUROLOGICAL),
        ("respiratory", RESPIRATORY),
    ])
}

/// Catalog as console text.
pub fn health_conditions_text() -> String {
    let mut out = String::new();
    for condition in health_conditions().values() {
        out.push_str(condition.name);
        out.push('\n');
        out.push_str(&format!("  {}\n", condition.description));
        out.push_str(&format!("  Risk factors: {}\n", condition.risk_factors.join(", ")));
        out.push_str(&format!("  Prevention: {}\n\n", condition.prevention));
    }
    out
}
