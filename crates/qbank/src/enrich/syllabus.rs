//! Subject syllabus references injected into enrichment prompts.
//!
//! When the existing metadata names a known subject, the prompt carries
//! that subject's syllabus so the model classifies chapter/topic against
//! a fixed taxonomy instead of inventing its own labels.

use serde_json::{Map, Value};

/// Subjects with a curated syllabus reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Physics,
    Chemistry,
    Mathematics,
    Economics,
    GeneralPaper,
}

/// Physics uses a nested chapter → topics taxonomy.
const PHYSICS_SYLLABUS: &[(&str, &[&str])] = &[
    (
        "Measurement",
        &["SI units", "errors and uncertainties", "scalars and vectors"],
    ),
    (
        "Kinematics",
        &["rectilinear motion", "projectile motion", "graphs of motion"],
    ),
    (
        "Dynamics",
        &["Newton's laws", "momentum and impulse", "conservation of momentum"],
    ),
    (
        "Forces",
        &["equilibrium", "moments and torque", "upthrust and pressure"],
    ),
    (
        "Work, Energy and Power",
        &["work done", "kinetic and potential energy", "efficiency"],
    ),
    (
        "Circular Motion",
        &["angular velocity", "centripetal force"],
    ),
    (
        "Gravitational Field",
        &["field strength", "gravitational potential", "orbits"],
    ),
    (
        "Oscillations",
        &["simple harmonic motion", "damping", "resonance"],
    ),
    (
        "Waves",
        &["progressive waves", "stationary waves", "diffraction and interference"],
    ),
    (
        "Electric Fields",
        &["Coulomb's law", "field strength", "electric potential"],
    ),
    (
        "Current of Electricity",
        &["charge and current", "resistance and resistivity", "e.m.f. and potential difference"],
    ),
    (
        "D.C. Circuits",
        &["series and parallel circuits", "potential dividers", "internal resistance"],
    ),
    (
        "Electromagnetism",
        &["magnetic fields", "force on a current-carrying conductor", "force on a moving charge"],
    ),
    (
        "Electromagnetic Induction",
        &["Faraday's law", "Lenz's law"],
    ),
    (
        "Quantum Physics",
        &["photoelectric effect", "energy levels and line spectra", "wave-particle duality"],
    ),
    (
        "Nuclear Physics",
        &["radioactive decay", "binding energy", "fission and fusion"],
    ),
];

const CHEMISTRY_TOPICS: &[&str] = &[
    "Atomic structure",
    "Chemical bonding",
    "The mole concept and stoichiometry",
    "Energetics",
    "Reaction kinetics",
    "Chemical equilibria",
    "Acid-base equilibria",
    "Electrochemistry",
    "The periodic table",
    "Organic chemistry",
    "Polymers",
];

const MATHEMATICS_TOPICS: &[&str] = &[
    "Functions and graphs",
    "Sequences and series",
    "Equations and inequalities",
    "Differentiation",
    "Integration",
    "Vectors",
    "Complex numbers",
    "Probability",
    "Permutations and combinations",
    "Binomial and normal distributions",
    "Hypothesis testing",
    "Correlation and regression",
];

const ECONOMICS_TOPICS: &[&str] = &[
    "Scarcity, choice and opportunity cost",
    "Demand and supply",
    "Elasticity",
    "Market failure and government intervention",
    "Firms and market structures",
    "Macroeconomic aims and policies",
    "National income",
    "Inflation and unemployment",
    "International trade",
    "Exchange rates and balance of payments",
];

const GENERAL_PAPER_TOPICS: &[&str] = &[
    "Science and technology",
    "Environment and sustainability",
    "Politics and governance",
    "Media and society",
    "Arts and culture",
    "Education",
    "Ethics and values",
    "Globalisation",
];

impl Subject {
    /// Detects a known subject from the existing metadata's `subject`
    /// field. Matching is case-insensitive and tolerates the separator
    /// spellings "general paper", "general-paper" and "general_paper".
    pub fn detect(existing: &Map<String, Value>) -> Option<Subject> {
        let raw = existing.get("subject")?.as_str()?;
        let normalized: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '_' { '-' } else { c })
            .collect();

        match normalized.as_str() {
            "physics" => Some(Subject::Physics),
            "chemistry" => Some(Subject::Chemistry),
            "mathematics" => Some(Subject::Mathematics),
            "economics" => Some(Subject::Economics),
            "general-paper" => Some(Subject::GeneralPaper),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Subject::Physics => "Physics",
            Subject::Chemistry => "Chemistry",
            Subject::Mathematics => "Mathematics",
            Subject::Economics => "Economics",
            Subject::GeneralPaper => "General Paper",
        }
    }

    /// Renders the syllabus block for the prompt, including the
    /// classification instruction.
    pub fn syllabus_reference(&self) -> String {
        let body = match self {
            Subject::Physics => {
                let chapters: Vec<String> = PHYSICS_SYLLABUS
                    .iter()
                    .map(|(chapter, topics)| format!("- {}: {}", chapter, topics.join(", ")))
                    .collect();
                chapters.join("\n")
            }
            Subject::Chemistry => flat_topic_list(CHEMISTRY_TOPICS),
            Subject::Mathematics => flat_topic_list(MATHEMATICS_TOPICS),
            Subject::Economics => flat_topic_list(ECONOMICS_TOPICS),
            Subject::GeneralPaper => flat_topic_list(GENERAL_PAPER_TOPICS),
        };

        format!(
            "SYLLABUS REFERENCE ({}):\n{}\n\nClassify the question's \"chapter\" and \"topic\" against this syllabus. Use the closest matching entries rather than inventing new names.",
            self.name(),
            body
        )
    }
}

fn flat_topic_list(topics: &[&str]) -> String {
    topics
        .iter()
        .map(|t| format!("- {}", t))
        .collect::<Vec<_>>()
        .join("\n")
}
