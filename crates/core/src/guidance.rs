//! Preventive guidance for a scored prediction.

use crate::model::Disease;
use riskcare_types::Probability;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::High => "High",
        })
    }
}

/// Above 0.7 is high risk, above 0.3 moderate, anything else low.
pub fn risk_level(probability: Probability) -> RiskLevel {
    let p = probability.value();
    if p > 0.7 {
        RiskLevel::High
    } else if p > 0.3 {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Guidance {
    pub risk_level: RiskLevel,
    pub lifestyle: Vec<&'static str>,
    pub diet: Vec<&'static str>,
    pub exercise: Vec<&'static str>,
    pub screening: Vec<&'static str>,
    pub consult: &'static str,
}

pub fn preventive_measures(disease: Disease, probability: Probability) -> Guidance {
    let level = risk_level(probability);
    match (disease, level) {
        (Disease::HeartDisease, RiskLevel::High) => guidance(
            level,
            &["Quit smoking immediately", "Manage stress with meditation/yoga"],
            &["Strict low-sodium diet", "Avoid trans fats completely"],
            &["Consult doctor before starting", "Light walking 15 mins/day"],
            &["ECG & Echo immediately", "Lipid profile"],
            "Consult a Cardiologist IMMEDIATELY",
        ),
        (Disease::HeartDisease, RiskLevel::Moderate) => guidance(
            level,
            &["Limit alcohol intake", "Maintain healthy weight"],
            &["Reduce salt intake", "Eat more fruits and vegetables"],
            &["Moderate cardio 30 mins/day", "Brisk walking"],
            &["Monitor BP weekly", "Annual cholesterol check"],
            "Schedule a checkup within 2 weeks",
        ),
        (Disease::HeartDisease, RiskLevel::Low) => guidance(
            level,
            &["Maintain active lifestyle", "Avoid smoking"],
            &["Balanced diet", "Limit processed foods"],
            &["Regular exercise 30 mins/day"],
            &["Regular annual checkup"],
            "Standard annual review",
        ),
        (Disease::Diabetes, RiskLevel::High) => guidance(
            level,
            &["Monitor blood sugar daily", "Inspect feet for injuries"],
            &["Strict low-carb diet", "Avoid sugar completely"],
            &["Moderate activity after meals"],
            &["HbA1c test immediately", "Fast blood sugar"],
            "Consult an Endocrinologist IMMEDIATELY",
        ),
        (Disease::Diabetes, RiskLevel::Moderate) => guidance(
            level,
            &["Weight management", "Regular sleep schedule"],
            &["Complex carbohydrates", "Portion control"],
            &["Aerobic exercise 150 mins/week"],
            &["HbA1c test every 3 months"],
            "Consult doctor within 1 month",
        ),
        (Disease::Diabetes, RiskLevel::Low) => guidance(
            level,
            &["Healthy weight maintenance"],
            &["Limit sugary drinks", "High fiber diet"],
            &["Stay active"],
            &["Annual blood sugar check"],
            "Standard annual review",
        ),
    }
}

fn guidance(
    risk_level: RiskLevel,
    lifestyle: &[&'static str],
    diet: &[&'static str],
    exercise: &[&'static str],
    screening: &[&'static str],
    consult: &'static str,
) -> Guidance {
    Guidance {
        risk_level,
        lifestyle: lifestyle.to_vec(),
        diet: diet.to_vec(),
        exercise: exercise.to_vec(),
        screening: screening.to_vec(),
        consult,
    }
}
