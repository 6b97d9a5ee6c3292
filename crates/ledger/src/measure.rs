//! Sizes encoded in material names and template descriptions.
//!
//! Arm and pole lengths appear as a number followed by a meter unit
//! (`BRAZO 1.5M`, `POSTE CONCRETO 12 MTS 750KG`) or, for arms, as spelled-out
//! phrases (`BRAZO METRO Y MEDIO`). Templates describe height bands as
//! `8 A 10 M` and perch counts as `2 PERCHAS`.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::normalize::match_form;

/// Closed interval `[min, max]`; `max` may be infinite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: f64,
    #[serde(default = "unbounded")]
    pub max: f64,
}

fn unbounded() -> f64 {
    f64::INFINITY
}

impl Band {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn exactly(value: f64) -> Self {
        Self { min: value, max: value }
    }

    pub fn at_least(min: f64) -> Self {
        Self { min, max: f64::INFINITY }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

const LENGTH_PHRASES: &[(&str, f64)] = &[
    ("UN METRO Y MEDIO", 1.5),
    ("METRO Y MEDIO", 1.5),
    ("1 1/2", 1.5),
    ("CUATRO METROS", 4.0),
    ("TRES METROS", 3.0),
    ("DOS METROS", 2.0),
    ("UN METRO", 1.0),
];

fn length_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*(?:MTS|MT|METROS|METRO|M)\b").expect("valid length regex")
    })
}

fn band_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*(?:M|MTS|MT)?\s*(?:A|AL|-|Y)\s*(\d+(?:[.,]\d+)?)\s*(?:MTS|MT|METROS|METRO|M)\b")
            .expect("valid band regex")
    })
}

fn perch_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+)\s*(O\s+MAS\s+)?PERCHAS?|PERCHAS?\s*(?:DE\s*)?(\d+)").expect("valid perch regex")
    })
}

fn arm_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:BRAZO|BRAZOS|ARM)\b").expect("valid arm regex"))
}

fn parse_decimal(s: &str) -> Option<f64> {
    s.replace(',', ".").parse().ok()
}

/// Length in meters encoded in a material name, if any.
pub fn length_m(name: &str) -> Option<f64> {
    let text = match_form(name);
    if let Some(caps) = length_pattern().captures(&text) {
        return parse_decimal(&caps[1]);
    }
    LENGTH_PHRASES
        .iter()
        .find(|(phrase, _)| text.contains(phrase))
        .map(|(_, meters)| *meters)
}

/// True when a material name describes a mounting arm.
pub fn is_arm(name: &str) -> bool {
    arm_pattern().is_match(&match_form(name))
}

/// Height band written in a description (`8 A 10 M`), or a single height
/// (`12 M`) as a one-point band.
pub fn height_band(description: &str) -> Option<Band> {
    let text = match_form(description);
    if let Some(caps) = band_pattern().captures(&text) {
        let lo = parse_decimal(&caps[1])?;
        let hi = parse_decimal(&caps[2])?;
        return Some(Band::new(lo.min(hi), lo.max(hi)));
    }
    length_pattern()
        .captures(&text)
        .and_then(|caps| parse_decimal(&caps[1]))
        .map(Band::exactly)
}

/// Perch-count band written in a description: `2 PERCHAS` is exactly two,
/// `3 O MAS PERCHAS` is three or more.
pub fn perch_band(description: &str) -> Option<Band> {
    let text = match_form(description);
    let caps = perch_pattern().captures(&text)?;
    if let Some(count) = caps.get(1) {
        let n: f64 = count.as_str().parse().ok()?;
        return Some(if caps.get(2).is_some() { Band::at_least(n) } else { Band::exactly(n) });
    }
    let n: f64 = caps.get(3)?.as_str().parse().ok()?;
    Some(Band::exactly(n))
}
