//! Structured attributes parsed from a free-text fitting description.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::canonical::{alnum_words, canonicalize, has_phrase};
use crate::sizes::parse_sizes;

/// Pipe and fitting material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Material {
    /// Chlorinated PVC.
    Cpvc,
    /// Polyvinyl chloride.
    Pvc,
    /// Brass.
    Brass,
    /// Copper.
    Copper,
    /// Galvanized steel.
    Galvanized,
    /// Stainless steel.
    Stainless,
}

/// Fitting shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FittingType {
    /// Elbow (also spelled ELL).
    Elbow,
    /// Tee.
    Tee,
    /// Wye.
    Wye,
    /// Coupling.
    Coupling,
    /// Reducer.
    Reducer,
    /// Bushing.
    Bushing,
    /// Cap.
    Cap,
    /// Union.
    Union,
    /// Adapter.
    Adapter,
    /// Nipple.
    Nipple,
}

/// Wall-thickness / pressure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Schedule {
    /// Schedule 40.
    #[serde(rename = "SCH40")]
    Sch40,
    /// Schedule 80.
    #[serde(rename = "SCH80")]
    Sch80,
}

/// Canonical connection end. Declaration order is the canonical priority
/// used when reporting an end set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EndType {
    /// Spigot (male, inserted).
    #[serde(rename = "SPG")]
    Spigot,
    /// Socket / slip (female, receiving).
    #[serde(rename = "S")]
    Socket,
    /// Male iron pipe thread.
    #[serde(rename = "MIP")]
    Mip,
    /// Female iron pipe thread.
    #[serde(rename = "FIP")]
    Fip,
    /// Copper tube size.
    #[serde(rename = "CTS")]
    Cts,
}

impl Material {
    /// Canonical keyword.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpvc => "CPVC",
            Self::Pvc => "PVC",
            Self::Brass => "BRASS",
            Self::Copper => "COPPER",
            Self::Galvanized => "GALVANIZED",
            Self::Stainless => "STAINLESS",
        }
    }
}

impl FittingType {
    /// Canonical keyword.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Elbow => "ELBOW",
            Self::Tee => "TEE",
            Self::Wye => "WYE",
            Self::Coupling => "COUPLING",
            Self::Reducer => "REDUCER",
            Self::Bushing => "BUSHING",
            Self::Cap => "CAP",
            Self::Union => "UNION",
            Self::Adapter => "ADAPTER",
            Self::Nipple => "NIPPLE",
        }
    }
}

impl Schedule {
    /// Canonical keyword.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sch40 => "SCH40",
            Self::Sch80 => "SCH80",
        }
    }
}

impl EndType {
    /// Canonical short code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spigot => "SPG",
            Self::Socket => "S",
            Self::Mip => "MIP",
            Self::Fip => "FIP",
            Self::Cts => "CTS",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(Material, FittingType, Schedule, EndType);

// First listed keyword found as a whole word wins.
const MATERIALS: &[(&str, Material)] = &[
    ("CPVC", Material::Cpvc),
    ("PVC", Material::Pvc),
    ("BRASS", Material::Brass),
    ("COPPER", Material::Copper),
    ("GALVANIZED", Material::Galvanized),
    ("GALV", Material::Galvanized),
    ("STAINLESS", Material::Stainless),
    ("SS", Material::Stainless),
];

const FITTING_TYPES: &[(&str, FittingType)] = &[
    ("ELBOW", FittingType::Elbow),
    ("ELL", FittingType::Elbow),
    ("TEE", FittingType::Tee),
    ("WYE", FittingType::Wye),
    ("COUPLING", FittingType::Coupling),
    ("REDUCER", FittingType::Reducer),
    ("BUSHING", FittingType::Bushing),
    ("CAP", FittingType::Cap),
    ("UNION", FittingType::Union),
    ("ADAPTER", FittingType::Adapter),
    ("NIPPLE", FittingType::Nipple),
];

const SCHEDULES: &[(&str, Schedule)] = &[
    ("SCH 80", Schedule::Sch80),
    ("SCH80", Schedule::Sch80),
    ("SCH 40", Schedule::Sch40),
    ("SCH40", Schedule::Sch40),
];

// Substring literals checked after the explicit 90/45 words.
const DEGREE_LITERALS: &[(&str, f64)] = &[
    ("22.5", 22.5),
    ("22-1/2", 22.5),
    ("22-1/4", 22.5),
    ("11.25", 11.25),
    ("11-1/4", 11.25),
];

pub(crate) const BEND_SYNONYMS: &[(&str, f64)] = &[
    ("1/4 BEND", 90.0),
    ("1/4BEND", 90.0),
    ("QUARTER BEND", 90.0),
    ("1/8 BEND", 45.0),
    ("1/8BEND", 45.0),
    ("EIGHTH BEND", 45.0),
    ("1/16 BEND", 22.5),
    ("1/16BEND", 22.5),
    ("1/32 BEND", 11.25),
    ("1/32BEND", 11.25),
    ("1/4 ELBOW", 90.0),
    ("1/8 ELBOW", 45.0),
];

// SXFIP / SXMIP are recognized as words but only contribute through the
// composite check below.
const END_WORDS: &[(&str, Option<EndType>)] = &[
    ("SXS", Some(EndType::Socket)),
    ("CXC", Some(EndType::Socket)),
    ("SXFIP", None),
    ("SXMIP", None),
    ("FIP", Some(EndType::Fip)),
    ("MIP", Some(EndType::Mip)),
    ("FNPT", Some(EndType::Fip)),
    ("MNPT", Some(EndType::Mip)),
    ("SLIP", Some(EndType::Socket)),
    ("SOCKET", Some(EndType::Socket)),
    ("SOC", Some(EndType::Socket)),
    ("SPIGOT", Some(EndType::Spigot)),
    ("SPG", Some(EndType::Spigot)),
    ("CTS", Some(EndType::Cts)),
];

const SPIGOT_SOCKET_PHRASES: &[&str] =
    &["SPIGOT X SOCKET", "SPG X SOC", "SPGXSOC", "SPIGOTXSOCKET"];
const SOCKET_PAIR_PHRASES: &[&str] = &["SLIP X SLIP", "SOCKET X SOCKET", "SXS", "CXC"];

/// Attribute record derived from one description. Pure function of the
/// input text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAttributes {
    /// Material keyword, if any.
    pub material: Option<Material>,
    /// Fitting shape, if any.
    #[serde(rename = "type")]
    pub fitting_type: Option<FittingType>,
    /// Schedule class, if any.
    pub schedule: Option<Schedule>,
    /// Bend angle in degrees, if any.
    pub angle_deg: Option<f64>,
    /// Connection ends in canonical priority order.
    pub ends: Vec<EndType>,
    /// Normalized size tokens in description order.
    pub sizes: Vec<String>,
    /// Description as supplied.
    pub raw: String,
    /// Canonical form of `raw`.
    pub canon: String,
}

impl ProductAttributes {
    /// Parses a raw description. Never fails; unknown attributes stay unset.
    pub fn parse(description: &str) -> Self {
        let canon = canonicalize(description);

        let mut material = first_phrase(&canon, MATERIALS);
        if material.is_none() && has_phrase(&canon, "DWV") {
            material = Some(Material::Pvc);
        }

        Self {
            material,
            fitting_type: first_phrase(&canon, FITTING_TYPES),
            schedule: first_phrase(&canon, SCHEDULES),
            angle_deg: detect_angle(&canon),
            ends: detect_ends(&canon),
            sizes: parse_sizes(&canon),
            raw: description.to_string(),
            canon,
        }
    }

    /// Number of the identity keys (material, type, schedule) set on both
    /// records.
    pub fn shared_identity_keys(&self, other: &Self) -> usize {
        [
            self.material.is_some() && other.material.is_some(),
            self.fitting_type.is_some() && other.fitting_type.is_some(),
            self.schedule.is_some() && other.schedule.is_some(),
        ]
        .into_iter()
        .filter(|shared| *shared)
        .count()
    }
}

/// Convenience wrapper for [`ProductAttributes::parse`].
pub fn parse(description: &str) -> ProductAttributes {
    ProductAttributes::parse(description)
}

fn first_phrase<T: Copy>(canon: &str, table: &[(&str, T)]) -> Option<T> {
    table
        .iter()
        .find(|(phrase, _)| has_phrase(canon, phrase))
        .map(|(_, value)| *value)
}

fn detect_angle(canon: &str) -> Option<f64> {
    let words: Vec<&str> = alnum_words(canon).collect();
    let has_degree_word = |degrees: &str| {
        words.iter().any(|word| {
            word.strip_prefix(degrees)
                .map_or(false, |suffix| matches!(suffix, "" | "D" | "DEG"))
        })
    };
    if has_degree_word("90") {
        return Some(90.0);
    }
    if has_degree_word("45") {
        return Some(45.0);
    }
    DEGREE_LITERALS
        .iter()
        .chain(BEND_SYNONYMS)
        .find(|(literal, _)| canon.contains(literal))
        .map(|(_, degrees)| *degrees)
}

fn detect_ends(canon: &str) -> Vec<EndType> {
    let mut found: Vec<EndType> = END_WORDS
        .iter()
        .filter(|(word, _)| has_phrase(canon, word))
        .filter_map(|(_, end)| *end)
        .collect();

    if canon.contains("SXMIP") {
        found.extend([EndType::Socket, EndType::Mip]);
    }
    if canon.contains("SXFIP") {
        found.extend([EndType::Socket, EndType::Fip]);
    }
    if SPIGOT_SOCKET_PHRASES.iter().any(|phrase| canon.contains(phrase)) {
        found.extend([EndType::Spigot, EndType::Socket]);
    }
    if SOCKET_PAIR_PHRASES.iter().any(|phrase| canon.contains(phrase)) {
        found.push(EndType::Socket);
    }

    found.sort();
    found.dedup();
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scenario_descriptions() {
        let a = parse("CPVC SCH80 1/8 ELBOW 1-1/2\" SXS");
        assert_eq!(a.material, Some(Material::Cpvc));
        assert_eq!(a.fitting_type, Some(FittingType::Elbow));
        assert_eq!(a.schedule, Some(Schedule::Sch80));
        assert_eq!(a.angle_deg, Some(45.0));
        assert_eq!(a.ends, vec![EndType::Socket]);
        assert_eq!(a.sizes, vec!["1-1/2"]);

        let b = parse("CPVC SCH 80 45 DEG ELBOW 1-1/2\" SOCKET X SOCKET");
        assert_eq!(b.material, Some(Material::Cpvc));
        assert_eq!(b.schedule, Some(Schedule::Sch80));
        assert_eq!(b.angle_deg, Some(45.0));
        assert_eq!(b.ends, vec![EndType::Socket]);
        assert_eq!(b.sizes, vec!["1-1/2"]);
    }

    #[test]
    fn angle_synonyms_resolve_to_degrees() {
        assert_eq!(parse("PVC 1/4 BEND 2IN").angle_deg, Some(90.0));
        assert_eq!(parse("PVC 90 ELBOW 2IN").angle_deg, Some(90.0));
        assert_eq!(parse("PVC 90DEG ELL 2").angle_deg, Some(90.0));
        assert_eq!(parse("DWV 1/16 BEND 3").angle_deg, Some(22.5));
        assert_eq!(parse("PVC 22-1/2 ELBOW 3").angle_deg, Some(22.5));
        assert_eq!(parse("PVC 11.25 ELBOW 3").angle_deg, Some(11.25));
        assert_eq!(parse("PVC ELBOW 3").angle_deg, None);
        assert_eq!(parse("PVC 900 ELBOW 3").angle_deg, None);
    }

    #[test]
    fn fraction_sizes_are_joined() {
        assert_eq!(parse("CPVC 1 1/2IN COUPLING").sizes, vec!["1-1/2"]);
    }

    #[test]
    fn material_vocabulary_and_dwv_default() {
        assert_eq!(parse("GALV NIPPLE 1/2 X 4").material, Some(Material::Galvanized));
        assert_eq!(parse("SS UNION 1").material, Some(Material::Stainless));
        assert_eq!(parse("DWV WYE 3").material, Some(Material::Pvc));
        assert_eq!(parse("CPVC DWV WYE 3").material, Some(Material::Cpvc));
        assert_eq!(parse("PIPE HANGER 3").material, None);
    }

    #[test]
    fn ell_collapses_to_elbow() {
        assert_eq!(parse("PVC 45 ELL 2").fitting_type, Some(FittingType::Elbow));
    }

    #[test]
    fn ends_follow_canonical_priority() {
        assert_eq!(
            parse("PVC ADAPTER 1 FIP X SPIGOT").ends,
            vec![EndType::Spigot, EndType::Fip]
        );
        assert_eq!(
            parse("PVC ADAPTER 1 SXMIP").ends,
            vec![EndType::Socket, EndType::Mip]
        );
        assert_eq!(
            parse("PVC 1/4 BEND 3 SPIGOT X SOCKET").ends,
            vec![EndType::Spigot, EndType::Socket]
        );
        assert_eq!(parse("COPPER TEE 1/2 CXC").ends, vec![EndType::Socket]);
        assert_eq!(parse("BRASS CAP 1/2 FNPT").ends, vec![EndType::Fip]);
    }

    #[test]
    fn parse_is_deterministic() {
        let description = "Schedule 80 CPVC Tee 3×2×1/2\" soc x fip";
        let first = parse(description);
        let second = parse(description);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn empty_description_has_no_attributes() {
        let attrs = parse("");
        assert_eq!(attrs.material, None);
        assert_eq!(attrs.fitting_type, None);
        assert!(attrs.ends.is_empty());
        assert!(attrs.sizes.is_empty());
        assert_eq!(attrs.canon, "");
    }

    #[test]
    fn serializes_with_canonical_codes() {
        let json = serde_json::to_value(parse("CPVC SCH80 TEE 2 SXS")).unwrap();
        assert_eq!(json["material"], "CPVC");
        assert_eq!(json["type"], "TEE");
        assert_eq!(json["schedule"], "SCH80");
        assert_eq!(json["ends"], serde_json::json!(["S"]));
    }
}
