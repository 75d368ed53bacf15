//! Coordinate reference system identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// EPSG code every upload is reprojected to (MAGNA-SIRGAS).
pub const TARGET_EPSG: u32 = 4686;

/// WKT1 definition of [`TARGET_EPSG`], written as the output `.prj`.
pub const TARGET_WKT: &str = concat!(
    r#"GEOGCS["MAGNA-SIRGAS",DATUM["Marco_Geocentrico_Nacional_de_Referencia","#,
    r#"SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]],"#,
    r#"TOWGS84[0,0,0,0,0,0,0],AUTHORITY["EPSG","6686"]],"#,
    r#"PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],"#,
    r#"UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],"#,
    r#"AUTHORITY["EPSG","4686"]]"#
);

const KNOWN_EPSG: &[(u32, &str)] = &[
    (4326, "WGS 84"),
    (3857, "WGS 84 / Pseudo-Mercator"),
    (4686, "MAGNA-SIRGAS"),
    (3116, "MAGNA-SIRGAS / Colombia Bogota zone"),
    (9377, "MAGNA-SIRGAS / Origen-Nacional"),
];

const ESRI_NAMES: &[(&str, u32)] = &[
    ("GCS_WGS_1984", 4326),
    ("WGS_1984_Web_Mercator_Auxiliary_Sphere", 3857),
    ("GCS_MAGNA", 4686),
    ("MAGNA_Colombia_Bogota", 3116),
];

/// Coordinate Reference System, identified by EPSG code when one is known
/// and by its raw definition (WKT) otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crs {
    pub code: Option<u32>,
    pub name: String,
    definition: String,
}

impl Crs {
    /// CRS for an EPSG code, named from the built-in table when possible
    pub fn epsg(code: u32) -> Self {
        let name = KNOWN_EPSG
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, name)| name.to_string())
            .unwrap_or_else(|| format!("EPSG:{}", code));

        Self {
            code: Some(code),
            name,
            definition: format!("EPSG:{}", code),
        }
    }

    /// WGS 84 (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::epsg(4326)
    }

    /// The system-wide target CRS
    pub fn target() -> Self {
        Self::epsg(TARGET_EPSG)
    }

    /// Build a CRS from a WKT definition such as the content of a `.prj` file.
    pub fn from_wkt(wkt: &str) -> Self {
        let wkt = wkt.trim();
        let name = wkt_name(wkt).unwrap_or_else(|| "unnamed".to_string());

        let code = parse_epsg_from_wkt(wkt).or_else(|| {
            ESRI_NAMES
                .iter()
                .find(|(esri, _)| name.eq_ignore_ascii_case(esri))
                .map(|(_, code)| *code)
        });

        match code {
            Some(code) => {
                let mut crs = Self::epsg(code);
                if crs.name.starts_with("EPSG:") {
                    crs.name = name;
                }
                crs
            }
            None => Self {
                code: None,
                name,
                definition: wkt.to_string(),
            },
        }
    }

    /// Parse `EPSG:4326`, `urn:ogc:def:crs:EPSG::4326` or a bare code.
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        let identifier = identifier.trim();
        if identifier.ends_with("CRS84") {
            return Some(Self::wgs84());
        }
        identifier
            .rsplit(':')
            .next()
            .and_then(|code| code.parse::<u32>().ok())
            .map(Self::epsg)
    }

    /// Identifier used when reporting and when handing the CRS to PROJ
    pub fn identifier(&self) -> String {
        match self.code {
            Some(code) => format!("EPSG:{}", code),
            None => self.definition.clone(),
        }
    }

    /// Definition string PROJ understands (`EPSG:x` or WKT)
    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Whether both systems are the same EPSG code
    pub fn same_as(&self, other: &Crs) -> bool {
        match (self.code, other.code) {
            (Some(a), Some(b)) => a == b,
            _ => self.definition == other.definition,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "EPSG:{} - {}", code, self.name),
            None => write!(f, "{} (custom WKT)", self.name),
        }
    }
}

/// Extract the EPSG code of the outermost object of a WKT string.
///
/// Only an `AUTHORITY` (or WKT2 `ID`) directly inside the outermost brackets
/// counts; nested ones belong to the base CRS, datum, spheroid or unit.
/// Plain identifiers such as `EPSG:4326` are accepted as well.
pub fn parse_epsg_from_wkt(wkt: &str) -> Option<u32> {
    if !wkt.contains('[') {
        return Crs::from_identifier(wkt).and_then(|crs| crs.code);
    }

    let mut depth = 0usize;
    let mut in_quotes = false;

    for (i, c) in wkt.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '[' | '(' if !in_quotes => {
                if depth == 1 {
                    let keyword = trailing_keyword(&wkt[..i]);
                    if keyword.eq_ignore_ascii_case("AUTHORITY") || keyword.eq_ignore_ascii_case("ID") {
                        if let Some(code) = epsg_authority_code(&wkt[i + 1..]) {
                            return Some(code);
                        }
                    }
                }
                depth += 1;
            }
            ']' | ')' if !in_quotes => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    None
}

fn trailing_keyword(prefix: &str) -> &str {
    let prefix = prefix.trim_end();
    let start = prefix
        .rfind(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .map(|i| i + 1)
        .unwrap_or(0);
    &prefix[start..]
}

/// `"EPSG","4326"]` or `"EPSG",4326]`
fn epsg_authority_code(args: &str) -> Option<u32> {
    let (authority, code) = args.split_once(',')?;
    if !authority.trim().trim_matches('"').eq_ignore_ascii_case("EPSG") {
        return None;
    }
    let digits: String = code
        .trim_start()
        .trim_start_matches('"')
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn wkt_name(wkt: &str) -> Option<String> {
    let start = wkt.find('"')? + 1;
    let end = wkt[start..].find('"')? + start;
    Some(wkt[start..end].to_string())
}
