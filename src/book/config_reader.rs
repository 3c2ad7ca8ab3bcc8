use log::debug;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::fs;

use crate::book::{BookResult, OpeningFileSnafu, ParsingJsonSnafu};

/// The JSON configuration file. Everything is optional; missing values fall
/// back to the defaults applied in `validate_settings`.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookConfig {
    /// What distinguishes polling places in the roster: "location" or
    /// "address". If you switch modes, delete the preprocessed snapshot or
    /// the change won't take effect.
    #[serde(rename = "pollKey")]
    pub poll_key: Option<String>,
    pub polls: Option<SourceFile>,
    pub addresses: Option<SourceFile>,
    pub boundaries: Option<BoundariesConfig>,
    pub cache: Option<CacheSettings>,
    pub fixes: Option<FixTables>,
    pub output: Option<OutputSettings>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub provider: Option<String>,
    #[serde(rename = "filePath")]
    pub file_path: String,
}

/// Precinct boundary polygons for the geometric lookup. When present, the
/// address list's ward/precinct columns are ignored and each address is
/// resolved by containment instead.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct BoundariesConfig {
    #[serde(rename = "filePath")]
    pub file_path: String,
    /// Attribute holding the ward number (default WARD).
    #[serde(rename = "wardField")]
    pub ward_field: Option<String>,
    /// Attribute holding the precinct number (default PRECINCT).
    #[serde(rename = "precinctField")]
    pub precinct_field: Option<String>,
    /// PROJ.4 string of the shapefile's coordinate system. When set, the
    /// polygons are reprojected to longitude/latitude at load time.
    #[serde(rename = "proj4")]
    pub proj4: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSettings {
    pub read: Option<bool>,
    pub write: Option<bool>,
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
}

/// Fixes to errors discovered in the published datasets which prevent the
/// pipeline from functioning properly. There are no guarantees that these
/// are the only errors in the data; they're just the ones noticed so far.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixTables {
    /// Replacement polling place names, keyed by ward/precinct.
    #[serde(rename = "locationNames", default)]
    pub location_names: Vec<WardPrecinctFix>,
    /// Replacement location detail lines, keyed by ward/precinct.
    #[serde(rename = "locationDetails", default)]
    pub location_details: Vec<WardPrecinctFix>,
    /// Replacement match addresses, keyed by ward/precinct.
    #[serde(rename = "matchAddresses", default)]
    pub match_addresses: Vec<WardPrecinctFix>,
    /// Replacement PRECINCT_WARD codes, e.g. "0502A" -> "0502".
    #[serde(rename = "precinctCodes", default)]
    pub precinct_codes: Vec<CodeFix>,
    /// Ward/precinct overrides for individual addresses.
    #[serde(rename = "addressPrecincts", default)]
    pub address_precincts: Vec<AddressFix>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct WardPrecinctFix {
    pub ward: u32,
    pub precinct: u32,
    pub value: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CodeFix {
    pub from: String,
    pub to: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AddressFix {
    pub number: u32,
    pub street: String,
    pub zip: String,
    pub ward: u32,
    pub precinct: u32,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "columnRows")]
    pub column_rows: Option<usize>,
    #[serde(rename = "doubleSided")]
    pub double_sided: Option<bool>,
    /// Repeat each sheet this many times per precinct at the polling place.
    #[serde(rename = "copiesPerPrecinct")]
    pub copies_per_precinct: Option<u32>,
    /// Repeat each sheet this many times per polling place.
    #[serde(rename = "copiesPerPollingPlace")]
    pub copies_per_polling_place: Option<u32>,
    /// Also print sheets for polling places with only one precinct.
    #[serde(rename = "printHomogeneous")]
    pub print_homogeneous: Option<bool>,
    pub format: Option<String>,
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
}

pub fn read_config(path: &Option<String>) -> BookResult<BookConfig> {
    match path {
        Some(p) => {
            let contents = fs::read_to_string(p).context(OpeningFileSnafu { path: p.clone() })?;
            let config: BookConfig =
                serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
            debug!("config: {:?}", config);
            Ok(config)
        }
        None => Ok(BookConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::FixIndex;
    use precinct_ranges::WardPrecinct;

    #[test]
    fn full_config_parses() {
        let js = r#"{
            "pollKey": "address",
            "polls": { "provider": "csv", "filePath": "polls.csv" },
            "addresses": { "filePath": "addresses.csv.bz2" },
            "boundaries": { "filePath": "precincts.shp", "proj4": "+proj=lcc +lat_1=41.71666666666667 +datum=NAD83" },
            "cache": { "read": false, "filePath": "snap.json" },
            "fixes": {
                "precinctCodes": [ { "from": "0502A", "to": "0502" } ],
                "locationDetails": [ { "ward": 15, "precinct": 5, "value": "35 WESTVILLE STREET" } ],
                "addressPrecincts": [ { "number": 60, "street": "N Crescent Cirt", "zip": "02135", "ward": 22, "precinct": 7 } ]
            },
            "output": { "columnRows": 28, "doubleSided": false, "format": "text" }
        }"#;
        let config: BookConfig = serde_json::from_str(js).unwrap();
        assert_eq!(config.poll_key.as_deref(), Some("address"));
        assert_eq!(config.polls.as_ref().unwrap().file_path, "polls.csv");
        assert_eq!(config.cache.as_ref().unwrap().read, Some(false));
        assert_eq!(config.output.as_ref().unwrap().column_rows, Some(28));

        let fixes = FixIndex::from_tables(&config.fixes);
        assert_eq!(
            fixes.precinct_codes.get("0502A").map(|s| s.as_str()),
            Some("0502")
        );
        assert_eq!(
            fixes
                .location_details
                .get(&WardPrecinct { ward: 15, precinct: 5 })
                .map(|s| s.as_str()),
            Some("35 WESTVILLE STREET")
        );
        assert_eq!(
            fixes
                .address_precincts
                .get(&(60, "N Crescent Cirt".to_string(), "02135".to_string())),
            Some(&WardPrecinct { ward: 22, precinct: 7 })
        );
    }

    #[test]
    fn empty_config_parses() {
        let config: BookConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, BookConfig::default());
    }
}
