/// Level identifiers, used as the prefix of every zone id
pub const COUNTRY_GROUP: &str = "country-group";
pub const COUNTRY: &str = "country";

/// Alternate key schemes stored in `Zone::keys`
pub mod keys {
    pub const ISO2: &str = "iso2";
    pub const ISO3: &str = "iso3";
    pub const UN: &str = "un";
    pub const FIPS: &str = "fips";
    pub const NUTS: &str = "nuts";
    pub const OSM: &str = "osm";
    pub const GEONAMES: &str = "geonames";
    pub const DEFAULT: &str = "default";

    /// Keys that can never change once a zone holds them
    pub const IMMUTABLE: &[&str] = &[ISO2];
}

// Natural Earth 110m admin-0 countries (lakes variant).
// There is no versioned address, this follows the latest release.
pub const NATURAL_EARTH_URL: &str = "https://raw.githubusercontent.com/nvkelso/natural-earth-vector/master/geojson/ne_110m_admin_0_countries_lakes.geojson";

/// Natural Earth stores missing values as `-99`
pub const NATURAL_EARTH_NONE: &str = "-99";

/// Property holding the stable Natural Earth polygon identifier
pub const NATURAL_EARTH_ID: &str = "NE_ID";

// Cleaner country shapes derived from https://datahub.io/core/geo-countries
pub const GEO_COUNTRIES_URL: &str = "https://github.com/apihackers/geo-countries-simplified/releases/download/2019-05-06/countries.geojson";

pub const WIKIDATA_SPARQL_ENDPOINT: &str = "https://query.wikidata.org/sparql";
pub const WIKIDATA_ENTITY_PREFIX: &str = "http://www.wikidata.org/entity/";

pub const DEFAULT_OUTPUT: &str = "output/zones.json";
pub const DEFAULT_USER_AGENT: &str = "geozones/0.1";

/// Build a zone id from its level and code
pub fn zone_id(level: &str, code: &str) -> String {
    format!("{}:{}", level, code)
}
