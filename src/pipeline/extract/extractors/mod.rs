// Source-specific extractors
pub mod geo_countries;
pub mod natural_earth;

pub use geo_countries::GeoCountriesExtractor;
pub use natural_earth::NaturalEarthExtractor;
