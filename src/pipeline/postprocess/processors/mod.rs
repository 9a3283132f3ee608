// Built-in postprocessors
pub mod add_parent;
pub mod wikidata;

pub use add_parent::AddParent;
pub use wikidata::{WikidataCountries, WikidataGroups};
