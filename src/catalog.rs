//! The dataset definition: which sources feed which level, which groups
//! exist and which enrichment passes run.

use std::sync::Arc;

use crate::config::Config;
use crate::constants::{self, keys};
use crate::pipeline::aggregate::{Aggregate, MemberPattern};
use crate::pipeline::extract::extractors::{GeoCountriesExtractor, NaturalEarthExtractor};
use crate::pipeline::postprocess::processors::{AddParent, WikidataCountries, WikidataGroups};
use crate::pipeline::source::SourceSpec;
use crate::pipeline::Registries;
use crate::wiki::KnowledgeGraphClient;

/// European Union member countries, by ISO alpha-2 code
pub const EU_COUNTRIES: &[&str] = &[
    "at", "be", "bg", "cy", "hr", "dk", "ee", "fi", "gr", "fr", "es", "de", "hu", "ie", "it", "lv", "lt", "lu", "mt",
    "nl", "no", "pl", "pt", "cz", "ro", "gb", "sk", "si", "se",
];

pub fn world() -> Aggregate {
    Aggregate::new("world", "World", vec![MemberPattern::level(constants::COUNTRY)])
        .with_key(keys::DEFAULT, "world")
        .with_wikidata("Q2")
}

pub fn european_union() -> Aggregate {
    let members = EU_COUNTRIES
        .iter()
        .map(|code| MemberPattern::zone(constants::COUNTRY, code))
        .collect();
    Aggregate::new("ue", "European Union", members)
        .with_parent(&constants::zone_id(constants::COUNTRY_GROUP, "world"))
        .with_key(keys::DEFAULT, "ue")
        .with_wikipedia("en:European_Union")
        .with_wikidata("Q458")
}

/// Build every registration. Wikidata passes are only registered with a client.
pub fn default_registries(config: &Config, knowledge_graph: Option<Arc<dyn KnowledgeGraphClient>>) -> Registries {
    let mut registries = Registries::default();

    registries.extractors.register(
        constants::COUNTRY,
        SourceSpec::new(config.sources.natural_earth.clone()),
        Box::new(NaturalEarthExtractor::new()),
    );
    registries.extractors.register(
        constants::COUNTRY,
        SourceSpec::new(config.sources.geo_countries.clone()),
        Box::new(GeoCountriesExtractor::new()),
    );

    registries.aggregates.register(world());
    registries.aggregates.register(european_union());

    registries.postprocessors.register(
        constants::COUNTRY,
        Box::new(AddParent::new(
            "Add European Union to countries parents",
            constants::COUNTRY,
            EU_COUNTRIES.iter().copied(),
            &constants::zone_id(constants::COUNTRY_GROUP, "ue"),
        )),
    );

    if let Some(client) = knowledge_graph {
        registries
            .postprocessors
            .register(constants::COUNTRY_GROUP, Box::new(WikidataGroups::new(client.clone())));
        registries
            .postprocessors
            .register(constants::COUNTRY, Box::new(WikidataCountries::new(client)));
    }

    registries
}
