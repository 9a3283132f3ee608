use percent_encoding::percent_decode_str;
use reqwest::Url;

/// Bare entity id from an entity URI (`http://www.wikidata.org/entity/Q142` -> `Q142`)
pub fn uri_to_id(uri: &str) -> Option<String> {
    let id = uri.trim().trim_end_matches('/').rsplit('/').next()?;
    let id = id.rsplit(':').next()?;
    (!id.is_empty()).then(|| id.to_string())
}

/// Page identifier `{lang}:{title}` from a Wikipedia article URL
pub fn wikipedia_url_to_id(url: Option<&str>) -> Option<String> {
    let url = Url::parse(url?).ok()?;
    let lang = url.host_str()?.strip_suffix(".wikipedia.org")?;
    let title = url.path().strip_prefix("/wiki/")?;
    let title = percent_decode_str(title).decode_utf8().ok()?;
    if lang.is_empty() || title.is_empty() {
        return None;
    }
    Some(format!("{}:{}", lang, title.replace(' ', "_")))
}

/// DBpedia resource URI for a Wikipedia article URL
pub fn wikipedia_to_dbpedia(url: Option<&str>) -> Option<String> {
    let id = wikipedia_url_to_id(url)?;
    let (lang, title) = id.split_once(':')?;
    if lang == "en" {
        Some(format!("http://dbpedia.org/resource/{}", title))
    } else {
        Some(format!("http://{}.dbpedia.org/resource/{}", lang, title))
    }
}

/// Commons file name from a media URL
/// (`http://commons.wikimedia.org/wiki/Special:FilePath/Flag%20of%20France.svg` -> `Flag_of_France.svg`)
pub fn media_url_to_path(url: Option<&str>) -> Option<String> {
    let url = Url::parse(url?).ok()?;
    let name = url.path_segments()?.last()?;
    let name = percent_decode_str(name).decode_utf8().ok()?;
    let name = name.strip_prefix("File:").unwrap_or(&*name).replace(' ', "_");
    (!name.is_empty()).then_some(name)
}
