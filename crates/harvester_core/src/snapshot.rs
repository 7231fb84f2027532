use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::job::normalize_url_for_dedupe;
use crate::{PlaceId, PlaceRecord};

/// Serializable copy of the shared session state, exchanged between the
/// orchestrator and the panel. Maps travel as key/value pair lists.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSnapshot {
    pub collected_urls: Vec<String>,
    pub processed_data: Vec<(PlaceId, PlaceRecord)>,
    pub url_to_place_id: Vec<(String, PlaceId)>,
    pub is_processing: bool,
    pub current_url: Option<String>,
}

impl SessionSnapshot {
    pub fn record_for_url(&self, url: &str) -> Option<&PlaceRecord> {
        let place_id = self
            .url_to_place_id
            .iter()
            .find(|(mapped, _)| mapped == url)
            .map(|(_, id)| id)?;
        self.processed_data
            .iter()
            .find(|(id, _)| id == place_id)
            .map(|(_, record)| record)
    }
}

/// Merge an incoming snapshot into a local one.
///
/// Collected URLs are unioned (local order first). Results and URL mappings
/// are unioned with the incoming side winning on key conflicts, so neither
/// map can shrink. The processing flag and current URL are last-writer-wins.
pub fn merge(local: &SessionSnapshot, incoming: &SessionSnapshot) -> SessionSnapshot {
    let mut seen: BTreeSet<String> = local
        .collected_urls
        .iter()
        .map(|url| normalize_url_for_dedupe(url))
        .collect();
    let mut collected_urls = local.collected_urls.clone();
    for url in &incoming.collected_urls {
        if seen.insert(normalize_url_for_dedupe(url)) {
            collected_urls.push(url.clone());
        }
    }

    SessionSnapshot {
        collected_urls,
        processed_data: union_pairs(&local.processed_data, &incoming.processed_data),
        url_to_place_id: union_pairs(&local.url_to_place_id, &incoming.url_to_place_id),
        is_processing: incoming.is_processing,
        current_url: incoming.current_url.clone(),
    }
}

fn union_pairs<V: Clone>(local: &[(String, V)], incoming: &[(String, V)]) -> Vec<(String, V)> {
    let mut merged: BTreeMap<String, V> = local.iter().cloned().collect();
    for (key, value) in incoming {
        merged.insert(key.clone(), value.clone());
    }
    merged.into_iter().collect()
}
