// Mapping between engine values and store documents.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;
use crate::store::Document;

pub const PLAYERS: &str = "players";
pub const MATCHES: &str = "matches";

pub fn encode<T: Serialize>(collection: &str, id: &str, value: &T) -> Result<Document, StoreError> {
    serde_json::to_value(value).map_err(|err| corrupt(collection, id, err))
}

pub fn decode<T: DeserializeOwned>(collection: &str, id: &str, doc: &Document) -> Result<T, StoreError> {
    T::deserialize(doc).map_err(|err| corrupt(collection, id, err))
}

fn corrupt(collection: &str, id: &str, err: serde_json::Error) -> StoreError {
    StoreError::Corrupt { collection: collection.to_string(), id: id.to_string(), reason: err.to_string() }
}
