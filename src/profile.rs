use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::store::{DocumentStore, Record};

/// Sort key shared by every profile document.
const PROFILE_SORT_KEY: &str = "profile";
/// Secondary-index partition holding all profiles, keyed by phone number.
const PROFILE_INDEX_PARTITION: &str = "profile";

/// A call-translation profile, keyed by phone number.
///
/// The callee side describes the party being called; the source side
/// describes the caller. Each side carries a language triple (code plus two
/// display names), a transcription provider, a TTS provider, and a voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub phone_number: String,
    pub name: String,
    pub callee_details: bool,
    pub callee_number: String,
    pub callee_language: String,
    pub callee_language_code: String,
    pub callee_language_friendly: String,
    pub callee_transcription_provider: String,
    pub callee_tts_provider: String,
    pub callee_voice: String,
    pub source_language: String,
    pub source_language_code: String,
    pub source_language_friendly: String,
    pub source_transcription_provider: String,
    pub source_tts_provider: String,
    pub source_voice: String,
    /// Handle of the human call-routing destination, expected unique across
    /// profiles. Uniqueness is advisory only (see the validator).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flex_worker_handle: Option<String>,
}

/// CRUD over profile documents.
///
/// This type exclusively owns the mapping between `Profile` and the store's
/// record shape; nothing else constructs profile records directly.
#[derive(Clone)]
pub struct ProfileRepository {
    store: DocumentStore,
}

impl ProfileRepository {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Map a profile to its storage shape. The phone number lives in the
    /// primary and index keys, not in the attribute document.
    fn to_record(profile: &Profile) -> Result<Record> {
        let mut attrs =
            serde_json::to_value(profile).context("Failed to serialize profile")?;
        attrs
            .as_object_mut()
            .context("Profile did not serialize to an object")?
            .remove("phoneNumber");

        Ok(Record {
            pk: profile.phone_number.clone(),
            sk: PROFILE_SORT_KEY.to_string(),
            pk1: Some(PROFILE_INDEX_PARTITION.to_string()),
            sk1: Some(profile.phone_number.clone()),
            attrs,
        })
    }

    /// Map a storage record back to a profile, restoring the phone number
    /// from the primary key.
    fn from_record(record: Record) -> Result<Profile> {
        let mut attrs = record.attrs;
        attrs
            .as_object_mut()
            .context("Profile record attributes are not an object")?
            .insert("phoneNumber".to_string(), record.pk.into());

        serde_json::from_value(attrs).context("Failed to deserialize profile record")
    }

    /// Get a profile by phone number. Absence is not an error.
    pub fn get(&self, phone_number: &str) -> Result<Option<Profile>> {
        self.store
            .get(phone_number, PROFILE_SORT_KEY)?
            .map(Self::from_record)
            .transpose()
    }

    /// Create or fully overwrite a profile. No uniqueness guarantee: a
    /// concurrent writer to the same phone number wins by last write.
    pub fn put(&self, profile: &Profile) -> Result<()> {
        self.store.put(&Self::to_record(profile)?)
    }

    /// Conditional create: returns `false` without writing when a profile
    /// already exists under this phone number.
    pub fn create(&self, profile: &Profile) -> Result<bool> {
        self.store.put_if_absent(&Self::to_record(profile)?)
    }

    /// Delete a profile. Returns `true` iff one existed.
    pub fn delete(&self, phone_number: &str) -> Result<bool> {
        self.store.delete(phone_number, PROFILE_SORT_KEY)
    }

    /// List all profiles via the secondary index, ordered by phone number.
    pub fn list(&self) -> Result<Vec<Profile>> {
        self.store
            .query_index(PROFILE_INDEX_PARTITION)?
            .into_iter()
            .map(Self::from_record)
            .collect()
    }
}
