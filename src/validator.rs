use anyhow::Result;

use crate::profile::{Profile, ProfileRepository};

/// Read-only view of the profile directory the validator checks against.
///
/// The handle check is an index-scoped scan with a post-filter; hiding it
/// behind this trait lets a dedicated handle index replace the scan later
/// without touching callers.
pub trait ProfileSource {
    fn get_profile(&self, phone_number: &str) -> Result<Option<Profile>>;
    fn list_profiles(&self) -> Result<Vec<Profile>>;
}

impl ProfileSource for ProfileRepository {
    fn get_profile(&self, phone_number: &str) -> Result<Option<Profile>> {
        self.get(phone_number)
    }

    fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.list()
    }
}

/// Advisory uniqueness checks against the profile directory.
///
/// Both checks only observe repository state; they do not prevent two
/// concurrent registrations of the same value. A caller needing a guarantee
/// must use the repository's conditional create at write time.
#[derive(Clone)]
pub struct Validator<S> {
    source: S,
}

impl<S: ProfileSource> Validator<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// `true` iff a profile exists under this phone number.
    ///
    /// Empty or missing input short-circuits to `false` without touching the
    /// store; an unset form field is not an error.
    pub fn is_phone_number_used(&self, phone_number: Option<&str>) -> Result<bool> {
        let phone_number = match phone_number {
            Some(p) if !p.is_empty() => p,
            _ => return Ok(false),
        };

        Ok(self.source.get_profile(phone_number)?.is_some())
    }

    /// `true` iff some profile's worker handle equals the input exactly
    /// (case-sensitive). Empty or missing input short-circuits to `false`.
    ///
    /// This scans the whole profile partition and filters. O(n) in the number
    /// of profiles, which is acceptable at this system's scale; the
    /// `ProfileSource` seam is where a dedicated index would slot in.
    pub fn is_handle_used(&self, handle: Option<&str>) -> Result<bool> {
        let handle = match handle {
            Some(h) if !h.is_empty() => h,
            _ => return Ok(false),
        };

        let profiles = self.source.list_profiles()?;
        Ok(profiles
            .iter()
            .any(|p| p.flex_worker_handle.as_deref() == Some(handle)))
    }
}
