//! Name-keyed, insertion-ordered collection of SDKs

use crate::sdk::Sdk;
use indexmap::IndexMap;
use std::fmt;

/// The SDKs registered in one namespace, plus the name of the default one.
///
/// Membership is keyed by name: [`SdkSet::add`] replaces an entry with the
/// same name, and [`SdkSet::remove`] removes by name. Value membership
/// (name *and* install path) is only answered by [`SdkSet::contains_value`].
#[derive(Debug, Clone, Default)]
pub struct SdkSet {
    sdks: IndexMap<String, Sdk>,
    default_name: Option<String>,
}

impl SdkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `sdk`, replacing any entry with the same name in place.
    /// Returns `true` if no entry with that name existed before.
    pub fn add(&mut self, sdk: Sdk) -> bool {
        self.sdks.insert(sdk.name().to_string(), sdk).is_none()
    }

    /// Remove the entry sharing `sdk`'s name.
    pub fn remove(&mut self, sdk: &Sdk) -> Option<Sdk> {
        self.remove_name(sdk.name())
    }

    pub fn remove_name(&mut self, name: &str) -> Option<Sdk> {
        self.sdks.shift_remove(name)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.sdks.contains_key(name)
    }

    pub fn contains_value(&self, sdk: &Sdk) -> bool {
        self.sdks.get(sdk.name()).is_some_and(|member| member == sdk)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Sdk> {
        self.sdks.get(name)
    }

    /// The designated default, or the first entry if the designation is
    /// unset or stale. `None` only for an empty set.
    pub fn default_sdk(&self) -> Option<&Sdk> {
        self.default_name
            .as_deref()
            .and_then(|name| self.sdks.get(name))
            .or_else(|| self.sdks.values().next())
    }

    /// Designate `sdk` as the default.
    ///
    /// # Panics
    ///
    /// Panics if no entry named like `sdk` is a member of the set.
    pub fn set_default(&mut self, sdk: &Sdk) {
        assert!(
            self.contains_name(sdk.name()),
            "cannot make '{}' the default: not a member of the set",
            sdk.name()
        );
        self.default_name = Some(sdk.name().to_string());
    }

    /// The recorded default name, which may not match any member.
    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.sdks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sdks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sdk> {
        self.sdks.values()
    }
}

/// Same members by value, in the same order, with the same effective default.
impl PartialEq for SdkSet {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter()) && self.default_sdk() == other.default_sdk()
    }
}

impl Eq for SdkSet {}

impl<'a> IntoIterator for &'a SdkSet {
    type Item = &'a Sdk;
    type IntoIter = indexmap::map::Values<'a, String, Sdk>;

    fn into_iter(self) -> Self::IntoIter {
        self.sdks.values()
    }
}

impl FromIterator<Sdk> for SdkSet {
    fn from_iter<I: IntoIterator<Item = Sdk>>(iter: I) -> Self {
        let mut set = SdkSet::new();
        for sdk in iter {
            set.add(sdk);
        }
        set
    }
}

/// `[A@/kits/a*, B@/kits/b]`, the effective default marked with `*`.
impl fmt::Display for SdkSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let default = self.default_sdk().map(Sdk::name);
        f.write_str("[")?;
        for (i, sdk) in self.sdks.values().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", sdk)?;
            if Some(sdk.name()) == default {
                f.write_str("*")?;
            }
        }
        f.write_str("]")
    }
}
