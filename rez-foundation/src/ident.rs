//! Case-insensitive identifier keys.
//!
//! Rez macro names, enum constants, symbols, and array names all compare
//! case-insensitively. Rather than folding strings at every call site, maps
//! keyed by a user-written name wrap the key in [`CaseInsensitive`], which
//! hashes and compares through one canonical Unicode fold.

use std::{
    borrow::Borrow,
    fmt,
    hash::{Hash, Hasher},
    ops::Deref,
};

use ref_cast::RefCast;

/// Folds an identifier to its canonical lower-case form.
///
/// This is the single fold operation used everywhere a name becomes a key.
pub fn fold(name: &str) -> String {
    name.chars().flat_map(char::to_lowercase).collect()
}

fn folded_chars(name: &str) -> impl Iterator<Item = char> + '_ {
    name.chars().flat_map(char::to_lowercase)
}

/// String wrapper that compares and hashes case-insensitively.
#[derive(Clone, Copy, RefCast)]
#[repr(transparent)]
pub struct CaseInsensitive<S: ?Sized>(S);

impl<S> CaseInsensitive<S> {
    pub fn new(inner: S) -> Self {
        Self(inner)
    }

    pub fn into_inner(self) -> S {
        self.0
    }
}

impl CaseInsensitive<str> {
    pub fn new_ref(s: &str) -> &Self {
        CaseInsensitive::ref_cast(s)
    }
}

impl<S> fmt::Debug for CaseInsensitive<S>
where
    S: ?Sized + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl<S> fmt::Display for CaseInsensitive<S>
where
    S: ?Sized + fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl<S> PartialEq for CaseInsensitive<S>
where
    S: ?Sized + AsRef<str>,
{
    fn eq(&self, other: &Self) -> bool {
        folded_chars(self.0.as_ref()).eq(folded_chars(other.0.as_ref()))
    }
}

impl<S> Eq for CaseInsensitive<S> where S: ?Sized + AsRef<str> {}

impl<S> Hash for CaseInsensitive<S>
where
    S: ?Sized + AsRef<str>,
{
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        folded_chars(self.0.as_ref()).for_each(|c| c.hash(state))
    }
}

impl Borrow<CaseInsensitive<str>> for CaseInsensitive<String> {
    fn borrow(&self) -> &CaseInsensitive<str> {
        CaseInsensitive::ref_cast(&self.0)
    }
}

impl AsRef<str> for CaseInsensitive<String> {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl AsRef<str> for CaseInsensitive<str> {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<T> Deref for CaseInsensitive<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn mixed_case_lookup() {
        let mut macros = HashMap::new();
        macros.insert(CaseInsensitive::new(String::from("kMenuID")), 128);
        assert_eq!(
            macros.get(CaseInsensitive::new_ref("KMENUID")).copied(),
            Some(128)
        );
        assert_eq!(
            macros.get(CaseInsensitive::new_ref("kmenuid")).copied(),
            Some(128)
        );
        assert_eq!(macros.get(CaseInsensitive::new_ref("kMenu")), None);
    }

    #[test]
    fn fold_is_unicode_aware() {
        assert_eq!(fold("Straße"), "straße");
        assert_eq!(
            CaseInsensitive::new_ref("ÉCRAN"),
            CaseInsensitive::new_ref("écran")
        );
    }
}
