//! Hash collections used throughout the crate.
//!
//! Keys are small ids and short strings, so the non-cryptographic FxHash is a
//! better fit than the std default hasher.

pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<T> = rustc_hash::FxHashSet<T>;
