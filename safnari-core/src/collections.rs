//! Fast, non-cryptographic hash map/set aliases used throughout the scanner.

use rustc_hash::FxHashMap as InnerMap;
use rustc_hash::FxHashSet as InnerSet;

pub type FxHashMap<K, V> = InnerMap<K, V>;
pub type FxHashSet<T> = InnerSet<T>;
