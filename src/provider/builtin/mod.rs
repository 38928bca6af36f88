//! Providers compiled into the library.

pub mod basic;
pub mod none;

pub use basic::{BasicOps, BasicProvider};
pub use none::NoneProvider;

use super::registry::{entry_name, ProviderEntry};

const BUILTINS: [(&str, ProviderEntry); 2] = [
    ("none", none::open as ProviderEntry),
    ("basic", basic::open as ProviderEntry),
];

/// Built-in provider whose entry name is `entry`.
pub fn lookup(entry: &str) -> Option<ProviderEntry> {
    BUILTINS
        .iter()
        .find(|(type_name, _)| entry_name(type_name) == entry)
        .map(|(_, open)| *open)
}

/// Type names of every built-in provider
pub fn names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|(type_name, _)| *type_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_entry_name() {
        assert!(lookup("_mixkit_mixer_basic_open").is_some());
        assert!(lookup("_mixkit_mixer_none_open").is_some());
        assert!(lookup("basic").is_none());
        assert_eq!(names().collect::<Vec<_>>(), vec!["none", "basic"]);
    }
}
