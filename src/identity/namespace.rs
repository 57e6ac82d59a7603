//! Namespace existence tracking. A namespace has no attributes beyond
//! its name (spec §3): it exists purely as a `namespace:<name>` marker
//! key plus membership in the `namespaces` system list.

pub const NAMESPACE_KEY_PREFIX: &str = "namespace:";
pub const NAMESPACES_LIST_KEY: &str = "namespaces";

pub fn namespace_key(name: &str) -> String {
    format!("{NAMESPACE_KEY_PREFIX}{name}")
}
