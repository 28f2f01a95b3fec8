//! URL utilities: domain-key extraction for scheduling

mod cleaner;

pub use cleaner::domain_key;
