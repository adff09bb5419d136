pub mod events;
pub mod ontology;
pub mod question;
pub mod sessions;
