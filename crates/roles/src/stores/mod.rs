//! Claims and profile store interfaces with in-memory implementations.

mod claims;
mod profile;

pub use claims::{ClaimsStore, InMemoryClaimsStore};
pub use profile::{InMemoryProfileStore, ProfileStore};
