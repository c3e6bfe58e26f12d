mod database;
mod fixture;

pub use database::TestDatabase;
pub use fixture::{unit_path, FixtureTree};
