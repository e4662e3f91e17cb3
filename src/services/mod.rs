pub mod conflicts;
pub mod encoding;
pub mod freshness;
pub mod locate;
pub mod lookup;
pub mod merge;
pub mod search;
pub mod validate;
