pub mod documents;
pub mod index;
pub mod record;
pub mod save;
pub mod search;
