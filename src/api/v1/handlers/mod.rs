pub mod admin;
pub mod documents;
pub mod health;
pub mod me;
