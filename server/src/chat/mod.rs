pub mod history;
pub mod message;
pub mod presence;
pub mod router;
pub mod store;
