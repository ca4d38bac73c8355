pub mod credentials;
pub mod dispatcher;
pub mod lifecycle;
pub mod query;
pub mod storage;
