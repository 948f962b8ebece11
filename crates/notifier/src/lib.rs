pub mod dispatcher;
pub mod fcm;
pub mod redis_queue;
pub mod tokens;
pub mod transport;
pub mod worker;
