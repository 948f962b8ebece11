pub mod comments;
pub mod cursor;
pub mod deeplink;
pub mod events;
pub mod pipeline;
pub mod recipients;
pub mod records;
pub mod store;
pub mod threshold;

#[cfg(test)]
pub(crate) mod testing;
