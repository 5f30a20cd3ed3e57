pub mod browser;
pub mod catalog_client;
pub mod puzzle;
