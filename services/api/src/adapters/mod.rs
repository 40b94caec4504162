pub mod directory;
pub mod file_store;
pub mod mock_catalog;
pub mod okta;

pub use directory::HttpUserDirectory;
pub use file_store::FileKeyValueStore;
pub use mock_catalog::MockCatalog;
pub use okta::OktaIdentityAdapter;
