pub mod configuration;
pub mod credentials;
pub mod file_store;
pub mod memory;
pub mod navigation;
pub mod network;
pub mod storage;
pub mod telemetry;
pub mod transport;

// Re-exports for convenience
pub use credentials::KeyringKeyValueStore;
pub use file_store::FileKeyValueStore;
pub use memory::MemoryKeyValueStore;
pub use navigation::LoggingNavigator;
pub use storage::SessionStorage;
pub use transport::ReqwestTransport;
