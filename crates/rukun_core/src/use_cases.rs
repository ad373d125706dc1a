mod client;
mod credential_store;
mod dispatch;
mod files;
mod refresh;
mod session;
#[cfg(test)]
mod testing;

pub use client::ApiClient;
pub use credential_store::{CredentialStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
pub use dispatch::RequestDispatcher;
pub use files::FileService;
pub use refresh::RefreshCoordinator;
pub use session::SessionController;
