pub mod domain;
pub mod editor;
pub mod guards;
pub mod mock_data;
pub mod persistence;
pub mod ports;
pub mod session;
pub mod store;

pub use domain::{
    Dataset, DirectoryUser, Document, DocumentStatus, IdentityClaims, NewDirectoryUser, Page,
    PagePayload, Role, User, ValidationRule, Version,
};
pub use editor::{EditorError, PageDraft, PagePermissions, ReviewDecision, ReviewVerdict, RuleField};
pub use guards::{evaluate, login_redirect, AdminGuard, AuthGuard, GuardContext, GuardDecision, Route};
pub use persistence::{MemoryKeyValueStore, SessionStorage};
pub use ports::{
    DocumentCatalog, IdentityProvider, KeyValueStore, PortError, PortResult, StorageError,
    UserDirectory,
};
pub use session::{BootstrapOutcome, SessionBootstrap, SessionEvent, SessionPhase};
pub use store::{AppStore, Breadcrumb, SelectionIssue, SnapshotError};
