//! Lantern LSP
//!
//! The language-server client core: framed JSON-RPC transport, request
//! multiplexing, subprocess lifecycle, per-server readiness tracking, and
//! the symbol/reference query API used by code-editing agents.

pub mod adapters;
pub mod launch;
pub mod process;
pub mod queries;
pub mod readiness;
pub mod registry;
pub mod rpc;
pub mod server;
pub mod symbols;
pub mod testing;
pub mod transport;
pub mod uri;

pub use adapters::{adapter_for, adapter_for_extension, LanguageAdapter, ReadinessSignal};
pub use launch::{DependencyProvider, LaunchDescriptor, Platform};
pub use queries::WorkspaceSymbolHit;
pub use readiness::{ReadinessCoordinator, ServerState};
pub use registry::ServerRegistry;
pub use rpc::RpcClient;
pub use server::LspServer;
pub use symbols::{FileLocation, SymbolInfo, SymbolSummary, SymbolTreeNode};
