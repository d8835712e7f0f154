//! sitesync - mirror local directory trees to remote rsync targets
//!
//! Settings are resolved into a set of sites ([`config`]), and sync runs walk
//! those sites in order, invoking rsync for each one ([`sync`]). Runs can be
//! triggered by hand, on file change, or for a single file, and killed while
//! in flight ([`session`]).

pub mod config;
pub mod debounce;
pub mod host;
pub mod logging;
pub mod paths;
pub mod process;
pub mod registry;
pub mod session;
pub mod sync;
pub mod templating;
pub mod watch;

pub use config::{Config, ConfigError, ConfigSource, RawSettings, Site, SiteOverride};
pub use host::Host;
pub use session::{SessionState, SessionTracker};
pub use sync::{Direction, SyncOrchestrator};
pub use templating::WorkspaceContext;
