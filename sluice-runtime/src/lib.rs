//! Sluice Runtime
//!
//! Assembles everything a job run needs at execution time:
//! - Run registrar: binds the window and destination of an instance and persists it
//! - Context manager: composes project, instance, task and hook layers into env and files
//! - Instance data writer: lays the result out on disk for the task container
//! - Asset dumper: renders assets for preview without registering a run

pub mod config;
pub mod context;
pub mod destination;
pub mod dumper;
pub mod error;
pub mod keys;
pub mod registrar;
pub mod store;
pub mod writer;

pub use config::Config;
pub use context::{ContextManager, EnvMap, RunContext};
pub use destination::{
    DatasetDestinationResolver, Destination, DestinationResolver, DestinationResolvers,
    StaticDestinationResolver, TableDestinationResolver,
};
pub use dumper::dump_assets;
pub use error::{Layer, Result, RuntimeError};
pub use registrar::{Clock, FixedClock, RunRegistrar, SystemClock};
pub use store::{InMemoryInstanceStore, InstanceStore, StoreError};
pub use writer::{DumpReport, InstanceDataWriter, safe_relative};
