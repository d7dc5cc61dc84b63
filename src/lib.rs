//! hapm - package manager for Home Assistant custom integrations and
//! Lovelace plugins hosted on a git forge.
//!
//! The crate is the reconciliation core. The desired package list, the forge
//! transport and result reporting are supplied by the caller: the desired list
//! as [`PackageDescription`]s, the transport as a [`Provider`].

pub mod archive;
pub mod config;
pub mod error;
pub mod manager;
pub mod package;
pub mod provider;
pub mod runtime;

pub use config::ManagerConfig;
pub use error::{ApplyError, ConfigurationError, InvalidVersionError, RetrievalError};
pub use manager::{ExportReport, Operation, PackageDiff, PackageManager};
pub use package::{PackageDescription, Registry, Version};
pub use provider::Provider;
pub use runtime::{RealRuntime, Runtime};
