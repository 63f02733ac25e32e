//! Kubernetes controllers for the Database Backup Operator
//!
//! Controllers wire the watch/queue runtime to the reconciliation engine;
//! the engine itself lives in `reconcilers`.

mod backup_controller;

pub use backup_controller::run as run_backup_controller;
