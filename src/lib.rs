pub mod audit;
pub mod compactor;
pub mod config;
pub mod console;
pub mod directory;
pub mod engine;
pub mod ledger;
pub mod limits;
pub mod menu;
pub mod model;
pub mod observability;
pub mod scheduler;
pub mod wal;
