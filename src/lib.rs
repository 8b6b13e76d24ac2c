//! Marketing performance brain: turns per-channel ad time series into
//! attributed performance truth, forward-looking risk signals, and ranked
//! recommended actions.
//!
//! The computation runs as three sequenced stages per organization and
//! analysis window: Memory (attribution), Oracle (risk), Curiosity
//! (recommendations). Each cycle is a pure function of its input rows;
//! persistence and scheduling live with the caller.

pub mod aggregate;
pub mod brain;
pub mod config;
pub mod curiosity;
pub mod db;
pub mod decay;
pub mod drift;
pub mod fatigue;
pub mod ltv;
pub mod memory;
pub mod models;
pub mod oracle;
pub mod report;
pub mod suggest;

pub use brain::{run_brain_cycle, BrainCycle, BrainInputs};
pub use config::BrainConfig;
pub use curiosity::CuriosityOutput;
pub use memory::MemoryOutput;
pub use models::AnalysisWindow;
pub use oracle::OracleOutput;
pub use suggest::{HttpSuggestClient, SuggestProvider};
