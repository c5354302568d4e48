//! Command handlers for the CLI
//!
//! Each handler loads what it needs, performs one command and reports
//! through the [`OutputFormatter`](crate::cli::OutputFormatter).

mod config;
mod simulate;
mod tickets;
mod transcript;

pub use config::{handle_config_check, handle_config_path, handle_config_show};
pub use simulate::{
    ScriptMember, SimulationReport, SimulationScript, StepReport, handle_simulate, run_simulation,
};
pub use tickets::{
    TicketRow, handle_tickets_list, handle_tickets_next_number, handle_tickets_reconcile,
    handle_tickets_show,
};
pub use transcript::handle_transcript_render;
