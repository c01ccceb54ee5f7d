//! CLI commands

mod pick;
mod plan;
mod run;
mod unlock;

pub use pick::PickCommand;
pub use plan::PlanCommand;
pub use run::RunCommand;
pub use unlock::UnlockCommand;
