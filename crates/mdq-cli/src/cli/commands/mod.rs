mod add;
mod clear;
mod fetch;
mod pause;
mod remove;
mod resume;
mod run;
mod status;

pub use add::run_add;
pub use clear::run_clear;
pub use fetch::run_fetch;
pub use pause::run_pause;
pub use remove::run_remove;
pub use resume::run_resume;
pub use run::run_queue;
pub use status::run_status;
