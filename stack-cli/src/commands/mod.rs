mod doctor;
mod down;
mod init;
mod logs;
mod ps;
mod state;
mod up;
mod wait;

pub use doctor::run_doctor;
pub use down::run_down;
pub use init::run_init;
pub use logs::run_logs;
pub use ps::run_ps;
pub use state::show_state;
pub use up::run_up;
pub use wait::run_wait;
