pub mod motion;
pub mod persist;
pub mod power;
pub mod reset;
pub mod serial;
pub mod simulate;
pub mod ui;
