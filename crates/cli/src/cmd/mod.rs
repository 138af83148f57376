mod crt;
mod implib;
mod locate;

pub use crt::cmd_crt;
pub use implib::cmd_implib;
pub use locate::cmd_locate;
