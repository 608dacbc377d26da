pub(crate) mod config;
pub(crate) mod errors;
pub(crate) mod fs;
pub(crate) mod launch;
pub(crate) mod lock;
pub(crate) mod provision;
pub(crate) mod python;
pub(crate) mod runtime;
pub(crate) mod state;
