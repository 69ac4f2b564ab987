mod server;

pub mod routes;
pub mod state;

pub use server::start_server;
pub use state::AppState;
