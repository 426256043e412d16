mod extract;
mod server;

pub use extract::{AuthUser, JsonBody, USER_HEADER};
pub use server::{HttpServer, HttpServerConfig};
