pub mod server;

use secrecy::SecretString;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        dsn_password: Option<SecretString>,
        frontend_url: String,
    },
}
