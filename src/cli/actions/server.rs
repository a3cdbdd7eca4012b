use crate::{api, cli::actions::Action};
use anyhow::{anyhow, Result};
use secrecy::ExposeSecret;
use url::Url;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            dsn_password,
            frontend_url,
        } => {
            let mut dsn = Url::parse(&dsn)?;

            // An explicitly supplied password wins over whatever the DSN carries
            if let Some(password) = dsn_password {
                dsn.set_password(Some(password.expose_secret()))
                    .map_err(|()| anyhow!("Error setting password"))?;
            }

            api::new(port, dsn.to_string(), &frontend_url).await?;
        }
    }

    Ok(())
}
