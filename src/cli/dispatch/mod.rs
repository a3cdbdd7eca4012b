use crate::cli::actions::Action;
use anyhow::Result;
use secrecy::SecretString;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches
            .get_one("dsn")
            .map(|s: &String| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --dsn"))?,
        dsn_password: matches
            .get_one("dsn-password")
            .map(|s: &String| SecretString::from(s.to_string())),
        frontend_url: matches
            .get_one("frontend-url")
            .map(|s: &String| s.to_string())
            .unwrap_or_else(|| "http://localhost:3000".to_string()),
    })
}
