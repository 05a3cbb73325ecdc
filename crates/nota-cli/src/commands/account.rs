//! Account command implementations

use std::io::{self, Write};

use anyhow::Result;
use nota_core::service::LOGIN_FAILED;
use nota_core::session::NOT_LOGGED_IN;
use nota_core::{Error, Operation, Outcome};

use super::{emit, App};

pub fn cmd_register(app: &App, username: &str, password: &str, secret: &str) -> Result<Outcome> {
    let result = app
        .service
        .register(username, password, secret)
        .and_then(|session| {
            app.save_session(&session)
                .map_err(|e| Error::InvalidData(e.to_string()))?;
            Ok(format!("Conta criada! Usuário: {}", username))
        });
    Ok(emit(Operation::Register.outcome(result)))
}

pub fn cmd_login(app: &App, username: &str, password: &str) -> Result<Outcome> {
    let result = app
        .service
        .login(username, password)
        .and_then(|session| match session {
            Some(session) => {
                app.save_session(&session)
                    .map_err(|e| Error::InvalidData(e.to_string()))?;
                Ok(format!("Login bem-sucedido! Usuário: {}", username))
            }
            None => Err(Error::Authorization(LOGIN_FAILED.to_string())),
        });
    Ok(emit(Operation::Login.outcome(result)))
}

pub fn cmd_logout(app: &App) -> Result<Outcome> {
    let session = app.session()?;
    let (anonymous, message) = app.service.logout(&session);
    app.save_session(&anonymous)?;
    Ok(emit(Outcome::Success(message)))
}

pub fn cmd_whoami(app: &App) -> Result<Outcome> {
    let session = app.session()?;
    let outcome = match session.username() {
        Some(name) => Outcome::Success(format!("Logado como {}", name)),
        None => Operation::Login.outcome(Err(Error::Authorization(NOT_LOGGED_IN.to_string()))),
    };
    Ok(emit(outcome))
}

pub fn cmd_delete_account(app: &App, yes: bool) -> Result<Outcome> {
    let session = app.session()?;

    // Confirm unless --yes
    if !yes {
        if let Some(name) = session.username() {
            print!(
                "Delete account '{}' and all of its receipts? This cannot be undone. [y/N] ",
                name
            );
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;
            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Aborted.");
                return Ok(Outcome::Success("Aborted.".to_string()));
            }
        }
    }

    let outcome = Operation::DeleteAccount.outcome(app.service.delete_account(&session));
    if outcome.is_success() {
        app.save_session(&nota_core::Session::Anonymous)?;
    }
    Ok(emit(outcome))
}
