//! A guided tour of the session layer: open sessions, log in, watch
//! the login spread to every session, and close everything to trigger
//! the implicit logout.
//!
//! Run with `RUST_LOG=debug` to see the table's own log lines between
//! the printed checkpoints.

use keyfort_token::{Token, TokenConfig};
use keyfort_types::{SessionMode, UserType};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("info")
                }),
        )
        .init();

    let token = Token::new(TokenConfig {
        label: "demo".into(),
        max_sessions: 8,
    });

    // Two callers connect: one read-write, one read-only.
    let main_session = token.open_session(SessionMode::ReadWrite)?;
    let reader = token.open_session(SessionMode::ReadOnly)?;
    println!("opened {main_session} and {reader}: {}", token.session_counts());

    // The read-write caller authenticates; the read-only session
    // observes the login without doing anything itself.
    token.login(main_session, UserType::User)?;
    println!(
        "after login, reader state: {:?}",
        token.session_info(reader)?.state
    );

    // A session opened mid-login starts logged in.
    let late = token.open_session(SessionMode::ReadOnly)?;
    println!(
        "late session starts at: {:?}",
        token.session_info(late)?.state
    );

    // Closing the session that logged in does not end the login while
    // other sessions remain.
    token.close_session(main_session)?;
    println!(
        "login session closed, still logged in: {}",
        token.is_logged_in()
    );

    // Closing the last session logs the token out implicitly.
    token.close_session(reader)?;
    token.close_session(late)?;
    println!(
        "all sessions closed, logged in: {} ({})",
        token.is_logged_in(),
        token.session_counts()
    );

    Ok(())
}
