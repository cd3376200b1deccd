//! Sign-in commands backed by the demo identity provider.

use std::error::Error;
use std::io::{self, Write};

use crate::auth::{
    AuthSession, DemoIdentityProvider, LoginCredentials, SignupCredentials,
    DEMO_EMAIL, DEMO_PASSWORD,
};
use crate::utils::time::format_local_date;

fn prompt(label: &str) -> io::Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

pub async fn run_login(
    session: &mut AuthSession,
    email: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let provider = DemoIdentityProvider::new();
    println!("Demo account: {DEMO_EMAIL} / {DEMO_PASSWORD}");
    let email = match email {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = prompt("Password: ")?;
    let user = session
        .login(&provider, &LoginCredentials { email, password })
        .await?;
    println!("✅ Signed in as {} <{}>", user.name, user.email);
    Ok(())
}

pub async fn run_signup(session: &mut AuthSession) -> Result<(), Box<dyn Error>> {
    let provider = DemoIdentityProvider::new();
    let credentials = SignupCredentials {
        name: prompt("Name: ")?,
        email: prompt("Email: ")?,
        password: prompt("Password: ")?,
        confirm_password: prompt("Confirm password: ")?,
    };
    let user = session.signup(&provider, &credentials).await?;
    println!("✅ Account created. Signed in as {} <{}>", user.name, user.email);
    Ok(())
}

pub fn run_logout(session: &mut AuthSession) {
    if session.is_authenticated() {
        session.logout();
        println!("✅ Signed out");
    } else {
        println!("Not signed in.");
    }
}

pub fn describe_session(session: &AuthSession) -> String {
    match session.current_user() {
        Some(user) if session.is_authenticated() => format!(
            "{} <{}> (member since {})",
            user.name,
            user.email,
            format_local_date(&user.created_at)
        ),
        _ => "Not signed in.".to_string(),
    }
}
