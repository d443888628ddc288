//! Portcullis Hash - produce a value for AUTH_PROXY_PASSWORD_HASH
//!
//! Usage:
//!   echo -n 'hunter2' | portcullis-hash
//!   portcullis-hash --password 'hunter2' --bcrypt --cost 12
//!
//! Reads the password from `--password` or the first line of stdin and
//! prints an Argon2id hash (bcrypt with `--bcrypt`).

use clap::Parser;
use std::io::BufRead;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use zeroize::Zeroizing;

use portcullis::auth::{hash_password, hash_password_bcrypt};

#[derive(Parser, Debug)]
#[command(name = "portcullis-hash")]
#[command(about = "Hash a password for the Portcullis auth proxy")]
#[command(version)]
struct Args {
    /// Password to hash (read from stdin when omitted)
    #[arg(long)]
    password: Option<String>,

    /// Emit a bcrypt hash instead of Argon2id
    #[arg(long)]
    bcrypt: bool,

    /// bcrypt cost factor
    #[arg(long, default_value_t = bcrypt::DEFAULT_COST, value_parser = clap::value_parser!(u32).range(4..=31))]
    cost: u32,
}

fn read_password(args: &mut Args) -> std::io::Result<Zeroizing<String>> {
    if let Some(password) = args.password.take() {
        return Ok(Zeroizing::new(password));
    }

    let mut line = Zeroizing::new(String::new());
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(Zeroizing::new(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args = Args::parse();

    let password = match read_password(&mut args) {
        Ok(password) if !password.is_empty() => password,
        Ok(_) => {
            error!("Password must not be empty");
            std::process::exit(1);
        }
        Err(e) => {
            error!("Failed to read password: {}", e);
            std::process::exit(1);
        }
    };

    let hashed = if args.bcrypt {
        hash_password_bcrypt(&password, args.cost)
    } else {
        hash_password(&password)
    };

    match hashed {
        Ok(hash) => println!("{}", hash),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}
