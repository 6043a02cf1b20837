//!
//! folio admin CLI
//! ---------------
//! Talks to a running folio server through the API client. The session is kept in a
//! small JSON file between invocations, so `login` once and the other commands reuse it.

use std::env;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use folio::client::{ApiClient, ClientError, FileStorage, SessionCache};
use folio::config::{positional_args, ClientConfig};

const FLAGS_WITH_VALUES: &[&str] = &["--server", "--session-file"];

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--server <url>] [--session-file <path>] <command> [args]\n\nCommands:\n  login <username> [password]        log in (prompts for the password when omitted)\n  logout                             forget the local session\n  whoami                             show the logged in user\n  messages                           list contact messages, newest first\n  unread                             count unread messages\n  read <id>                          mark a message as read\n  delete <id>                        delete a message\n  contact <name> <email> <message>   send a contact message (no login needed)\n\nFlags:\n  --server <url>          API server (env: FOLIO_SERVER, default http://localhost:5000)\n  --session-file <path>   Session file (env: FOLIO_SESSION_FILE, default .folio_session.json)\n  -h, --help              Show this help"
    );
}

fn prompt_password() -> Result<String> {
    print!("Password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn arg<'a>(rest: &'a [String], i: usize, what: &str) -> Result<&'a str> {
    rest.get(i).map(|s| s.as_str()).ok_or_else(|| anyhow!("missing {what}"))
}

async fn dispatch(api: &ApiClient, cmd: &str, rest: &[String]) -> Result<(), ClientError> {
    match cmd {
        "login" => {
            let username = arg(rest, 0, "username")?;
            let password = match rest.get(1) { Some(p) => p.clone(), None => prompt_password()? };
            let session = api.login(username, &password).await?;
            println!("Logged in as {} ({})", session.user.username, session.user.role);
        }
        "logout" => {
            api.logout();
            println!("Logged out");
        }
        "whoami" => {
            let user = api.profile().await?;
            println!("{} ({}) id={}", user.username, user.role, user.id);
        }
        "messages" => {
            let msgs = api.messages().await?;
            println!("{} message(s)", msgs.len());
            for m in msgs {
                let flag = if m.read { " " } else { "*" };
                println!("{flag} {}  {}  {} <{}>  {}", m.id, m.created_at.format("%Y-%m-%d %H:%M"), m.name, m.email, m.message);
            }
        }
        "unread" => println!("{}", api.unread_count().await?),
        "read" => {
            let m = api.mark_read(arg(rest, 0, "message id")?).await?;
            println!("Marked {} as read", m.id);
        }
        "delete" => {
            let id = arg(rest, 0, "message id")?;
            api.delete_message(id).await?;
            println!("Deleted {id}");
        }
        "contact" => {
            let m = api.send_contact(arg(rest, 0, "name")?, arg(rest, 1, "email")?, arg(rest, 2, "message")?).await?;
            println!("Message sent ({})", m.id);
        }
        other => return Err(anyhow!("unknown command '{other}'").into()),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .try_init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().cloned().unwrap_or_else(|| "folio_cli".to_string());
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage(&program);
        return Ok(());
    }
    let positional = positional_args(&args[1.min(args.len())..], FLAGS_WITH_VALUES);
    let Some((cmd, rest)) = positional.split_first() else {
        print_usage(&program);
        return Ok(());
    };

    let config = ClientConfig::from_env_and_args(&args);
    let cache = SessionCache::new(Arc::new(FileStorage::new(&config.session_file)));
    let api = ApiClient::new(&config.server_url, cache)?;

    match dispatch(&api, cmd, rest).await {
        Ok(()) => Ok(()),
        Err(ClientError::Unauthorized { message, redirect }) => {
            eprintln!("{message}. Session cleared; run `{program} login <username>` ({redirect}).");
            std::process::exit(2);
        }
        Err(e) => Err(e.into()),
    }
}
