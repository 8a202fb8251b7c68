//! Terminal chat client
//!
//! Reads prompts from stdin and prints replies as they stream in.
//!
//! ```text
//! folio-chat [profile.toml]
//! ```
//!
//! The profile path may also come from `FOLIO_CHAT_PROFILE`. Without one, the
//! client talks to Ollama's generate API on localhost.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio::config::ChatProfile;
use folio::conversation::{Role, Transcript};
use folio::engine::{ChatSession, SubmitOutcome};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so they never interleave with the reply text.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let profile_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("FOLIO_CHAT_PROFILE").ok())
        .map(PathBuf::from);

    let profile = match profile_path {
        Some(path) => ChatProfile::from_file(&path)?,
        None => ChatProfile::default(),
    };

    let session = ChatSession::new(
        profile.session_settings(),
        Arc::new(profile.transport(reqwest::Client::new())),
    );

    eprintln!(
        "Chatting with {} ({}) at {}. Ctrl-D to quit.",
        profile.chat.model, profile.chat.flavor, profile.chat.api_url
    );

    let mut rx = session.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let mut printer = ReplyPrinter::new(session.transcript().len() + 1);

        let submit = session.submit(&line);
        tokio::pin!(submit);

        let outcome = loop {
            tokio::select! {
                outcome = &mut submit => break outcome?,
                Ok(()) = rx.changed() => {
                    let transcript = rx.borrow_and_update().clone();
                    if transcript.is_streaming() {
                        printer.show(&transcript);
                    }
                }
            }
        };

        match outcome {
            SubmitOutcome::Ignored => {}
            SubmitOutcome::Completed { .. } => {
                printer.show(&session.transcript());
                println!();
            }
            SubmitOutcome::Failed { error } => eprintln!("\n{}", error),
        }
    }

    Ok(())
}

/// Prints the part of one reply that has not been shown yet.
struct ReplyPrinter {
    index: usize,
    printed: String,
}

impl ReplyPrinter {
    fn new(index: usize) -> Self {
        Self {
            index,
            printed: String::new(),
        }
    }

    fn show(&mut self, transcript: &Transcript) {
        let Some(reply) = transcript.messages().get(self.index) else {
            return;
        };
        if reply.role != Role::Assistant {
            return;
        }

        if let Some(unseen) = reply.content.strip_prefix(self.printed.as_str()) {
            if !unseen.is_empty() {
                print!("{}", unseen);
                std::io::stdout().flush().ok();
                self.printed.push_str(unseen);
            }
        }
    }
}
