//! Line-oriented interactive shell driving a [`Session`].
//!
//! Questions are dispatched onto a `JoinSet` so several can be in flight;
//! the shell loop is the only owner of the session and applies each
//! resolution as it completes.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::{JoinError, JoinSet};

use ingatini_core::{HistoryEntry, Role, Turn, UploadFile, UserId};
use ingatini_session::{QueryResolution, Session};

const HELP: &str = "\
Commands:
  login <name>      sign in (creates the user if needed)
  login #<id>       resume an existing user by id
  logout            sign out and clear the session
  upload <path>     attach a document
  docs              list attached documents
  ask <question>    ask a question (plain text works too)
  wait              wait for every pending answer
  transcript        show the conversation so far
  history           reload and show past queries
  status            show service and session status
  help              show this help
  quit              leave";

// =============================================================================
// Commands
// =============================================================================

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login(String),
    Resume(UserId),
    Logout,
    Upload(Option<PathBuf>),
    Docs,
    Ask(String),
    Wait,
    Transcript,
    History,
    Status,
    Help,
    Quit,
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Command {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Command::Empty;
        }
        let (head, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (trimmed, ""),
        };

        match (head, rest.is_empty()) {
            ("login", _) => match rest.strip_prefix('#') {
                Some(id) if !id.trim().is_empty() => match id.parse::<UserId>() {
                    Ok(user_id) => Command::Resume(user_id),
                    Err(never) => match never {},
                },
                _ => Command::Login(rest.to_string()),
            },
            ("upload", true) => Command::Upload(None),
            ("upload", false) => Command::Upload(Some(PathBuf::from(rest))),
            ("ask", _) => Command::Ask(after_keyword(line, "ask").to_string()),
            ("logout", true) => Command::Logout,
            ("docs", true) => Command::Docs,
            ("wait", true) => Command::Wait,
            ("transcript", true) => Command::Transcript,
            ("history", true) => Command::History,
            ("status", true) => Command::Status,
            ("help", true) => Command::Help,
            ("quit", true) | ("exit", true) => Command::Quit,
            _ => Command::Ask(line.to_string()),
        }
    }
}

/// The text following `keyword` and one separating whitespace character,
/// otherwise exactly as typed.
fn after_keyword<'a>(line: &'a str, keyword: &str) -> &'a str {
    let rest = line.trim_start().strip_prefix(keyword).unwrap_or_default();
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if c.is_whitespace() => chars.as_str(),
        _ => rest,
    }
}

// =============================================================================
// Rendering
// =============================================================================

pub fn render_turn(turn: &Turn) -> String {
    let mut out = match turn.role {
        Role::User => format!("you> {}", turn.content),
        Role::Assistant => format!("assistant> {}", turn.content),
        Role::Error => format!("error> {}", turn.content),
    };
    if let Some(evidence) = turn.evidence.as_ref().filter(|e| !e.is_empty()) {
        let sources: Vec<String> = evidence
            .iter()
            .map(|e| format!("doc {}", e.document_id))
            .collect();
        out.push_str(&format!("\n  Sources: {}", sources.join(", ")));
    }
    out
}

pub fn render_history_entry(entry: &HistoryEntry) -> String {
    let when = entry
        .created_at
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown time".to_string());
    format!(
        "Q: {}\nA: {}\n  Retrieved {} chunk(s) | {}",
        entry.query_text, entry.answer_text, entry.retrieved_chunk_count, when
    )
}

fn upload_file(path: &Path, bytes: Vec<u8>) -> UploadFile {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    UploadFile::new(name, bytes)
}

// =============================================================================
// Shell
// =============================================================================

pub struct Shell {
    session: Session,
    in_flight: JoinSet<QueryResolution>,
}

impl Shell {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            in_flight: JoinSet::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Read commands until `quit` or end of input, then wait for pending answers.
    pub async fn run<R>(&mut self, input: R) -> ingatini_core::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    if !self.handle(Command::parse(&line)).await {
                        break;
                    }
                }
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    self.apply(joined);
                }
            }
        }
        self.wait().await;
        Ok(())
    }

    /// Execute one command. Returns `false` when the shell should stop.
    pub async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Empty => {}
            Command::Help => println!("{}", HELP),
            Command::Quit => return false,
            Command::Login(name) => match self.session.establish(&name).await {
                Ok(identity) => {
                    println!("Welcome, {}! (user {})", identity.display_name, identity.id);
                    self.print_sign_in_notices();
                }
                Err(err) => println!("{}", err),
            },
            Command::Resume(user_id) => match self.session.resume(&user_id).await {
                Ok(identity) => {
                    println!("Welcome back, {}!", identity.display_name);
                    self.print_sign_in_notices();
                }
                Err(err) => println!("{}", err),
            },
            Command::Logout => {
                self.session.sign_out();
                println!("Signed out.");
            }
            Command::Upload(path) => self.upload(path).await,
            Command::Docs => {
                self.print_scope_banner();
                for doc in self.session.scope().documents() {
                    let name = doc.file_name.as_deref().unwrap_or("(unnamed)");
                    println!("  {} {} ({} chunks)", doc.id, name, doc.chunk_count);
                }
            }
            Command::Ask(text) => self.dispatch(&text),
            Command::Wait => self.wait().await,
            Command::Transcript => {
                for turn in self.session.transcript() {
                    println!("{}", render_turn(turn));
                }
                if let Some(err) = self.session.orchestrator().error() {
                    println!("[{}]", err);
                }
            }
            Command::History => match self.session.load_history().await {
                Ok(entries) if entries.is_empty() => println!("No queries yet."),
                Ok(entries) => {
                    for entry in entries {
                        println!("{}\n", render_history_entry(entry));
                    }
                }
                Err(err) => println!("{}", err),
            },
            Command::Status => {
                let status = self.session.probe_health().await;
                println!("{}", status);
                match self.session.identity() {
                    Some(identity) => {
                        println!("Signed in as {} ({})", identity.display_name, identity.id)
                    }
                    None => println!("Not signed in"),
                }
                self.print_scope_banner();
                println!(
                    "{} question(s) awaiting an answer",
                    self.session.orchestrator().pending_count()
                );
            }
        }
        true
    }

    /// Lines shown right after a successful sign-in.
    fn sign_in_notices(&self) -> Vec<String> {
        let mut notices = vec![format!("{} document(s) uploaded", self.session.scope().len())];
        if let Some(err) = self.session.history().error() {
            notices.push(format!("History unavailable: {}", err));
        }
        notices
    }

    fn print_sign_in_notices(&self) {
        for notice in self.sign_in_notices() {
            println!("{}", notice);
        }
    }

    fn print_scope_banner(&self) {
        if self.session.identity().is_some() {
            println!("{} document(s) uploaded", self.session.scope().len());
        }
    }

    async fn upload(&mut self, path: Option<PathBuf>) {
        let file = match path {
            Some(path) => match tokio::fs::read(&path).await {
                Ok(bytes) => Some(upload_file(&path, bytes)),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "Cannot read upload");
                    println!("Cannot read {}: {}", path.display(), err);
                    return;
                }
            },
            None => None,
        };
        match self.session.attach(file).await {
            Ok(doc) => {
                println!("Document uploaded successfully! ({} chunks)", doc.chunk_count);
                self.print_scope_banner();
            }
            Err(err) => println!("{}", err),
        }
    }

    fn dispatch(&mut self, text: &str) {
        match self.session.submit(text) {
            Ok(dispatch) => {
                let service = self.session.service();
                self.in_flight
                    .spawn(async move { dispatch.run(service.as_ref()).await });
                println!("Thinking...");
            }
            Err(err) => println!("{}", err),
        }
    }

    fn apply(&mut self, joined: Result<QueryResolution, JoinError>) {
        match joined {
            Ok(resolution) => match self.session.resolve(resolution) {
                Ok(turn) => println!("{}", render_turn(&turn)),
                Err(err) => tracing::debug!(error = %err, "Answer arrived after sign-out"),
            },
            Err(err) => tracing::error!(error = %err, "Query task failed"),
        }
    }

    async fn wait(&mut self) {
        while let Some(joined) = self.in_flight.join_next().await {
            self.apply(joined);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ingatini_client::MockRagService;
    use ingatini_core::{DocumentId, EvidenceRef, IngatiniConfig, RemoteOperation};

    fn make_shell() -> (Arc<MockRagService>, Shell) {
        let mock = Arc::new(MockRagService::new());
        let session = Session::new(mock.clone(), &IngatiniConfig::default());
        (mock, Shell::new(session))
    }

    // ---- Parsing ----

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("login alice"), Command::Login("alice".into()));
        assert_eq!(Command::parse("login #7"), Command::Resume(UserId::from(7)));
        assert_eq!(Command::parse("login"), Command::Login(String::new()));
        assert_eq!(Command::parse("logout"), Command::Logout);
        assert_eq!(
            Command::parse("upload notes/policy.pdf"),
            Command::Upload(Some(PathBuf::from("notes/policy.pdf")))
        );
        assert_eq!(Command::parse("upload"), Command::Upload(None));
        assert_eq!(Command::parse("  quit "), Command::Quit);
        assert_eq!(Command::parse(""), Command::Empty);
    }

    #[test]
    fn test_plain_text_is_a_question() {
        assert_eq!(
            Command::parse("What is the refund policy?"),
            Command::Ask("What is the refund policy?".into())
        );
        // Keywords with trailing text are questions too.
        assert_eq!(
            Command::parse("history of the company?"),
            Command::Ask("history of the company?".into())
        );
    }

    #[test]
    fn test_ask_keeps_question_text() {
        assert_eq!(Command::parse("ask why?"), Command::Ask("why?".into()));
        assert_eq!(Command::parse("ask"), Command::Ask(String::new()));
        assert_eq!(Command::parse("ask  two spaces"), Command::Ask(" two spaces".into()));
    }

    #[test]
    fn test_ask_separator_may_be_any_whitespace() {
        assert_eq!(Command::parse("ask\twhy?"), Command::Ask("why?".into()));
        assert_eq!(after_keyword("  ask\u{3000}why?", "ask"), "why?");
    }

    // ---- Rendering ----

    #[test]
    fn test_render_turn_with_sources() {
        let turn = Turn::assistant(
            "30 days.",
            vec![EvidenceRef {
                document_id: DocumentId::from("doc1"),
            }],
        );
        assert_eq!(render_turn(&turn), "assistant> 30 days.\n  Sources: doc doc1");
        assert_eq!(render_turn(&Turn::error("boom")), "error> boom");
    }

    #[test]
    fn test_render_history_without_timestamp() {
        let entry = HistoryEntry {
            query_text: "q".into(),
            answer_text: "a".into(),
            retrieved_chunk_count: 0,
            created_at: None,
        };
        assert!(render_history_entry(&entry).contains("Retrieved 0 chunk(s) | unknown time"));
    }

    #[test]
    fn test_upload_file_uses_base_name() {
        let file = upload_file(Path::new("/tmp/docs/policy.pdf"), vec![1, 2]);
        assert_eq!(file.file_name, "policy.pdf");
    }

    // ---- Driving a session ----

    #[tokio::test]
    async fn test_script_runs_to_completion() {
        let (mock, mut shell) = make_shell();
        mock.answer("What is the refund policy?", "30 days.", &[]);
        let script: &[u8] = b"login alice\nWhat is the refund policy?\nask second\nquit\n";

        shell.run(script).await.unwrap();

        let transcript = shell.session().transcript();
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript[0].content, "What is the refund policy?");
        let users = transcript.iter().filter(|t| t.role == Role::User).count();
        assert_eq!(users, 2);
        assert!(transcript.iter().any(|t| t.content == "30 days."));
        assert!(!shell.session().orchestrator().is_awaiting_response());
    }

    #[tokio::test]
    async fn test_ask_before_login_is_rejected() {
        let (mock, mut shell) = make_shell();
        shell.run(&b"hello\n"[..]).await.unwrap();
        assert!(shell.session().transcript().is_empty());
        assert!(mock.recorded_queries().is_empty());
    }

    #[tokio::test]
    async fn test_sign_in_reports_history_failure() {
        let (mock, mut shell) = make_shell();
        mock.fail(RemoteOperation::QueryHistory, 500, None);
        shell.handle(Command::Login("alice".into())).await;

        assert!(shell.session().identity().is_some());
        assert_eq!(
            shell.sign_in_notices(),
            vec![
                "0 document(s) uploaded".to_string(),
                "History unavailable: Failed to load query history".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_sign_in_without_history_failure() {
        let (_, mut shell) = make_shell();
        shell.handle(Command::Login("alice".into())).await;
        assert_eq!(shell.sign_in_notices(), vec!["0 document(s) uploaded".to_string()]);
    }

    #[tokio::test]
    async fn test_upload_missing_file_keeps_scope() {
        let (_, mut shell) = make_shell();
        shell.handle(Command::Login("alice".into())).await;
        shell.handle(Command::Upload(None)).await;
        shell
            .handle(Command::Upload(Some(PathBuf::from("/definitely/not/here.txt"))))
            .await;
        assert!(shell.session().scope().is_empty());
    }
}
