//! TOON Language Server and document state engine.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use serde_json::Value;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService};
use tracing::{debug, info, warn};

pub mod codec;
mod debounce;
mod document;
pub mod error;
mod lsp;
pub(crate) mod settings;
pub mod types;

pub use debounce::Debouncer;
pub use document::{
    collect_all_paths, find, join_path, path, project, split_path, Document, DocumentOptions,
    DocumentStore, History, HistorySnapshot, LineIndex, MovePosition, Path, TreeNode,
    DEFAULT_HISTORY_LIMIT, ROOT_ID,
};
pub use lsp::{
    commands, execute, lint, parse, to_diagnostics, Command, CommandError, Invocation, LintIssue,
    LintLevel, Outcome, ALL_COMMANDS, DIAGNOSTIC_SOURCE,
};
pub use settings::{discover_settings, load_settings, EditorSettings, LintSettings, Settings};

/// A text change waiting out the debounce period.
#[derive(Debug, Clone)]
struct StagedChange {
    uri: Url,
    text: String,
    version: i32,
}

/// The parts of the server a debounce timer needs once it fires.
#[derive(Clone)]
struct Validator {
    client: Client,
    documents: Arc<DocumentStore>,
    versions: Arc<DashMap<Url, i32>>,
    lint: LintSettings,
}

impl Validator {
    /// Load staged text into its document. Returns `false` if it was closed.
    fn apply(&self, staged: StagedChange) -> bool {
        let StagedChange { uri, text, version } = staged;
        let applied = self
            .documents
            .update(&uri, |doc| doc.set_content(text, true))
            .is_some();
        if applied {
            self.versions.insert(uri, version);
        }
        applied
    }

    async fn apply_and_publish(&self, staged: StagedChange) {
        let uri = staged.uri.clone();
        if self.apply(staged) {
            self.publish(uri).await;
        }
    }

    async fn publish(&self, uri: Url) {
        let Some(diagnostics) = self
            .documents
            .read(&uri, |doc| lsp::to_diagnostics(doc, &self.lint))
        else {
            return;
        };
        let version = self.versions.get(&uri).map(|v| *v);
        debug!(%uri, count = diagnostics.len(), "publishing diagnostics");
        self.client
            .publish_diagnostics(uri, diagnostics, version)
            .await;
    }
}

pub struct Backend {
    client: Client,
    documents: Arc<DocumentStore>,
    versions: Arc<DashMap<Url, i32>>,
    pending: OnceLock<Debouncer<Url, StagedChange>>,
    settings: OnceLock<Settings>,
}

impl Backend {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            documents: Arc::new(DocumentStore::default()),
            versions: Arc::new(DashMap::new()),
            pending: OnceLock::new(),
            settings: OnceLock::new(),
        }
    }

    fn settings(&self) -> &Settings {
        self.settings.get_or_init(Settings::default)
    }

    fn pending(&self) -> &Debouncer<Url, StagedChange> {
        self.pending
            .get_or_init(|| Debouncer::new(self.settings().debounce()))
    }

    fn validator(&self) -> Validator {
        Validator {
            client: self.client.clone(),
            documents: Arc::clone(&self.documents),
            versions: Arc::clone(&self.versions),
            lint: self.settings().lint.clone(),
        }
    }

    /// Apply any staged text for `uri` right away.
    fn flush_pending(&self, uri: &Url) {
        if let Some(staged) = self.pending().flush(uri) {
            debug!(%uri, "flushing staged change");
            self.validator().apply(staged);
        }
    }

    /// Replace the client's copy of the document with `text`.
    async fn push_text(&self, uri: &Url, previous: &str, text: String) {
        let edit = TextEdit {
            range: LineIndex::new(previous).full_range(),
            new_text: text,
        };
        let workspace_edit = WorkspaceEdit {
            changes: Some(HashMap::from([(uri.clone(), vec![edit])])),
            ..Default::default()
        };
        match self.client.apply_edit(workspace_edit).await {
            Ok(response) if !response.applied => {
                warn!(%uri, reason = ?response.failure_reason, "client rejected edit");
            }
            Ok(_) => {}
            Err(err) => warn!(%uri, error = %err, "workspace/applyEdit failed"),
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let workspace_root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|f| f.uri.to_file_path().ok())
            .or_else(|| {
                #[allow(deprecated)]
                params.root_uri.as_ref()?.to_file_path().ok()
            });

        if let Some(root) = workspace_root {
            let (settings, settings_dir) = settings::discover_settings(&root);
            info!(root = %root.display(), settings_dir = %settings_dir.display(), "workspace settings loaded");
            let _ = self.settings.set(settings);
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::FULL),
                        save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                        ..Default::default()
                    },
                )),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: ALL_COMMANDS.iter().map(|c| c.to_string()).collect(),
                    work_done_progress_options: WorkDoneProgressOptions::default(),
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "TOON language server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let TextDocumentItem {
            uri, text, version, ..
        } = params.text_document;
        debug!(%uri, version, "did_open");
        self.pending().cancel(&uri);
        self.documents
            .open(uri.clone(), text, self.settings().document_options());
        self.versions.insert(uri.clone(), version);
        self.validator().publish(uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        // FULL sync: the last change carries the whole text.
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };

        let unchanged = self
            .documents
            .read(&uri, |doc| doc.raw_text() == change.text)
            .unwrap_or(false);
        if unchanged {
            self.pending().cancel(&uri);
            self.versions.insert(uri, version);
            return;
        }

        let validator = self.validator();
        let staged = StagedChange {
            uri: uri.clone(),
            text: change.text,
            version,
        };
        self.pending().schedule(uri, staged, move |staged| async move {
            validator.apply_and_publish(staged).await;
        });
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        self.flush_pending(&uri);
        self.documents.update(&uri, |doc| doc.mark_clean());
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.pending().cancel(&uri);
        self.documents.close(&uri);
        self.versions.remove(&uri);
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        let Invocation { uri, command } = lsp::parse(&params.command, &params.arguments)?;
        debug!(%uri, command = %params.command, "execute_command");
        self.flush_pending(&uri);

        let outcome = self
            .documents
            .update(&uri, |doc| lsp::execute(doc, command))
            .ok_or_else(|| CommandError::NotOpen(uri.clone()))?
            .map_err(CommandError::from)?;

        if let Some(previous) = &outcome.replaced {
            let text = self
                .documents
                .read(&uri, |doc| doc.raw_text().to_string())
                .unwrap_or_default();
            self.push_text(&uri, previous, text).await;
        }
        self.validator().publish(uri).await;
        Ok(Some(outcome.result))
    }
}

pub fn create_service() -> (LspService<Backend>, tower_lsp::ClientSocket) {
    LspService::new(Backend::new)
}
