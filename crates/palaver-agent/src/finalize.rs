//! Finalize pipeline: everything that happens after the loop produces an
//! answer. Delivery (file, clipboard) and the durable history commit run in
//! a fixed order; the first failure aborts the remaining steps and
//! propagates, so nothing fails silently.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, info};

use palaver_core::history::{HistoryStore, UpsertParams};

use crate::tools::sandbox::resolve_workspace_path;

// ─────────────────────────────────────────────
// Request / outcome shapes
// ─────────────────────────────────────────────

/// Where the answer goes besides stdout.
#[derive(Clone, Debug, Default)]
pub struct OutputDelivery {
    /// Write the answer to this file, resolved inside the workspace.
    pub file: Option<String>,
    /// Copy to the system clipboard.
    pub copy: bool,
    /// Copy this file's content instead of the answer text. The file must
    /// already exist.
    pub copy_source: Option<String>,
}

pub struct FinalizeRequest {
    pub content: String,
    pub delivery: OutputDelivery,
    /// History commit; `None` when the loop produced no response id, in
    /// which case nothing durable happened and nothing is recorded.
    pub commit: Option<UpsertParams>,
}

#[derive(Clone, Debug)]
pub struct FinalizeOutcome {
    pub exit_code: i32,
    /// What the CLI prints; always the answer content.
    pub stdout: String,
}

/// Extra finalize steps beyond plain delivery, run in priority order.
#[derive(Clone, Debug)]
pub enum FinalizeAction {
    CopyToClipboard { text: String },
    /// Wrap a Mermaid source file in a self-contained HTML page.
    RenderDiagramHtml { source: String, output: String },
    OpenFile { path: String },
}

impl FinalizeAction {
    fn flag(&self) -> &'static str {
        match self {
            FinalizeAction::CopyToClipboard { .. } => "--copy",
            FinalizeAction::RenderDiagramHtml { .. } => "--render",
            FinalizeAction::OpenFile { .. } => "--open",
        }
    }
}

// ─────────────────────────────────────────────
// Pipeline
// ─────────────────────────────────────────────

pub struct FinalizePipeline {
    workspace: PathBuf,
    store: HistoryStore,
}

impl FinalizePipeline {
    pub fn new(workspace: impl Into<PathBuf>, store: HistoryStore) -> Self {
        FinalizePipeline {
            workspace: workspace.into(),
            store,
        }
    }

    /// Deliver the answer, then commit history. Delivery failures surface
    /// before the commit runs; a commit failure surfaces after delivery
    /// already happened. Neither is ever skipped silently.
    pub async fn handle_result(&self, request: FinalizeRequest) -> Result<FinalizeOutcome> {
        self.deliver(&request.content, &request.delivery).await?;

        if let Some(params) = &request.commit {
            let entry = self.store.upsert_conversation(params)?;
            info!(
                title = %entry.title,
                requests = entry.request_count,
                "conversation committed to history"
            );
        } else {
            debug!("no response id; skipping history commit");
        }

        Ok(FinalizeOutcome {
            exit_code: 0,
            stdout: request.content,
        })
    }

    async fn deliver(&self, content: &str, delivery: &OutputDelivery) -> Result<()> {
        if let Some(raw) = &delivery.file {
            let path = resolve_workspace_path(raw, &self.workspace)?;
            if path.is_dir() {
                bail!("output target '{raw}' is an existing directory");
            }
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("failed to create directories for '{raw}'"))?;
            }
            tokio::fs::write(&path, content)
                .await
                .with_context(|| format!("failed to write output file '{raw}'"))?;
            info!(path = %raw, "answer written to file");
        }

        if delivery.copy {
            let text = match &delivery.copy_source {
                Some(raw) => {
                    let path = resolve_workspace_path(raw, &self.workspace)?;
                    if !path.is_file() {
                        bail!("copy source '{raw}' does not exist");
                    }
                    tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("failed to read copy source '{raw}'"))?
                }
                None => content.to_string(),
            };
            copy_to_clipboard(&text).await?;
            info!("answer copied to clipboard");
        }

        Ok(())
    }

    /// Run extra actions in order, stopping at the first failure. The
    /// failing action's flag is logged so the user knows which request
    /// feature broke.
    pub async fn run_actions(&self, actions: &[FinalizeAction]) -> Result<()> {
        for action in actions {
            if let Err(err) = self.run_action(action).await {
                error!(flag = action.flag(), error = %err, "finalize action failed");
                return Err(err);
            }
        }
        Ok(())
    }

    async fn run_action(&self, action: &FinalizeAction) -> Result<()> {
        match action {
            FinalizeAction::CopyToClipboard { text } => copy_to_clipboard(text).await,
            FinalizeAction::RenderDiagramHtml { source, output } => {
                let source_path = resolve_workspace_path(source, &self.workspace)?;
                if !source_path.is_file() {
                    bail!("diagram source '{source}' does not exist");
                }
                let output_path = resolve_workspace_path(output, &self.workspace)?;
                let mermaid = tokio::fs::read_to_string(&source_path)
                    .await
                    .with_context(|| format!("failed to read diagram source '{source}'"))?;
                tokio::fs::write(&output_path, render_diagram_page(&mermaid))
                    .await
                    .with_context(|| format!("failed to write rendered diagram '{output}'"))?;
                info!(path = %output, "diagram rendered to HTML");
                Ok(())
            }
            FinalizeAction::OpenFile { path } => {
                let resolved = resolve_workspace_path(path, &self.workspace)?;
                open_in_viewer(&resolved).await
            }
        }
    }
}

// ─────────────────────────────────────────────
// Clipboard / viewer plumbing
// ─────────────────────────────────────────────

fn clipboard_command() -> (&'static str, &'static [&'static str]) {
    if cfg!(target_os = "macos") {
        ("pbcopy", &[])
    } else if cfg!(target_os = "windows") {
        ("clip", &[])
    } else {
        ("xclip", &["-selection", "clipboard"])
    }
}

async fn copy_to_clipboard(text: &str) -> Result<()> {
    let (program, args) = clipboard_command();
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("clipboard command '{program}' is not available"))?;

    if let Some(stdin) = child.stdin.as_mut() {
        stdin
            .write_all(text.as_bytes())
            .await
            .context("failed to pipe text to the clipboard command")?;
    }
    drop(child.stdin.take());

    let status = child
        .wait()
        .await
        .context("clipboard command did not run")?;
    if !status.success() {
        bail!("clipboard command '{program}' exited with {status}");
    }
    Ok(())
}

async fn open_in_viewer(path: &std::path::Path) -> Result<()> {
    let program = if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    let status = Command::new(program)
        .arg(path)
        .status()
        .await
        .with_context(|| format!("viewer command '{program}' is not available"))?;
    if !status.success() {
        bail!("'{program}' exited with {status}");
    }
    Ok(())
}

fn render_diagram_page(mermaid: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Diagram</title>
  <script src="https://cdn.jsdelivr.net/npm/mermaid@11/dist/mermaid.min.js"></script>
</head>
<body>
  <pre class="mermaid">
{mermaid}
  </pre>
  <script>mermaid.initialize({{ startOnLoad: true }});</script>
</body>
</html>
"#
    )
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_core::types::{Effort, Verbosity};

    fn pipeline(dir: &tempfile::TempDir) -> FinalizePipeline {
        let store = HistoryStore::new(dir.path().join("history.json"));
        FinalizePipeline::new(dir.path(), store)
    }

    fn commit_params(response_id: &str) -> UpsertParams {
        UpsertParams {
            response_id: response_id.into(),
            user_text: "hello".into(),
            assistant_text: "OK!".into(),
            model: "gpt-5".into(),
            effort: Effort::Medium,
            verbosity: Verbosity::Medium,
            title: "hello".into(),
            previous_response_id: None,
            active_last_response_id: None,
            context: None,
        }
    }

    #[tokio::test]
    async fn test_answer_written_to_file_and_committed() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);

        let outcome = pipeline
            .handle_result(FinalizeRequest {
                content: "OK!".into(),
                delivery: OutputDelivery {
                    file: Some("out/answer.md".into()),
                    ..Default::default()
                },
                commit: Some(commit_params("resp_1")),
            })
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.stdout, "OK!");
        let written = std::fs::read_to_string(dir.path().join("out/answer.md")).unwrap();
        assert_eq!(written, "OK!");

        let store = HistoryStore::new(dir.path().join("history.json"));
        let entries = store.load_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].last_response_id, "resp_1");
        assert_eq!(entries[0].request_count, 1);
        assert_eq!(entries[0].turns.len(), 2);
    }

    #[tokio::test]
    async fn test_no_response_id_skips_commit() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);

        pipeline
            .handle_result(FinalizeRequest {
                content: "partial".into(),
                delivery: OutputDelivery::default(),
                commit: None,
            })
            .await
            .unwrap();

        let store = HistoryStore::new(dir.path().join("history.json"));
        assert!(store.load_entries().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_directory_output_target_fails_before_commit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("out")).unwrap();
        let pipeline = pipeline(&dir);

        let err = pipeline
            .handle_result(FinalizeRequest {
                content: "x".into(),
                delivery: OutputDelivery {
                    file: Some("out".into()),
                    ..Default::default()
                },
                commit: Some(commit_params("resp_1")),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("existing directory"));

        // The failed delivery aborted the commit loudly, not silently.
        let store = HistoryStore::new(dir.path().join("history.json"));
        assert!(store.load_entries().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_output_escape_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);

        let err = pipeline
            .handle_result(FinalizeRequest {
                content: "x".into(),
                delivery: OutputDelivery {
                    file: Some("../escape.md".into()),
                    ..Default::default()
                },
                commit: None,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("outside the workspace"));
    }

    #[tokio::test]
    async fn test_missing_copy_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);

        let err = pipeline
            .handle_result(FinalizeRequest {
                content: "x".into(),
                delivery: OutputDelivery {
                    copy: true,
                    copy_source: Some("missing.md".into()),
                    ..Default::default()
                },
                commit: None,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_render_diagram_html() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("d.mmd"), "graph TD; A-->B;").unwrap();
        let pipeline = pipeline(&dir);

        pipeline
            .run_actions(&[FinalizeAction::RenderDiagramHtml {
                source: "d.mmd".into(),
                output: "d.html".into(),
            }])
            .await
            .unwrap();

        let html = std::fs::read_to_string(dir.path().join("d.html")).unwrap();
        assert!(html.contains("graph TD; A-->B;"));
        assert!(html.contains("mermaid"));
    }

    #[tokio::test]
    async fn test_actions_stop_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);

        let actions = vec![
            FinalizeAction::RenderDiagramHtml {
                source: "missing.mmd".into(),
                output: "a.html".into(),
            },
            FinalizeAction::RenderDiagramHtml {
                source: "missing.mmd".into(),
                output: "b.html".into(),
            },
        ];
        assert!(pipeline.run_actions(&actions).await.is_err());
        // The second action never ran.
        assert!(!dir.path().join("b.html").exists());
    }
}
