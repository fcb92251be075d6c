//! Transform pipelines: external commands run over raw content.
//!
//! A pipeline belongs to one content type. Its commands are chained: each
//! one receives the previous output on stdin, and the last stdout replaces the
//! document body before rendering.

use crate::{config::TransformersConfig, log};
use std::{
    collections::BTreeMap,
    io::{self, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
    thread,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("failed to run `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("`{command}` produced non UTF-8 output")]
    Encoding { command: String },
}

/// Transformed document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    pub content: String,
    /// `false` when the pipeline already produced HTML.
    pub is_markdown: bool,
}

/// Content transformation capability. Called from rayon workers.
pub trait Transformer: Sync {
    /// `Ok(None)` when no pipeline is configured for `content_type`.
    fn transform(&self, content: &str, content_type: &str)
    -> Result<Option<Transformed>, TransformError>;
}

#[derive(Debug, Clone)]
struct Pipeline {
    commands: Vec<Vec<String>>,
    is_markdown_result: bool,
}

/// Pipelines keyed by content type, run in the project root.
#[derive(Debug, Clone, Default)]
pub struct Pipelines {
    pipelines: BTreeMap<String, Pipeline>,
    workdir: PathBuf,
}

impl Pipelines {
    pub fn new(config: &TransformersConfig, workdir: &Path) -> Self {
        let pipelines = config
            .pipelines
            .iter()
            .filter_map(|(type_id, pipeline)| {
                let commands: Vec<Vec<String>> = pipeline
                    .run
                    .iter()
                    .filter(|argv| argv.first().is_some_and(|program| !program.trim().is_empty()))
                    .cloned()
                    .collect();
                if commands.is_empty() {
                    log!("warn"; "transform pipeline for `{type_id}` has no commands, ignored");
                    return None;
                }
                Some((
                    type_id.clone(),
                    Pipeline {
                        commands,
                        is_markdown_result: pipeline.is_markdown_result,
                    },
                ))
            })
            .collect();

        Self {
            pipelines,
            workdir: workdir.to_path_buf(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    fn run(&self, argv: &[String], input: &str) -> Result<String, TransformError> {
        let command = argv.join(" ");
        let mut child = Command::new(&argv[0])
            .args(&argv[1..])
            .current_dir(&self.workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| TransformError::Spawn {
                command: command.clone(),
                source,
            })?;

        // Feed stdin from another thread so a full stdout pipe cannot deadlock us.
        let stdin = child.stdin.take();
        let output = thread::scope(|scope| {
            scope.spawn(move || {
                if let Some(mut stdin) = stdin {
                    // The command may exit without reading all of its input.
                    stdin.write_all(input.as_bytes()).ok();
                }
            });
            child.wait_with_output()
        })
        .map_err(|source| TransformError::Spawn {
            command: command.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(TransformError::Failed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| TransformError::Encoding { command })
    }
}

impl Transformer for Pipelines {
    fn transform(
        &self,
        content: &str,
        content_type: &str,
    ) -> Result<Option<Transformed>, TransformError> {
        let Some(pipeline) = self.pipelines.get(content_type) else {
            return Ok(None);
        };

        let mut current = content.to_owned();
        for argv in &pipeline.commands {
            current = self.run(argv, &current)?;
        }

        Ok(Some(Transformed {
            content: current,
            is_markdown: pipeline.is_markdown_result,
        }))
    }
}
