//! Port fakes shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use sooty_core::ports::{
    ArtifactFetcher, CommandError, CommandOutput, CommandRunner, CommandSpec, FetchError,
    LineCallback,
};

type Handler = Box<dyn Fn(&CommandSpec) -> Result<CommandOutput, CommandError> + Send + Sync>;

/// Records every command and answers through a handler.
///
/// Output lines returned by the handler are replayed to the command's line
/// callback, and non-zero exits honour `fail_tolerant` like the real runner.
pub struct RecordingRunner {
    calls: Mutex<Vec<CommandSpec>>,
    handler: Handler,
}

impl Default for RecordingRunner {
    fn default() -> Self {
        Self::with_handler(|_| Ok(ok_output("")))
    }
}

impl RecordingRunner {
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&CommandSpec) -> Result<CommandOutput, CommandError> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        }
    }

    pub fn specs(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.specs().iter().map(CommandSpec::display).collect()
    }

    pub fn programs(&self) -> Vec<String> {
        self.specs().into_iter().map(|s| s.program).collect()
    }
}

pub fn ok_output(output: &str) -> CommandOutput {
    CommandOutput {
        code: Some(0),
        output: output.to_owned(),
    }
}

pub fn exit_output(code: i32, output: &str) -> CommandOutput {
    CommandOutput {
        code: Some(code),
        output: output.to_owned(),
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push(spec.clone());
        let result = (self.handler)(&spec)?;
        if let Some(callback) = &spec.on_line {
            for line in result.output.lines().filter(|l| !l.is_empty()) {
                callback(line);
            }
        }
        if result.success() || spec.fail_tolerant {
            Ok(result)
        } else {
            Err(CommandError::failed(spec.program, result.code, result.output))
        }
    }
}

/// Serves canned JSON and writes canned bytes for downloads.
#[derive(Default)]
pub struct ScriptedFetcher {
    json: Mutex<HashMap<String, Value>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<VecDeque<String>>,
}

impl ScriptedFetcher {
    pub fn json(self, url: &str, value: Value) -> Self {
        self.json.lock().unwrap().insert(url.to_owned(), value);
        self
    }

    pub fn file(self, url: &str, bytes: &[u8]) -> Self {
        self.files.lock().unwrap().insert(url.to_owned(), bytes.to_vec());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait]
impl ArtifactFetcher for ScriptedFetcher {
    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        self.requests.lock().unwrap().push_back(url.to_owned());
        self.json
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_owned(),
                status: 404,
            })
    }

    async fn download(
        &self,
        url: &str,
        dest: &Path,
        on_line: Option<LineCallback>,
    ) -> Result<u64, FetchError> {
        self.requests.lock().unwrap().push_back(url.to_owned());
        let bytes = self
            .files
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_owned(),
                status: 404,
            })?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(dest, &bytes).unwrap();
        if let Some(callback) = on_line {
            callback(&format!("[installer] Downloading: {url}"));
        }
        Ok(bytes.len() as u64)
    }
}
