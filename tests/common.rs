use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

// Every test binary includes this module but none uses all of it.
#[allow(dead_code)]
pub struct TestContext {
    pub temp_dir: TempDir,
    pub state_file: PathBuf,
    pub bin_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub bin_path: PathBuf,
}

#[allow(dead_code)]
impl TestContext {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state_file = temp_dir.path().join("state.json");
        let bin_dir = temp_dir.path().join("bin");
        let tmp_dir = temp_dir.path().join("tmp");

        let bin_path = PathBuf::from(env!("CARGO_BIN_EXE_azabox"));

        Self {
            temp_dir,
            state_file,
            bin_dir,
            tmp_dir,
            bin_path,
        }
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = Command::new(&self.bin_path);
        cmd.env("AZABOX_STATE_FILE", &self.state_file);
        cmd.env("AZABOX_BIN_DIR", &self.bin_dir);
        cmd.env("AZABOX_TMP_DIR", &self.tmp_dir);
        cmd.env_remove("AZABOX_LOG_LEVEL");
        cmd.env_remove("AZABOX_GITHUB_API_URL");
        // keep HOME and XDG lookups inside the temp dir
        cmd.env("HOME", self.temp_dir.path());
        cmd.env("XDG_CONFIG_HOME", self.temp_dir.path().join("config"));
        cmd
    }

    /// Command talking to a mock GitHub API instead of api.github.com.
    pub fn cmd_with_api(&self, api_url: &str) -> Command {
        let mut cmd = self.cmd();
        cmd.env("AZABOX_GITHUB_API_URL", api_url);
        cmd.env_remove("GITHUB_TOKEN");
        cmd
    }

    pub fn write_state(&self, json: &str) {
        std::fs::write(&self.state_file, json).expect("Failed to seed state file");
    }

    pub fn read_state(&self) -> serde_json::Value {
        let raw = std::fs::read_to_string(&self.state_file).expect("Failed to read state file");
        serde_json::from_str(&raw).expect("State file is not valid JSON")
    }
}

#[allow(dead_code)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: std::process::ExitStatus,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            status: output.status,
        }
    }
}

#[allow(dead_code)]
impl CommandOutput {
    pub fn assert_success(&self) -> &Self {
        if !self.status.success() {
            panic!(
                "Command failed with status {:?}\nstdout: {}\nstderr: {}",
                self.status.code(),
                self.stdout,
                self.stderr
            );
        }
        self
    }

    pub fn assert_failure(&self) -> &Self {
        assert!(
            !self.status.success(),
            "Command unexpectedly succeeded\nstdout: {}\nstderr: {}",
            self.stdout,
            self.stderr
        );
        self
    }

    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(
            self.stdout.contains(text),
            "Stdout did not contain '{}'\nActual stdout: {}",
            text,
            self.stdout
        );
        self
    }

    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(
            self.stderr.contains(text),
            "Stderr did not contain '{}'\nActual stderr: {}",
            text,
            self.stderr
        );
        self
    }
}
