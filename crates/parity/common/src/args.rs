use clap::Parser;
use std::path::{
    Path,
    PathBuf,
};

#[derive(Debug, Parser, Clone)]
pub struct CliArgs {
    /// Print machine readable JSON instead of status lines
    #[clap(short, long, global = true)]
    pub json: bool,
    /// Directory holding the hand-off address and result files
    #[clap(long, global = true, default_value = ".", env = "PARITY_WORK_DIR")]
    pub work_dir: PathBuf,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            json: false,
            work_dir: PathBuf::from("."),
        }
    }
}

impl CliArgs {
    pub fn json_output(&self) -> bool {
        self.json
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}
