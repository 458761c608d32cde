//! Test helpers for staging golden files and capturing CLI output.

use super::*;
use camino::Utf8PathBuf;
use regionkit_core::EntityKind;
use std::fs;
use tempfile::TempDir;

/// Golden CSV text served for each kind in CLI tests.
pub(super) fn golden_csv(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Region => "11,Aceh\n12,Sumatera Utara\n",
        EntityKind::SubRegion => "1101,11,Kabupaten Simeulue\n1201,12,Kabupaten Nias\n",
        EntityKind::District => "110101,1101,Teupah Selatan\n",
        EntityKind::Settlement => "1101012001,110101,Latiung\n1101012002,110199,Lost\n",
    }
}

/// Temporary workspace holding a golden-source directory and a database path.
#[derive(Debug)]
pub(super) struct Workdir {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workdir {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        fs::create_dir(root.join("golden")).expect("create golden dir");
        Self { _dir: dir, root }
    }

    /// Workspace with every golden file written.
    pub(super) fn with_golden() -> Self {
        let workdir = Self::new();
        for kind in EntityKind::ALL {
            workdir.write_golden(kind, golden_csv(kind));
        }
        workdir
    }

    pub(super) fn write_golden(&self, kind: EntityKind, contents: &str) {
        let path = self.data_dir().join(kind.schema().source_file);
        fs::write(&path, contents).expect("write golden file");
    }

    pub(super) fn data_dir(&self) -> Utf8PathBuf {
        self.root.join("golden")
    }

    pub(super) fn database(&self) -> Utf8PathBuf {
        self.root.join("state/reference.db")
    }

    /// Location flags pointing at this workspace.
    pub(super) fn location_flags(&self) -> Vec<String> {
        vec![
            format!("--{ARG_DATABASE}"),
            self.database().into_string(),
            format!("--{ARG_DATA_DIR}"),
            self.data_dir().into_string(),
        ]
    }
}

/// Parse `args` as a full invocation and run it, capturing stdout as JSON.
pub(super) fn invoke(args: &[String]) -> Result<(ResponseStatus, serde_json::Value), CliError> {
    let mut invocation = vec!["regionkit".to_owned()];
    invocation.extend(args.iter().cloned());
    let cli = Cli::try_parse_from(invocation).map_err(CliError::ArgumentParsing)?;
    let mut output = Vec::new();
    let status = run_command(cli.command, &mut output)?;
    let body = serde_json::from_slice(&output).expect("stdout is JSON");
    Ok((status, body))
}
